use crate::notification::{Notification, NotificationError, NotificationKind, Notifier};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

/// Keeps every notification it is asked to send
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.lock().clone()
    }

    pub fn kinds(&self) -> Vec<NotificationKind> {
        self.lock().iter().map(|n| n.kind).collect()
    }

    pub fn state_names(&self) -> Vec<String> {
        self.lock().iter().map(|n| n.state_name.clone()).collect()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Notification>> {
        self.sent
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotificationError> {
        self.lock().push(notification.clone());
        Ok(())
    }
}

/// Rejects every notification as if the webhook returned 500
#[derive(Debug, Default)]
pub struct FailingNotifier {
    calls: AtomicUsize,
}

impl FailingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Notifier for FailingNotifier {
    async fn send(&self, _notification: &Notification) -> Result<(), NotificationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(NotificationError::Status { status: 500 })
    }
}
