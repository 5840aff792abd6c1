//! Invocation cancellation.
//!
//! The hosting environment owns the deadline for one event. A
//! [`CancellationHandle`] trips the signal; every clone of the matching
//! [`Cancellation`] observes it, so retry sleeps and outbound calls can stop early.

use std::time::Duration;
use tokio::sync::watch;

/// Trips the paired [`Cancellation`]
#[derive(Debug, Clone)]
pub struct CancellationHandle {
    sender: watch::Sender<bool>,
}

impl CancellationHandle {
    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    /// Cancel automatically once `deadline` elapses
    pub fn cancel_after(&self, deadline: Duration) -> tokio::task::JoinHandle<()> {
        let handle = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(deadline).await;
            handle.cancel();
        })
    }
}

/// Observes cancellation of the current invocation
#[derive(Debug, Clone)]
pub struct Cancellation {
    receiver: watch::Receiver<bool>,
}

impl Cancellation {
    /// A linked handle/signal pair
    pub fn pair() -> (CancellationHandle, Self) {
        let (sender, receiver) = watch::channel(false);
        (CancellationHandle { sender }, Self { receiver })
    }

    /// A signal that never fires
    pub fn never() -> Self {
        let (_, cancellation) = Self::pair();
        cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolves once the invocation is cancelled
    pub async fn cancelled(&self) {
        let mut receiver = self.receiver.clone();
        if receiver.wait_for(|cancelled| *cancelled).await.is_err() {
            // Handle dropped without cancelling: nothing can cancel us any more.
            std::future::pending::<()>().await;
        }
    }
}

impl Default for Cancellation {
    fn default() -> Self {
        Self::never()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cancel_is_observed_by_clones() {
        let (handle, cancellation) = Cancellation::pair();
        let observer = cancellation.clone();
        assert!(!observer.is_cancelled());

        handle.cancel();
        assert!(observer.is_cancelled());
        observer.cancelled().await;
    }

    #[tokio::test]
    async fn test_never_does_not_fire() {
        let cancellation = Cancellation::never();
        let fired = tokio::time::timeout(Duration::from_millis(20), cancellation.cancelled()).await;
        assert!(fired.is_err());
        assert!(!cancellation.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_after_deadline() {
        let (handle, cancellation) = Cancellation::pair();
        handle.cancel_after(Duration::from_secs(30));

        tokio::time::timeout(Duration::from_secs(31), cancellation.cancelled())
            .await
            .expect("deadline should cancel the invocation");
    }
}
