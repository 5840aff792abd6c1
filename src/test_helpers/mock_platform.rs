use crate::platform::{
    OrchestrationPlatform, PlatformError, ServiceDescription, ServiceUpdate, ServiceUpdateOutput,
};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// In-memory platform that records every call.
///
/// Every `update_service` call is recorded, including the ones configured to
/// fail, so `mutation_count` equals the number of attempts that reached the
/// platform.
#[derive(Debug, Default)]
pub struct MockPlatform {
    revisions: HashMap<String, Vec<String>>,
    missing_services: HashSet<String>,
    failing_services: HashMap<String, String>,
    transient_failures: AtomicU32,
    update_delay: Option<Duration>,
    list_calls: AtomicUsize,
    updates: Mutex<Vec<ServiceUpdate>>,
}

impl MockPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register revisions for `family`, newest first
    pub fn with_revisions(mut self, family: &str, revisions: &[&str]) -> Self {
        self.revisions.insert(
            family.to_string(),
            revisions.iter().map(|r| (*r).to_string()).collect(),
        );
        self
    }

    /// `service_name` does not exist: `describe_service` reports it absent and
    /// updates fail with [`PlatformError::ServiceNotFound`]
    pub fn with_missing_service(mut self, service_name: &str) -> Self {
        self.missing_services.insert(service_name.to_string());
        self
    }

    /// Every update of `service_name` fails with `message`
    pub fn with_failing_service(mut self, service_name: &str, message: &str) -> Self {
        self.failing_services
            .insert(service_name.to_string(), message.to_string());
        self
    }

    /// The next `count` updates fail regardless of service
    pub fn with_transient_failures(self, count: u32) -> Self {
        self.transient_failures.store(count, Ordering::SeqCst);
        self
    }

    pub fn with_update_delay(mut self, delay: Duration) -> Self {
        self.update_delay = Some(delay);
        self
    }

    /// Recorded `update_service` calls in order
    pub fn updates(&self) -> Vec<ServiceUpdate> {
        self.lock_updates().clone()
    }

    pub fn mutation_count(&self) -> usize {
        self.lock_updates().len()
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    fn lock_updates(&self) -> MutexGuard<'_, Vec<ServiceUpdate>> {
        self.updates
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl OrchestrationPlatform for MockPlatform {
    async fn list_revisions(&self, task_family: &str) -> Result<Vec<String>, PlatformError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.revisions.get(task_family).cloned().unwrap_or_default())
    }

    async fn update_service(
        &self,
        update: &ServiceUpdate,
    ) -> Result<ServiceUpdateOutput, PlatformError> {
        let call_number = {
            let mut updates = self.lock_updates();
            updates.push(update.clone());
            updates.len()
        };

        if let Some(delay) = self.update_delay {
            tokio::time::sleep(delay).await;
        }

        if self.missing_services.contains(&update.service_name) {
            return Err(PlatformError::ServiceNotFound {
                cluster: update.cluster.clone(),
                service_name: update.service_name.clone(),
            });
        }

        if let Some(message) = self.failing_services.get(&update.service_name) {
            return Err(PlatformError::api("UpdateService", message));
        }

        let transient = self
            .transient_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |remaining| {
                remaining.checked_sub(1)
            })
            .is_ok();
        if transient {
            return Err(PlatformError::api("UpdateService", "ThrottlingException: Rate exceeded"));
        }

        Ok(ServiceUpdateOutput {
            deployment_id: Some(format!("ecs-svc/{call_number:019}")),
            status: Some("ACTIVE".to_string()),
        })
    }

    async fn describe_service(
        &self,
        _cluster: &str,
        service_name: &str,
    ) -> Result<Option<ServiceDescription>, PlatformError> {
        if self.missing_services.contains(service_name) {
            return Ok(None);
        }
        Ok(Some(ServiceDescription {
            service_name: service_name.to_string(),
            status: Some("ACTIVE".to_string()),
            task_definition: None,
            desired_count: 1,
            running_count: 1,
        }))
    }
}
