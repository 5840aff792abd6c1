//! Single deployment attempt.

use super::{DeploymentError, DeploymentRequest};
use crate::cancellation::Cancellation;
use crate::config::DeploymentConfig;
use crate::platform::{revision_number, OrchestrationPlatform, PlatformError, ServiceUpdate};
use crate::registry::ServiceRegistry;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// What one successful attempt produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorOutcome {
    pub service_name: String,
    pub cluster_name: String,
    pub revision: String,
    pub deployment_id: Option<String>,
    pub message: String,
    pub dry_run: bool,
}

/// Resolves a request against the registry and applies it to the platform
#[derive(Debug, Clone)]
pub struct DeploymentExecutor {
    registry: ServiceRegistry,
    platform: Arc<dyn OrchestrationPlatform>,
    call_timeout: Duration,
    dry_run: bool,
}

impl DeploymentExecutor {
    pub fn new(
        registry: ServiceRegistry,
        platform: Arc<dyn OrchestrationPlatform>,
        config: &DeploymentConfig,
    ) -> Self {
        Self {
            registry,
            platform,
            call_timeout: config.timeout(),
            dry_run: config.dry_run,
        }
    }

    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// One attempt. Issues at most one `update_service` call and none in dry-run mode.
    pub async fn execute(
        &self,
        request: &DeploymentRequest,
        cancellation: &Cancellation,
    ) -> Result<ExecutorOutcome, DeploymentError> {
        let mapping = self.registry.resolve(&request.service)?;
        let cluster_name = self.registry.cluster_name().to_string();

        let revision = match request.revision.as_deref().filter(|r| !r.is_empty()) {
            Some(revision) => revision.to_string(),
            None => {
                self.latest_revision(&mapping.task_family, cancellation)
                    .await?
            }
        };

        if self.dry_run {
            info!(
                service = %request.service,
                service_name = %mapping.service_name,
                cluster = %cluster_name,
                revision = %revision,
                "🧪 DRY RUN: Skipping service update"
            );
            return Ok(ExecutorOutcome {
                service_name: mapping.service_name.clone(),
                cluster_name,
                revision,
                deployment_id: None,
                message: "Dry run successful - no actual deployment performed".to_string(),
                dry_run: true,
            });
        }

        let update = ServiceUpdate {
            cluster: cluster_name.clone(),
            service_name: mapping.service_name.clone(),
            revision: revision.clone(),
            force_new_deployment: request.force_new_deployment,
            desired_count: request.desired_count,
        };

        debug!(
            service_name = %update.service_name,
            cluster = %update.cluster,
            revision = %update.revision,
            desired_count = ?update.desired_count,
            "Updating service"
        );

        let output = self
            .bounded("UpdateService", cancellation, self.platform.update_service(&update))
            .await?;

        Ok(ExecutorOutcome {
            message: format!(
                "Successfully deployed {} to {}",
                mapping.service_name, cluster_name
            ),
            service_name: mapping.service_name.clone(),
            cluster_name,
            revision,
            deployment_id: output.deployment_id,
            dry_run: false,
        })
    }

    /// Newest registered revision for `task_family`
    async fn latest_revision(
        &self,
        task_family: &str,
        cancellation: &Cancellation,
    ) -> Result<String, DeploymentError> {
        let revisions = self
            .bounded(
                "ListTaskDefinitions",
                cancellation,
                self.platform.list_revisions(task_family),
            )
            .await?;

        if !is_newest_first(&revisions) {
            warn!(
                family = %task_family,
                revisions = ?revisions,
                "Platform returned revisions out of order, using the first entry"
            );
        }

        revisions
            .into_iter()
            .next()
            .ok_or_else(|| DeploymentError::RevisionNotFound {
                task_family: task_family.to_string(),
            })
    }

    /// Bound a platform call by the per-call timeout and the invocation's cancellation
    async fn bounded<T, F>(
        &self,
        operation: &str,
        cancellation: &Cancellation,
        call: F,
    ) -> Result<T, DeploymentError>
    where
        F: Future<Output = Result<T, PlatformError>>,
    {
        if cancellation.is_cancelled() {
            return Err(DeploymentError::Cancelled);
        }

        tokio::select! {
            biased;
            _ = cancellation.cancelled() => Err(DeploymentError::Cancelled),
            outcome = tokio::time::timeout(self.call_timeout, call) => match outcome {
                Ok(result) => result.map_err(DeploymentError::from),
                Err(_) => Err(DeploymentError::Timeout {
                    operation: operation.to_string(),
                    seconds: self.call_timeout.as_secs(),
                }),
            },
        }
    }
}

/// Revision numbers never increase along the list (unparseable entries are ignored)
fn is_newest_first(revisions: &[String]) -> bool {
    let numbers: Vec<u64> = revisions
        .iter()
        .filter_map(|revision| revision_number(revision))
        .collect();
    numbers.windows(2).all(|pair| pair[0] >= pair[1])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DispatcherConfig;
    use crate::deployment::SourceEvent;
    use crate::test_helpers::MockPlatform;
    use crate::types::ServiceIdentifier;

    fn executor(platform: Arc<MockPlatform>, dry_run: bool) -> DeploymentExecutor {
        let mut config = DispatcherConfig::new("acme", "dev", "acme_cluster_dev")
            .with_service(ServiceIdentifier::Primary, "acme_backend", "acme_backend_dev")
            .with_service(ServiceIdentifier::named("worker"), "acme_worker", "acme_worker_dev");
        config.deployment.dry_run = dry_run;
        let registry = ServiceRegistry::new(Arc::new(config.clone()));
        DeploymentExecutor::new(registry, platform, &config.deployment)
    }

    fn request(service: ServiceIdentifier) -> DeploymentRequest {
        DeploymentRequest::new(service, "test", SourceEvent::Manual)
    }

    #[tokio::test]
    async fn test_resolves_latest_revision() {
        let platform = Arc::new(MockPlatform::new().with_revisions(
            "acme_worker_dev",
            &["acme_worker_dev:12", "acme_worker_dev:11", "acme_worker_dev:3"],
        ));
        let executor = executor(platform.clone(), false);

        let outcome = executor
            .execute(&request(ServiceIdentifier::named("worker")), &Cancellation::never())
            .await
            .unwrap();

        assert_eq!(outcome.revision, "acme_worker_dev:12");
        assert_eq!(outcome.service_name, "acme_worker");
        assert_eq!(outcome.cluster_name, "acme_cluster_dev");
        assert!(outcome.deployment_id.is_some());
        assert!(!outcome.dry_run);

        let updates = platform.updates();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].service_name, "acme_worker");
        assert_eq!(updates[0].revision, "acme_worker_dev:12");
        assert!(updates[0].force_new_deployment);
    }

    #[tokio::test]
    async fn test_explicit_revision_skips_listing() {
        let platform = Arc::new(MockPlatform::new());
        let executor = executor(platform.clone(), false);

        let outcome = executor
            .execute(
                &request(ServiceIdentifier::Primary)
                    .with_revision("acme_backend_dev:4")
                    .with_desired_count(2),
                &Cancellation::never(),
            )
            .await
            .unwrap();

        assert_eq!(outcome.revision, "acme_backend_dev:4");
        assert_eq!(platform.list_calls(), 0);
        assert_eq!(platform.updates()[0].desired_count, Some(2));
    }

    #[tokio::test]
    async fn test_unknown_service_is_lookup_error() {
        let platform = Arc::new(MockPlatform::new());
        let err = executor(platform.clone(), false)
            .execute(&request(ServiceIdentifier::named("billing")), &Cancellation::never())
            .await
            .unwrap_err();

        assert!(matches!(err, DeploymentError::Lookup(_)));
        assert!(!err.is_retryable());
        assert_eq!(platform.mutation_count(), 0);
    }

    #[tokio::test]
    async fn test_no_revisions_is_revision_not_found() {
        let platform = Arc::new(MockPlatform::new());
        let err = executor(platform.clone(), false)
            .execute(&request(ServiceIdentifier::named("worker")), &Cancellation::never())
            .await
            .unwrap_err();

        assert_eq!(
            err,
            DeploymentError::RevisionNotFound {
                task_family: "acme_worker_dev".to_string()
            }
        );
        assert_eq!(platform.mutation_count(), 0);
    }

    #[tokio::test]
    async fn test_service_missing_from_cluster_is_platform_error() {
        let platform = Arc::new(
            MockPlatform::new()
                .with_revisions("acme_worker_dev", &["acme_worker_dev:9"])
                .with_missing_service("acme_worker"),
        );
        let err = executor(platform.clone(), false)
            .execute(&request(ServiceIdentifier::named("worker")), &Cancellation::never())
            .await
            .unwrap_err();

        assert_eq!(
            err,
            DeploymentError::Platform(PlatformError::ServiceNotFound {
                cluster: "acme_cluster_dev".to_string(),
                service_name: "acme_worker".to_string(),
            })
        );
        assert_eq!(
            err.to_string(),
            "service acme_worker not found in cluster acme_cluster_dev"
        );
        assert_eq!(platform.mutation_count(), 1);
    }

    #[tokio::test]
    async fn test_dry_run_resolves_but_never_mutates() {
        let platform = Arc::new(
            MockPlatform::new().with_revisions("acme_worker_dev", &["acme_worker_dev:9"]),
        );
        let executor = executor(platform.clone(), true);

        let outcome = executor
            .execute(&request(ServiceIdentifier::named("worker")), &Cancellation::never())
            .await
            .unwrap();

        assert!(outcome.dry_run);
        assert!(outcome.deployment_id.is_none());
        assert_eq!(outcome.revision, "acme_worker_dev:9");
        assert_eq!(platform.list_calls(), 1);
        assert_eq!(platform.mutation_count(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_before_call() {
        let platform = Arc::new(
            MockPlatform::new().with_revisions("acme_worker_dev", &["acme_worker_dev:9"]),
        );
        let (handle, cancellation) = Cancellation::pair();
        handle.cancel();

        let err = executor(platform.clone(), false)
            .execute(&request(ServiceIdentifier::named("worker")), &cancellation)
            .await
            .unwrap_err();

        assert_eq!(err, DeploymentError::Cancelled);
        assert_eq!(platform.mutation_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_platform_call_times_out() {
        let platform = Arc::new(
            MockPlatform::new()
                .with_revisions("acme_worker_dev", &["acme_worker_dev:9"])
                .with_update_delay(Duration::from_secs(3600)),
        );

        let err = executor(platform, false)
            .execute(&request(ServiceIdentifier::named("worker")), &Cancellation::never())
            .await
            .unwrap_err();

        assert_eq!(
            err,
            DeploymentError::Timeout {
                operation: "UpdateService".to_string(),
                seconds: 600
            }
        );
        assert!(err.is_retryable());
    }

    #[test]
    fn test_is_newest_first() {
        let ordered = vec!["f:10".to_string(), "f:9".to_string(), "f:2".to_string()];
        assert!(is_newest_first(&ordered));

        let unordered = vec!["f:9".to_string(), "f:10".to_string()];
        assert!(!is_newest_first(&unordered));

        assert!(is_newest_first(&[]));
    }
}
