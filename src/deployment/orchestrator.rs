//! # Deployment Orchestrator
//!
//! Wraps the executor with the retry loop and the lifecycle notifications:
//!
//! 1. "initiating" info notification
//! 2. up to `max_retries + 1` attempts, sleeping `attempt × backoff_unit` between them
//! 3. success or failure notification
//!
//! Notification delivery never changes the result. Fan-out runs targets one at a
//! time, in input order, and one target's failure never stops the rest.

use super::{
    DeploymentError, DeploymentExecutor, DeploymentRequest, DeploymentResult, DeploymentState,
    RetryPolicy,
};
use crate::cancellation::Cancellation;
use crate::error::DispatchError;
use crate::logging::log_deployment_operation;
use crate::notification::{Notification, Notifier};
use crate::types::ServiceIdentifier;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct DeploymentOrchestrator {
    executor: DeploymentExecutor,
    notifier: Arc<dyn Notifier>,
    policy: RetryPolicy,
    environment: String,
}

impl DeploymentOrchestrator {
    pub fn new(
        executor: DeploymentExecutor,
        notifier: Arc<dyn Notifier>,
        policy: RetryPolicy,
        environment: impl Into<String>,
    ) -> Self {
        Self {
            executor,
            notifier,
            policy,
            environment: environment.into(),
        }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Deploy one service with retries. Never panics on failure: the outcome is
    /// always a [`DeploymentResult`].
    ///
    /// Once the invocation is cancelled no further attempt or notification is
    /// started, and the result carries the most recent real failure.
    pub async fn deploy(
        &self,
        request: &DeploymentRequest,
        cancellation: &Cancellation,
    ) -> DeploymentResult {
        let service_name = self.display_name(&request.service);
        let mut state = DeploymentState::Initiated;

        log_deployment_operation(
            "deploy",
            &request.service,
            &state,
            Some(&format!("source={} reason={}", request.source, request.reason)),
        );

        if cancellation.is_cancelled() {
            warn!(service = %request.service, "Invocation already cancelled, deployment not started");
            advance(&request.service, &mut state, DeploymentState::Failed, None);
            return self.cancelled_before_start(request);
        }

        self.notify(
            Notification::deployment_initiating(&service_name, &request.reason),
            cancellation,
        )
        .await;

        let mut attempt = 0;
        let mut last_failure: Option<DeploymentError> = None;
        let (failure, cancelled) = loop {
            attempt += 1;
            advance(&request.service, &mut state, DeploymentState::Attempting, None);
            debug!(
                service = %request.service,
                attempt,
                total_attempts = self.policy.total_attempts(),
                "Deployment attempt"
            );

            let error = match self.executor.execute(request, cancellation).await {
                Ok(outcome) => {
                    advance(
                        &request.service,
                        &mut state,
                        DeploymentState::Succeeded,
                        Some(&outcome.message),
                    );
                    info!(
                        service = %request.service,
                        service_name = %outcome.service_name,
                        cluster = %outcome.cluster_name,
                        revision = %outcome.revision,
                        deployment_id = ?outcome.deployment_id,
                        attempts = attempt,
                        dry_run = outcome.dry_run,
                        "🚀 DEPLOY: Deployment completed successfully"
                    );

                    self.notify(
                        Notification::deployment_succeeded(
                            &outcome.service_name,
                            outcome.deployment_id.clone(),
                            Some(outcome.revision.clone()),
                        ),
                        cancellation,
                    )
                    .await;

                    return DeploymentResult {
                        success: true,
                        service: request.service.clone(),
                        service_name: outcome.service_name,
                        cluster_name: outcome.cluster_name,
                        revision: Some(outcome.revision),
                        deployment_id: outcome.deployment_id,
                        message: outcome.message,
                        error: None,
                        failure: None,
                        attempts: attempt,
                        dry_run: outcome.dry_run,
                    };
                }
                Err(error) => error,
            };

            let error_text = error.to_string();
            advance(
                &request.service,
                &mut state,
                DeploymentState::AttemptFailed,
                Some(&error_text),
            );
            error!(
                service = %request.service,
                attempt,
                error = %error,
                "Deployment attempt failed"
            );

            // A cancelled attempt says nothing about the service; report what
            // failed before it.
            if error == DeploymentError::Cancelled {
                break match last_failure {
                    Some(previous) => (previous, true),
                    None => (error, false),
                };
            }

            if !error.is_retryable() || !self.policy.has_attempts_after(attempt) {
                break (error, false);
            }

            let backoff = self.policy.backoff_for(attempt);
            warn!(
                service = %request.service,
                attempt,
                max_retries = self.policy.max_retries,
                backoff_ms = backoff.as_millis() as u64,
                "Retrying deployment"
            );

            tokio::select! {
                biased;
                _ = cancellation.cancelled() => {
                    warn!(service = %request.service, attempt, "Deployment cancelled during backoff");
                    break (error, true);
                }
                _ = tokio::time::sleep(backoff) => {}
            }
            last_failure = Some(error);
        };

        let error = if cancelled {
            format!(
                "Failed after {}: {failure} (cancelled)",
                attempts_phrase(attempt)
            )
        } else {
            format!("Failed after {}: {failure}", attempts_phrase(attempt))
        };
        advance(
            &request.service,
            &mut state,
            DeploymentState::Failed,
            Some(&error),
        );
        error!(
            service = %request.service,
            attempts = attempt,
            error = %error,
            "Deployment failed after all retries"
        );

        self.notify(
            Notification::deployment_failed(&service_name, &error),
            cancellation,
        )
        .await;

        let resolved = self.executor.registry().resolve(&request.service).is_ok();
        DeploymentResult {
            success: false,
            service: request.service.clone(),
            service_name: if resolved { service_name } else { String::new() },
            cluster_name: self.executor.registry().cluster_name().to_string(),
            revision: request.revision.clone(),
            deployment_id: None,
            message: format!("Deployment failed after {}", attempts_phrase(attempt)),
            error: Some(error),
            failure: Some(failure),
            attempts: attempt,
            dry_run: self.executor.is_dry_run(),
        }
    }

    /// Deploy each request in order, isolating failures per target.
    ///
    /// Targets reached after cancellation are reported as cancelled without
    /// touching the platform or the notifier.
    pub async fn deploy_multiple(
        &self,
        requests: &[DeploymentRequest],
        cancellation: &Cancellation,
    ) -> Vec<DeploymentResult> {
        let identifiers: Vec<String> = requests.iter().map(|r| r.service.to_string()).collect();
        info!(
            count = requests.len(),
            services = ?identifiers,
            "Deploying multiple services"
        );

        let mut results = Vec::with_capacity(requests.len());
        for request in requests {
            results.push(self.deploy(request, cancellation).await);
        }

        let report = FanOutReport::from_results(&results);
        info!(
            total = report.total,
            successful = report.succeeded,
            failed = report.failures.len(),
            "Multiple deployments completed"
        );

        results
    }

    fn cancelled_before_start(&self, request: &DeploymentRequest) -> DeploymentResult {
        let registry = self.executor.registry();
        DeploymentResult {
            success: false,
            service: request.service.clone(),
            service_name: registry
                .resolve(&request.service)
                .map(|mapping| mapping.service_name.clone())
                .unwrap_or_default(),
            cluster_name: registry.cluster_name().to_string(),
            revision: request.revision.clone(),
            deployment_id: None,
            message: "Deployment cancelled before the first attempt".to_string(),
            error: Some(DeploymentError::Cancelled.to_string()),
            failure: Some(DeploymentError::Cancelled),
            attempts: 0,
            dry_run: self.executor.is_dry_run(),
        }
    }

    /// Platform service name, or `(unknown)` for identifiers that do not resolve
    fn display_name(&self, service: &ServiceIdentifier) -> String {
        self.executor
            .registry()
            .resolve(service)
            .map(|mapping| mapping.service_name.clone())
            .unwrap_or_else(|_| "(unknown)".to_string())
    }

    /// Deliver `notification` unless the invocation is (or becomes) cancelled
    async fn notify(&self, notification: Notification, cancellation: &Cancellation) {
        let notification = notification.with_environment(self.environment.clone());
        if cancellation.is_cancelled() {
            debug!(
                service = %notification.service,
                state = %notification.state_name,
                "Invocation cancelled, notification not sent"
            );
            return;
        }

        tokio::select! {
            biased;
            _ = cancellation.cancelled() => {
                warn!(
                    service = %notification.service,
                    state = %notification.state_name,
                    "Notification abandoned, invocation cancelled"
                );
            }
            delivered = self.notifier.send(&notification) => {
                if let Err(e) = delivered {
                    warn!(
                        service = %notification.service,
                        state = %notification.state_name,
                        error = %e,
                        "Notification delivery failed"
                    );
                }
            }
        }
    }
}

fn advance(
    service: &ServiceIdentifier,
    state: &mut DeploymentState,
    next: DeploymentState,
    details: Option<&str>,
) {
    debug_assert!(
        state.can_transition_to(next),
        "invalid deployment transition {state} -> {next}"
    );
    *state = next;
    log_deployment_operation("deploy", service, state, details);
}

fn attempts_phrase(attempts: u32) -> String {
    if attempts == 1 {
        "1 attempt".to_string()
    } else {
        format!("{attempts} attempts")
    }
}

/// Aggregate view over a fan-out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FanOutReport {
    pub total: usize,
    pub succeeded: usize,
    /// `"<identifier>: <cause>"` for every failed target, in input order
    pub failures: Vec<String>,
}

impl FanOutReport {
    pub fn from_results(results: &[DeploymentResult]) -> Self {
        let failures: Vec<String> = results
            .iter()
            .filter(|result| !result.success)
            .map(|result| {
                format!(
                    "{}: {}",
                    result.service,
                    result.error.as_deref().unwrap_or(&result.message)
                )
            })
            .collect();

        Self {
            total: results.len(),
            succeeded: results.len() - failures.len(),
            failures,
        }
    }

    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty()
    }

    /// `Err(PartialFailure)` naming every failed target when any failed
    pub fn into_result(self) -> Result<Self, DispatchError> {
        if self.all_succeeded() {
            Ok(self)
        } else {
            Err(DispatchError::PartialFailure {
                total: self.total,
                failed: self.failures.len(),
                failures: self.failures,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deployment::SourceEvent;
    use crate::notification::NotificationKind;
    use crate::registry::ServiceRegistry;
    use crate::test_helpers::{
        sample_config, sample_platform, FailingNotifier, MockPlatform, RecordingNotifier,
    };
    use crate::notification::NotificationError;
    use crate::platform::PlatformError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Takes ten seconds to deliver anything
    #[derive(Debug, Default)]
    struct SlowNotifier {
        calls: AtomicUsize,
    }

    impl SlowNotifier {
        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Notifier for SlowNotifier {
        async fn send(&self, _notification: &Notification) -> Result<(), NotificationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(())
        }
    }

    fn orchestrator(
        platform: Arc<MockPlatform>,
        notifier: Arc<dyn Notifier>,
        policy: RetryPolicy,
    ) -> DeploymentOrchestrator {
        let config = sample_config();
        let registry = ServiceRegistry::new(Arc::new(config.clone()));
        let executor = DeploymentExecutor::new(registry, platform, &config.deployment);
        DeploymentOrchestrator::new(executor, notifier, policy, "dev")
    }

    fn request(service: ServiceIdentifier) -> DeploymentRequest {
        DeploymentRequest::new(service, "test deploy", SourceEvent::Manual)
    }

    #[tokio::test]
    async fn test_success_sends_initiating_then_success() {
        let platform = Arc::new(sample_platform());
        let notifier = Arc::new(RecordingNotifier::new());
        let orchestrator = orchestrator(
            platform.clone(),
            notifier.clone(),
            RetryPolicy::new(2, Duration::ZERO),
        );

        let result = orchestrator
            .deploy(&request(ServiceIdentifier::named("worker")), &Cancellation::never())
            .await;

        assert!(result.success);
        assert_eq!(result.attempts, 1);
        assert_eq!(result.service_name, "acme_worker");
        assert_eq!(result.revision.as_deref(), Some("acme_worker_dev:12"));
        assert!(result.deployment_id.is_some());
        assert_eq!(platform.mutation_count(), 1);

        assert_eq!(
            notifier.kinds(),
            vec![NotificationKind::Info, NotificationKind::Success]
        );
        assert_eq!(
            notifier.state_names(),
            vec!["DEPLOYMENT_INITIATING", "DEPLOYMENT_COMPLETED"]
        );
        let sent = notifier.sent();
        assert_eq!(sent[0].service, "acme_worker");
        assert_eq!(sent[1].environment, "dev");
        assert_eq!(sent[1].revision.as_deref(), Some("acme_worker_dev:12"));
    }

    #[tokio::test]
    async fn test_transient_failure_recovers_on_retry() {
        let platform = Arc::new(sample_platform().with_transient_failures(1));
        let notifier = Arc::new(RecordingNotifier::new());
        let orchestrator = orchestrator(
            platform.clone(),
            notifier.clone(),
            RetryPolicy::new(2, Duration::ZERO),
        );

        let result = orchestrator
            .deploy(&request(ServiceIdentifier::Primary), &Cancellation::never())
            .await;

        assert!(result.success);
        assert_eq!(result.attempts, 2);
        assert_eq!(platform.mutation_count(), 2);
        assert_eq!(
            notifier.kinds(),
            vec![NotificationKind::Info, NotificationKind::Success]
        );
    }

    #[tokio::test]
    async fn test_exhausted_retries_report_attempt_count() {
        let platform =
            Arc::new(sample_platform().with_failing_service("acme_worker", "service is draining"));
        let notifier = Arc::new(RecordingNotifier::new());
        let orchestrator = orchestrator(
            platform.clone(),
            notifier.clone(),
            RetryPolicy::new(2, Duration::ZERO),
        );

        let result = orchestrator
            .deploy(&request(ServiceIdentifier::named("worker")), &Cancellation::never())
            .await;

        assert!(!result.success);
        assert_eq!(result.attempts, 3);
        assert_eq!(platform.mutation_count(), 3);
        assert_eq!(result.message, "Deployment failed after 3 attempts");
        let error = result.error.unwrap();
        assert!(error.starts_with("Failed after 3 attempts: "));
        assert!(error.contains("service is draining"));

        let sent = notifier.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].kind, NotificationKind::Error);
        assert_eq!(sent[1].reason, error);
    }

    #[tokio::test]
    async fn test_lookup_failure_is_not_retried() {
        let platform = Arc::new(sample_platform());
        let notifier = Arc::new(RecordingNotifier::new());
        let orchestrator = orchestrator(
            platform.clone(),
            notifier.clone(),
            RetryPolicy::new(5, Duration::ZERO),
        );

        let result = orchestrator
            .deploy(&request(ServiceIdentifier::named("billing")), &Cancellation::never())
            .await;

        assert!(!result.success);
        assert_eq!(result.attempts, 1);
        assert!(result.service_name.is_empty());
        assert!(matches!(result.failure, Some(DeploymentError::Lookup(_))));
        assert_eq!(result.message, "Deployment failed after 1 attempt");
        assert!(result
            .error
            .as_deref()
            .unwrap()
            .starts_with("Failed after 1 attempt: "));
        assert_eq!(platform.mutation_count(), 0);
        assert_eq!(notifier.sent()[0].service, "(unknown)");
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_is_linear() {
        let platform =
            Arc::new(sample_platform().with_failing_service("acme_worker", "throttled"));
        let orchestrator = orchestrator(
            platform.clone(),
            Arc::new(RecordingNotifier::new()),
            RetryPolicy::new(2, Duration::from_secs(5)),
        );

        let started = tokio::time::Instant::now();
        let result = orchestrator
            .deploy(&request(ServiceIdentifier::named("worker")), &Cancellation::never())
            .await;

        assert!(!result.success);
        assert_eq!(result.attempts, 3);
        // 5s after the first failure, 10s after the second
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(15), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_secs(16), "elapsed {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_during_backoff_stops_retrying() {
        let platform =
            Arc::new(sample_platform().with_failing_service("acme_worker", "throttled"));
        let orchestrator = orchestrator(
            platform.clone(),
            Arc::new(RecordingNotifier::new()),
            RetryPolicy::new(3, Duration::from_secs(60)),
        );

        let (handle, cancellation) = Cancellation::pair();
        handle.cancel_after(Duration::from_secs(30));

        let result = orchestrator
            .deploy(&request(ServiceIdentifier::named("worker")), &cancellation)
            .await;

        assert!(!result.success);
        assert_eq!(result.attempts, 1);
        assert_eq!(platform.mutation_count(), 1);
        assert!(result.error.unwrap().contains("throttled"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_during_attempt_reports_previous_failure() {
        let platform = Arc::new(
            sample_platform()
                .with_failing_service("acme_worker", "service is draining")
                .with_update_delay(Duration::from_secs(3)),
        );
        let notifier = Arc::new(RecordingNotifier::new());
        let orchestrator = orchestrator(
            platform.clone(),
            notifier.clone(),
            RetryPolicy::new(2, Duration::from_secs(5)),
        );

        // attempt 1 fails at t=3, attempt 2 starts at t=8 and is cut off at t=9
        let (handle, cancellation) = Cancellation::pair();
        handle.cancel_after(Duration::from_secs(9));

        let result = orchestrator
            .deploy(&request(ServiceIdentifier::named("worker")), &cancellation)
            .await;

        assert!(!result.success);
        assert_eq!(result.attempts, 2);
        assert_eq!(platform.mutation_count(), 2);
        assert_eq!(
            result.failure,
            Some(DeploymentError::Platform(PlatformError::api(
                "UpdateService",
                "service is draining"
            )))
        );
        let error = result.error.unwrap();
        assert!(error.starts_with("Failed after 2 attempts: "), "{error}");
        assert!(error.contains("service is draining"), "{error}");
        assert!(error.ends_with("(cancelled)"), "{error}");
        // no failure notice once the invocation is cancelled
        assert_eq!(notifier.kinds(), vec![NotificationKind::Info]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_invocation_sends_nothing() {
        let platform = Arc::new(sample_platform());
        let notifier = Arc::new(SlowNotifier::default());
        let orchestrator = orchestrator(
            platform.clone(),
            notifier.clone(),
            RetryPolicy::new(2, Duration::from_secs(5)),
        );
        let (handle, cancellation) = Cancellation::pair();
        handle.cancel();

        let started = tokio::time::Instant::now();
        let result = orchestrator
            .deploy(&request(ServiceIdentifier::named("worker")), &cancellation)
            .await;

        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(!result.success);
        assert_eq!(result.attempts, 0);
        assert_eq!(result.failure, Some(DeploymentError::Cancelled));
        assert_eq!(result.service_name, "acme_worker");
        assert_eq!(notifier.calls(), 0);
        assert_eq!(platform.mutation_count(), 0);
        assert_eq!(platform.list_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_abandons_slow_notification() {
        let platform = Arc::new(sample_platform());
        let notifier = Arc::new(SlowNotifier::default());
        let orchestrator = orchestrator(
            platform.clone(),
            notifier.clone(),
            RetryPolicy::new(2, Duration::from_secs(5)),
        );
        let (handle, cancellation) = Cancellation::pair();
        handle.cancel_after(Duration::from_secs(2));

        let started = tokio::time::Instant::now();
        let result = orchestrator
            .deploy(&request(ServiceIdentifier::named("worker")), &cancellation)
            .await;

        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(2), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_secs(3), "elapsed {elapsed:?}");
        assert!(!result.success);
        assert_eq!(result.attempts, 1);
        assert_eq!(
            result.error.as_deref(),
            Some("Failed after 1 attempt: deployment cancelled")
        );
        // only the initiating notice was started
        assert_eq!(notifier.calls(), 1);
        assert_eq!(platform.mutation_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fan_out_after_cancellation_skips_remaining_targets() {
        let platform = Arc::new(sample_platform());
        let notifier = Arc::new(SlowNotifier::default());
        let orchestrator = orchestrator(
            platform.clone(),
            notifier.clone(),
            RetryPolicy::new(2, Duration::from_secs(5)),
        );
        let (handle, cancellation) = Cancellation::pair();
        handle.cancel();

        let requests = vec![
            request(ServiceIdentifier::named("worker")),
            request(ServiceIdentifier::named("scheduler")),
            request(ServiceIdentifier::Primary),
        ];
        let started = tokio::time::Instant::now();
        let results = orchestrator.deploy_multiple(&requests, &cancellation).await;

        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| !r.success && r.attempts == 0));
        assert_eq!(notifier.calls(), 0);
        assert_eq!(platform.mutation_count(), 0);

        let report = FanOutReport::from_results(&results);
        assert_eq!(report.failures[1], "scheduler: deployment cancelled");
    }

    #[tokio::test]
    async fn test_notification_failure_does_not_change_result() {
        let platform = Arc::new(sample_platform());
        let notifier = Arc::new(FailingNotifier::new());
        let orchestrator = orchestrator(
            platform.clone(),
            notifier.clone(),
            RetryPolicy::new(2, Duration::ZERO),
        );

        let result = orchestrator
            .deploy(&request(ServiceIdentifier::named("worker")), &Cancellation::never())
            .await;

        assert!(result.success);
        assert_eq!(platform.mutation_count(), 1);
        assert_eq!(notifier.calls(), 2);
    }

    #[tokio::test]
    async fn test_fan_out_isolates_failures() {
        let platform =
            Arc::new(sample_platform().with_failing_service("acme_worker", "service is draining"));
        let orchestrator = orchestrator(
            platform.clone(),
            Arc::new(RecordingNotifier::new()),
            RetryPolicy::new(1, Duration::ZERO),
        );

        let requests = vec![
            request(ServiceIdentifier::named("worker")),
            request(ServiceIdentifier::named("scheduler")),
            request(ServiceIdentifier::Primary),
        ];
        let results = orchestrator
            .deploy_multiple(&requests, &Cancellation::never())
            .await;

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].service, ServiceIdentifier::named("worker"));
        assert!(!results[0].success);
        assert!(results[1].success);
        assert!(results[2].success);

        let report = FanOutReport::from_results(&results);
        assert_eq!(report.total, 3);
        assert_eq!(report.succeeded, 2);
        let err = report.into_result().unwrap_err();
        match err {
            DispatchError::PartialFailure { failed, failures, .. } => {
                assert_eq!(failed, 1);
                assert!(failures[0].starts_with("worker: Failed after 2 attempts"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_fan_out_report_all_succeeded() {
        let report = FanOutReport::from_results(&[]);
        assert!(report.all_succeeded());
        assert!(report.into_result().is_ok());
    }
}
