// Test Helpers Module - in-memory collaborators
//
// Stand-ins for the orchestration platform and the notification gateway so the
// executor, orchestrator and router can be exercised without AWS or a webhook.

pub mod mock_platform;
pub mod recording_notifier;

pub use mock_platform::MockPlatform;
pub use recording_notifier::{FailingNotifier, RecordingNotifier};

use crate::config::DispatcherConfig;
use crate::types::{ConfigFileLocation, ServiceIdentifier};

/// Three-service configuration used across unit and integration tests.
///
/// `worker` and `scheduler` share `s3://acme-config-dev/shared/app.env`; retries
/// back off with a zero unit so failure paths run instantly.
pub fn sample_config() -> DispatcherConfig {
    let mut config = DispatcherConfig::new("acme", "dev", "acme_cluster_dev")
        .with_service(ServiceIdentifier::Primary, "acme_backend", "acme_backend_dev")
        .with_service(ServiceIdentifier::named("worker"), "acme_worker", "acme_worker_dev")
        .with_service(
            ServiceIdentifier::named("scheduler"),
            "acme_scheduler",
            "acme_scheduler_dev",
        )
        .with_file_binding(
            ServiceIdentifier::Primary,
            ConfigFileLocation::new("acme-config-dev", "backend/app.env"),
        )
        .with_file_binding(
            ServiceIdentifier::named("worker"),
            ConfigFileLocation::new("acme-config-dev", "shared/app.env"),
        )
        .with_file_binding(
            ServiceIdentifier::named("scheduler"),
            ConfigFileLocation::new("acme-config-dev", "shared/app.env"),
        );
    config.notifications.webhook_url = Some("https://hooks.example.test/deploys".to_string());
    config.deployment.backoff_seconds = 0;
    config
}

/// [`MockPlatform`] with one registered revision per service in [`sample_config`]
pub fn sample_platform() -> MockPlatform {
    MockPlatform::new()
        .with_revisions("acme_backend_dev", &["acme_backend_dev:31", "acme_backend_dev:30"])
        .with_revisions("acme_worker_dev", &["acme_worker_dev:12"])
        .with_revisions("acme_scheduler_dev", &["acme_scheduler_dev:5"])
}
