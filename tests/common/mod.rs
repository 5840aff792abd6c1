//! Shared setup for integration tests: an environment map in the deployed
//! format, loaded through the real config loader and wired to in-memory
//! collaborators.

#![allow(dead_code)]

use ci_dispatcher::config::ConfigLoader;
use ci_dispatcher::notification::Notifier;
use ci_dispatcher::test_helpers::{MockPlatform, RecordingNotifier};
use ci_dispatcher::{Dispatcher, DispatcherConfig};
use std::collections::HashMap;
use std::sync::Arc;

pub const SERVICE_MAP: &str = r#"{
    "": {"service_name": "acme_backend", "task_family": "acme_backend_dev"},
    "worker": {"service_name": "acme_worker", "task_family": "acme_worker_dev"},
    "scheduler": {"service_name": "acme_scheduler", "task_family": "acme_scheduler_dev"}
}"#;

pub const FILE_MAP: &str = r#"{
    "worker": [{"bucket": "acme-config-dev", "key": "worker/config.env"}],
    "scheduler": [
        {"bucket": "acme-config-dev", "key": "worker/config.env"},
        {"bucket": "acme-config-dev", "key": "scheduler/config.env"}
    ]
}"#;

/// Environment as the deployed handler would see it
pub fn deployed_env() -> HashMap<String, String> {
    [
        ("PROJECT_NAME", "acme"),
        ("PROJECT_ENV", "dev"),
        ("AWS_REGION", "eu-west-1"),
        ("ECS_CLUSTER_NAME", "acme_cluster_dev"),
        ("ECS_SERVICE_MAP", SERVICE_MAP),
        ("S3_SERVICE_MAP", FILE_MAP),
        ("SLACK_WEBHOOK_URL", "https://hooks.slack.com/services/T000/B000/XXXX"),
        ("MAX_DEPLOYMENT_RETRIES", "2"),
        ("RETRY_BACKOFF_SECONDS", "0"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

pub fn load_config(env: &HashMap<String, String>) -> DispatcherConfig {
    ConfigLoader::from_source(env).expect("test environment should be valid")
}

/// Platform with a few registered revisions per family, newest first
pub fn platform() -> MockPlatform {
    MockPlatform::new()
        .with_revisions(
            "acme_backend_dev",
            &["arn:aws:ecs:eu-west-1:123456789012:task-definition/acme_backend_dev:31"],
        )
        .with_revisions(
            "acme_worker_dev",
            &[
                "arn:aws:ecs:eu-west-1:123456789012:task-definition/acme_worker_dev:12",
                "arn:aws:ecs:eu-west-1:123456789012:task-definition/acme_worker_dev:11",
            ],
        )
        .with_revisions(
            "acme_scheduler_dev",
            &["arn:aws:ecs:eu-west-1:123456789012:task-definition/acme_scheduler_dev:5"],
        )
}

pub struct Harness {
    pub dispatcher: Dispatcher,
    pub platform: Arc<MockPlatform>,
    pub notifier: Arc<RecordingNotifier>,
}

impl Harness {
    pub fn new(config: DispatcherConfig, platform: MockPlatform) -> Self {
        let platform = Arc::new(platform);
        let notifier = Arc::new(RecordingNotifier::new());
        let dispatcher = Dispatcher::from_parts(config, platform.clone(), notifier.clone())
            .expect("dispatcher should build");
        Self {
            dispatcher,
            platform,
            notifier,
        }
    }

    pub fn with_notifier(
        config: DispatcherConfig,
        platform: MockPlatform,
        notifier: Arc<dyn Notifier>,
    ) -> (Dispatcher, Arc<MockPlatform>) {
        let platform = Arc::new(platform);
        let dispatcher = Dispatcher::from_parts(config, platform.clone(), notifier)
            .expect("dispatcher should build");
        (dispatcher, platform)
    }

    pub fn default_setup() -> Self {
        Self::new(load_config(&deployed_env()), platform())
    }
}
