//! # Dispatcher Configuration
//!
//! Configuration is read once at process start from environment variables (the
//! hosting model for a short-lived event handler) and is immutable afterwards.
//! The loaded [`DispatcherConfig`] is wrapped in an `Arc` and handed to every
//! component constructor; there is no global configuration state.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use ci_dispatcher::config::ConfigLoader;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConfigLoader::from_env()?;
//!
//! println!("cluster: {}", config.cluster_name);
//! println!("retries: {}", config.deployment.max_retries);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use crate::types::{ConfigFileLocation, ServiceIdentifier, ServiceMapping};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::{parse_bool, sanitized_config, ConfigLoader, EnvSource, ProcessEnv};

/// Log verbosity accepted by `LOG_LEVEL`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Directive understood by `tracing_subscriber::EnvFilter`
    pub fn as_filter_directive(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_filter_directive())
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            _ => Err(format!(
                "LOG_LEVEL must be one of: debug, info, warn, error (got: {s})"
            )),
        }
    }
}

/// Webhook notification settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationConfig {
    pub enabled: bool,
    pub webhook_url: Option<String>,
    /// Upper bound for one webhook delivery
    pub timeout_seconds: u64,
}

impl NotificationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// True when notifications are enabled and an endpoint is configured
    pub fn is_active(&self) -> bool {
        self.enabled && self.webhook_url.as_deref().is_some_and(|url| !url.is_empty())
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            webhook_url: None,
            timeout_seconds: 10,
        }
    }
}

/// Deployment retry and timeout settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentConfig {
    /// Bound applied to each call into the orchestration platform
    pub timeout_seconds: u64,
    /// Retries after the first attempt (R retries means R + 1 attempts)
    pub max_retries: u32,
    /// Backoff unit; the n-th retry waits `n * backoff_seconds`
    pub backoff_seconds: u64,
    /// Resolve everything but skip the mutating platform call
    pub dry_run: bool,
}

impl DeploymentConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn backoff_unit(&self) -> Duration {
        Duration::from_secs(self.backoff_seconds)
    }
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 600,
            max_retries: 2,
            backoff_seconds: 5,
            dry_run: false,
        }
    }
}

/// Per-source feature toggles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureToggles {
    pub registry_push: bool,
    pub parameter_change: bool,
    pub object_storage_change: bool,
    pub manual_trigger: bool,
}

impl Default for FeatureToggles {
    fn default() -> Self {
        Self {
            registry_push: true,
            parameter_change: true,
            object_storage_change: true,
            manual_trigger: true,
        }
    }
}

/// Root configuration for one dispatcher process
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatcherConfig {
    pub project_name: String,
    pub environment: String,
    pub region: String,
    pub log_level: LogLevel,

    /// Actual ECS cluster name
    pub cluster_name: String,

    /// Service identifier → actual ECS resource names
    pub services: BTreeMap<ServiceIdentifier, ServiceMapping>,

    /// Service identifier → configuration files it consumes
    pub file_bindings: BTreeMap<ServiceIdentifier, Vec<ConfigFileLocation>>,

    pub notifications: NotificationConfig,
    pub deployment: DeploymentConfig,
    pub features: FeatureToggles,
}

impl DispatcherConfig {
    /// Minimal configuration for the given project; callers fill in services.
    pub fn new(
        project_name: impl Into<String>,
        environment: impl Into<String>,
        cluster_name: impl Into<String>,
    ) -> Self {
        Self {
            project_name: project_name.into(),
            environment: environment.into(),
            region: "us-east-1".to_string(),
            log_level: LogLevel::default(),
            cluster_name: cluster_name.into(),
            services: BTreeMap::new(),
            file_bindings: BTreeMap::new(),
            notifications: NotificationConfig::default(),
            deployment: DeploymentConfig::default(),
            features: FeatureToggles::default(),
        }
    }

    /// Add a service mapping
    pub fn with_service(
        mut self,
        id: ServiceIdentifier,
        service_name: impl Into<String>,
        task_family: impl Into<String>,
    ) -> Self {
        self.services
            .insert(id, ServiceMapping::new(service_name, task_family));
        self
    }

    /// Bind a configuration file to a service
    pub fn with_file_binding(mut self, id: ServiceIdentifier, location: ConfigFileLocation) -> Self {
        self.file_bindings.entry(id).or_default().push(location);
        self
    }

    /// Every violation of the configuration's invariants, in a stable order
    pub fn validation_errors(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.project_name.is_empty() {
            errors.push("PROJECT_NAME is required".to_string());
        }
        if self.environment.is_empty() {
            errors.push("PROJECT_ENV is required".to_string());
        }
        if self.cluster_name.is_empty() {
            errors.push("ECS_CLUSTER_NAME is required".to_string());
        }

        if self.services.is_empty() {
            errors.push(
                "ECS_SERVICE_MAP is required and must contain at least one service".to_string(),
            );
        }
        for (id, mapping) in &self.services {
            if mapping.service_name.is_empty() {
                errors.push(format!("service '{id}': service_name is required"));
            }
            if mapping.task_family.is_empty() {
                errors.push(format!("service '{id}': task_family is required"));
            }
        }

        if self.notifications.enabled
            && self
                .notifications
                .webhook_url
                .as_deref()
                .map_or(true, str::is_empty)
        {
            errors.push(
                "SLACK_WEBHOOK_URL is required when ENABLE_SLACK_NOTIFICATIONS is true"
                    .to_string(),
            );
        }

        if self.deployment.timeout_seconds == 0 {
            errors.push("DEPLOYMENT_TIMEOUT_SECONDS must be positive".to_string());
        }

        errors
    }

    /// Validate configuration, reporting all violations at once
    pub fn validate(&self) -> ConfigResult<()> {
        let errors = self.validation_errors();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigurationError::validation_failed(errors))
        }
    }

    /// JSON view with the webhook URL and other secrets masked
    pub fn sanitized(&self) -> serde_json::Value {
        sanitized_config(self)
    }

    /// Configured identifiers in stable order
    pub fn service_identifiers(&self) -> Vec<ServiceIdentifier> {
        self.services.keys().cloned().collect()
    }
}
