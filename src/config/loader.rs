//! Configuration Loader
//!
//! Reads the dispatcher settings from an [`EnvSource`] (the process environment in
//! production, a plain map in tests), parses the two JSON-encoded service maps and
//! validates the result. Parse problems and invariant violations are collected
//! together so a single failure lists everything that needs fixing.

use super::error::{ConfigResult, ConfigurationError};
use super::{DeploymentConfig, DispatcherConfig, FeatureToggles, LogLevel, NotificationConfig};
use crate::types::{ConfigFileLocation, ServiceIdentifier, ServiceMapping};
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

/// Environment variable names
pub mod keys {
    pub const PROJECT_NAME: &str = "PROJECT_NAME";
    pub const PROJECT_ENV: &str = "PROJECT_ENV";
    pub const AWS_REGION: &str = "AWS_REGION";
    pub const LOG_LEVEL: &str = "LOG_LEVEL";
    pub const ECS_CLUSTER_NAME: &str = "ECS_CLUSTER_NAME";
    pub const ECS_SERVICE_MAP: &str = "ECS_SERVICE_MAP";
    pub const S3_SERVICE_MAP: &str = "S3_SERVICE_MAP";
    pub const SLACK_WEBHOOK_URL: &str = "SLACK_WEBHOOK_URL";
    pub const ENABLE_SLACK_NOTIFICATIONS: &str = "ENABLE_SLACK_NOTIFICATIONS";
    pub const DEPLOYMENT_TIMEOUT_SECONDS: &str = "DEPLOYMENT_TIMEOUT_SECONDS";
    pub const MAX_DEPLOYMENT_RETRIES: &str = "MAX_DEPLOYMENT_RETRIES";
    pub const RETRY_BACKOFF_SECONDS: &str = "RETRY_BACKOFF_SECONDS";
    pub const DRY_RUN: &str = "DRY_RUN";
    pub const ENABLE_ECR_MONITORING: &str = "ENABLE_ECR_MONITORING";
    pub const ENABLE_SSM_MONITORING: &str = "ENABLE_SSM_MONITORING";
    pub const ENABLE_S3_MONITORING: &str = "ENABLE_S3_MONITORING";
    pub const ENABLE_MANUAL_DEPLOY: &str = "ENABLE_MANUAL_DEPLOY";
}

/// Source of raw configuration values
pub trait EnvSource {
    /// Value for `key`; empty strings are treated as unset
    fn var(&self, key: &str) -> Option<String>;
}

/// The real process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|value| !value.is_empty())
    }
}

impl EnvSource for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).filter(|value| !value.is_empty()).cloned()
    }
}

impl EnvSource for HashMap<&str, &str> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key)
            .filter(|value| !value.is_empty())
            .map(|value| value.to_string())
    }
}

/// Builds a validated [`DispatcherConfig`]
#[derive(Debug)]
pub struct ConfigLoader<'a, S: EnvSource> {
    source: &'a S,
    errors: Vec<String>,
}

impl ConfigLoader<'static, ProcessEnv> {
    /// Load configuration from the process environment
    pub fn from_env() -> ConfigResult<DispatcherConfig> {
        static PROCESS_ENV: ProcessEnv = ProcessEnv;
        ConfigLoader::from_source(&PROCESS_ENV)
    }
}

impl<'a, S: EnvSource> ConfigLoader<'a, S> {
    /// Load configuration from an arbitrary source
    pub fn from_source(source: &'a S) -> ConfigResult<DispatcherConfig> {
        let mut loader = Self {
            source,
            errors: Vec::new(),
        };
        let config = loader.build();

        let mut errors = loader.errors;
        errors.extend(config.validation_errors());
        if !errors.is_empty() {
            return Err(ConfigurationError::validation_failed(errors));
        }

        debug!(
            "Configuration loaded: {}",
            serde_json::to_string(&sanitized_config(&config))
                .unwrap_or_else(|_| "[serialization error]".to_string())
        );
        info!(
            project = %config.project_name,
            environment = %config.environment,
            cluster = %config.cluster_name,
            services = config.services.len(),
            dry_run = config.deployment.dry_run,
            "🔧 CONFIG: Dispatcher configuration loaded"
        );

        Ok(config)
    }

    fn build(&mut self) -> DispatcherConfig {
        let log_level = match self
            .string(keys::LOG_LEVEL)
            .unwrap_or_else(|| "info".to_string())
            .parse::<LogLevel>()
        {
            Ok(level) => level,
            Err(message) => {
                self.errors.push(message);
                LogLevel::default()
            }
        };

        let services: BTreeMap<ServiceIdentifier, ServiceMapping> =
            self.json_map(keys::ECS_SERVICE_MAP);
        let file_bindings: BTreeMap<ServiceIdentifier, Vec<ConfigFileLocation>> =
            self.json_map(keys::S3_SERVICE_MAP);

        let notifications = NotificationConfig {
            enabled: self.boolean(keys::ENABLE_SLACK_NOTIFICATIONS, true),
            webhook_url: self.string(keys::SLACK_WEBHOOK_URL),
            ..NotificationConfig::default()
        };

        let defaults = DeploymentConfig::default();
        let timeout_seconds = self
            .integer(keys::DEPLOYMENT_TIMEOUT_SECONDS, defaults.timeout_seconds as i64)
            .max(0) as u64;
        let max_retries = self.integer(keys::MAX_DEPLOYMENT_RETRIES, defaults.max_retries as i64);
        if max_retries < 0 {
            self.errors
                .push("MAX_DEPLOYMENT_RETRIES must be non-negative".to_string());
        }
        let backoff_seconds =
            self.integer(keys::RETRY_BACKOFF_SECONDS, defaults.backoff_seconds as i64);
        if backoff_seconds < 0 {
            self.errors
                .push("RETRY_BACKOFF_SECONDS must be non-negative".to_string());
        }

        let deployment = DeploymentConfig {
            timeout_seconds,
            max_retries: u32::try_from(max_retries.max(0)).unwrap_or(u32::MAX),
            backoff_seconds: backoff_seconds.max(0) as u64,
            dry_run: self.boolean(keys::DRY_RUN, false),
        };

        let features = FeatureToggles {
            registry_push: self.boolean(keys::ENABLE_ECR_MONITORING, true),
            parameter_change: self.boolean(keys::ENABLE_SSM_MONITORING, true),
            object_storage_change: self.boolean(keys::ENABLE_S3_MONITORING, true),
            manual_trigger: self.boolean(keys::ENABLE_MANUAL_DEPLOY, true),
        };

        DispatcherConfig {
            project_name: self.string(keys::PROJECT_NAME).unwrap_or_default(),
            environment: self.string(keys::PROJECT_ENV).unwrap_or_default(),
            region: self
                .string(keys::AWS_REGION)
                .unwrap_or_else(|| "us-east-1".to_string()),
            log_level,
            cluster_name: self.string(keys::ECS_CLUSTER_NAME).unwrap_or_default(),
            services,
            file_bindings,
            notifications,
            deployment,
            features,
        }
    }

    fn string(&self, key: &str) -> Option<String> {
        self.source.var(key).map(|value| value.trim().to_string())
    }

    fn boolean(&mut self, key: &str, default: bool) -> bool {
        match self.string(key) {
            None => default,
            Some(raw) => match parse_bool(&raw) {
                Some(value) => value,
                None => {
                    self.errors
                        .push(format!("{key} must be a boolean (got: {raw})"));
                    default
                }
            },
        }
    }

    fn integer(&mut self, key: &str, default: i64) -> i64 {
        match self.string(key) {
            None => default,
            Some(raw) => raw.parse::<i64>().unwrap_or_else(|_| {
                self.errors
                    .push(format!("{key} must be an integer (got: {raw})"));
                default
            }),
        }
    }

    fn json_map<V: DeserializeOwned>(&mut self, key: &str) -> BTreeMap<ServiceIdentifier, V> {
        let raw = self.string(key).unwrap_or_else(|| "{}".to_string());
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            self.errors
                .push(ConfigurationError::invalid_json(key, e).to_string());
            BTreeMap::new()
        })
    }
}

/// Configuration as JSON with sensitive values masked, for logging
pub fn sanitized_config(config: &DispatcherConfig) -> serde_json::Value {
    let mut config_json = serde_json::json!(config);
    let sensitive_patterns = ["webhook", "secret", "token", "password", "credential"];
    sanitize_json_recursive(&mut config_json, &sensitive_patterns);
    config_json
}

/// Accepts the usual spellings of on/off flags
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" | "enabled" => Some(true),
        "false" | "0" | "no" | "off" | "disabled" => Some(false),
        _ => None,
    }
}

fn sanitize_json_recursive(value: &mut serde_json::Value, sensitive_patterns: &[&str]) {
    match value {
        serde_json::Value::Object(map) => {
            for (key, val) in map.iter_mut() {
                let key_lower = key.to_lowercase();
                let is_sensitive = sensitive_patterns
                    .iter()
                    .any(|pattern| key_lower.contains(pattern));

                if is_sensitive {
                    if let serde_json::Value::String(s) = val {
                        let masked = if s.chars().count() > 12 {
                            format!("{}***", s.chars().take(12).collect::<String>())
                        } else {
                            "***".to_string()
                        };
                        *val = serde_json::Value::String(format!("[MASKED: {masked}]"));
                    }
                } else {
                    sanitize_json_recursive(val, sensitive_patterns);
                }
            }
        }
        serde_json::Value::Array(items) => {
            for item in items {
                sanitize_json_recursive(item, sensitive_patterns);
            }
        }
        _ => {}
    }
}
