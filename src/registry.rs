//! # Service Registry
//!
//! Typed, fail-fast lookups over the static identifier → resource mapping and the
//! configuration-file bindings. The registry borrows nothing mutable: it is built
//! once from the loaded [`DispatcherConfig`] and shared behind an `Arc`.

use crate::config::DispatcherConfig;
use crate::types::{ConfigFileLocation, ServiceIdentifier, ServiceMapping};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("service '{identifier}' not found in ECS_SERVICE_MAP")]
    NotFound { identifier: ServiceIdentifier },
}

/// Read-only view of the configured services
#[derive(Debug, Clone)]
pub struct ServiceRegistry {
    config: Arc<DispatcherConfig>,
}

impl ServiceRegistry {
    pub fn new(config: Arc<DispatcherConfig>) -> Self {
        Self { config }
    }

    /// Cluster that every configured service runs in
    pub fn cluster_name(&self) -> &str {
        &self.config.cluster_name
    }

    /// Mapping for `id`; unknown identifiers are an error, never a default
    pub fn resolve(&self, id: &ServiceIdentifier) -> Result<&ServiceMapping, RegistryError> {
        self.config
            .services
            .get(id)
            .ok_or_else(|| RegistryError::NotFound {
                identifier: id.clone(),
            })
    }

    /// Every identifier whose bindings contain exactly `(bucket, key)`.
    ///
    /// The reverse mapping is derived on each call. An empty result means no
    /// service consumes the file, which is a normal outcome.
    pub fn services_for_file(&self, bucket: &str, key: &str) -> Vec<ServiceIdentifier> {
        self.config
            .file_bindings
            .iter()
            .filter(|(_, files)| files.iter().any(|file| file.matches(bucket, key)))
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// All configured identifiers
    pub fn all_identifiers(&self) -> Vec<ServiceIdentifier> {
        self.config.service_identifiers()
    }

    /// Files bound to `id` (empty when none are configured)
    pub fn files_for(&self, id: &ServiceIdentifier) -> &[ConfigFileLocation] {
        self.config
            .file_bindings
            .get(id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Introspection summary for one identifier
    pub fn service_info(&self, id: &ServiceIdentifier) -> serde_json::Value {
        match self.resolve(id) {
            Ok(mapping) => json!({
                "identifier": id.to_string(),
                "service_name": mapping.service_name,
                "task_family": mapping.task_family,
                "cluster_name": self.config.cluster_name,
                "config_files": self.files_for(id),
            }),
            Err(e) => json!({ "error": e.to_string() }),
        }
    }
}
