//! # Orchestration Platform
//!
//! The seam between the deployment executor and the managed container service.
//! [`EcsPlatform`](ecs::EcsPlatform) talks to AWS ECS; tests use the in-memory
//! platform from `test_helpers`.

pub mod ecs;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use ecs::EcsPlatform;

/// Errors returned by platform calls
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlatformError {
    #[error("{operation} failed: {message}")]
    Api { operation: String, message: String },

    #[error("service {service_name} not found in cluster {cluster}")]
    ServiceNotFound {
        cluster: String,
        service_name: String,
    },
}

impl PlatformError {
    pub fn api(operation: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Api {
            operation: operation.into(),
            message: message.to_string(),
        }
    }
}

/// One mutating update of a running service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceUpdate {
    pub cluster: String,
    pub service_name: String,
    /// Task definition ARN or `family:revision`
    pub revision: String,
    pub force_new_deployment: bool,
    pub desired_count: Option<i32>,
}

/// What the platform reports after accepting an update
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceUpdateOutput {
    /// Id of the primary deployment, when the platform returns one
    pub deployment_id: Option<String>,
    pub status: Option<String>,
}

/// Read-only snapshot of a service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDescription {
    pub service_name: String,
    pub status: Option<String>,
    pub task_definition: Option<String>,
    pub desired_count: i32,
    pub running_count: i32,
}

#[async_trait]
pub trait OrchestrationPlatform: Send + Sync + std::fmt::Debug {
    /// Deployable revisions of `task_family`, newest first
    async fn list_revisions(&self, task_family: &str) -> Result<Vec<String>, PlatformError>;

    /// Apply a new revision to a service (the only mutating call)
    async fn update_service(
        &self,
        update: &ServiceUpdate,
    ) -> Result<ServiceUpdateOutput, PlatformError>;

    /// Describe a service; `Ok(None)` when it does not exist
    async fn describe_service(
        &self,
        cluster: &str,
        service_name: &str,
    ) -> Result<Option<ServiceDescription>, PlatformError>;
}

/// Numeric revision suffix of `family:N` or a task definition ARN
pub fn revision_number(revision: &str) -> Option<u64> {
    revision.rsplit_once(':')?.1.parse().ok()
}
