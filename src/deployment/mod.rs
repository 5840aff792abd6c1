//! # Deployment
//!
//! Requests, results and the two layers that act on them:
//!
//! - [`DeploymentExecutor`]: one attempt against the platform, no retries
//! - [`DeploymentOrchestrator`]: retry loop, backoff, lifecycle notifications and fan-out

pub mod executor;
pub mod orchestrator;
pub mod retry;
pub mod states;

use crate::platform::PlatformError;
use crate::registry::RegistryError;
use crate::types::ServiceIdentifier;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub use executor::{DeploymentExecutor, ExecutorOutcome};
pub use orchestrator::{DeploymentOrchestrator, FanOutReport};
pub use retry::RetryPolicy;
pub use states::DeploymentState;

/// What caused a deployment request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceEvent {
    RegistryPush,
    ParameterChange,
    FileChange,
    Manual,
}

impl fmt::Display for SourceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RegistryPush => write!(f, "registry_push"),
            Self::ParameterChange => write!(f, "parameter_change"),
            Self::FileChange => write!(f, "file_change"),
            Self::Manual => write!(f, "manual"),
        }
    }
}

/// A request to roll one service onto a revision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRequest {
    pub service: ServiceIdentifier,
    /// Explicit revision; `None` means "latest registered for the family"
    pub revision: Option<String>,
    pub reason: String,
    pub source: SourceEvent,
    pub force_new_deployment: bool,
    pub desired_count: Option<i32>,
}

impl DeploymentRequest {
    pub fn new(service: ServiceIdentifier, reason: impl Into<String>, source: SourceEvent) -> Self {
        Self {
            service,
            revision: None,
            reason: reason.into(),
            source,
            force_new_deployment: true,
            desired_count: None,
        }
    }

    pub fn with_revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = Some(revision.into());
        self
    }

    pub fn with_desired_count(mut self, desired_count: i32) -> Self {
        self.desired_count = Some(desired_count);
        self
    }
}

/// Final outcome of a (possibly retried) deployment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentResult {
    pub success: bool,
    pub service: ServiceIdentifier,
    /// Actual platform service name; empty when the identifier never resolved
    pub service_name: String,
    pub cluster_name: String,
    /// Revision that was (or would have been) applied
    pub revision: Option<String>,
    pub deployment_id: Option<String>,
    pub message: String,
    pub error: Option<String>,
    /// Typed cause behind `error`
    #[serde(skip)]
    pub failure: Option<DeploymentError>,
    pub attempts: u32,
    pub dry_run: bool,
}

/// Failure of a single attempt
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeploymentError {
    #[error(transparent)]
    Lookup(#[from] RegistryError),

    #[error("no task definitions found for family {task_family}")]
    RevisionNotFound { task_family: String },

    #[error(transparent)]
    Platform(#[from] PlatformError),

    #[error("{operation} timed out after {seconds}s")]
    Timeout { operation: String, seconds: u64 },

    #[error("deployment cancelled")]
    Cancelled,
}

impl DeploymentError {
    /// Whether another attempt could succeed.
    ///
    /// A lookup failure is a configuration problem and will fail identically on
    /// every attempt. Cancellation ends the invocation.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Lookup(_) | Self::Cancelled)
    }
}
