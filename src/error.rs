//! Error types for the dispatcher.
//!

use crate::config::ConfigurationError;
use crate::notification::NotificationError;
use crate::registry::RegistryError;
use thiserror::Error;

/// Failure surfaced to the caller of the event router
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DispatchError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Lookup error: {0}")]
    Registry(#[from] RegistryError),

    #[error("unsupported event source: {source_name} (event {event_id})")]
    UnsupportedSource {
        source_name: String,
        event_id: String,
    },

    #[error("failed to parse {source_name} event detail: {reason}")]
    MalformedEvent { source_name: String, reason: String },

    #[error("{event_kind} event must include '{field}' field")]
    MissingField { event_kind: String, field: String },

    #[error("deployment of {service} failed after {attempts} attempt(s): {reason}")]
    DeploymentFailed {
        service: String,
        attempts: u32,
        reason: String,
    },

    #[error("some deployments failed ({failed} of {total}): {}", failures.join("; "))]
    PartialFailure {
        total: usize,
        failed: usize,
        failures: Vec<String>,
    },

    #[error("Notification error: {0}")]
    Notification(#[from] NotificationError),
}

impl DispatchError {
    pub fn malformed_event(source_name: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::MalformedEvent {
            source_name: source_name.into(),
            reason: reason.to_string(),
        }
    }

    pub fn missing_field(event_kind: impl Into<String>, field: impl Into<String>) -> Self {
        Self::MissingField {
            event_kind: event_kind.into(),
            field: field.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DispatchError>;
