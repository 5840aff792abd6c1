//! # Notification Gateway
//!
//! Fire-and-forget status messages to the team chat webhook. Callers treat a
//! delivery failure as a warning: it is logged and never changes the outcome of
//! the deployment that triggered it.

pub mod templates;
pub mod webhook;

use crate::config::DispatcherConfig;
use crate::deployment::DeploymentState;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

pub use webhook::WebhookNotifier;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotificationError {
    #[error("webhook returned status {status}")]
    Status { status: u16 },

    #[error("failed to send notification: {0}")]
    Transport(String),

    #[error("failed to build webhook client: {0}")]
    Client(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Success,
    Error,
    Info,
    Warning,
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Error => write!(f, "error"),
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

/// One outbound status message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,
    /// Platform service name (or a display label when it never resolved)
    pub service: String,
    pub state_name: String,
    pub reason: String,
    pub deployment_id: Option<String>,
    pub revision: Option<String>,
    /// Filled in by the gateway when left empty
    pub environment: String,
    pub timestamp: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        kind: NotificationKind,
        service: impl Into<String>,
        state_name: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            service: service.into(),
            state_name: state_name.into(),
            reason: String::new(),
            deployment_id: None,
            revision: None,
            environment: String::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    pub fn with_deployment_id(mut self, deployment_id: Option<String>) -> Self {
        self.deployment_id = deployment_id.filter(|id| !id.is_empty());
        self
    }

    pub fn with_revision(mut self, revision: Option<String>) -> Self {
        self.revision = revision.filter(|r| !r.is_empty());
        self
    }

    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }

    /// Lifecycle notification named after a deployment state
    pub fn for_state(
        kind: NotificationKind,
        service: impl Into<String>,
        state: DeploymentState,
    ) -> Self {
        Self::new(kind, service, state.notification_name())
    }

    pub fn deployment_initiating(service: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::for_state(NotificationKind::Info, service, DeploymentState::Initiated).with_reason(reason)
    }

    pub fn deployment_succeeded(
        service: impl Into<String>,
        deployment_id: Option<String>,
        revision: Option<String>,
    ) -> Self {
        Self::for_state(NotificationKind::Success, service, DeploymentState::Succeeded)
            .with_reason("Deployment completed successfully")
            .with_deployment_id(deployment_id)
            .with_revision(revision)
    }

    pub fn deployment_failed(service: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::for_state(NotificationKind::Error, service, DeploymentState::Failed).with_reason(reason)
    }
}

#[async_trait]
pub trait Notifier: Send + Sync + fmt::Debug {
    async fn send(&self, notification: &Notification) -> Result<(), NotificationError>;
}

/// Used when notifications are switched off
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledNotifier;

#[async_trait]
impl Notifier for DisabledNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotificationError> {
        debug!(
            service = %notification.service,
            kind = %notification.kind,
            "Notifications disabled, skipping"
        );
        Ok(())
    }
}

/// Pick the gateway implementation for `config`
pub fn notifier_from_config(
    config: &DispatcherConfig,
) -> Result<Arc<dyn Notifier>, NotificationError> {
    if !config.notifications.enabled {
        return Ok(Arc::new(DisabledNotifier));
    }
    Ok(Arc::new(WebhookNotifier::from_config(config)?))
}
