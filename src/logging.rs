//! # Structured Logging Module
//!
//! JSON logs on stdout, one object per line, so the hosting environment's log
//! collector can index the structured fields.

use crate::config::LogLevel;
use crate::deployment::DeploymentState;
use crate::types::ServiceIdentifier;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Install the global subscriber.
///
/// `RUST_LOG` overrides `level` when set. Calling this more than once, or after
/// another subscriber was installed, is harmless.
pub fn init_structured_logging(level: LogLevel) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(level.as_filter_directive()));

        let subscriber = tracing_subscriber::registry().with(filter).with(
            fmt::layer()
                .json()
                .with_target(true)
                .with_current_span(false)
                .flatten_event(true),
        );

        if subscriber.try_init().is_err() {
            tracing::debug!("Global tracing subscriber already initialized - continuing with existing subscriber");
        }

        tracing::info!(
            pid = std::process::id(),
            level = %level,
            "🔧 STRUCTURED LOGGING: Initialized JSON output"
        );
    });
}

/// Log a deployment lifecycle step with consistent fields
pub fn log_deployment_operation(
    operation: &str,
    service: &ServiceIdentifier,
    state: &DeploymentState,
    details: Option<&str>,
) {
    match state {
        DeploymentState::Failed => tracing::error!(
            operation = %operation,
            service = %service,
            state = %state,
            notification_state = state.notification_name(),
            details = details.unwrap_or(""),
            "🚀 DEPLOY_OPERATION"
        ),
        state if state.is_terminal() => tracing::info!(
            operation = %operation,
            service = %service,
            state = %state,
            notification_state = state.notification_name(),
            details = details.unwrap_or(""),
            "🚀 DEPLOY_OPERATION"
        ),
        _ => tracing::debug!(
            operation = %operation,
            service = %service,
            state = %state,
            notification_state = state.notification_name(),
            details = details.unwrap_or(""),
            "🚀 DEPLOY_OPERATION"
        ),
    }
}

/// Log a routed event
pub fn log_event_operation(source: &str, event_id: &str, outcome: &str) {
    tracing::info!(
        source = %source,
        event_id = %event_id,
        outcome = %outcome,
        "📨 EVENT_OPERATION"
    );
}
