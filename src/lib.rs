#![allow(clippy::doc_markdown)] // Allow technical terms like ECS, SSM in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # CI Dispatcher
//!
//! Event-driven deployment dispatcher for ECS services.
//!
//! ## Overview
//!
//! The dispatcher receives infrastructure change events from an event bus and
//! turns them into service deployments:
//!
//! - **Registry push**: a new container image rolls the matching service
//! - **Parameter change**: a changed parameter restarts the service that reads it
//! - **Object storage change**: a changed env file restarts every service bound to it
//! - **Manual trigger**: an operator names the service (and optionally the revision)
//! - **Orchestration status**: platform deployment events are relayed to chat
//!
//! Deployments are retried with linear backoff, and every lifecycle step is
//! reported to a chat webhook. Notification failures never affect a deployment.
//!
//! ## Module Organization
//!
//! - [`config`] - Environment-driven configuration and validation
//! - [`registry`] - Identifier → service lookups and file bindings
//! - [`deployment`] - Executor (single attempt) and orchestrator (retries, fan-out)
//! - [`platform`] - Orchestration platform seam and the ECS client
//! - [`notification`] - Webhook notifications
//! - [`events`] - Typed inbound events and identifier extraction
//! - [`router`] - Per-source event handlers
//! - [`bootstrap`] - Component wiring
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ci_dispatcher::{Cancellation, Dispatcher, EventEnvelope};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let dispatcher = Dispatcher::from_env().await?;
//!
//! let envelope: EventEnvelope = serde_json::from_str(r#"{
//!     "source": "action.deploy",
//!     "detail-type": "Manual Deploy",
//!     "id": "manual-1",
//!     "detail": { "service": "worker" }
//! }"#)?;
//!
//! let status = dispatcher.handle(&envelope, &Cancellation::never()).await?;
//! println!("{status}");
//! # Ok(())
//! # }
//! ```

pub mod bootstrap;
pub mod cancellation;
pub mod config;
pub mod deployment;
pub mod error;
pub mod events;
pub mod logging;
pub mod notification;
pub mod platform;
pub mod registry;
pub mod router;
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;
pub mod types;

pub use bootstrap::{Dispatcher, ServiceCheck};
pub use cancellation::{Cancellation, CancellationHandle};
pub use config::{ConfigLoader, ConfigurationError, DispatcherConfig, LogLevel};
pub use deployment::{
    DeploymentError, DeploymentOrchestrator, DeploymentRequest, DeploymentResult,
    DeploymentState, FanOutReport, SourceEvent,
};
pub use error::{DispatchError, Result};
pub use events::{EventEnvelope, EventSource, InboundEvent};
pub use notification::{Notification, NotificationError, NotificationKind, Notifier};
pub use platform::{OrchestrationPlatform, PlatformError};
pub use registry::{RegistryError, ServiceRegistry};
pub use router::{EventRouter, RouteKind, RouteOutcome};
pub use types::{ConfigFileLocation, ServiceIdentifier, ServiceMapping};
