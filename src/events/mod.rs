//! # Events
//!
//! Typed inbound events and the naming conventions used to map them to service
//! identifiers.

pub mod extract;
pub mod types;

pub use extract::IdentifierExtractor;
pub use types::{
    EventEnvelope, EventSource, InboundEvent, ManualTriggerDetail, ObjectStorageDetail,
    OrchestrationStatusDetail, ParameterChangeDetail, RegistryPushDetail, RequestParameters,
};
