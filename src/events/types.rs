//! Inbound envelope and the per-source detail payloads.
//!
//! Detail fields default to empty so that partially populated events reach the
//! handlers (which decide whether to skip them). A `detail` that is not an
//! object, or carries a field of the wrong JSON type, is malformed.

use crate::error::DispatchError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Event-bus envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub source: String,
    #[serde(rename = "detail-type", alias = "detailType", default)]
    pub detail_type: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub detail: serde_json::Value,
    #[serde(default)]
    pub resources: Vec<String>,
}

impl EventEnvelope {
    pub fn new(source: impl Into<String>, detail: serde_json::Value) -> Self {
        Self {
            source: source.into(),
            detail_type: String::new(),
            id: uuid::Uuid::new_v4().to_string(),
            detail,
            resources: Vec::new(),
        }
    }

    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resources.push(resource.into());
        self
    }
}

/// Closed set of event sources the router understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSource {
    RegistryPush,
    OrchestrationStatus,
    ParameterChange,
    ObjectStorageChange,
    ManualTrigger,
}

impl EventSource {
    /// Classify an envelope `source` string
    pub fn classify(source: &str) -> Option<Self> {
        match source {
            "aws.ecr" => Some(Self::RegistryPush),
            "aws.ecs" => Some(Self::OrchestrationStatus),
            "aws.ssm" => Some(Self::ParameterChange),
            "aws.s3" => Some(Self::ObjectStorageChange),
            "action.deploy" | "action.production" => Some(Self::ManualTrigger),
            _ => None,
        }
    }

    /// Envelope's source, or `UnsupportedSource`
    pub fn of(envelope: &EventEnvelope) -> Result<Self, DispatchError> {
        Self::classify(&envelope.source).ok_or_else(|| DispatchError::UnsupportedSource {
            source_name: envelope.source.clone(),
            event_id: envelope.id.clone(),
        })
    }

    /// Short label used in logs and error messages
    pub fn label(&self) -> &'static str {
        match self {
            Self::RegistryPush => "ECR",
            Self::OrchestrationStatus => "ECS",
            Self::ParameterChange => "SSM",
            Self::ObjectStorageChange => "S3",
            Self::ManualTrigger => "manual deploy",
        }
    }
}

impl fmt::Display for EventSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RegistryPush => write!(f, "registry_push"),
            Self::OrchestrationStatus => write!(f, "orchestration_status"),
            Self::ParameterChange => write!(f, "parameter_change"),
            Self::ObjectStorageChange => write!(f, "object_storage_change"),
            Self::ManualTrigger => write!(f, "manual_trigger"),
        }
    }
}

/// Container image pushed to the registry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryPushDetail {
    #[serde(rename = "repository-name", alias = "repositoryName")]
    pub repository_name: String,
    #[serde(rename = "image-tag", alias = "imageTag")]
    pub image_tag: String,
    #[serde(rename = "action-type", alias = "actionType")]
    pub action_type: String,
    pub result: String,
}

impl RegistryPushDetail {
    /// A completed, successful push (case-insensitive)
    pub fn is_successful_push(&self) -> bool {
        self.action_type.eq_ignore_ascii_case("PUSH") && self.result.eq_ignore_ascii_case("SUCCESS")
    }
}

/// Service deployment state change reported by the platform
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OrchestrationStatusDetail {
    pub event_type: String,
    pub event_name: String,
    pub reason: String,
    pub deployment_id: String,
}

impl OrchestrationStatusDetail {
    pub const STEADY_STATE: &'static str = "SERVICE_STEADY_STATE";
    pub const DEPLOYMENT_COMPLETED: &'static str = "SERVICE_DEPLOYMENT_COMPLETED";
    pub const DEPLOYMENT_FAILED: &'static str = "SERVICE_DEPLOYMENT_FAILED";
    pub const TASK_START_IMPAIRED: &'static str = "SERVICE_TASK_START_IMPAIRED";
}

/// Parameter store change
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParameterChangeDetail {
    pub operation: String,
    pub name: String,
    #[serde(rename = "type")]
    pub parameter_type: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RequestParameters {
    pub bucket_name: String,
    pub key: String,
}

/// Object written or deleted in a configuration bucket
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ObjectStorageDetail {
    pub request_parameters: RequestParameters,
    pub event_name: String,
}

/// Operator-initiated deployment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManualTriggerDetail {
    pub service: Option<String>,
    #[serde(alias = "taskDefinition")]
    pub task_definition: Option<String>,
    pub reason: Option<String>,
}

/// A classified event with its typed payload
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    RegistryPush(RegistryPushDetail),
    OrchestrationStatus {
        detail: OrchestrationStatusDetail,
        /// First resource of the envelope (the service ARN)
        service_arn: Option<String>,
    },
    ParameterChange(ParameterChangeDetail),
    ObjectStorageChange(ObjectStorageDetail),
    ManualTrigger(ManualTriggerDetail),
}

impl InboundEvent {
    /// Decode the envelope's detail for an already classified `source`
    pub fn decode(source: EventSource, envelope: &EventEnvelope) -> Result<Self, DispatchError> {
        Ok(match source {
            EventSource::RegistryPush => Self::RegistryPush(decode_detail(source, envelope)?),
            EventSource::OrchestrationStatus => Self::OrchestrationStatus {
                detail: decode_detail(source, envelope)?,
                service_arn: envelope.resources.first().cloned(),
            },
            EventSource::ParameterChange => Self::ParameterChange(decode_detail(source, envelope)?),
            EventSource::ObjectStorageChange => {
                Self::ObjectStorageChange(decode_detail(source, envelope)?)
            }
            EventSource::ManualTrigger => Self::ManualTrigger(decode_detail(source, envelope)?),
        })
    }

    pub fn source(&self) -> EventSource {
        match self {
            Self::RegistryPush(_) => EventSource::RegistryPush,
            Self::OrchestrationStatus { .. } => EventSource::OrchestrationStatus,
            Self::ParameterChange(_) => EventSource::ParameterChange,
            Self::ObjectStorageChange(_) => EventSource::ObjectStorageChange,
            Self::ManualTrigger(_) => EventSource::ManualTrigger,
        }
    }
}

fn decode_detail<T: DeserializeOwned>(
    source: EventSource,
    envelope: &EventEnvelope,
) -> Result<T, DispatchError> {
    serde_json::from_value(envelope.detail.clone())
        .map_err(|e| DispatchError::malformed_event(source.label(), e))
}
