//! # Event Router
//!
//! Classifies an envelope by source, checks the per-source feature toggle,
//! decodes the typed detail and hands off to the matching handler.
//!
//! Handlers distinguish two kinds of "nothing happened":
//! - skips (extraction misses, unsuccessful pushes, unbound files) are normal
//!   background noise on a shared bus and return `Ok`
//! - unsupported sources, malformed details, missing manual `service` fields,
//!   and failed deployments are errors for the hosting invocation

use crate::cancellation::Cancellation;
use crate::config::DispatcherConfig;
use crate::deployment::{
    DeploymentError, DeploymentOrchestrator, DeploymentRequest, DeploymentResult, FanOutReport,
    SourceEvent,
};
use crate::error::{DispatchError, Result};
use crate::events::{
    EventEnvelope, EventSource, IdentifierExtractor, InboundEvent, ManualTriggerDetail,
    ObjectStorageDetail, OrchestrationStatusDetail, ParameterChangeDetail, RegistryPushDetail,
};
use crate::logging::log_event_operation;
use crate::notification::{Notification, NotificationKind, Notifier};
use crate::registry::ServiceRegistry;
use crate::types::ServiceIdentifier;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

const DEFAULT_MANUAL_REASON: &str = "Manual deployment triggered";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteKind {
    /// At least one deployment ran and succeeded
    Deployed,
    /// Event ignored as irrelevant
    Skipped,
    /// Status event forwarded to the notification gateway
    Notified,
    /// The source's feature toggle is off
    Disabled,
}

impl fmt::Display for RouteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Deployed => write!(f, "deployed"),
            Self::Skipped => write!(f, "skipped"),
            Self::Notified => write!(f, "notified"),
            Self::Disabled => write!(f, "disabled"),
        }
    }
}

/// Non-error outcome of handling one event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteOutcome {
    pub kind: RouteKind,
    pub message: String,
}

impl RouteOutcome {
    fn new(kind: RouteKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    fn deployed(message: impl Into<String>) -> Self {
        Self::new(RouteKind::Deployed, message)
    }

    fn skipped(message: impl Into<String>) -> Self {
        Self::new(RouteKind::Skipped, message)
    }
}

#[derive(Debug, Clone)]
pub struct EventRouter {
    config: Arc<DispatcherConfig>,
    registry: ServiceRegistry,
    orchestrator: DeploymentOrchestrator,
    notifier: Arc<dyn Notifier>,
    extractor: IdentifierExtractor,
}

impl EventRouter {
    pub fn new(
        config: Arc<DispatcherConfig>,
        registry: ServiceRegistry,
        orchestrator: DeploymentOrchestrator,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self> {
        let extractor = IdentifierExtractor::new(&config.project_name, &config.environment)
            .map_err(|e| {
                DispatchError::Configuration(crate::config::ConfigurationError::invalid_value(
                    "PROJECT_NAME",
                    config.project_name.clone(),
                    e.to_string(),
                ))
            })?;

        Ok(Self {
            config,
            registry,
            orchestrator,
            notifier,
            extractor,
        })
    }

    /// Handle one event and return its human-readable status
    pub async fn handle(
        &self,
        envelope: &EventEnvelope,
        cancellation: &Cancellation,
    ) -> Result<String> {
        self.route(envelope, cancellation)
            .await
            .map(|outcome| outcome.message)
    }

    /// Handle one event and return the typed outcome
    pub async fn route(
        &self,
        envelope: &EventEnvelope,
        cancellation: &Cancellation,
    ) -> Result<RouteOutcome> {
        info!(
            event_id = %envelope.id,
            event_source = %envelope.source,
            detail_type = %envelope.detail_type,
            "📨 EVENT: Received event"
        );

        let source = EventSource::of(envelope).inspect_err(|_| {
            warn!(event_id = %envelope.id, source = %envelope.source, "Unknown event source");
        })?;

        if let Some(disabled) = self.disabled_message(source) {
            info!(event_id = %envelope.id, source = %source, "{disabled}, skipping event");
            return Ok(RouteOutcome::new(RouteKind::Disabled, disabled));
        }

        let event = InboundEvent::decode(source, envelope).inspect_err(|e| {
            error!(event_id = %envelope.id, source = %source, error = %e, "Failed to decode event detail");
        })?;

        let outcome = match event {
            InboundEvent::RegistryPush(detail) => self.on_registry_push(detail, cancellation).await,
            InboundEvent::OrchestrationStatus {
                detail,
                service_arn,
            } => Ok(self.on_orchestration_status(detail, service_arn).await),
            InboundEvent::ParameterChange(detail) => {
                self.on_parameter_change(detail, cancellation).await
            }
            InboundEvent::ObjectStorageChange(detail) => {
                self.on_object_storage_change(detail, cancellation).await
            }
            InboundEvent::ManualTrigger(detail) => {
                self.on_manual_trigger(detail, cancellation).await
            }
        };

        match &outcome {
            Ok(outcome) => log_event_operation(&envelope.source, &envelope.id, &outcome.kind.to_string()),
            Err(e) => log_event_operation(&envelope.source, &envelope.id, &e.to_string()),
        }
        outcome
    }

    fn disabled_message(&self, source: EventSource) -> Option<&'static str> {
        let features = &self.config.features;
        match source {
            EventSource::RegistryPush if !features.registry_push => Some("ECR monitoring disabled"),
            EventSource::ParameterChange if !features.parameter_change => {
                Some("SSM monitoring disabled")
            }
            EventSource::ObjectStorageChange if !features.object_storage_change => {
                Some("S3 monitoring disabled")
            }
            EventSource::ManualTrigger if !features.manual_trigger => {
                Some("Manual deploy disabled")
            }
            EventSource::OrchestrationStatus if !self.config.notifications.enabled => {
                Some("Notifications disabled")
            }
            _ => None,
        }
    }

    async fn on_registry_push(
        &self,
        detail: RegistryPushDetail,
        cancellation: &Cancellation,
    ) -> Result<RouteOutcome> {
        info!(
            repository = %detail.repository_name,
            tag = %detail.image_tag,
            action = %detail.action_type,
            result = %detail.result,
            "Processing ECR event"
        );

        if !detail.is_successful_push() {
            return Ok(RouteOutcome::skipped(format!(
                "Skipped event: action={} result={}",
                detail.action_type, detail.result
            )));
        }

        let Some(service) = self.extractor.from_repository(&detail.repository_name) else {
            warn!(repository = %detail.repository_name, "Unable to extract service name from repository");
            return Ok(RouteOutcome::skipped(format!(
                "Repository {} does not match the naming convention for project {}, skipping",
                detail.repository_name, self.config.project_name
            )));
        };

        let request = DeploymentRequest::new(
            service,
            format!(
                "New ECR image pushed: {}:{}",
                detail.repository_name, detail.image_tag
            ),
            SourceEvent::RegistryPush,
        );
        self.deploy_one(request, cancellation).await
    }

    async fn on_orchestration_status(
        &self,
        detail: OrchestrationStatusDetail,
        service_arn: Option<String>,
    ) -> RouteOutcome {
        info!(
            event_type = %detail.event_type,
            event_name = %detail.event_name,
            service_arn = ?service_arn,
            deployment_id = %detail.deployment_id,
            "Processing ECS event"
        );

        if detail.event_name == OrchestrationStatusDetail::STEADY_STATE {
            debug!("Skipping SERVICE_STEADY_STATE event");
            return RouteOutcome::skipped("Skipped SERVICE_STEADY_STATE event");
        }

        let kind = match detail.event_name.as_str() {
            OrchestrationStatusDetail::DEPLOYMENT_COMPLETED => NotificationKind::Success,
            OrchestrationStatusDetail::DEPLOYMENT_FAILED
            | OrchestrationStatusDetail::TASK_START_IMPAIRED => NotificationKind::Error,
            _ => NotificationKind::Info,
        };

        let notification = Notification::new(
            kind,
            service_arn.unwrap_or_default(),
            detail.event_name.clone(),
        )
        .with_reason(detail.reason)
        .with_deployment_id(Some(detail.deployment_id))
        .with_environment(self.config.environment.clone());

        match self.notifier.send(&notification).await {
            Ok(()) => RouteOutcome::new(
                RouteKind::Notified,
                format!("Sent notification for {} event", detail.event_name),
            ),
            Err(e) => {
                warn!(event_name = %detail.event_name, error = %e, "Notification delivery failed");
                RouteOutcome::new(
                    RouteKind::Notified,
                    format!(
                        "Notification for {} event not delivered: {e}",
                        detail.event_name
                    ),
                )
            }
        }
    }

    async fn on_parameter_change(
        &self,
        detail: ParameterChangeDetail,
        cancellation: &Cancellation,
    ) -> Result<RouteOutcome> {
        info!(
            operation = %detail.operation,
            parameter = %detail.name,
            param_type = %detail.parameter_type,
            "Processing SSM event"
        );

        let Some(service) = self.extractor.from_parameter_path(&detail.name) else {
            warn!(parameter = %detail.name, "Unable to extract service from SSM parameter path");
            return Ok(RouteOutcome::skipped(format!(
                "SSM parameter {} does not match expected pattern, skipping",
                detail.name
            )));
        };

        let request = DeploymentRequest::new(
            service,
            format!(
                "SSM parameter changed: {} ({})",
                detail.name, detail.operation
            ),
            SourceEvent::ParameterChange,
        );
        self.deploy_one(request, cancellation).await
    }

    async fn on_object_storage_change(
        &self,
        detail: ObjectStorageDetail,
        cancellation: &Cancellation,
    ) -> Result<RouteOutcome> {
        let bucket = &detail.request_parameters.bucket_name;
        let key = &detail.request_parameters.key;
        info!(bucket = %bucket, key = %key, event_name = %detail.event_name, "Processing S3 event");

        let services = self.registry.services_for_file(bucket, key);
        if services.is_empty() {
            warn!(bucket = %bucket, key = %key, "No services found for S3 file");
            return Ok(RouteOutcome::skipped(format!(
                "No service configured for s3://{bucket}/{key}"
            )));
        }

        let requests: Vec<DeploymentRequest> = services
            .into_iter()
            .map(|service| {
                DeploymentRequest::new(
                    service,
                    format!("S3 env file changed: s3://{bucket}/{key}"),
                    SourceEvent::FileChange,
                )
            })
            .collect();

        let results = self
            .orchestrator
            .deploy_multiple(&requests, cancellation)
            .await;
        let report = FanOutReport::from_results(&results).into_result().inspect_err(|e| {
            error!(bucket = %bucket, key = %key, error = %e, "Some deployments failed");
        })?;

        Ok(RouteOutcome::deployed(format!(
            "Successfully deployed {} services for S3 file change",
            report.succeeded
        )))
    }

    async fn on_manual_trigger(
        &self,
        detail: ManualTriggerDetail,
        cancellation: &Cancellation,
    ) -> Result<RouteOutcome> {
        let service = detail
            .service
            .as_deref()
            .and_then(ServiceIdentifier::from_event_name)
            .ok_or_else(|| {
                error!("Manual deploy event missing service field");
                DispatchError::missing_field("manual deploy", "service")
            })?;

        let reason = detail
            .reason
            .filter(|reason| !reason.is_empty())
            .unwrap_or_else(|| DEFAULT_MANUAL_REASON.to_string());

        info!(
            service = %service,
            task_definition = ?detail.task_definition,
            reason = %reason,
            "Processing manual deploy event"
        );

        let mut request = DeploymentRequest::new(service, reason, SourceEvent::Manual);
        if let Some(revision) = detail.task_definition.filter(|r| !r.is_empty()) {
            request = request.with_revision(revision);
        }
        self.deploy_one(request, cancellation).await
    }

    async fn deploy_one(
        &self,
        request: DeploymentRequest,
        cancellation: &Cancellation,
    ) -> Result<RouteOutcome> {
        let result = self.orchestrator.deploy(&request, cancellation).await;
        into_outcome(result)
    }
}

fn into_outcome(result: DeploymentResult) -> Result<RouteOutcome> {
    if result.success {
        return Ok(RouteOutcome::deployed(result.message));
    }
    match result.failure {
        Some(DeploymentError::Lookup(lookup)) => Err(DispatchError::Registry(lookup)),
        _ => Err(DispatchError::DeploymentFailed {
            service: result.service.to_string(),
            attempts: result.attempts,
            reason: result.error.unwrap_or(result.message),
        }),
    }
}
