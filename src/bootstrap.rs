//! # Bootstrap
//!
//! Builds the component graph from one loaded configuration. Every component
//! receives its collaborators explicitly; nothing reads process state after
//! [`ConfigLoader`] returns.

use crate::cancellation::Cancellation;
use crate::config::{ConfigLoader, DispatcherConfig};
use crate::deployment::{DeploymentExecutor, DeploymentOrchestrator, RetryPolicy};
use crate::error::Result;
use crate::events::EventEnvelope;
use crate::notification::{notifier_from_config, Notifier};
use crate::platform::{EcsPlatform, OrchestrationPlatform};
use crate::registry::ServiceRegistry;
use crate::router::{EventRouter, RouteOutcome};
use crate::types::ServiceIdentifier;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// Outcome of checking one configured service against the platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceCheck {
    pub service: ServiceIdentifier,
    pub service_name: String,
    pub exists: bool,
    pub status: Option<String>,
    pub error: Option<String>,
}

/// Fully wired dispatcher for one process
#[derive(Debug, Clone)]
pub struct Dispatcher {
    config: Arc<DispatcherConfig>,
    registry: ServiceRegistry,
    platform: Arc<dyn OrchestrationPlatform>,
    router: EventRouter,
}

impl Dispatcher {
    /// Load configuration from the process environment and connect to ECS
    pub async fn from_env() -> Result<Self> {
        let config = ConfigLoader::from_env()?;
        let platform = EcsPlatform::connect(&config.region).await;
        let notifier = notifier_from_config(&config)?;
        Self::from_parts(config, Arc::new(platform), notifier)
    }

    /// Wire an already loaded configuration with explicit collaborators
    pub fn from_parts(
        config: DispatcherConfig,
        platform: Arc<dyn OrchestrationPlatform>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self> {
        config.validate()?;
        let config = Arc::new(config);
        let registry = ServiceRegistry::new(config.clone());

        let executor =
            DeploymentExecutor::new(registry.clone(), platform.clone(), &config.deployment);
        let orchestrator = DeploymentOrchestrator::new(
            executor,
            notifier.clone(),
            RetryPolicy::from_config(&config.deployment),
            config.environment.clone(),
        );
        let router = EventRouter::new(config.clone(), registry.clone(), orchestrator, notifier)?;

        info!(
            project = %config.project_name,
            environment = %config.environment,
            cluster = %config.cluster_name,
            services = config.services.len(),
            dry_run = config.deployment.dry_run,
            "🔧 BOOTSTRAP: Dispatcher ready"
        );

        Ok(Self {
            config,
            registry,
            platform,
            router,
        })
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    pub fn router(&self) -> &EventRouter {
        &self.router
    }

    /// Handle one envelope (see [`EventRouter::handle`])
    pub async fn handle(
        &self,
        envelope: &EventEnvelope,
        cancellation: &Cancellation,
    ) -> Result<String> {
        self.router.handle(envelope, cancellation).await
    }

    pub async fn route(
        &self,
        envelope: &EventEnvelope,
        cancellation: &Cancellation,
    ) -> Result<RouteOutcome> {
        self.router.route(envelope, cancellation).await
    }

    /// Describe every configured service on the platform
    pub async fn verify_services(&self) -> Vec<ServiceCheck> {
        let mut checks = Vec::new();
        for service in self.registry.all_identifiers() {
            let Ok(mapping) = self.registry.resolve(&service) else {
                continue;
            };

            let check = match self
                .platform
                .describe_service(self.registry.cluster_name(), &mapping.service_name)
                .await
            {
                Ok(Some(description)) => ServiceCheck {
                    service: service.clone(),
                    service_name: mapping.service_name.clone(),
                    exists: true,
                    status: description.status,
                    error: None,
                },
                Ok(None) => ServiceCheck {
                    service: service.clone(),
                    service_name: mapping.service_name.clone(),
                    exists: false,
                    status: None,
                    error: None,
                },
                Err(e) => ServiceCheck {
                    service: service.clone(),
                    service_name: mapping.service_name.clone(),
                    exists: false,
                    status: None,
                    error: Some(e.to_string()),
                },
            };

            if !check.exists {
                warn!(
                    service = %service,
                    service_name = %check.service_name,
                    error = ?check.error,
                    "Configured service not found on platform"
                );
            }
            checks.push(check);
        }
        checks
    }
}
