//! AWS ECS implementation of [`OrchestrationPlatform`].

use super::{
    OrchestrationPlatform, PlatformError, ServiceDescription, ServiceUpdate, ServiceUpdateOutput,
};
use async_trait::async_trait;
use aws_sdk_ecs::error::DisplayErrorContext;
use aws_sdk_ecs::types::SortOrder;
use aws_sdk_ecs::Client;
use tracing::debug;

/// Revisions fetched when looking for the latest task definition
const REVISION_PAGE_SIZE: i32 = 10;

#[derive(Clone)]
pub struct EcsPlatform {
    client: Client,
    region: String,
}

impl std::fmt::Debug for EcsPlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EcsPlatform")
            .field("client", &"aws_sdk_ecs::Client")
            .field("region", &self.region)
            .finish()
    }
}

impl EcsPlatform {
    /// Build a client for `region` using the default credential chain
    pub async fn connect(region: &str) -> Self {
        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(region.to_string()))
            .load()
            .await;
        Self::from_client(Client::new(&sdk_config), region)
    }

    pub fn from_client(client: Client, region: impl Into<String>) -> Self {
        Self {
            client,
            region: region.into(),
        }
    }
}

#[async_trait]
impl OrchestrationPlatform for EcsPlatform {
    async fn list_revisions(&self, task_family: &str) -> Result<Vec<String>, PlatformError> {
        debug!(family = %task_family, "Listing task definitions");

        let output = self
            .client
            .list_task_definitions()
            .family_prefix(task_family)
            .sort(SortOrder::Desc)
            .max_results(REVISION_PAGE_SIZE)
            .send()
            .await
            .map_err(|e| PlatformError::api("ListTaskDefinitions", DisplayErrorContext(&e)))?;

        Ok(output.task_definition_arns().to_vec())
    }

    async fn update_service(
        &self,
        update: &ServiceUpdate,
    ) -> Result<ServiceUpdateOutput, PlatformError> {
        let output = self
            .client
            .update_service()
            .cluster(&update.cluster)
            .service(&update.service_name)
            .task_definition(&update.revision)
            .force_new_deployment(update.force_new_deployment)
            .set_desired_count(update.desired_count)
            .send()
            .await
            .map_err(|e| {
                if e
                    .as_service_error()
                    .is_some_and(|err| err.is_service_not_found_exception())
                {
                    PlatformError::ServiceNotFound {
                        cluster: update.cluster.clone(),
                        service_name: update.service_name.clone(),
                    }
                } else {
                    PlatformError::api("UpdateService", DisplayErrorContext(&e))
                }
            })?;

        let primary = output.service().and_then(|service| {
            service
                .deployments()
                .iter()
                .find(|deployment| deployment.status() == Some("PRIMARY"))
        });

        Ok(ServiceUpdateOutput {
            deployment_id: primary.and_then(|d| d.id()).map(str::to_string),
            status: output
                .service()
                .and_then(|service| service.status())
                .map(str::to_string),
        })
    }

    async fn describe_service(
        &self,
        cluster: &str,
        service_name: &str,
    ) -> Result<Option<ServiceDescription>, PlatformError> {
        let output = self
            .client
            .describe_services()
            .cluster(cluster)
            .services(service_name)
            .send()
            .await
            .map_err(|e| PlatformError::api("DescribeServices", DisplayErrorContext(&e)))?;

        Ok(output.services().first().map(|service| ServiceDescription {
            service_name: service
                .service_name()
                .unwrap_or(service_name)
                .to_string(),
            status: service.status().map(str::to_string),
            task_definition: service.task_definition().map(str::to_string),
            desired_count: service.desired_count(),
            running_count: service.running_count(),
        }))
    }
}
