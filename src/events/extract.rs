//! Logical service identifiers from repository names and parameter paths.

use crate::types::ServiceIdentifier;
use regex::Regex;

/// Naming conventions for one project/environment
#[derive(Debug, Clone)]
pub struct IdentifierExtractor {
    project: String,
    service_repository: Regex,
    parameter_path: Regex,
}

impl IdentifierExtractor {
    pub fn new(project: &str, environment: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            project: project.to_string(),
            service_repository: Regex::new(r"^\w+_service_(\w+)$")?,
            parameter_path: Regex::new(&format!(
                r"^/?{}/{}/(\w+)/\w+$",
                regex::escape(environment),
                regex::escape(project)
            ))?,
        })
    }

    /// Identifier for a container repository.
    ///
    /// - `{project}_backend` is the primary service
    /// - `{anything}_service_{name}` is `name`
    /// - `{project}_{name}` is `name`, except `{project}_task_*` repositories,
    ///   which hold one-off task images rather than services
    pub fn from_repository(&self, repository: &str) -> Option<ServiceIdentifier> {
        if repository == format!("{}_{}", self.project, ServiceIdentifier::PRIMARY_ALIAS) {
            return Some(ServiceIdentifier::Primary);
        }

        if let Some(captures) = self.service_repository.captures(repository) {
            return captures
                .get(1)
                .and_then(|name| ServiceIdentifier::from_event_name(name.as_str()));
        }

        let name = repository.strip_prefix(&self.project)?.strip_prefix('_')?;
        if name.is_empty() || name == "task" || name.starts_with("task_") {
            return None;
        }
        ServiceIdentifier::from_event_name(name)
    }

    /// Identifier for a `/{env}/{project}/{identifier}/{parameter}` path
    pub fn from_parameter_path(&self, path: &str) -> Option<ServiceIdentifier> {
        let captures = self.parameter_path.captures(path)?;
        ServiceIdentifier::from_event_name(captures.get(1)?.as_str())
    }
}
