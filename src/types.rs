//! Core identifiers and resource mappings shared by the registry, the executor
//! and the event handlers.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Logical service identifier used in events and configuration.
///
/// The primary (backend) service is an explicit variant rather than an empty
/// string. In the JSON service maps it is keyed by `""`; in repository names and
/// parameter paths it appears under the `backend` alias.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ServiceIdentifier {
    /// The project's primary service
    Primary,
    /// Any other named service
    Named(String),
}

impl ServiceIdentifier {
    /// Alias used for the primary service in repository names and parameter paths
    pub const PRIMARY_ALIAS: &'static str = "backend";

    /// Build an identifier from a service-map key (`""` is the primary service)
    pub fn from_config_key(key: &str) -> Self {
        if key.is_empty() {
            Self::Primary
        } else {
            Self::Named(key.to_string())
        }
    }

    /// Build an identifier from a name found in an event.
    ///
    /// Returns `None` for an empty name so an event that accidentally carries no
    /// identifier is never mistaken for the primary service.
    pub fn from_event_name(name: &str) -> Option<Self> {
        match name.trim() {
            "" => None,
            Self::PRIMARY_ALIAS => Some(Self::Primary),
            other => Some(Self::Named(other.to_string())),
        }
    }

    /// Named service shorthand
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    /// Key under which this identifier appears in the service maps
    pub fn config_key(&self) -> &str {
        match self {
            Self::Primary => "",
            Self::Named(name) => name,
        }
    }

    pub fn is_primary(&self) -> bool {
        matches!(self, Self::Primary)
    }
}

impl fmt::Display for ServiceIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => write!(f, "({})", Self::PRIMARY_ALIAS),
            Self::Named(name) => write!(f, "{name}"),
        }
    }
}

impl Serialize for ServiceIdentifier {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.config_key())
    }
}

impl<'de> Deserialize<'de> for ServiceIdentifier {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let key = String::deserialize(deserializer)?;
        Ok(Self::from_config_key(&key))
    }
}

/// Actual orchestration-platform resource names for one logical service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceMapping {
    /// Name of the ECS service
    pub service_name: String,
    /// Task definition family queried for the latest revision
    pub task_family: String,
}

impl ServiceMapping {
    pub fn new(service_name: impl Into<String>, task_family: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            task_family: task_family.into(),
        }
    }
}

/// An object-storage location (bucket + key) a service reads configuration from
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConfigFileLocation {
    pub bucket: String,
    pub key: String,
}

impl ConfigFileLocation {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    pub fn matches(&self, bucket: &str, key: &str) -> bool {
        self.bucket == bucket && self.key == key
    }
}

impl fmt::Display for ConfigFileLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}
