//! Configuration Error Types
//!
//! Error handling for configuration loading and validation. Validation never
//! stops at the first problem: every violation is collected into
//! [`ConfigurationError::ValidationFailed`] so a misconfigured deployment reports
//! everything that is wrong in a single failure.

use thiserror::Error;

/// Configuration-related errors with detailed context
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// Missing required configuration field
    #[error("Missing required configuration field '{field}' in {context}")]
    MissingRequiredField { field: String, context: String },

    /// Invalid configuration value
    #[error("Invalid value '{value}' for field '{field}': {context}")]
    InvalidValue {
        field: String,
        value: String,
        context: String,
    },

    /// A JSON-encoded map could not be parsed
    #[error("Failed to parse {field}: {error}")]
    InvalidJson { field: String, error: String },

    /// Aggregated validation failure listing every violation
    #[error("Configuration validation failed:\n  - {}", errors.join("\n  - "))]
    ValidationFailed { errors: Vec<String> },
}

impl ConfigurationError {
    /// Create a missing required field error
    pub fn missing_required_field<F: Into<String>, C: Into<String>>(field: F, context: C) -> Self {
        Self::MissingRequiredField {
            field: field.into(),
            context: context.into(),
        }
    }

    /// Create an invalid value error
    pub fn invalid_value<F: Into<String>, V: Into<String>, C: Into<String>>(
        field: F,
        value: V,
        context: C,
    ) -> Self {
        Self::InvalidValue {
            field: field.into(),
            value: value.into(),
            context: context.into(),
        }
    }

    /// Create an invalid JSON error
    pub fn invalid_json<F: Into<String>, E: std::fmt::Display>(field: F, error: E) -> Self {
        Self::InvalidJson {
            field: field.into(),
            error: error.to_string(),
        }
    }

    /// Create an aggregated validation error
    pub fn validation_failed(errors: Vec<String>) -> Self {
        Self::ValidationFailed { errors }
    }

    /// Individual violations carried by this error
    pub fn violations(&self) -> Vec<String> {
        match self {
            Self::ValidationFailed { errors } => errors.clone(),
            other => vec![other.to_string()],
        }
    }
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigurationError>;
