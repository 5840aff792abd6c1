use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of one deployment request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentState {
    /// Request accepted, initiating notification sent
    Initiated,
    /// An attempt is in flight
    Attempting,
    /// The last attempt failed; a retry may follow
    AttemptFailed,
    /// The platform accepted the update
    Succeeded,
    /// Attempts exhausted, a non-retryable error occurred, or the invocation
    /// was cancelled
    Failed,
}

impl DeploymentState {
    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    pub fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Initiated, Self::Attempting)
                | (Self::Initiated, Self::Failed)
                | (Self::Attempting, Self::Succeeded)
                | (Self::Attempting, Self::AttemptFailed)
                | (Self::AttemptFailed, Self::Attempting)
                | (Self::AttemptFailed, Self::Failed)
        )
    }

    /// Name used for the `state` field in notifications
    pub fn notification_name(&self) -> &'static str {
        match self {
            Self::Initiated => "DEPLOYMENT_INITIATING",
            Self::Attempting => "DEPLOYMENT_IN_PROGRESS",
            Self::AttemptFailed => "DEPLOYMENT_RETRYING",
            Self::Succeeded => "DEPLOYMENT_COMPLETED",
            Self::Failed => "DEPLOYMENT_FAILED",
        }
    }
}

impl fmt::Display for DeploymentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initiated => write!(f, "initiated"),
            Self::Attempting => write!(f, "attempting"),
            Self::AttemptFailed => write!(f, "attempt_failed"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for DeploymentState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "initiated" => Ok(Self::Initiated),
            "attempting" => Ok(Self::Attempting),
            "attempt_failed" => Ok(Self::AttemptFailed),
            "succeeded" => Ok(Self::Succeeded),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Invalid deployment state: {s}")),
        }
    }
}
