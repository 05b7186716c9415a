//! Error types for host-provision

use thiserror::Error;

/// Main error type for provisioning operations
#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Insufficient privilege: {0}")]
    Privilege(String),

    #[error("Unsupported platform: {0}")]
    Platform(String),

    #[error("Passwords do not match")]
    PasswordMismatch,

    #[error("Prompt failed: {0}")]
    Prompt(String),

    #[error("Aborted by operator")]
    Aborted,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Template error: {0}")]
    Template(String),

    #[error("Step '{step}' failed: {message}")]
    Step { step: String, message: String },

    #[error("User/group error: {0}")]
    UserGroup(String),

    #[error("Command execution failed: {0}")]
    Command(String),
}

impl ProvisionError {
    /// Create a step error
    pub fn step(step: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Step {
            step: step.into(),
            message: message.into(),
        }
    }

    /// Whether this error must abort the whole run
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::InvalidRequest(_)
                | Self::Privilege(_)
                | Self::Platform(_)
                | Self::PasswordMismatch
                | Self::Prompt(_)
                | Self::Aborted
        )
    }
}

impl From<minijinja::Error> for ProvisionError {
    fn from(e: minijinja::Error) -> Self {
        Self::Template(e.to_string())
    }
}

impl From<reqwest::Error> for ProvisionError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e.to_string())
    }
}
