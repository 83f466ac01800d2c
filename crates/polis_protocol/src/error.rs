//! Error taxonomy shared across the control plane.

use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PolisError>;

#[derive(Error, Debug)]
pub enum PolisError {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Not configured: {0}")]
    NotConfigured(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Remote failure ({endpoint}): {message}")]
    Remote { endpoint: String, message: String },

    #[error("Signing failed: {0}")]
    Signing(String),

    #[error("Signature verification failed: {0}")]
    CryptoVerify(String),

    #[error("Hook '{hook}' failed: {message}")]
    Hook { hook: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl PolisError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_configured(msg: impl Into<String>) -> Self {
        Self::NotConfigured(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn remote(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Remote {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Recoverable errors leave background sync running; the triggering
    /// operation fails but the next tick retries.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Remote { .. } | Self::Hook { .. })
    }

    /// HTTP status the handler layer maps this error to.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::NotConfigured(_) => 400,
            Self::NotFound(_) => 404,
            Self::Conflict(_) => 409,
            Self::Remote { .. } => 502,
            Self::Signing(_) | Self::CryptoVerify(_) => 500,
            Self::Hook { .. } => 500,
            Self::Io(_) | Self::Json(_) | Self::Yaml(_) => 500,
        }
    }
}
