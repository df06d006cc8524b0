//! Provisioning error types

use crate::action::ApplyFailure;
use thiserror::Error;

/// Provisioning errors
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("Engine error: {0}")]
    EngineError(String),

    #[error("Collaborator call failed: {0}")]
    CollaboratorFailed(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("State file error: {0}")]
    StateError(String),

    #[error("Lock acquisition failed: {0}")]
    LockError(String),

    #[error("Output '{name}' could not be resolved from {reference}")]
    UnresolvedOutput { name: String, reference: String },

    #[error(transparent)]
    ApplyFailed(#[from] ApplyFailure),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CloudError>;
