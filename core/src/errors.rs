//! Error types for the DeployDeck core

use thiserror::Error;

/// Main error type for the DeployDeck core
#[derive(Error, Debug)]
pub enum DeckError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Gateway error: {0}")]
    GatewayError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Unsupported time unit: {0}")]
    InvalidUnit(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for DeckError {
    fn from(err: anyhow::Error) -> Self {
        DeckError::Internal(err.to_string())
    }
}
