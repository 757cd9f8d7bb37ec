//! Error types for the core document model

use thiserror::Error;

/// Result type for core operations
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised by the document model
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid user id: {0}")]
    InvalidUserId(String),

    #[error("Invalid URL for {field}: {reason}")]
    InvalidUrl { field: &'static str, reason: String },

    #[error("Invalid API key: {0}")]
    InvalidApiKey(String),

    #[error("API key signing failed: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}
