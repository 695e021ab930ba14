//! Error types for taskray-core

use thiserror::Error;

/// Result type alias using taskray-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in taskray-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Entity not found in the local cache
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Remote API error
    #[error(transparent)]
    Api(#[from] crate::api::ApiError),

    /// Secure credential storage error
    #[error(transparent)]
    Credential(#[from] crate::credentials::CredentialError),
}
