//! Error types for palaver-core

use thiserror::Error;

/// Result type alias using palaver-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in palaver-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// libSQL error from the local cache database
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP transport error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend API returned a non-success response
    #[error("API error: {0}")]
    Api(String),

    /// JSON (de)serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A remote record did not match the message schema
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// Identity provider error
    #[error("Auth error: {0}")]
    Auth(#[from] crate::auth::AuthError),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
