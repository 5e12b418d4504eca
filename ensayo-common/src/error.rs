//! Common error types for Ensayo

use thiserror::Error;

/// Common result type for Ensayo operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across Ensayo services
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Referenced node or record does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Request fields missing or inconsistent with the stored hierarchy
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Asset storage backend (presigned URL generation) failed
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Shorthand for a `NotFound` naming the entity and its id
    pub fn not_found(entity: &str, id: impl std::fmt::Display) -> Self {
        Error::NotFound(format!("{} {} not found", entity, id))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Internal(format!("JSON encoding failed: {}", err))
    }
}
