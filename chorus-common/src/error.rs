//! Common error types for Chorus

use thiserror::Error;

/// Common result type for Chorus operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy shared by the core and the HTTP service
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSON column (element_ids, program_ids, tags)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Unknown song, program, version, vote or comment
    #[error("Not found: {0}")]
    NotFound(String),

    /// Missing or malformed field
    #[error("Validation error: {0}")]
    Validation(String),

    /// Best-effort collaborator failure (rendering, media storage)
    #[error("Dependency failure: {0}")]
    Dependency(String),

    /// Caller lacks the capability for the operation
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Shorthand for a validation error naming the offending field
    pub fn invalid(field: &str, message: impl std::fmt::Display) -> Self {
        Error::Validation(format!("{}: {}", field, message))
    }
}
