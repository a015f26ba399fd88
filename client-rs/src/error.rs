//! Error types for Chatter client

use thiserror::Error;

/// Errors that can occur when using the Chatter client
#[derive(Error, Debug)]
pub enum ChatterError {
    /// Request could not be sent or the response could not be read
    #[error("Transport error: {0}")]
    Transport(String),

    /// Request timed out
    #[error("Request timed out")]
    Timeout,

    /// Server rejected the request as malformed
    #[error("Invalid request: {0}")]
    Validation(String),

    /// Server rejected the bearer token
    #[error("Authentication failed: {0}")]
    Unauthenticated(String),

    /// Caller is not allowed to perform the operation
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Requested message does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Server failed to handle the request
    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// Failed to serialize/deserialize a body
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ChatterError {
    /// Map a non-success HTTP status and its `{message}` body
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            400 => ChatterError::Validation(message),
            401 => ChatterError::Unauthenticated(message),
            403 => ChatterError::PermissionDenied(message),
            404 => ChatterError::NotFound(message),
            status => ChatterError::Server { status, message },
        }
    }
}

impl From<reqwest::Error> for ChatterError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ChatterError::Timeout
        } else {
            ChatterError::Transport(e.to_string())
        }
    }
}

/// Result type for Chatter operations
pub type Result<T> = std::result::Result<T, ChatterError>;
