//! Error types for chattap

use thiserror::Error;

/// Main error type for chattap operations
#[derive(Error, Debug)]
pub enum ChatTapError {
    /// Interaction log errors (file system, locking, etc.)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Proxy/HTTP errors
    #[error("Proxy error: {0}")]
    Proxy(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for ChatTapError {
    fn from(e: serde_json::Error) -> Self {
        ChatTapError::Serialization(e.to_string())
    }
}

/// Result type alias for chattap operations
pub type Result<T> = std::result::Result<T, ChatTapError>;
