//! Error types for the index registry.

use std::io;

use thiserror::Error;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Errors raised by the registry and its collaborators.
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// A persisted record could not be read or failed required-field checks.
    #[error("Failed to decode {path}: {reason}")]
    Decode { path: String, reason: String },

    /// The resource store rejected a write.
    #[error("Failed to persist {path}: {reason}")]
    Persist { path: String, reason: String },

    /// A reference the registry expected to resolve is dangling.
    #[error("Corrupted registry state: {0}")]
    CorruptedState(String),

    #[error("Storage location allocator exhausted after {attempts} attempts")]
    AllocatorExhausted { attempts: usize },

    #[error("Dictionary error: {0}")]
    Dictionary(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RegistryError {
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        RegistryError::NotFound(msg.into())
    }

    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        RegistryError::InvalidArgument(msg.into())
    }

    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        RegistryError::InvalidConfig(msg.into())
    }

    pub fn decode<P: Into<String>, S: Into<String>>(path: P, reason: S) -> Self {
        RegistryError::Decode {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn persist<P: Into<String>, S: Into<String>>(path: P, reason: S) -> Self {
        RegistryError::Persist {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn corrupted<S: Into<String>>(msg: S) -> Self {
        RegistryError::CorruptedState(msg.into())
    }

    pub fn dictionary<S: Into<String>>(msg: S) -> Self {
        RegistryError::Dictionary(msg.into())
    }

    pub fn internal<S: Into<String>>(msg: S) -> Self {
        RegistryError::Internal(msg.into())
    }

    /// Whether this error means the requested record does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, RegistryError::NotFound(_))
    }
}
