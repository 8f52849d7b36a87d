//! Error types for the TEDSAI engine.

use crate::remote::RemoteError;
use thiserror::Error;

/// All possible errors from the engine.
///
/// Most of these never reach callers of the periodic services: local storage
/// failures are logged and treated as empty, remote failures are logged per
/// collection. They surface through the lower-level APIs so tests and hosts
/// can observe them.
#[derive(Debug, Error)]
pub enum Error {
    // Local storage errors
    #[error("storage access failed for key '{key}': {message}")]
    Storage { key: String, message: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("stored value is not valid base64: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("stored value is not valid UTF-8")]
    InvalidUtf8,

    // Remote store errors
    #[error("remote store error: {0}")]
    Remote(#[from] RemoteError),

    #[error("remote store is not ready")]
    RemoteNotReady,

    // Lookup errors
    #[error("unknown collection: {0}")]
    UnknownCollection(String),

    #[error("no backup found")]
    BackupNotFound,
}

impl Error {
    pub(crate) fn storage(key: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::Storage {
            key: key.into(),
            message: err.to_string(),
        }
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = Error::UnknownCollection("recipes".into());
        assert_eq!(err.to_string(), "unknown collection: recipes");

        let err = Error::storage("tedsai_menu", "quota exceeded");
        assert_eq!(
            err.to_string(),
            "storage access failed for key 'tedsai_menu': quota exceeded"
        );

        let err = Error::from(RemoteError::new("permission denied"));
        assert_eq!(err.to_string(), "remote store error: permission denied");
    }
}
