//! Error types for blob storage access

use thiserror::Error;

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur when talking to the blob store
#[derive(Error, Debug)]
pub enum StorageError {
    /// Object does not exist in the bucket
    #[error("Object not found: {key}")]
    NotFound {
        /// Object key
        key: String,
    },

    /// Store rejected the request
    #[error("Storage request rejected with status {status}: {message}")]
    Rejected {
        /// HTTP status code
        status: u16,
        /// Response body or status text
        message: String,
    },

    /// Downloaded object is too small to be a real recording
    #[error("Object {key} is only {size} bytes, below the {min} byte minimum")]
    TooSmall {
        /// Object key
        key: String,
        /// Actual size in bytes
        size: usize,
        /// Minimum acceptable size
        min: usize,
    },

    /// Object content is not audio at all
    #[error("Object {key} looks like {kind}, not audio")]
    NotAudio {
        /// Object key
        key: String,
        /// What the content resembles
        kind: String,
    },

    /// HTTP transport error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// I/O error writing the object locally
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    /// Create a not found error
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    /// Create a rejected error
    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        Self::Rejected {
            status,
            message: message.into(),
        }
    }

    /// Check if error is retryable
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Rejected { status: 500..=599, .. })
    }
}

impl From<StorageError> for echolens_core::Error {
    fn from(err: StorageError) -> Self {
        match &err {
            StorageError::TooSmall { .. } | StorageError::NotAudio { .. } => Self::InvalidAudio {
                reason: err.to_string(),
            },
            // A missing object is a storage failure, not an unknown call:
            // NotFound is reserved for call ids the record store has never seen
            _ => Self::Storage(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_object_maps_to_core_storage() {
        let err = StorageError::not_found("uploads/missing.wav");
        let core: echolens_core::Error = err.into();
        assert!(matches!(core, echolens_core::Error::Storage(_)));
    }

    #[test]
    fn test_too_small_maps_to_invalid_audio() {
        let err = StorageError::TooSmall {
            key: "k".to_string(),
            size: 12,
            min: 1024,
        };
        let core: echolens_core::Error = err.into();
        assert!(matches!(core, echolens_core::Error::InvalidAudio { .. }));
    }

    #[test]
    fn test_server_errors_are_retryable() {
        assert!(StorageError::rejected(503, "unavailable").is_retryable());
        assert!(!StorageError::rejected(403, "forbidden").is_retryable());
        assert!(!StorageError::not_found("k").is_retryable());
    }
}
