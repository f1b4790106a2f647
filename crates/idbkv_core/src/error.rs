//! Error types for idbkv core.

use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in idbkv core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage engine error.
    #[error("storage error: {0}")]
    Storage(#[from] idbkv_storage::StorageError),

    /// Malformed key bytes.
    #[error("codec error: {0}")]
    Codec(#[from] idbkv_codec::CodecError),

    /// The store was written with a different schema version.
    #[error("schema version mismatch: found {found}, expected {expected}")]
    SchemaVersionMismatch {
        /// Version recorded in the store.
        found: i64,
        /// Version this build understands.
        expected: i64,
    },

    /// Stored metadata is structurally inconsistent.
    #[error("consistency error: {message}")]
    Consistency {
        /// Description of the inconsistency.
        message: String,
    },

    /// Operation not permitted in current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why operation is invalid.
        message: String,
    },

    /// An argument is out of range or malformed.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the argument problem.
        message: String,
    },
}

impl CoreError {
    /// Creates a consistency error.
    pub fn consistency(message: impl Into<String>) -> Self {
        Self::Consistency {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }
}
