//! Error types for storage operations.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The engine directory does not exist and creation was not requested.
    #[error("engine directory does not exist: {}", path.display())]
    NotFound {
        /// The missing directory.
        path: PathBuf,
    },

    /// Another process holds the engine lock.
    #[error("engine locked: another process has exclusive access")]
    Locked,

    /// The journal was created with a different comparator.
    #[error("comparator mismatch: journal uses {found}, engine opened with {expected}")]
    ComparatorMismatch {
        /// Name of the comparator the engine was opened with.
        expected: String,
        /// Name recorded in the journal header.
        found: String,
    },

    /// The on-disk data is corrupted.
    #[error("storage corrupted: {0}")]
    Corrupted(String),
}

impl StorageError {
    /// Creates a corruption error.
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::Corrupted(message.into())
    }
}
