//! Error types for the codec crate.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur while encoding, decoding or comparing keys.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Input ended in the middle of a field.
    #[error("unexpected end of input")]
    UnexpectedEof,

    /// A field defined as non-negative was given a negative value.
    #[error("negative value {value} for a non-negative field")]
    NegativeValue {
        /// The rejected value.
        value: i64,
    },

    /// A varint or fixed-width integer does not fit in 63 bits.
    #[error("integer overflow")]
    IntegerOverflow,

    /// A tagged key starts with an unknown type byte.
    #[error("invalid key type byte {0:#04x}")]
    InvalidTypeByte(u8),

    /// A string is not valid UTF-16.
    #[error("invalid UTF-16 string")]
    InvalidUtf16,

    /// A key prefix is malformed or holds ids out of range.
    #[error("invalid key prefix: {message}")]
    InvalidPrefix {
        /// Description of the problem.
        message: String,
    },

    /// A composite key is malformed.
    #[error("invalid key: {message}")]
    InvalidKey {
        /// Description of the problem.
        message: String,
    },
}

impl CodecError {
    /// Create an invalid prefix error.
    pub fn invalid_prefix(message: impl Into<String>) -> Self {
        Self::InvalidPrefix {
            message: message.into(),
        }
    }

    /// Create an invalid key error.
    pub fn invalid_key(message: impl Into<String>) -> Self {
        Self::InvalidKey {
            message: message.into(),
        }
    }
}
