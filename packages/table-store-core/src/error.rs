//! Store error types.

use thiserror::Error;

/// Errors raised by the codec, the table registry and the replica builder.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Field count or type disagrees with a declared schema
    #[error("Schema violation: {0}")]
    SchemaViolation(String),

    /// Declared lengths disagree with the actual byte data
    #[error("Layout mismatch: {0}")]
    LayoutMismatch(String),

    /// A schema or length limit was exceeded
    #[error("Limit exceeded: {what} is {got}, maximum {max}")]
    LimitExceeded {
        what: &'static str,
        got: u64,
        max: u64,
    },

    /// Malformed or protocol-violating event in the stream
    #[error("Stream integrity error at event {index}: {message}")]
    StreamIntegrity { index: u64, message: String },

    /// Event or read references a table with no registration
    #[error("Unknown table {table}")]
    UnknownTable { table: String },

    /// Resource id carries an unsupported type tag
    #[error("Invalid resource id {id}: {reason}")]
    InvalidResourceId { id: String, reason: String },

    /// Persisted data failed verification
    #[error("Data corruption detected: {0}")]
    DataCorruption(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// I/O error during persistence
    #[error("I/O error: {0}")]
    IoError(String),

    /// Transient I/O error that may succeed on retry
    #[error("Transient I/O error: {0}")]
    TransientIoError(String),
}

impl StoreError {
    /// Builds a stream integrity error for the event at `index`.
    pub(crate) fn stream(index: u64, message: impl Into<String>) -> Self {
        StoreError::StreamIntegrity {
            index,
            message: message.into(),
        }
    }

    /// Returns `true` for errors that describe a broken event stream rather than a
    /// codec or persistence failure.
    pub fn is_stream_error(&self) -> bool {
        matches!(
            self,
            StoreError::StreamIntegrity { .. } | StoreError::UnknownTable { .. }
        )
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
