//! Error types for vecindex.

use thiserror::Error;

/// Errors raised by index, search, storage and embedding operations.
///
/// Every error is returned synchronously to the immediate caller; nothing is
/// retried internally.
#[derive(Debug, Error)]
pub enum SearchError {
    /// Malformed record: missing or non-numeric embedding, NaN component,
    /// dimension or schema mismatch.
    #[error("invalid record: {0}")]
    Validation(String),

    /// A filter matched no record on a single-item operation.
    #[error("not found: {0}")]
    NotFound(String),

    /// Two vectors of different dimensionality were compared.
    #[error("vectors must have the same length: {left} != {right}")]
    LengthMismatch {
        /// Length of the left-hand vector.
        left: usize,
        /// Length of the right-hand vector.
        right: usize,
    },

    /// The external store is absent or cannot be opened.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// A store read, write or transaction failed mid-operation.
    #[error("storage operation failed: {0}")]
    StorageOperation(String),

    /// Out-of-range entry index into a graph layer.
    #[error("invalid entry index {index} for layer of length {len}")]
    InvalidIndex {
        /// The offending index.
        index: usize,
        /// Length of the layer it was used against.
        len: usize,
    },

    /// An encoded graph index failed its checksum or structural validation.
    #[error("corrupted index data: {0}")]
    Corrupted(String),

    /// The embedding collaborator failed to produce a vector.
    #[error("embedding failed: {0}")]
    Embedding(String),
}

impl From<std::io::Error> for SearchError {
    fn from(err: std::io::Error) -> Self {
        SearchError::StorageOperation(err.to_string())
    }
}

impl From<bincode::Error> for SearchError {
    fn from(err: bincode::Error) -> Self {
        SearchError::Corrupted(err.to_string())
    }
}

/// Result alias used throughout the crate.
pub type Result<T, E = SearchError> = std::result::Result<T, E>;
