//! Search error types.

use std::io;

use tantivy::TantivyError;
use thiserror::Error;

/// Errors that can occur in the index store and query engine.
#[derive(Debug, Error)]
pub enum SearchError {
    /// Tantivy index error
    #[error("Tantivy error: {0}")]
    Tantivy(#[from] TantivyError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Stored document or commit payload could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Another writer holds the index lock
    #[error("Index is locked by another writer: {0}")]
    AlreadyLocked(String),

    /// Query text is missing or does not parse
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Result limit outside the accepted range
    #[error("Invalid limit: {0}")]
    InvalidLimit(String),

    /// Index not found
    #[error("Index not found at path: {0}")]
    IndexNotFound(String),

    /// Schema mismatch
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    /// Index content that cannot be decoded
    #[error("Index corrupted: {0}")]
    Corrupted(String),
}

impl SearchError {
    /// Whether the error means the index storage can no longer be trusted.
    ///
    /// A batch hitting one of these must stop without committing.
    pub fn is_batch_fatal(&self) -> bool {
        match self {
            SearchError::Tantivy(e) => match e {
                TantivyError::DataCorruption(_)
                | TantivyError::OpenDirectoryError(_)
                | TantivyError::OpenReadError(_)
                | TantivyError::OpenWriteError(_)
                | TantivyError::Poisoned
                | TantivyError::ErrorInThread(_)
                | TantivyError::IncompatibleIndex(_) => true,
                TantivyError::IoError(io) => !is_transient_io(io.kind()),
                _ => false,
            },
            SearchError::Io(e) => !is_transient_io(e.kind()),
            SearchError::Corrupted(_) | SearchError::SchemaMismatch(_) => true,
            _ => false,
        }
    }

    /// Whether retrying the same operation later may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            SearchError::AlreadyLocked(_) | SearchError::IndexNotFound(_) => true,
            SearchError::Io(e) => is_transient_io(e.kind()),
            SearchError::Tantivy(TantivyError::IoError(io)) => is_transient_io(io.kind()),
            _ => false,
        }
    }

    /// Whether the error is the caller's fault (bad query or limit).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            SearchError::InvalidQuery(_) | SearchError::InvalidLimit(_)
        )
    }
}

fn is_transient_io(kind: io::ErrorKind) -> bool {
    matches!(
        kind,
        io::ErrorKind::TimedOut | io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock
    )
}
