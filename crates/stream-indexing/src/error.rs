//! Error types for the batch applier.

use stream_search::SearchError;
use thiserror::Error;

/// Errors that can occur while applying a batch
#[derive(Error, Debug)]
pub enum IndexingError {
    /// Another applier holds the index write lock
    #[error("Writer busy: {0}")]
    WriterBusy(String),

    /// Index store error
    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    /// Generic index operation error
    #[error("Index error: {0}")]
    Index(String),
}

impl IndexingError {
    /// Whether the caller should retry the whole invocation later.
    pub fn is_retryable(&self) -> bool {
        match self {
            IndexingError::WriterBusy(_) => true,
            IndexingError::Search(e) => e.is_retryable(),
            IndexingError::Index(_) => false,
        }
    }

    /// Whether the batch must stop without committing.
    pub fn is_batch_fatal(&self) -> bool {
        match self {
            IndexingError::Search(e) => e.is_batch_fatal(),
            _ => false,
        }
    }
}
