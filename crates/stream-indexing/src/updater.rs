//! Index updater seam between the batch applier and the index store.

use stream_search::{CommitMarker, IndexWriterHandle};
use stream_types::{DocumentId, IndexedDocument, Mutation};

use crate::error::IndexingError;

/// Operations the batch applier needs from an index writer.
///
/// The Tantivy writer handle is the production implementation; tests
/// substitute recording or failing updaters.
pub trait IndexUpdater: Send {
    /// Replace or add a document keyed by its id.
    fn upsert(&mut self, doc: &IndexedDocument) -> Result<(), IndexingError>;

    /// Remove a document by id. Absent ids are a no-op.
    fn delete(&mut self, doc_id: &DocumentId) -> Result<(), IndexingError>;

    /// Publish everything applied since the last commit.
    fn commit(&mut self, marker: &CommitMarker) -> Result<u64, IndexingError>;

    /// Discard everything applied since the last commit.
    fn rollback(&mut self) -> Result<(), IndexingError>;

    /// Get the name of this updater for logging.
    fn name(&self) -> &str;

    /// Apply one mutation.
    fn apply(&mut self, mutation: &Mutation) -> Result<(), IndexingError> {
        match mutation {
            Mutation::Upsert(doc) => self.upsert(doc),
            Mutation::Delete(doc_id) => self.delete(doc_id),
        }
    }
}

impl IndexUpdater for IndexWriterHandle {
    fn upsert(&mut self, doc: &IndexedDocument) -> Result<(), IndexingError> {
        IndexWriterHandle::upsert(self, doc)?;
        Ok(())
    }

    fn delete(&mut self, doc_id: &DocumentId) -> Result<(), IndexingError> {
        IndexWriterHandle::delete(self, doc_id);
        Ok(())
    }

    fn commit(&mut self, marker: &CommitMarker) -> Result<u64, IndexingError> {
        Ok(IndexWriterHandle::commit(self, marker)?)
    }

    fn rollback(&mut self) -> Result<(), IndexingError> {
        IndexWriterHandle::rollback(self)?;
        Ok(())
    }

    fn name(&self) -> &str {
        "tantivy"
    }
}
