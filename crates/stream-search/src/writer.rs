//! Exclusive index writer.
//!
//! Mutations are buffered until `commit`. Dropping the handle without a
//! commit discards them and releases the write lock.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use tantivy::{IndexWriter, TantivyDocument, Term};
use tracing::{debug, info, warn};

use stream_types::{DocumentId, IndexedDocument};

use crate::document::record_to_doc;
use crate::error::SearchError;
use crate::schema::SearchSchema;

/// Payload stored with every commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitMarker {
    /// When the commit was made
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub committed_at: DateTime<Utc>,

    /// First sequence number seen in the committed batch
    pub first_sequence: Option<String>,

    /// Last sequence number seen in the committed batch
    pub last_sequence: Option<String>,

    /// Records applied by the commit
    pub records: usize,
}

impl CommitMarker {
    pub fn new(
        first_sequence: Option<String>,
        last_sequence: Option<String>,
        records: usize,
    ) -> Self {
        Self {
            committed_at: Utc::now().trunc_subsecs(3),
            first_sequence,
            last_sequence,
            records,
        }
    }
}

/// Holds the index write lock for its lifetime.
pub struct IndexWriterHandle {
    writer: IndexWriter<TantivyDocument>,
    schema: SearchSchema,
}

impl IndexWriterHandle {
    pub(crate) fn new(writer: IndexWriter<TantivyDocument>, schema: SearchSchema) -> Self {
        Self { writer, schema }
    }

    /// Replace the document with the same id, or add it.
    pub fn upsert(&self, record: &IndexedDocument) -> Result<u64, SearchError> {
        let doc = record_to_doc(&self.schema, record)?;

        let term = Term::from_field_text(self.schema.doc_id, record.document_id.as_str());
        self.writer.delete_term(term);
        let opstamp = self.writer.add_document(doc)?;

        debug!(doc_id = %record.document_id, "Upserted document");
        Ok(opstamp)
    }

    /// Delete a document by id. Absent ids are a no-op.
    pub fn delete(&self, doc_id: &DocumentId) -> u64 {
        let term = Term::from_field_text(self.schema.doc_id, doc_id.as_str());
        let opstamp = self.writer.delete_term(term);
        debug!(doc_id = %doc_id, "Deleted document");
        opstamp
    }

    /// Publish every mutation since open or the last commit.
    pub fn commit(&mut self, marker: &CommitMarker) -> Result<u64, SearchError> {
        let payload = serde_json::to_string(marker)?;

        let mut prepared = self.writer.prepare_commit()?;
        prepared.set_payload(&payload);
        let opstamp = prepared.commit()?;

        info!(opstamp, records = marker.records, "Committed index changes");
        Ok(opstamp)
    }

    /// Discard uncommitted mutations.
    pub fn rollback(&mut self) -> Result<u64, SearchError> {
        let opstamp = self.writer.rollback()?;
        warn!(opstamp, "Rolled back index changes");
        Ok(opstamp)
    }

    /// Opstamp of the last commit.
    pub fn commit_opstamp(&self) -> u64 {
        self.writer.commit_opstamp()
    }

    /// Wait for background merges and release the lock.
    pub fn close(self) -> Result<(), SearchError> {
        self.writer.wait_merging_threads()?;
        debug!("Released index writer");
        Ok(())
    }
}
