//! Point-in-time view of the committed index.

use tantivy::collector::{DocSetCollector, TopDocs};
use tantivy::query::{AllQuery, TermQuery};
use tantivy::schema::IndexRecordOption;
use tantivy::{DocAddress, Searcher, TantivyDocument, Term};

use stream_types::{DocumentId, IndexedDocument};

use crate::document::doc_to_record;
use crate::error::SearchError;
use crate::schema::SearchSchema;

/// A read snapshot. Never sees commits made after it was opened.
pub struct IndexSnapshot {
    searcher: Searcher,
    schema: SearchSchema,
}

impl IndexSnapshot {
    pub(crate) fn new(searcher: Searcher, schema: SearchSchema) -> Self {
        Self { searcher, schema }
    }

    pub fn searcher(&self) -> &Searcher {
        &self.searcher
    }

    /// Live documents in the snapshot.
    pub fn num_docs(&self) -> u64 {
        self.searcher.num_docs()
    }

    /// Look up a document by id.
    pub fn get(&self, doc_id: &DocumentId) -> Result<Option<IndexedDocument>, SearchError> {
        let term = Term::from_field_text(self.schema.doc_id, doc_id.as_str());
        let query = TermQuery::new(term, IndexRecordOption::Basic);
        let top_docs = self.searcher.search(&query, &TopDocs::with_limit(1))?;

        match top_docs.first() {
            Some((_, address)) => Ok(Some(self.load(*address)?)),
            None => Ok(None),
        }
    }

    /// Every live document, ordered by id.
    pub fn documents(&self) -> Result<Vec<IndexedDocument>, SearchError> {
        let addresses = self.searcher.search(&AllQuery, &DocSetCollector)?;
        let mut records = addresses
            .into_iter()
            .map(|address| self.load(address))
            .collect::<Result<Vec<_>, _>>()?;
        records.sort_by(|a, b| a.document_id.cmp(&b.document_id));
        Ok(records)
    }

    pub(crate) fn load(&self, address: DocAddress) -> Result<IndexedDocument, SearchError> {
        let doc: TantivyDocument = self.searcher.doc(address)?;
        doc_to_record(&self.schema, &doc)
    }
}

#[cfg(test)]
mod tests {
    use crate::index::{IndexStore, IndexStoreConfig};
    use crate::writer::CommitMarker;
    use stream_types::{DocumentId, FieldValue, IndexedDocument};
    use tempfile::TempDir;

    #[test]
    fn test_snapshot_is_point_in_time() {
        let temp_dir = TempDir::new().unwrap();
        let store = IndexStore::open_or_create(IndexStoreConfig::new(temp_dir.path())).unwrap();

        let mut writer = store.open_for_write().unwrap();
        writer
            .upsert(&IndexedDocument::new(DocumentId::new("b")).with_field("n", FieldValue::keyword("2")))
            .unwrap();
        writer
            .upsert(&IndexedDocument::new(DocumentId::new("a")).with_field("n", FieldValue::keyword("1")))
            .unwrap();
        writer.commit(&CommitMarker::new(None, None, 2)).unwrap();

        let before = store.open_for_read().unwrap();

        writer.delete(&DocumentId::new("a"));
        writer.commit(&CommitMarker::new(None, None, 1)).unwrap();

        let ids: Vec<_> = before
            .documents()
            .unwrap()
            .into_iter()
            .map(|d| d.document_id)
            .collect();
        assert_eq!(ids, vec![DocumentId::new("a"), DocumentId::new("b")]);

        let after = store.open_for_read().unwrap();
        assert_eq!(after.num_docs(), 1);
        assert!(after.get(&DocumentId::new("a")).unwrap().is_none());
        assert!(after.get(&DocumentId::new("b")).unwrap().is_some());
    }
}
