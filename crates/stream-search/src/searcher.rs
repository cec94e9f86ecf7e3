//! Ranked full-text search using BM25 scoring.
//!
//! Results are ordered by descending score, then by document id ascending so
//! equal scores always come back in the same order.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use tantivy::collector::{Count, TopDocs};
use tantivy::query::QueryParser;
use tracing::{debug, info};

use stream_types::{DocumentId, FieldValue};

use crate::error::SearchError;
use crate::index::IndexStore;

/// A search result with relevance score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredDocument {
    pub document_id: DocumentId,
    /// BM25 relevance score
    pub score: f32,
    pub fields: BTreeMap<String, FieldValue>,
}

/// Hits plus the counts reported alongside them.
#[derive(Debug, Clone, Default)]
pub struct SearchHits {
    pub hits: Vec<ScoredDocument>,
    /// Documents matching the query, before the limit
    pub total_matches: usize,
    /// Live documents in the snapshot that served the query
    pub index_num_docs: u64,
}

/// Read-only query engine. Opens a fresh snapshot for every query.
#[derive(Clone)]
pub struct QueryEngine {
    store: IndexStore,
    query_parser: QueryParser,
}

impl QueryEngine {
    pub fn new(store: IndexStore) -> Self {
        let query_parser =
            QueryParser::for_index(store.index(), store.schema().default_search_fields());
        Self {
            store,
            query_parser,
        }
    }

    /// Ranked documents matching `query`, at most `limit` of them.
    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<ScoredDocument>, SearchError> {
        Ok(self.execute(query, limit)?.hits)
    }

    /// Run a query and report match and index counts with the hits.
    pub fn execute(&self, query_str: &str, limit: usize) -> Result<SearchHits, SearchError> {
        if limit == 0 {
            return Err(SearchError::InvalidLimit("limit must be > 0".to_string()));
        }
        if query_str.trim().is_empty() {
            return Err(SearchError::InvalidQuery("query is required".to_string()));
        }

        let query = self
            .query_parser
            .parse_query(query_str)
            .map_err(|e| SearchError::InvalidQuery(e.to_string()))?;

        let snapshot = self.store.open_for_read()?;
        let searcher = snapshot.searcher();

        // Widen the window until the boundary score is fully inside it, so the
        // id tie-break sees every document sharing that score. The first
        // window never exceeds the snapshot size.
        let mut fetch = limit.min(snapshot.num_docs() as usize).max(1);
        let (top_docs, total_matches) = loop {
            let (top_docs, count) =
                searcher.search(&query, &(TopDocs::with_limit(fetch), Count))?;
            let exhausted = top_docs.len() < fetch || fetch >= count;
            if exhausted || (fetch > limit && top_docs[fetch - 1].0 < top_docs[limit - 1].0) {
                break (top_docs, count);
            }
            fetch = fetch.saturating_mul(2).min(count);
            debug!(fetch, "Widening result window for tie-break");
        };

        let mut hits = Vec::with_capacity(top_docs.len());
        for (score, address) in top_docs {
            let record = snapshot.load(address)?;
            hits.push(ScoredDocument {
                document_id: record.document_id,
                score,
                fields: record.fields,
            });
        }
        hits.sort_by(rank_order);
        hits.truncate(limit);

        info!(
            query = query_str,
            results = hits.len(),
            total_matches,
            "Search complete"
        );

        Ok(SearchHits {
            hits,
            total_matches,
            index_num_docs: snapshot.num_docs(),
        })
    }

    /// Live documents in a fresh snapshot.
    pub fn num_docs(&self) -> Result<u64, SearchError> {
        Ok(self.store.open_for_read()?.num_docs())
    }
}

fn rank_order(a: &ScoredDocument, b: &ScoredDocument) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.document_id.cmp(&b.document_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::IndexStoreConfig;
    use crate::writer::CommitMarker;
    use stream_types::IndexedDocument;
    use tempfile::TempDir;

    fn setup(docs: &[(&str, &str)]) -> (TempDir, QueryEngine) {
        let temp_dir = TempDir::new().unwrap();
        let store = IndexStore::open_or_create(IndexStoreConfig::new(temp_dir.path())).unwrap();

        let mut writer = store.open_for_write().unwrap();
        for (id, body) in docs {
            writer
                .upsert(
                    &IndexedDocument::new(DocumentId::new(*id))
                        .with_field("id", FieldValue::keyword(*id))
                        .with_field("body", FieldValue::text(*body)),
                )
                .unwrap();
        }
        writer
            .commit(&CommitMarker::new(None, None, docs.len()))
            .unwrap();
        writer.close().unwrap();

        (temp_dir, QueryEngine::new(store))
    }

    fn ids(hits: &[ScoredDocument]) -> Vec<&str> {
        hits.iter().map(|h| h.document_id.as_str()).collect()
    }

    #[test]
    fn test_search_ranks_matches() {
        let (_dir, engine) = setup(&[
            ("doc1", "red fox"),
            ("doc2", "blue fox"),
            ("doc3", "red dog"),
        ]);

        let hits = engine.search("fox", 10).unwrap();
        assert_eq!(ids(&hits), vec!["doc1", "doc2"]);
        assert!(hits[0].score >= hits[1].score);

        let hits = engine.search("fox", 1).unwrap();
        assert_eq!(ids(&hits), vec!["doc1"]);
    }

    #[test]
    fn test_tie_break_by_document_id() {
        // Identical bodies score identically; insertion order is reversed.
        let docs: Vec<(String, &str)> = (0..20)
            .rev()
            .map(|i| (format!("doc{:02}", i), "same words here"))
            .collect();
        let refs: Vec<(&str, &str)> = docs.iter().map(|(id, b)| (id.as_str(), *b)).collect();
        let (_dir, engine) = setup(&refs);

        for limit in [1, 3, 7, 20] {
            let hits = engine.search("words", limit).unwrap();
            let expected: Vec<String> = (0..limit).map(|i| format!("doc{:02}", i)).collect();
            assert_eq!(ids(&hits), expected);
        }
    }

    #[test]
    fn test_counts() {
        let (_dir, engine) = setup(&[("a", "red fox"), ("b", "blue fox"), ("c", "red dog")]);
        let result = engine.execute("red", 1).unwrap();
        assert_eq!(result.hits.len(), 1);
        assert_eq!(result.total_matches, 2);
        assert_eq!(result.index_num_docs, 3);
    }

    #[test]
    fn test_attribute_scoped_query() {
        let (_dir, engine) = setup(&[("a", "red fox"), ("b", "blue fox")]);
        let hits = engine.search("body:blue", 10).unwrap();
        assert_eq!(ids(&hits), vec!["b"]);
    }

    #[test]
    fn test_keyword_match() {
        let (_dir, engine) = setup(&[("a", "red fox"), ("b", "blue fox")]);
        let hits = engine.search("a", 10).unwrap();
        assert_eq!(ids(&hits), vec!["a"]);
    }

    #[test]
    fn test_invalid_queries() {
        let (_dir, engine) = setup(&[("a", "red fox")]);

        assert!(matches!(
            engine.search("   ", 10),
            Err(SearchError::InvalidQuery(msg)) if msg == "query is required"
        ));
        assert!(matches!(
            engine.search("(fox OR dog ", 10),
            Err(SearchError::InvalidQuery(_))
        ));
        assert!(matches!(
            engine.search("fox", 0),
            Err(SearchError::InvalidLimit(_))
        ));
    }

    #[test]
    fn test_huge_limit_is_bounded_by_index_size() {
        let (_dir, engine) = setup(&[("a", "red fox"), ("b", "blue fox")]);
        let hits = engine.search("fox", usize::MAX / 2).unwrap();
        assert_eq!(ids(&hits), vec!["a", "b"]);

        let (_dir, empty) = setup(&[]);
        assert!(empty.search("fox", usize::MAX / 2).unwrap().is_empty());
    }

    #[test]
    fn test_no_matches() {
        let (_dir, engine) = setup(&[("a", "red fox")]);
        let result = engine.execute("zebra", 5).unwrap();
        assert!(result.hits.is_empty());
        assert_eq!(result.total_matches, 0);
    }
}
