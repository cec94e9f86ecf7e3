//! # stream-search
//!
//! Tantivy-backed index store and query engine for the stream indexer.
//!
//! ## Features
//! - Embedded Tantivy index with MmapDirectory on the shared mount
//! - Exclusive, fail-fast writer with delete-then-add upserts
//! - Commit markers stored in the index metadata
//! - Read snapshots that never wait on the writer
//! - BM25 ranking with a stable document-id tie-break

pub mod document;
pub mod error;
pub mod index;
pub mod request;
pub mod schema;
pub mod searcher;
pub mod snapshot;
pub mod writer;

pub use document::{doc_to_record, record_to_doc};
pub use error::SearchError;
pub use index::{open_or_create_index, IndexStore, IndexStoreConfig};
pub use request::{QueryLimits, SearchRequest, SearchResponse, SearchResult};
pub use schema::{build_record_schema, SearchSchema};
pub use searcher::{QueryEngine, ScoredDocument, SearchHits};
pub use snapshot::IndexSnapshot;
pub use writer::{CommitMarker, IndexWriterHandle};
