//! Tantivy index management.
//!
//! Handles index creation, the exclusive writer and read snapshots.

use std::path::{Path, PathBuf};

use tantivy::directory::error::LockError;
use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, TantivyError};
use tracing::{debug, info};

use stream_types::Settings;

use crate::error::SearchError;
use crate::schema::{build_record_schema, SearchSchema};
use crate::snapshot::IndexSnapshot;
use crate::writer::{CommitMarker, IndexWriterHandle};

/// Default memory budget for IndexWriter (50MB)
const DEFAULT_WRITER_MEMORY_MB: usize = 50;

/// Index store configuration
#[derive(Debug, Clone)]
pub struct IndexStoreConfig {
    /// Path to index directory
    pub index_path: PathBuf,
    /// Memory budget for writer in MB
    pub writer_memory_mb: usize,
}

impl Default for IndexStoreConfig {
    fn default() -> Self {
        Self {
            index_path: PathBuf::from("./index"),
            writer_memory_mb: DEFAULT_WRITER_MEMORY_MB,
        }
    }
}

impl IndexStoreConfig {
    pub fn new(index_path: impl Into<PathBuf>) -> Self {
        Self {
            index_path: index_path.into(),
            writer_memory_mb: DEFAULT_WRITER_MEMORY_MB,
        }
    }

    pub fn with_memory_mb(mut self, mb: usize) -> Self {
        self.writer_memory_mb = mb;
        self
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.index_path()).with_memory_mb(settings.writer_memory_mb)
    }
}

/// The on-disk index: one exclusive writer, any number of read snapshots.
#[derive(Clone)]
pub struct IndexStore {
    index: Index,
    schema: SearchSchema,
    config: IndexStoreConfig,
}

impl IndexStore {
    /// Open existing index or create new one.
    pub fn open_or_create(config: IndexStoreConfig) -> Result<Self, SearchError> {
        let index = open_or_create_index(&config.index_path)?;
        Self::from_index(index, config)
    }

    /// Open an existing index without creating it.
    pub fn open(config: IndexStoreConfig) -> Result<Self, SearchError> {
        if !index_exists(&config.index_path) {
            return Err(SearchError::IndexNotFound(
                config.index_path.display().to_string(),
            ));
        }
        let index = Index::open_in_dir(&config.index_path)?;
        Self::from_index(index, config)
    }

    fn from_index(index: Index, config: IndexStoreConfig) -> Result<Self, SearchError> {
        let schema = SearchSchema::from_schema(index.schema())?;
        info!(path = ?config.index_path, "Opened index store");
        Ok(Self {
            index,
            schema,
            config,
        })
    }

    /// Get the search schema
    pub fn schema(&self) -> &SearchSchema {
        &self.schema
    }

    /// Get the underlying Tantivy index
    pub fn index(&self) -> &Index {
        &self.index
    }

    /// Get the index path
    pub fn path(&self) -> &Path {
        &self.config.index_path
    }

    /// Acquire the exclusive writer.
    ///
    /// Fails fast with [`SearchError::AlreadyLocked`] when another writer,
    /// in this process or any other, holds the lock.
    pub fn open_for_write(&self) -> Result<IndexWriterHandle, SearchError> {
        let memory_budget = self.config.writer_memory_mb * 1024 * 1024;
        let writer: IndexWriter<TantivyDocument> = match self.index.writer(memory_budget) {
            Ok(writer) => writer,
            Err(TantivyError::LockFailure(LockError::LockBusy, _)) => {
                return Err(SearchError::AlreadyLocked(
                    self.config.index_path.display().to_string(),
                ));
            }
            Err(e) => return Err(e.into()),
        };
        debug!(
            memory_mb = self.config.writer_memory_mb,
            "Acquired index writer"
        );
        Ok(IndexWriterHandle::new(writer, self.schema.clone()))
    }

    /// Snapshot of the latest committed generation.
    ///
    /// Each call builds a fresh reader so the snapshot reflects every commit
    /// that completed before it.
    pub fn open_for_read(&self) -> Result<IndexSnapshot, SearchError> {
        let reader: IndexReader = self
            .index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;
        Ok(IndexSnapshot::new(reader.searcher(), self.schema.clone()))
    }

    /// Marker attached to the latest commit, if any commit carried one.
    pub fn last_commit(&self) -> Result<Option<CommitMarker>, SearchError> {
        let metas = self.index.load_metas()?;
        match metas.payload {
            Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }
}

fn index_exists(path: &Path) -> bool {
    path.join("meta.json").exists()
}

/// Open an existing index or create a new one.
///
/// Uses MmapDirectory for persistence.
pub fn open_or_create_index(path: &Path) -> Result<Index, SearchError> {
    if index_exists(path) {
        debug!(path = ?path, "Opening existing index");
        Ok(Index::open_in_dir(path)?)
    } else {
        info!(path = ?path, "Creating new index");
        std::fs::create_dir_all(path)?;
        let schema = build_record_schema();
        Ok(Index::create_in_dir(path, schema.schema().clone())?)
    }
}
