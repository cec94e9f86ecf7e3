//! Command implementations.
//!
//! Handles:
//! - index: apply one change-event batch and print the partial batch response
//! - search: run a query and print the search response
//! - stats: print document count and the last commit marker

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use tokio::io::AsyncReadExt;
use tracing::{debug, info};

use stream_indexing::{ApplierConfig, BatchApplier, BatchResult, IndexingError};
use stream_search::{
    CommitMarker, IndexStore, IndexStoreConfig, QueryEngine, QueryLimits, SearchRequest,
    SearchResponse,
};
use stream_types::{ChangeBatch, CodecConfig, DocumentCodec, Settings};

/// Load settings and apply CLI overrides (highest precedence).
pub fn load_settings(
    config_path: Option<&str>,
    mount_path_override: Option<&str>,
    log_level_override: Option<&str>,
) -> Result<Settings> {
    let mut settings = Settings::load(config_path).context("Failed to load configuration")?;

    if let Some(mount_path) = mount_path_override {
        settings.mount_path = mount_path.to_string();
    }
    if let Some(log_level) = log_level_override {
        settings.log_level = log_level.to_string();
    }

    settings.validate().context("Invalid configuration")?;
    Ok(settings)
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over the configured level. Logs go to stderr; stdout
/// carries command output only.
pub fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;
    Ok(())
}

/// Apply one batch to the index under the configured mount.
pub fn index_batch(settings: &Settings, batch: &ChangeBatch) -> Result<BatchResult, IndexingError> {
    let store = IndexStore::open_or_create(IndexStoreConfig::from_settings(settings))?;
    let codec = DocumentCodec::new(CodecConfig::from_settings(settings));
    let applier = BatchApplier::new(store, codec, ApplierConfig::from_settings(settings));
    applier.apply(&batch.records)
}

/// Read a batch from `input` (or stdin), apply it and print the
/// `batchItemFailures` response.
///
/// A busy writer is an error so the caller retries the whole batch.
pub async fn handle_index(settings: Settings, input: Option<PathBuf>) -> Result<()> {
    let bytes = match &input {
        Some(path) => tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read batch file {}", path.display()))?,
        None => {
            let mut buf = Vec::new();
            tokio::io::stdin()
                .read_to_end(&mut buf)
                .await
                .context("Failed to read batch from stdin")?;
            buf
        }
    };
    let batch = ChangeBatch::from_slice(&bytes).context("Invalid change batch")?;

    info!(
        records = batch.len(),
        table = settings.table_name.as_deref().unwrap_or("-"),
        index = %settings.index_path().display(),
        "Applying batch"
    );

    let result = tokio::task::spawn_blocking(move || index_batch(&settings, &batch))
        .await
        .context("Index task panicked")?
        .context("Failed to apply batch")?;

    let response = serde_json::to_string(&result.item_failures())?;
    println!("{}", response);
    Ok(())
}

/// Run a query against the index under the configured mount.
///
/// Failures, including a missing index, are reported in the response.
pub fn search_index(settings: &Settings, request: &SearchRequest) -> SearchResponse {
    let store = match IndexStore::open(IndexStoreConfig::from_settings(settings)) {
        Ok(store) => store,
        Err(e) => return SearchResponse::from_error(&e),
    };
    let engine = QueryEngine::new(store);
    engine.handle(request, &QueryLimits::from_settings(settings))
}

pub async fn handle_search(settings: Settings, query: String, limit: Option<i64>) -> Result<()> {
    let request = SearchRequest {
        query: Some(query),
        limit,
    };
    debug!(?request, "Search request");

    let response = tokio::task::spawn_blocking(move || search_index(&settings, &request))
        .await
        .context("Search task panicked")?;

    println!("{}", serde_json::to_string(&response)?);
    if let Some(error) = response.error {
        anyhow::bail!("Search failed: {}", error);
    }
    Ok(())
}

/// Index statistics reported by `stats`.
#[derive(Debug, Serialize)]
pub struct IndexStats {
    pub index_path: String,
    pub table_name: Option<String>,
    pub num_docs: u64,
    pub last_commit: Option<CommitMarker>,
}

pub fn index_stats(settings: &Settings) -> Result<IndexStats> {
    let path = settings.index_path();
    let store = IndexStore::open(IndexStoreConfig::from_settings(settings))
        .with_context(|| format!("Failed to open index at {}", path.display()))?;

    Ok(IndexStats {
        index_path: display(&path),
        table_name: settings.table_name.clone(),
        num_docs: store.open_for_read()?.num_docs(),
        last_commit: store.last_commit()?,
    })
}

pub fn show_stats(settings: &Settings) -> Result<()> {
    let stats = index_stats(settings)?;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

fn display(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn settings(dir: &TempDir) -> Settings {
        Settings {
            mount_path: dir.path().to_string_lossy().to_string(),
            partition_key: "id".to_string(),
            sort_key: None,
            ..Settings::default()
        }
    }

    #[test]
    fn test_search_missing_index_reports_error() {
        let dir = TempDir::new().unwrap();
        let response = search_index(&settings(&dir), &SearchRequest::new("fox"));
        assert!(response.error.unwrap().starts_with("Index not found"));
        assert!(response.results.is_empty());
    }

    #[test]
    fn test_stats_missing_index_is_error() {
        let dir = TempDir::new().unwrap();
        assert!(index_stats(&settings(&dir)).is_err());
    }

    #[test]
    fn test_index_then_stats() {
        let dir = TempDir::new().unwrap();
        let settings = settings(&dir);
        let batch = ChangeBatch::from_json(
            r#"{"Records": [{"eventName": "INSERT", "dynamodb": {
                "SequenceNumber": "7", "NewImage": {"id": {"S": "x"}}}}]}"#,
        )
        .unwrap();

        let result = index_batch(&settings, &batch).unwrap();
        assert!(result.committed);

        let stats = index_stats(&settings).unwrap();
        assert_eq!(stats.num_docs, 1);
        assert_eq!(
            stats.last_commit.and_then(|m| m.last_sequence).as_deref(),
            Some("7")
        );
    }
}
