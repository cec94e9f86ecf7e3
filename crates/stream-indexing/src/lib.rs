//! Batch applier for the stream indexer.
//!
//! Consumes change-event batches and turns each one into at most one index
//! commit, reporting the outcome of every record.
//!
//! ## Key Components
//!
//! - [`BatchApplier`]: opens the exclusive writer, applies a batch, commits
//! - [`IndexUpdater`]: seam between the applier and the index writer
//! - [`BatchResult`]: per-record outcomes and the partial batch response
//! - [`IndexingError`]: invocation-level failures such as a busy writer
//!
//! ## Example
//!
//! ```ignore
//! use stream_indexing::{ApplierConfig, BatchApplier};
//!
//! let applier = BatchApplier::new(store, codec, ApplierConfig::from_settings(&settings));
//! let result = applier.apply(&batch.records)?;
//! println!("{}", serde_json::to_string(&result.item_failures())?);
//! ```

pub mod applier;
pub mod error;
pub mod result;
pub mod updater;

pub use applier::{apply_batch, ApplierConfig, BatchApplier};
pub use error::IndexingError;
pub use result::{
    AbortReason, BatchItemFailures, BatchResult, BatchStats, FailureReason, ItemFailure,
    RecordOutcome, RecordStatus,
};
pub use updater::IndexUpdater;
