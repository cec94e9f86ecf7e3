//! Per-record outcomes and batch results.
//!
//! A batch either commits (successful records are durable, failed ones are
//! reported) or does not (every record is reported as failed so the
//! transport redelivers the whole batch).

use serde::{Deserialize, Serialize};
use thiserror::Error;

use stream_types::{ChangeEvent, Operation, SkipReason};

/// Why a record was not applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FailureReason {
    /// The codec rejected the record
    #[error("{0}")]
    Skipped(SkipReason),

    /// The index rejected the mutation
    #[error("Apply error: {0}")]
    ApplyError(String),

    /// The batch was not committed
    #[error("Batch aborted")]
    BatchAborted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordStatus {
    Success,
    Failure(FailureReason),
}

/// Outcome of one record, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordOutcome {
    /// Position in the batch
    pub index: usize,
    pub operation: Operation,
    pub sequence_number: Option<String>,
    pub event_id: Option<String>,
    pub status: RecordStatus,
}

impl RecordOutcome {
    pub fn new(index: usize, event: &ChangeEvent, status: RecordStatus) -> Self {
        Self {
            index,
            operation: event.operation,
            sequence_number: event.sequence_number().map(str::to_string),
            event_id: event.event_id.clone(),
            status,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == RecordStatus::Success
    }

    /// Identifier reported back to the transport: the sequence number, else
    /// the eventID, else the position in the batch.
    pub fn item_identifier(&self) -> String {
        self.sequence_number
            .clone()
            .or_else(|| self.event_id.clone())
            .unwrap_or_else(|| self.index.to_string())
    }
}

/// Why a batch was not committed even though records succeeded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AbortReason {
    /// A record failed under the abort-batch policy
    #[error("record {index} failed: {message}")]
    RecordFailed { index: usize, message: String },

    /// Index storage is corrupt or unusable
    #[error("fatal index error at record {index}: {message}")]
    Fatal { index: usize, message: String },

    /// The batch ran past its time budget
    #[error("time budget exceeded")]
    TimeBudgetExceeded,

    /// The commit itself failed
    #[error("commit failed: {0}")]
    CommitFailed(String),
}

/// Counters logged after each batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchStats {
    pub total: usize,
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub failed: usize,
}

/// Lambda partial batch response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchItemFailures {
    pub batch_item_failures: Vec<ItemFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemFailure {
    pub item_identifier: String,
}

/// Result of applying one batch. Not persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchResult {
    pub outcomes: Vec<RecordOutcome>,
    pub committed: bool,
    /// Commit opstamp when committed
    pub opstamp: Option<u64>,
    pub abort_reason: Option<AbortReason>,
}

impl BatchResult {
    /// Result for an empty batch: nothing to commit, nothing failed.
    pub fn empty() -> Self {
        Self {
            outcomes: Vec::new(),
            committed: false,
            opstamp: None,
            abort_reason: None,
        }
    }

    pub fn failures(&self) -> impl Iterator<Item = &RecordOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }

    pub fn failed_count(&self) -> usize {
        self.failures().count()
    }

    pub fn success_count(&self) -> usize {
        self.outcomes.len() - self.failed_count()
    }

    pub fn is_aborted(&self) -> bool {
        self.abort_reason.is_some()
    }

    pub fn stats(&self) -> BatchStats {
        let mut stats = BatchStats {
            total: self.outcomes.len(),
            ..BatchStats::default()
        };
        for outcome in &self.outcomes {
            if !outcome.is_success() {
                stats.failed += 1;
                continue;
            }
            match outcome.operation {
                Operation::Insert => stats.created += 1,
                Operation::Modify => stats.updated += 1,
                Operation::Remove => stats.deleted += 1,
                Operation::Unknown => {}
            }
        }
        stats
    }

    /// Failed records in the transport's partial batch response shape.
    pub fn item_failures(&self) -> BatchItemFailures {
        BatchItemFailures {
            batch_item_failures: self
                .failures()
                .map(|o| ItemFailure {
                    item_identifier: o.item_identifier(),
                })
                .collect(),
        }
    }
}
