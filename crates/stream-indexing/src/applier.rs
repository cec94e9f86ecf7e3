//! Batch applier: one change-event batch, one writer session, at most one
//! commit.
//!
//! Records are applied in arrival order. A record that cannot be encoded or
//! applied fails on its own; the batch commits when at least one record
//! succeeded and nothing aborted it. The write lock is released on every
//! path, including errors and early returns.

use std::cmp::Ordering;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use stream_search::{CommitMarker, IndexStore, SearchError};
use stream_types::{ApplyErrorPolicy, ChangeEvent, DocumentCodec, Settings};

use crate::error::IndexingError;
use crate::result::{AbortReason, BatchResult, FailureReason, RecordOutcome, RecordStatus};
use crate::updater::IndexUpdater;

/// Configuration for the batch applier.
#[derive(Debug, Clone, Default)]
pub struct ApplierConfig {
    /// What a non-fatal apply error does to the rest of the batch
    pub policy: ApplyErrorPolicy,
    /// Abort when the batch runs longer than this
    pub time_budget: Option<Duration>,
}

impl ApplierConfig {
    pub fn with_policy(mut self, policy: ApplyErrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = Some(budget);
        self
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            policy: settings.apply_error_policy,
            time_budget: settings.batch_time_budget_ms.map(Duration::from_millis),
        }
    }
}

/// Applies change-event batches to the index.
pub struct BatchApplier {
    store: IndexStore,
    codec: DocumentCodec,
    config: ApplierConfig,
}

impl BatchApplier {
    pub fn new(store: IndexStore, codec: DocumentCodec, config: ApplierConfig) -> Self {
        Self {
            store,
            codec,
            config,
        }
    }

    /// Apply one batch.
    ///
    /// Returns [`IndexingError::WriterBusy`] without touching any record when
    /// another writer holds the lock.
    pub fn apply(&self, events: &[ChangeEvent]) -> Result<BatchResult, IndexingError> {
        let started = Instant::now();

        let mut writer = match self.store.open_for_write() {
            Ok(writer) => writer,
            Err(SearchError::AlreadyLocked(path)) => {
                warn!(path = %path, records = events.len(), "Index writer busy");
                return Err(IndexingError::WriterBusy(path));
            }
            Err(e) => return Err(e.into()),
        };

        let result = apply_batch(&mut writer, &self.codec, &self.config, events, started);

        if let Err(e) = writer.close() {
            warn!(error = %e, "Index writer did not close cleanly");
        }
        Ok(result)
    }
}

/// Apply `events` through any [`IndexUpdater`].
///
/// `started` anchors the time budget, so time spent acquiring the writer
/// counts against it.
pub fn apply_batch<U: IndexUpdater>(
    updater: &mut U,
    codec: &DocumentCodec,
    config: &ApplierConfig,
    events: &[ChangeEvent],
    started: Instant,
) -> BatchResult {
    if events.is_empty() {
        debug!("Empty batch");
        return BatchResult::empty();
    }

    let over_budget = || {
        config
            .time_budget
            .is_some_and(|budget| started.elapsed() >= budget)
    };

    let mut outcomes = Vec::with_capacity(events.len());
    let mut abort: Option<AbortReason> = None;
    let mut previous_sequence: Option<&str> = None;

    for (index, event) in events.iter().enumerate() {
        if over_budget() {
            warn!(index, "Batch time budget exceeded");
            abort = Some(AbortReason::TimeBudgetExceeded);
            break;
        }

        if let (Some(previous), Some(current)) = (previous_sequence, event.sequence_number()) {
            if compare_sequence(previous, current) == Ordering::Greater {
                warn!(
                    index,
                    previous, current, "Sequence number went backwards within batch"
                );
            }
        }
        if let Some(current) = event.sequence_number() {
            previous_sequence = Some(current);
        }

        let mutation = match codec.encode(event) {
            Ok(mutation) => mutation,
            Err(reason) => {
                debug!(index, reason = %reason, "Skipping record");
                outcomes.push(RecordOutcome::new(
                    index,
                    event,
                    RecordStatus::Failure(FailureReason::Skipped(reason)),
                ));
                continue;
            }
        };

        match updater.apply(&mutation) {
            Ok(()) => {
                debug!(index, doc_id = %mutation.document_id(), op = %event.operation, "Applied record");
                outcomes.push(RecordOutcome::new(index, event, RecordStatus::Success));
            }
            Err(e) if e.is_batch_fatal() => {
                error!(index, error = %e, updater = updater.name(), "Fatal index error, aborting batch");
                abort = Some(AbortReason::Fatal {
                    index,
                    message: e.to_string(),
                });
                break;
            }
            Err(e) => {
                warn!(index, error = %e, doc_id = %mutation.document_id(), "Failed to apply record");
                match config.policy {
                    ApplyErrorPolicy::SkipRecord => outcomes.push(RecordOutcome::new(
                        index,
                        event,
                        RecordStatus::Failure(FailureReason::ApplyError(e.to_string())),
                    )),
                    ApplyErrorPolicy::AbortBatch => {
                        abort = Some(AbortReason::RecordFailed {
                            index,
                            message: e.to_string(),
                        });
                        break;
                    }
                }
            }
        }
    }

    let successes = outcomes.iter().filter(|o| o.is_success()).count();
    let mut opstamp = None;

    if abort.is_none() && successes > 0 {
        if over_budget() {
            warn!("Batch time budget exceeded before commit");
            abort = Some(AbortReason::TimeBudgetExceeded);
        } else {
            let marker = CommitMarker::new(
                first_sequence(events),
                first_sequence(events.iter().rev()),
                successes,
            );
            match updater.commit(&marker) {
                Ok(stamp) => opstamp = Some(stamp),
                Err(e) => {
                    error!(error = %e, updater = updater.name(), "Commit failed");
                    abort = Some(AbortReason::CommitFailed(e.to_string()));
                }
            }
        }
    }

    if abort.is_some() {
        if let Err(e) = updater.rollback() {
            warn!(error = %e, "Rollback after abort failed");
        }
    }

    let committed = opstamp.is_some();
    if !committed {
        for outcome in outcomes.iter_mut() {
            if outcome.is_success() {
                outcome.status = RecordStatus::Failure(FailureReason::BatchAborted);
            }
        }
        for (index, event) in events.iter().enumerate().skip(outcomes.len()) {
            outcomes.push(RecordOutcome::new(
                index,
                event,
                RecordStatus::Failure(FailureReason::BatchAborted),
            ));
        }
    }

    let result = BatchResult {
        outcomes,
        committed,
        opstamp,
        abort_reason: abort,
    };

    let stats = result.stats();
    info!(
        total = stats.total,
        created = stats.created,
        updated = stats.updated,
        deleted = stats.deleted,
        failed = stats.failed,
        committed,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Batch applied"
    );
    if let Some(reason) = &result.abort_reason {
        warn!(reason = %reason, "Batch not committed");
    }

    result
}

fn first_sequence<'a>(events: impl IntoIterator<Item = &'a ChangeEvent>) -> Option<String> {
    events
        .into_iter()
        .find_map(|e| e.sequence_number())
        .map(str::to_string)
}

/// Order stream sequence numbers: numerically when both are decimal
/// strings, lexically otherwise.
fn compare_sequence(a: &str, b: &str) -> Ordering {
    let numeric = |s: &str| !s.is_empty() && s.bytes().all(|c| c.is_ascii_digit());
    if numeric(a) && numeric(b) {
        let a = a.trim_start_matches('0');
        let b = b.trim_start_matches('0');
        a.len().cmp(&b.len()).then_with(|| a.cmp(b))
    } else {
        a.cmp(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use stream_types::{
        AttributeValue, CodecConfig, DocumentId, Image, IndexedDocument, Operation,
    };

    /// Records applied mutations; fails on configured ids.
    #[derive(Default)]
    struct RecordingUpdater {
        applied: Vec<String>,
        committed: Vec<CommitMarker>,
        rollbacks: usize,
        fail_ids: HashSet<String>,
        fatal_ids: HashSet<String>,
        fail_commit: bool,
    }

    impl RecordingUpdater {
        fn check(&self, id: &DocumentId) -> Result<(), IndexingError> {
            if self.fatal_ids.contains(id.as_str()) {
                return Err(SearchError::Corrupted(format!("segment for {}", id)).into());
            }
            if self.fail_ids.contains(id.as_str()) {
                return Err(IndexingError::Index(format!("rejected {}", id)));
            }
            Ok(())
        }
    }

    impl IndexUpdater for RecordingUpdater {
        fn upsert(&mut self, doc: &IndexedDocument) -> Result<(), IndexingError> {
            self.check(&doc.document_id)?;
            self.applied.push(format!("upsert {}", doc.document_id));
            Ok(())
        }

        fn delete(&mut self, doc_id: &DocumentId) -> Result<(), IndexingError> {
            self.check(doc_id)?;
            self.applied.push(format!("delete {}", doc_id));
            Ok(())
        }

        fn commit(&mut self, marker: &CommitMarker) -> Result<u64, IndexingError> {
            if self.fail_commit {
                return Err(IndexingError::Index("disk full".into()));
            }
            self.committed.push(marker.clone());
            Ok(self.committed.len() as u64)
        }

        fn rollback(&mut self) -> Result<(), IndexingError> {
            self.rollbacks += 1;
            Ok(())
        }

        fn name(&self) -> &str {
            "recording"
        }
    }

    fn image(id: &str) -> Image {
        Image::from([
            ("id".to_string(), AttributeValue::s(id)),
            ("body".to_string(), AttributeValue::s("text")),
        ])
    }

    fn codec() -> DocumentCodec {
        DocumentCodec::new(CodecConfig::new("id"))
    }

    fn run(updater: &mut RecordingUpdater, config: &ApplierConfig, events: &[ChangeEvent]) -> BatchResult {
        apply_batch(updater, &codec(), config, events, Instant::now())
    }

    #[test]
    fn test_commits_successful_records() {
        let mut updater = RecordingUpdater::default();
        let events = vec![
            ChangeEvent::insert("100", image("a")),
            ChangeEvent::modify("101", None, image("a")),
            ChangeEvent::remove("102", image("b")),
        ];

        let result = run(&mut updater, &ApplierConfig::default(), &events);

        assert!(result.committed);
        assert_eq!(result.opstamp, Some(1));
        assert_eq!(result.failed_count(), 0);
        assert_eq!(updater.applied, vec!["upsert a", "upsert a", "delete b"]);

        let marker = &updater.committed[0];
        assert_eq!(marker.first_sequence.as_deref(), Some("100"));
        assert_eq!(marker.last_sequence.as_deref(), Some("102"));
        assert_eq!(marker.records, 3);
    }

    #[test]
    fn test_malformed_record_is_isolated() {
        let mut updater = RecordingUpdater::default();
        let events = vec![
            ChangeEvent::insert("1", image("a")),
            ChangeEvent::insert("2", Image::new()),
            ChangeEvent::insert("3", image("c")),
        ];

        let result = run(&mut updater, &ApplierConfig::default(), &events);

        assert!(result.committed);
        let failed: Vec<_> = result.failures().map(|o| o.index).collect();
        assert_eq!(failed, vec![1]);
        assert!(matches!(
            result.outcomes[1].status,
            RecordStatus::Failure(FailureReason::Skipped(_))
        ));
    }

    #[test]
    fn test_zero_successes_does_not_commit() {
        let mut updater = RecordingUpdater::default();
        let mut unknown = ChangeEvent::insert("2", image("b"));
        unknown.operation = Operation::Unknown;
        let events = vec![ChangeEvent::insert("1", Image::new()), unknown];

        let result = run(&mut updater, &ApplierConfig::default(), &events);

        assert!(!result.committed);
        assert!(updater.committed.is_empty());
        assert_eq!(result.failed_count(), 2);
        assert!(!result.is_aborted());
    }

    #[test]
    fn test_apply_error_skip_policy() {
        let mut updater = RecordingUpdater {
            fail_ids: HashSet::from(["b".to_string()]),
            ..Default::default()
        };
        let events = vec![
            ChangeEvent::insert("1", image("a")),
            ChangeEvent::insert("2", image("b")),
            ChangeEvent::insert("3", image("c")),
        ];

        let result = run(&mut updater, &ApplierConfig::default(), &events);

        assert!(result.committed);
        assert_eq!(result.failed_count(), 1);
        assert!(matches!(
            result.outcomes[1].status,
            RecordStatus::Failure(FailureReason::ApplyError(_))
        ));
    }

    #[test]
    fn test_apply_error_abort_policy() {
        let mut updater = RecordingUpdater {
            fail_ids: HashSet::from(["b".to_string()]),
            ..Default::default()
        };
        let config = ApplierConfig::default().with_policy(ApplyErrorPolicy::AbortBatch);
        let events = vec![
            ChangeEvent::insert("1", image("a")),
            ChangeEvent::insert("2", image("b")),
            ChangeEvent::insert("3", image("c")),
        ];

        let result = run(&mut updater, &config, &events);

        assert!(!result.committed);
        assert!(updater.committed.is_empty());
        assert_eq!(updater.rollbacks, 1);
        assert_eq!(result.failed_count(), 3);
        assert!(matches!(
            result.abort_reason,
            Some(AbortReason::RecordFailed { index: 1, .. })
        ));
        // record 2 was never attempted
        assert_eq!(updater.applied, vec!["upsert a"]);
    }

    #[test]
    fn test_fatal_error_aborts_under_skip_policy() {
        let mut updater = RecordingUpdater {
            fatal_ids: HashSet::from(["b".to_string()]),
            ..Default::default()
        };
        let events = vec![
            ChangeEvent::insert("1", image("a")),
            ChangeEvent::insert("2", image("b")),
        ];

        let result = run(&mut updater, &ApplierConfig::default(), &events);

        assert!(!result.committed);
        assert!(matches!(
            result.abort_reason,
            Some(AbortReason::Fatal { index: 1, .. })
        ));
        assert!(result
            .outcomes
            .iter()
            .all(|o| o.status == RecordStatus::Failure(FailureReason::BatchAborted)));
    }

    #[test]
    fn test_commit_failure_fails_every_record() {
        let mut updater = RecordingUpdater {
            fail_commit: true,
            ..Default::default()
        };
        let events = vec![ChangeEvent::insert("1", image("a"))];

        let result = run(&mut updater, &ApplierConfig::default(), &events);

        assert!(!result.committed);
        assert!(matches!(result.abort_reason, Some(AbortReason::CommitFailed(_))));
        assert_eq!(result.item_failures().batch_item_failures.len(), 1);
    }

    #[test]
    fn test_time_budget_exhausted() {
        let mut updater = RecordingUpdater::default();
        let config = ApplierConfig::default().with_time_budget(Duration::ZERO);
        let events = vec![ChangeEvent::insert("1", image("a"))];

        let result = run(&mut updater, &config, &events);

        assert!(!result.committed);
        assert!(updater.applied.is_empty());
        assert_eq!(result.abort_reason, Some(AbortReason::TimeBudgetExceeded));
        assert_eq!(result.failed_count(), 1);
    }

    #[test]
    fn test_empty_batch() {
        let mut updater = RecordingUpdater::default();
        let result = run(&mut updater, &ApplierConfig::default(), &[]);
        assert!(!result.committed);
        assert!(result.outcomes.is_empty());
    }

    #[test]
    fn test_compare_sequence() {
        assert_eq!(compare_sequence("99", "100"), Ordering::Less);
        assert_eq!(compare_sequence("0100", "100"), Ordering::Equal);
        assert_eq!(compare_sequence("b", "a"), Ordering::Greater);
    }

    #[test]
    fn test_config_from_settings() {
        let settings = Settings {
            apply_error_policy: ApplyErrorPolicy::AbortBatch,
            batch_time_budget_ms: Some(1500),
            ..Settings::default()
        };
        let config = ApplierConfig::from_settings(&settings);
        assert_eq!(config.policy, ApplyErrorPolicy::AbortBatch);
        assert_eq!(config.time_budget, Some(Duration::from_millis(1500)));
    }
}
