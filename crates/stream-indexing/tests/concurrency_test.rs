//! Single-writer exclusion and reader/writer independence.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use tempfile::TempDir;

use stream_indexing::{ApplierConfig, BatchApplier, IndexingError};
use stream_search::{CommitMarker, IndexStore, IndexStoreConfig, QueryEngine};
use stream_types::{
    AttributeValue, ChangeEvent, CodecConfig, DocumentCodec, DocumentId, FieldValue,
    IndexedDocument, Image,
};

fn setup() -> (TempDir, IndexStore) {
    let dir = TempDir::new().unwrap();
    let store = IndexStore::open_or_create(IndexStoreConfig::new(dir.path())).unwrap();
    (dir, store)
}

fn applier(store: &IndexStore) -> BatchApplier {
    BatchApplier::new(
        store.clone(),
        DocumentCodec::new(CodecConfig::new("id")),
        ApplierConfig::default(),
    )
}

fn insert(seq: &str, id: &str, body: &str) -> ChangeEvent {
    ChangeEvent::insert(
        seq,
        Image::from([
            ("id".to_string(), AttributeValue::s(id)),
            ("body".to_string(), AttributeValue::s(body)),
        ]),
    )
}

#[test]
fn test_second_writer_gets_writer_busy() {
    let (_dir, store) = setup();
    let applier = applier(&store);

    let held = store.open_for_write().unwrap();

    let result = applier.apply(&[insert("1", "a", "red fox")]);
    match result {
        Err(err @ IndexingError::WriterBusy(_)) => assert!(err.is_retryable()),
        other => panic!("Expected WriterBusy, got {:?}", other.map(|r| r.committed)),
    }
    assert_eq!(store.open_for_read().unwrap().num_docs(), 0);

    held.close().unwrap();

    let result = applier.apply(&[insert("1", "a", "red fox")]).unwrap();
    assert!(result.committed);
    assert_eq!(store.open_for_read().unwrap().num_docs(), 1);
}

#[test]
fn test_independently_opened_store_is_excluded() {
    let (dir, store) = setup();
    let other = IndexStore::open(IndexStoreConfig::new(dir.path())).unwrap();

    let _held = store.open_for_write().unwrap();
    let result = applier(&other).apply(&[insert("1", "a", "x")]);
    assert!(matches!(result, Err(IndexingError::WriterBusy(_))));
}

#[test]
fn test_query_does_not_wait_for_writer() {
    let (_dir, store) = setup();
    applier(&store)
        .apply(&[insert("1", "a", "red fox")])
        .unwrap();

    // Hold the lock with uncommitted work while a reader runs.
    let mut writer = store.open_for_write().unwrap();
    writer
        .upsert(
            &IndexedDocument::new(DocumentId::new("b"))
                .with_field("body", FieldValue::text("blue fox")),
        )
        .unwrap();

    let engine = QueryEngine::new(store.clone());
    let (tx, rx) = mpsc::channel();
    let reader = thread::spawn(move || {
        let hits = engine.search("fox", 10).unwrap();
        tx.send(hits.len()).unwrap();
    });

    let seen = rx
        .recv_timeout(Duration::from_secs(10))
        .expect("query blocked on the writer");
    assert_eq!(seen, 1);
    reader.join().unwrap();

    writer.commit(&CommitMarker::new(None, None, 1)).unwrap();
    writer.close().unwrap();

    let engine = QueryEngine::new(store);
    assert_eq!(engine.search("fox", 10).unwrap().len(), 2);
}

#[test]
fn test_concurrent_readers_during_batches() {
    let (_dir, store) = setup();
    let applier = applier(&store);

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let engine = QueryEngine::new(store.clone());
            thread::spawn(move || {
                let mut last = 0;
                for _ in 0..20 {
                    let count = engine.execute("fox", 100).unwrap().total_matches;
                    // Committed generations only grow in this test.
                    assert!(count >= last);
                    last = count;
                }
            })
        })
        .collect();

    for i in 0..6 {
        let seq = format!("{}", i);
        let id = format!("doc{}", i);
        let result = applier.apply(&[insert(&seq, &id, "quick fox")]).unwrap();
        assert!(result.committed);
    }

    for reader in readers {
        reader.join().unwrap();
    }
    assert_eq!(store.open_for_read().unwrap().num_docs(), 6);
}

#[test]
fn test_commit_does_not_wait_for_open_snapshot() {
    let (_dir, store) = setup();
    applier(&store)
        .apply(&[insert("1", "a", "red fox")])
        .unwrap();

    // Snapshot held across the commit, plus a query running in a loop.
    let snapshot = store.open_for_read().unwrap();
    let engine = QueryEngine::new(store.clone());
    let stop = Arc::new(AtomicBool::new(false));
    let querying = {
        let stop = stop.clone();
        thread::spawn(move || {
            while !stop.load(Ordering::Relaxed) {
                engine.search("fox", 10).unwrap();
            }
        })
    };

    let writer_applier = applier(&store);
    let (tx, rx) = mpsc::channel();
    let writer = thread::spawn(move || {
        let result = writer_applier
            .apply(&[insert("2", "b", "blue fox")])
            .unwrap();
        tx.send(result.committed).unwrap();
    });

    let committed = rx
        .recv_timeout(Duration::from_secs(10))
        .expect("commit blocked on an open reader");
    assert!(committed);
    writer.join().unwrap();

    stop.store(true, Ordering::Relaxed);
    querying.join().unwrap();

    // The held snapshot still shows its own generation.
    assert_eq!(snapshot.num_docs(), 1);
    assert_eq!(store.open_for_read().unwrap().num_docs(), 2);
}
