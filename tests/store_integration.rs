//! Integration tests for visit persistence
//!
//! Verifies the SQLite store round-trips records faithfully and that the
//! buffered write path delivers records to the store through the background
//! flush task.

use std::sync::Arc;
use tokio::time::{sleep, Duration};

use tally::stats::VisitRecord;
use tally::storage::{SqliteStore, VisitBuffer, VisitStore};

fn visit(timestamp: i64, ip: &str, url: &str) -> VisitRecord {
    VisitRecord {
        timestamp,
        ip: ip.to_string(),
        user_agent: "Mozilla/5.0 (X11; Linux x86_64; rv:121.0) Gecko/20100101 Firefox/121.0"
            .to_string(),
        url: url.to_string(),
        referrer: "Direct".to_string(),
        language: "en-US,en;q=0.9".to_string(),
    }
}

async fn memory_store() -> Arc<dyn VisitStore> {
    let store = SqliteStore::new("sqlite::memory:", 5).await.unwrap();
    store.init().await.unwrap();
    Arc::new(store)
}

#[tokio::test]
async fn test_append_and_load_roundtrip() {
    let store = memory_store().await;

    let record = visit(1_700_000_000, "203.0.113.1", "/docs");
    store.append(&record).await.unwrap();

    let loaded = store.load_all().await.unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0], record);
    assert_eq!(store.count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_load_all_is_ordered_by_timestamp() {
    let store = memory_store().await;

    store
        .append_batch(&[
            visit(1_700_000_300, "203.0.113.3", "/c"),
            visit(1_700_000_100, "203.0.113.1", "/a"),
            visit(1_700_000_200, "203.0.113.2", "/b"),
        ])
        .await
        .unwrap();

    let loaded = store.load_all().await.unwrap();
    let timestamps: Vec<i64> = loaded.iter().map(|r| r.timestamp).collect();
    assert_eq!(timestamps, vec![1_700_000_100, 1_700_000_200, 1_700_000_300]);
}

#[tokio::test]
async fn test_empty_batch_is_a_noop() {
    let store = memory_store().await;

    store.append_batch(&[]).await.unwrap();
    assert_eq!(store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_buffer_auto_flush_reaches_store() {
    let store = memory_store().await;

    let buffer = Arc::new(VisitBuffer::with_config(1024, 50));
    let _handle = buffer.start_flush_task(Arc::clone(&store), 1);

    for i in 0..10 {
        buffer.record(visit(1_700_000_000 + i, "203.0.113.7", "/"));
    }

    // Wait for the fast flush and at least one store flush
    sleep(Duration::from_secs(2)).await;

    let count = store.count().await.unwrap();
    assert_eq!(count, 10, "all buffered visits should be flushed");
}

#[tokio::test]
async fn test_buffer_shutdown_flushes_pending_records() {
    let store = memory_store().await;

    // Long intervals so nothing flushes before the shutdown signal
    let buffer = Arc::new(VisitBuffer::with_config(1024, 60_000));
    let _handle = buffer.start_flush_task(Arc::clone(&store), 3_600);

    buffer.record(visit(1_700_000_000, "203.0.113.7", "/"));
    buffer.record(visit(1_700_000_001, "203.0.113.8", "/about"));

    buffer.shutdown().await;
    sleep(Duration::from_millis(500)).await;

    let count = store.count().await.unwrap();
    assert_eq!(count, 2, "shutdown should flush buffered visits");
}
