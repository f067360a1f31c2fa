//! Buffered visit persistence
//!
//! Visits are recorded on the request hot path, so they are not written to
//! the store directly. An actor owns a local buffer and fast-flushes it into
//! a shared layer; a background task periodically drains that layer into the
//! store as one batch.
//!
//! Uses a 2-layer architecture to avoid lock contention on hot URLs:
//! - Layer 1: local HashMap (single-threaded inside the actor, no locks)
//! - Layer 2: shared DashMap (for concurrent drain access)

use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error, info, warn};

use crate::stats::VisitRecord;
use crate::storage::VisitStore;

/// Message types for the buffer actor
enum ActorMessage {
    /// Record one visit
    Record(VisitRecord),
    /// Shutdown signal - flush the local buffer, then acknowledge
    Shutdown(oneshot::Sender<()>),
}

struct BufferActor {
    /// Channel receiver for incoming visit records
    receiver: mpsc::Receiver<ActorMessage>,
    /// Layer 1: lock-free record buffer (single-threaded access only)
    buffer: HashMap<String, Vec<VisitRecord>>,
    /// Layer 2: shared buffer for concurrent drains
    shared: Arc<DashMap<String, Vec<VisitRecord>>>,
    /// Fast flush interval (Layer 1 → Layer 2)
    fast_flush_interval: Duration,
}

impl BufferActor {
    async fn run(mut self) {
        let mut fast_flush_ticker = tokio::time::interval(self.fast_flush_interval);

        // Skip the first tick which fires immediately
        fast_flush_ticker.tick().await;

        loop {
            tokio::select! {
                Some(msg) = self.receiver.recv() => {
                    match msg {
                        ActorMessage::Record(record) => {
                            self.buffer
                                .entry(record.url.clone())
                                .or_default()
                                .push(record);
                        }
                        ActorMessage::Shutdown(ack) => {
                            info!("Visit buffer actor received shutdown signal, flushing...");
                            self.flush_to_shared();
                            let _ = ack.send(());
                            break;
                        }
                    }
                }
                _ = fast_flush_ticker.tick() => {
                    self.flush_to_shared();
                }
                else => {
                    warn!("Visit buffer channel closed unexpectedly, flushing...");
                    self.flush_to_shared();
                    break;
                }
            }
        }
    }

    /// Flush Layer 1 (local buffer) → Layer 2 (shared DashMap)
    fn flush_to_shared(&mut self) {
        if self.buffer.is_empty() {
            return;
        }

        for (url, records) in self.buffer.drain() {
            self.shared
                .entry(url)
                .and_modify(|existing| existing.extend(records.clone()))
                .or_insert(records);
        }
    }
}

/// In-memory visit write buffer with periodic batch flush
pub struct VisitBuffer {
    /// Actor message sender for lock-free recording
    actor_tx: mpsc::Sender<ActorMessage>,

    /// Shared record buffer (Layer 2) for concurrent drain access
    shared: Arc<DashMap<String, Vec<VisitRecord>>>,

    /// Shutdown signal for the flush task
    shutdown_tx: watch::Sender<bool>,
}

impl VisitBuffer {
    /// Create a buffer with configurable channel capacity and fast flush
    /// interval
    pub fn with_config(capacity: usize, fast_flush_interval_ms: u64) -> Self {
        let (actor_tx, receiver) = mpsc::channel(capacity);
        let shared = Arc::new(DashMap::new());
        let (shutdown_tx, _) = watch::channel(false);

        let actor = BufferActor {
            receiver,
            buffer: HashMap::new(),
            shared: Arc::clone(&shared),
            fast_flush_interval: Duration::from_millis(fast_flush_interval_ms),
        };
        tokio::spawn(actor.run());

        Self {
            actor_tx,
            shared,
            shutdown_tx,
        }
    }

    /// Create a buffer with default settings
    pub fn new() -> Self {
        Self::with_config(
            100_000, // 100k record channel
            100,     // 100ms fast flush interval
        )
    }

    /// Record a visit.
    ///
    /// This is the HOT PATH method called on every tracked request. A full
    /// channel drops the record with a warning rather than blocking the
    /// request.
    pub fn record(&self, record: VisitRecord) {
        if self.actor_tx.try_send(ActorMessage::Record(record)).is_err() {
            warn!("Visit buffer full, dropping visit record");
        }
    }

    /// Drain all buffered records from the shared layer
    pub fn drain(&self) -> Vec<VisitRecord> {
        let mut result = Vec::new();

        let keys: Vec<String> = self.shared.iter().map(|entry| entry.key().clone()).collect();
        for key in keys {
            if let Some((_, mut records)) = self.shared.remove(&key) {
                result.append(&mut records);
            }
        }

        result
    }

    /// Start the background task that drains the buffer into the store
    pub fn start_flush_task(
        &self,
        store: Arc<dyn VisitStore>,
        flush_interval_secs: u64,
    ) -> tokio::task::JoinHandle<()> {
        let shared = Arc::clone(&self.shared);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(flush_interval_secs));
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        flush_shared(&shared, store.as_ref()).await;
                    }
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            info!("Visit buffer flush task shutting down, final flush...");
                            flush_shared(&shared, store.as_ref()).await;
                            break;
                        }
                    }
                }
            }
        })
    }

    /// Signal shutdown: the actor flushes its local buffer into the shared
    /// layer, and only then the flush task performs a final drain into the
    /// store.
    pub async fn shutdown(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.actor_tx.send(ActorMessage::Shutdown(ack_tx)).await.is_ok() {
            let _ = ack_rx.await;
        }
        let _ = self.shutdown_tx.send(true);
    }
}

impl Default for VisitBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Drain the shared layer and persist everything in one batch
async fn flush_shared(shared: &DashMap<String, Vec<VisitRecord>>, store: &dyn VisitStore) {
    let keys: Vec<String> = shared.iter().map(|entry| entry.key().clone()).collect();
    if keys.is_empty() {
        return;
    }

    let mut pending = Vec::new();
    for key in keys {
        if let Some((_, mut records)) = shared.remove(&key) {
            pending.append(&mut records);
        }
    }

    if pending.is_empty() {
        return;
    }

    debug!("Flushing {} buffered visits to store", pending.len());
    if let Err(e) = store.append_batch(&pending).await {
        error!("Failed to flush visit buffer: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    fn visit(url: &str) -> VisitRecord {
        VisitRecord {
            timestamp: 1_700_000_000,
            ip: "203.0.113.7".to_string(),
            user_agent: "curl/8.4.0".to_string(),
            url: url.to_string(),
            referrer: "Direct".to_string(),
            language: "en".to_string(),
        }
    }

    #[tokio::test]
    async fn test_record_reaches_shared_layer() {
        let buffer = VisitBuffer::with_config(16, 10);

        buffer.record(visit("/"));
        buffer.record(visit("/"));
        buffer.record(visit("/about"));

        // Wait past the fast flush interval so the actor moves the records
        sleep(Duration::from_millis(100)).await;

        let drained = buffer.drain();
        assert_eq!(drained.len(), 3);
        assert!(buffer.drain().is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_flushes_local_buffer() {
        let buffer = VisitBuffer::with_config(16, 60_000);

        buffer.record(visit("/"));
        buffer.shutdown().await;

        assert_eq!(buffer.drain().len(), 1);
    }
}
