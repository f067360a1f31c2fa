use anyhow::Result;
use async_trait::async_trait;

use crate::stats::VisitRecord;

/// Append-only store of raw visit records.
///
/// Statistics are always computed from a full snapshot, so the read side is
/// a single `load_all`. Pre-aggregated storage for very large record sets is
/// a backend concern, not part of this interface.
#[async_trait]
pub trait VisitStore: Send + Sync {
    /// Initialize the store (create tables and indexes)
    async fn init(&self) -> Result<()>;

    /// Append a single visit record
    async fn append(&self, record: &VisitRecord) -> Result<()>;

    /// Append a batch of visit records in one transaction
    async fn append_batch(&self, records: &[VisitRecord]) -> Result<()>;

    /// Load the full record set, oldest first
    async fn load_all(&self) -> Result<Vec<VisitRecord>>;

    /// Number of stored records
    async fn count(&self) -> Result<i64>;
}
