//! Counting store interface

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::time::Duration;

use crate::types::{Batch, BatchOp, BatchReply};
use crate::Result;

/// Key-value capabilities backing the activity tracker.
///
/// Each single-key write is indivisible with respect to concurrent callers,
/// TTL included. Nothing spanning several keys is transactional.
#[async_trait]
pub trait CountingStore: Send + Sync + 'static {
    /// Increment the integer at `key` by one (absent counts as 0) and set its
    /// TTL. Returns the new value.
    async fn incr_with_expiry(&self, key: &str, ttl: Duration) -> Result<i64>;

    /// Add `member` to the set at `key` and refresh the whole set's TTL.
    /// Returns whether the member was new.
    async fn sadd_with_expiry(&self, key: &str, member: &str, ttl: Duration) -> Result<bool>;

    /// Add or re-score `member` in the sorted set at `key` and refresh its TTL.
    async fn zadd_with_expiry(
        &self,
        key: &str,
        score: f64,
        member: &str,
        ttl: Duration,
    ) -> Result<bool>;

    /// Overwrite the string at `key`.
    async fn set_with_expiry(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

    /// Read string values in key order. Absent, expired or non-string keys
    /// come back as `None`.
    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<String>>>;

    /// Members of the set at `key`; empty when the key does not exist.
    async fn smembers(&self, key: &str) -> Result<BTreeSet<String>>;

    /// Sorted-set members with `min <= score <= max`, ascending by score.
    async fn zrange_by_score(&self, key: &str, min: f64, max: f64) -> Result<Vec<(String, f64)>>;

    /// Remaining time to live, `None` if the key is absent.
    async fn ttl(&self, key: &str) -> Result<Option<Duration>>;

    /// Drop every expired key. Returns how many entries were removed.
    async fn purge_expired(&self) -> Result<u64>;

    async fn is_healthy(&self) -> bool;

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut values = self.mget(&[key.to_string()]).await?;
        Ok(values.pop().flatten())
    }

    /// Apply `batch` in order, stopping at the first failure. Operations
    /// applied before the failure stay applied. Backends that pipeline may
    /// override this; none of them is all-or-nothing.
    async fn execute_batch(&self, batch: Batch) -> Result<Vec<BatchReply>> {
        let mut replies = Vec::with_capacity(batch.len());
        for op in batch.into_ops() {
            replies.push(self.apply(op).await?);
        }
        Ok(replies)
    }

    async fn apply(&self, op: BatchOp) -> Result<BatchReply> {
        match op {
            BatchOp::IncrWithExpiry { key, ttl } => {
                self.incr_with_expiry(&key, ttl).await.map(BatchReply::Integer)
            }
            BatchOp::SAddWithExpiry { key, member, ttl } => self
                .sadd_with_expiry(&key, &member, ttl)
                .await
                .map(BatchReply::Added),
            BatchOp::ZAddWithExpiry {
                key,
                score,
                member,
                ttl,
            } => self
                .zadd_with_expiry(&key, score, &member, ttl)
                .await
                .map(BatchReply::Added),
        }
    }
}
