//! In-process counting store
//!
//! Every operation runs while holding the DashMap shard lock for its key,
//! which makes increment-and-expire and add-and-expire indivisible for
//! concurrent callers. Expired entries are invisible immediately and
//! physically removed by `purge_expired`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::one::RefMut;
use dashmap::DashMap;
use pulse_core::{Clock, SystemClock};
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::store::CountingStore;
use crate::{Result, StoreError};

#[derive(Debug, Clone)]
enum Value {
    Str(String),
    Set(HashSet<String>),
    Sorted(HashMap<String, f64>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<DateTime<Utc>>,
}

impl Entry {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

pub struct MemoryStore {
    entries: DashMap<String, Entry>,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Expiry is judged against `clock`, so a manual clock can age keys out.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
        }
    }

    /// Number of keys that have not expired.
    pub fn live_keys(&self) -> usize {
        let now = self.clock.now();
        self.entries.iter().filter(|e| e.value().is_live(now)).count()
    }

    /// Locks `key`, replacing a missing or expired entry with `init()`.
    fn live_entry_mut(
        &self,
        key: &str,
        now: DateTime<Utc>,
        init: impl Fn() -> Value,
    ) -> RefMut<'_, String, Entry> {
        let mut entry = self.entries.entry(key.to_string()).or_insert_with(|| Entry {
            value: init(),
            expires_at: None,
        });
        if !entry.is_live(now) {
            *entry = Entry {
                value: init(),
                expires_at: None,
            };
        }
        entry
    }

    fn wrong_type(key: &str) -> StoreError {
        StoreError::WrongType {
            key: key.to_string(),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn expiry(now: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|ttl| now.checked_add_signed(ttl))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[async_trait]
impl CountingStore for MemoryStore {
    async fn incr_with_expiry(&self, key: &str, ttl: Duration) -> Result<i64> {
        let now = self.clock.now();
        let mut entry = self.live_entry_mut(key, now, || Value::Str("0".to_string()));

        let next = match &mut entry.value {
            Value::Str(raw) => {
                let not_an_integer = || StoreError::NotAnInteger {
                    key: key.to_string(),
                };
                let current: i64 = raw.parse().map_err(|_| not_an_integer())?;
                let next = current.checked_add(1).ok_or_else(not_an_integer)?;
                *raw = next.to_string();
                next
            }
            _ => return Err(Self::wrong_type(key)),
        };
        entry.expires_at = Some(expiry(now, ttl));
        Ok(next)
    }

    async fn sadd_with_expiry(&self, key: &str, member: &str, ttl: Duration) -> Result<bool> {
        let now = self.clock.now();
        let mut entry = self.live_entry_mut(key, now, || Value::Set(HashSet::new()));

        let added = match &mut entry.value {
            Value::Set(members) => members.insert(member.to_string()),
            _ => return Err(Self::wrong_type(key)),
        };
        entry.expires_at = Some(expiry(now, ttl));
        Ok(added)
    }

    async fn zadd_with_expiry(
        &self,
        key: &str,
        score: f64,
        member: &str,
        ttl: Duration,
    ) -> Result<bool> {
        let now = self.clock.now();
        let mut entry = self.live_entry_mut(key, now, || Value::Sorted(HashMap::new()));

        let added = match &mut entry.value {
            Value::Sorted(members) => members.insert(member.to_string(), score).is_none(),
            _ => return Err(Self::wrong_type(key)),
        };
        entry.expires_at = Some(expiry(now, ttl));
        Ok(added)
    }

    async fn set_with_expiry(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let now = self.clock.now();
        self.entries.insert(
            key.to_string(),
            Entry {
                value: Value::Str(value.to_string()),
                expires_at: Some(expiry(now, ttl)),
            },
        );
        Ok(())
    }

    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<String>>> {
        let now = self.clock.now();
        Ok(keys
            .iter()
            .map(|key| {
                let entry = self.entries.get(key)?;
                match &entry.value {
                    Value::Str(raw) if entry.is_live(now) => Some(raw.clone()),
                    _ => None,
                }
            })
            .collect())
    }

    async fn smembers(&self, key: &str) -> Result<BTreeSet<String>> {
        let now = self.clock.now();
        let Some(entry) = self.entries.get(key) else {
            return Ok(BTreeSet::new());
        };
        if !entry.is_live(now) {
            return Ok(BTreeSet::new());
        }
        match &entry.value {
            Value::Set(members) => Ok(members.iter().cloned().collect()),
            _ => Err(Self::wrong_type(key)),
        }
    }

    async fn zrange_by_score(&self, key: &str, min: f64, max: f64) -> Result<Vec<(String, f64)>> {
        let now = self.clock.now();
        let Some(entry) = self.entries.get(key) else {
            return Ok(Vec::new());
        };
        if !entry.is_live(now) {
            return Ok(Vec::new());
        }
        let Value::Sorted(members) = &entry.value else {
            return Err(Self::wrong_type(key));
        };

        let mut range: Vec<(String, f64)> = members
            .iter()
            .filter(|(_, score)| **score >= min && **score <= max)
            .map(|(member, score)| (member.clone(), *score))
            .collect();
        range.sort_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        Ok(range)
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>> {
        let now = self.clock.now();
        let Some(entry) = self.entries.get(key) else {
            return Ok(None);
        };
        match entry.expires_at {
            Some(at) if at > now => Ok((at - now).to_std().ok()),
            Some(_) => Ok(None),
            None => Ok(Some(Duration::MAX)),
        }
    }

    async fn purge_expired(&self) -> Result<u64> {
        let now = self.clock.now();
        let mut removed = 0u64;
        self.entries.retain(|_, entry| {
            let keep = entry.is_live(now);
            if !keep {
                removed += 1;
            }
            keep
        });
        debug!(removed, "Purged expired keys");
        Ok(removed)
    }

    async fn is_healthy(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Batch, BatchReply};
    use chrono::TimeZone;
    use pulse_core::ManualClock;

    const HOUR: Duration = Duration::from_secs(3600);

    fn store_at(clock: &ManualClock) -> MemoryStore {
        MemoryStore::with_clock(Arc::new(clock.clone()))
    }

    fn start() -> ManualClock {
        ManualClock::new(Utc.with_ymd_and_hms(2025, 8, 27, 11, 15, 0).unwrap())
    }

    #[tokio::test]
    async fn test_incr_starts_at_one_and_sets_ttl() {
        let clock = start();
        let store = store_at(&clock);

        assert_eq!(store.incr_with_expiry("c", 4 * HOUR).await.unwrap(), 1);
        assert_eq!(store.incr_with_expiry("c", 4 * HOUR).await.unwrap(), 2);
        assert_eq!(store.get("c").await.unwrap().as_deref(), Some("2"));
        assert_eq!(store.ttl("c").await.unwrap(), Some(4 * HOUR));
    }

    #[tokio::test]
    async fn test_incr_refreshes_ttl_and_restarts_after_expiry() {
        let clock = start();
        let store = store_at(&clock);

        store.incr_with_expiry("c", 2 * HOUR).await.unwrap();
        clock.advance(chrono::Duration::minutes(90));
        store.incr_with_expiry("c", 2 * HOUR).await.unwrap();
        assert_eq!(store.ttl("c").await.unwrap(), Some(2 * HOUR));

        clock.advance(chrono::Duration::hours(2));
        assert_eq!(store.get("c").await.unwrap(), None);
        assert_eq!(store.incr_with_expiry("c", 2 * HOUR).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_incr_rejects_non_integer_and_wrong_type() {
        let store = MemoryStore::new();
        store.set_with_expiry("s", "active", HOUR).await.unwrap();
        store.sadd_with_expiry("set", "a", HOUR).await.unwrap();

        assert!(matches!(
            store.incr_with_expiry("s", HOUR).await,
            Err(StoreError::NotAnInteger { .. })
        ));
        assert!(matches!(
            store.incr_with_expiry("set", HOUR).await,
            Err(StoreError::WrongType { .. })
        ));
    }

    #[tokio::test]
    async fn test_sadd_is_idempotent_and_smembers_of_absent_is_empty() {
        let store = MemoryStore::new();
        assert!(store.smembers("nobody").await.unwrap().is_empty());

        assert!(store.sadd_with_expiry("t", "click", HOUR).await.unwrap());
        assert!(!store.sadd_with_expiry("t", "click", HOUR).await.unwrap());
        assert!(store.sadd_with_expiry("t", "view", HOUR).await.unwrap());

        let members: Vec<String> = store.smembers("t").await.unwrap().into_iter().collect();
        assert_eq!(members, vec!["click".to_string(), "view".to_string()]);
    }

    #[tokio::test]
    async fn test_set_expires_as_a_whole() {
        let clock = start();
        let store = store_at(&clock);

        store.sadd_with_expiry("t", "click", HOUR).await.unwrap();
        clock.advance(chrono::Duration::minutes(45));
        store.sadd_with_expiry("t", "view", HOUR).await.unwrap();
        clock.advance(chrono::Duration::minutes(45));
        assert_eq!(store.smembers("t").await.unwrap().len(), 2);

        clock.advance(chrono::Duration::minutes(20));
        assert!(store.smembers("t").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_mget_preserves_order_and_reports_absence() {
        let store = MemoryStore::new();
        store.set_with_expiry("a", "1", HOUR).await.unwrap();
        store.set_with_expiry("c", "0", HOUR).await.unwrap();
        store.sadd_with_expiry("set", "x", HOUR).await.unwrap();

        let keys = vec!["a".to_string(), "b".to_string(), "c".to_string(), "set".to_string()];
        let values = store.mget(&keys).await.unwrap();
        assert_eq!(
            values,
            vec![Some("1".to_string()), None, Some("0".to_string()), None]
        );
    }

    #[tokio::test]
    async fn test_zrange_by_score() {
        let store = MemoryStore::new();
        for ts in [300.0, 100.0, 200.0] {
            store
                .zadd_with_expiry("z", ts, &format!("{}", ts as i64), HOUR)
                .await
                .unwrap();
        }
        assert!(!store.zadd_with_expiry("z", 100.0, "100", HOUR).await.unwrap());

        let range = store.zrange_by_score("z", 150.0, 300.0).await.unwrap();
        assert_eq!(
            range,
            vec![("200".to_string(), 200.0), ("300".to_string(), 300.0)]
        );
    }

    #[tokio::test]
    async fn test_batch_applies_in_order_and_keeps_prefix_on_failure() {
        let store = MemoryStore::new();
        store.set_with_expiry("status", "inactive", HOUR).await.unwrap();

        let mut ok = Batch::new();
        ok.incr_with_expiry("c", HOUR)
            .sadd_with_expiry("t", "click", HOUR)
            .zadd_with_expiry("z", 1.0, "1", HOUR);
        let replies = store.execute_batch(ok).await.unwrap();
        assert_eq!(
            replies,
            vec![BatchReply::Integer(1), BatchReply::Added(true), BatchReply::Added(true)]
        );

        let mut failing = Batch::new();
        failing
            .incr_with_expiry("c", HOUR)
            .incr_with_expiry("status", HOUR)
            .sadd_with_expiry("t", "view", HOUR);
        assert!(store.execute_batch(failing).await.is_err());

        assert_eq!(store.get("c").await.unwrap().as_deref(), Some("2"));
        assert!(!store.smembers("t").await.unwrap().contains("view"));
    }

    #[tokio::test]
    async fn test_purge_removes_only_expired() {
        let clock = start();
        let store = store_at(&clock);

        store.incr_with_expiry("short", HOUR).await.unwrap();
        store.incr_with_expiry("long", 3 * HOUR).await.unwrap();
        clock.advance(chrono::Duration::hours(2));

        assert_eq!(store.purge_expired().await.unwrap(), 1);
        assert_eq!(store.live_keys(), 1);
        assert_eq!(store.get("long").await.unwrap().as_deref(), Some("1"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_increments_are_not_lost() {
        let store = Arc::new(MemoryStore::new());
        let mut handles = Vec::new();
        for _ in 0..500 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.incr_with_expiry("hot", HOUR).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(store.get("hot").await.unwrap().as_deref(), Some("500"));
    }
}
