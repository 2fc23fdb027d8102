//! LumaDB-backed counting store
//!
//! Keys live in three tables by value kind. Every row carries `expires_at`;
//! reads filter on it and `purge_expired` deletes what has lapsed. Each
//! operation is a single statement, so a concurrent caller never observes
//! half of an increment-and-expire.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::future::try_join_all;
use pulse_core::{Clock, SystemClock};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio_postgres::Client;
use tracing::{debug, info, instrument, warn};

use crate::pool::{PoolConfig, StorePool};
use crate::store::CountingStore;
use crate::types::{Batch, BatchOp, BatchReply};
use crate::Result;

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS pulse_kv (
    key         TEXT PRIMARY KEY,
    value       TEXT NOT NULL,
    expires_at  TIMESTAMPTZ NOT NULL
);
CREATE TABLE IF NOT EXISTS pulse_set_members (
    key         TEXT NOT NULL,
    member      TEXT NOT NULL,
    expires_at  TIMESTAMPTZ NOT NULL,
    PRIMARY KEY (key, member)
);
CREATE TABLE IF NOT EXISTS pulse_sorted_members (
    key         TEXT NOT NULL,
    member      TEXT NOT NULL,
    score       DOUBLE PRECISION NOT NULL,
    expires_at  TIMESTAMPTZ NOT NULL,
    PRIMARY KEY (key, member)
);
CREATE INDEX IF NOT EXISTS pulse_kv_expires_idx ON pulse_kv (expires_at);
CREATE INDEX IF NOT EXISTS pulse_set_members_expires_idx ON pulse_set_members (expires_at);
CREATE INDEX IF NOT EXISTS pulse_sorted_members_expires_idx ON pulse_sorted_members (expires_at);
";

const INCR: &str = r"
INSERT INTO pulse_kv (key, value, expires_at) VALUES ($1, '1', $3)
ON CONFLICT (key) DO UPDATE SET
    value = ((CASE WHEN pulse_kv.expires_at <= $2 THEN 0 ELSE pulse_kv.value::BIGINT END) + 1)::TEXT,
    expires_at = EXCLUDED.expires_at
RETURNING value::BIGINT
";

const SET: &str = r"
INSERT INTO pulse_kv (key, value, expires_at) VALUES ($1, $2, $3)
ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, expires_at = EXCLUDED.expires_at
";

// Members other than the one being added keep their own expiry once lapsed,
// so an expired set is never revived by a later add.
const SADD: &str = r"
WITH prior AS (
    SELECT 1 FROM pulse_set_members
    WHERE key = $1 AND member = $2 AND expires_at > $3
), upserted AS (
    INSERT INTO pulse_set_members (key, member, expires_at) VALUES ($1, $2, $4)
    ON CONFLICT (key, member) DO UPDATE SET expires_at = EXCLUDED.expires_at
    RETURNING 1
), refreshed AS (
    UPDATE pulse_set_members SET expires_at = $4
    WHERE key = $1 AND member <> $2 AND expires_at > $3
    RETURNING 1
)
SELECT NOT EXISTS (SELECT 1 FROM prior)
";

const ZADD: &str = r"
WITH prior AS (
    SELECT 1 FROM pulse_sorted_members
    WHERE key = $1 AND member = $2 AND expires_at > $4
), upserted AS (
    INSERT INTO pulse_sorted_members (key, member, score, expires_at) VALUES ($1, $2, $3, $5)
    ON CONFLICT (key, member) DO UPDATE SET score = EXCLUDED.score, expires_at = EXCLUDED.expires_at
    RETURNING 1
), refreshed AS (
    UPDATE pulse_sorted_members SET expires_at = $5
    WHERE key = $1 AND member <> $2 AND expires_at > $4
    RETURNING 1
)
SELECT NOT EXISTS (SELECT 1 FROM prior)
";

const MGET: &str =
    "SELECT key, value FROM pulse_kv WHERE key = ANY($1) AND expires_at > $2";

const SMEMBERS: &str =
    "SELECT member FROM pulse_set_members WHERE key = $1 AND expires_at > $2";

const ZRANGE: &str = r"
SELECT member, score FROM pulse_sorted_members
WHERE key = $1 AND score >= $2 AND score <= $3 AND expires_at > $4
ORDER BY score, member
";

const TTL: &str = r"
SELECT MAX(expires_at) FROM (
    SELECT expires_at FROM pulse_kv WHERE key = $1
    UNION ALL
    SELECT expires_at FROM pulse_set_members WHERE key = $1
    UNION ALL
    SELECT expires_at FROM pulse_sorted_members WHERE key = $1
) AS candidates
";

const PURGE: [&str; 3] = [
    "DELETE FROM pulse_kv WHERE expires_at <= $1",
    "DELETE FROM pulse_set_members WHERE expires_at <= $1",
    "DELETE FROM pulse_sorted_members WHERE expires_at <= $1",
];

pub struct LumaDbStore {
    pool: StorePool,
    clock: Arc<dyn Clock>,
}

impl LumaDbStore {
    pub fn new(pool: StorePool) -> Self {
        Self::with_clock(pool, Arc::new(SystemClock))
    }

    pub fn with_clock(pool: StorePool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }

    pub fn connect(config: &PoolConfig) -> Result<Self> {
        Ok(Self::new(StorePool::new(config)?))
    }

    /// Create the backing tables if they do not exist yet.
    pub async fn ensure_schema(&self) -> Result<()> {
        let conn = self.pool.get().await?;
        conn.batch_execute(SCHEMA).await?;
        info!("LumaDB counting store schema ready");
        Ok(())
    }

    fn expiry(&self, now: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
        chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| now.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    async fn apply_on(&self, client: &Client, op: &BatchOp, now: DateTime<Utc>) -> Result<BatchReply> {
        match op {
            BatchOp::IncrWithExpiry { key, ttl } => incr(client, key, now, self.expiry(now, *ttl))
                .await
                .map(BatchReply::Integer),
            BatchOp::SAddWithExpiry { key, member, ttl } => {
                sadd(client, key, member, now, self.expiry(now, *ttl))
                    .await
                    .map(BatchReply::Added)
            }
            BatchOp::ZAddWithExpiry {
                key,
                score,
                member,
                ttl,
            } => zadd(client, key, *score, member, now, self.expiry(now, *ttl))
                .await
                .map(BatchReply::Added),
        }
    }
}

async fn incr(client: &Client, key: &str, now: DateTime<Utc>, expires_at: DateTime<Utc>) -> Result<i64> {
    let row = client.query_one(INCR, &[&key, &now, &expires_at]).await?;
    Ok(row.get(0))
}

async fn sadd(
    client: &Client,
    key: &str,
    member: &str,
    now: DateTime<Utc>,
    expires_at: DateTime<Utc>,
) -> Result<bool> {
    let row = client
        .query_one(SADD, &[&key, &member, &now, &expires_at])
        .await?;
    Ok(row.get(0))
}

async fn zadd(
    client: &Client,
    key: &str,
    score: f64,
    member: &str,
    now: DateTime<Utc>,
    expires_at: DateTime<Utc>,
) -> Result<bool> {
    let row = client
        .query_one(ZADD, &[&key, &member, &score, &now, &expires_at])
        .await?;
    Ok(row.get(0))
}

async fn set(client: &Client, key: &str, value: &str, expires_at: DateTime<Utc>) -> Result<()> {
    client.execute(SET, &[&key, &value, &expires_at]).await?;
    Ok(())
}

#[async_trait]
impl CountingStore for LumaDbStore {
    #[instrument(skip(self))]
    async fn incr_with_expiry(&self, key: &str, ttl: Duration) -> Result<i64> {
        let conn = self.pool.get().await?;
        let now = self.clock.now();
        incr(&conn, key, now, self.expiry(now, ttl)).await
    }

    #[instrument(skip(self))]
    async fn sadd_with_expiry(&self, key: &str, member: &str, ttl: Duration) -> Result<bool> {
        let conn = self.pool.get().await?;
        let now = self.clock.now();
        sadd(&conn, key, member, now, self.expiry(now, ttl)).await
    }

    #[instrument(skip(self))]
    async fn zadd_with_expiry(
        &self,
        key: &str,
        score: f64,
        member: &str,
        ttl: Duration,
    ) -> Result<bool> {
        let conn = self.pool.get().await?;
        let now = self.clock.now();
        zadd(&conn, key, score, member, now, self.expiry(now, ttl)).await
    }

    #[instrument(skip(self, value))]
    async fn set_with_expiry(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let conn = self.pool.get().await?;
        let now = self.clock.now();
        set(&conn, key, value, self.expiry(now, ttl)).await
    }

    #[instrument(skip(self, keys), fields(keys = keys.len()))]
    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<String>>> {
        let conn = self.pool.get().await?;
        let now = self.clock.now();
        let rows = conn.query(MGET, &[&keys, &now]).await?;

        let mut found: HashMap<String, String> = rows
            .into_iter()
            .map(|row| (row.get::<_, String>(0), row.get::<_, String>(1)))
            .collect();
        Ok(keys.iter().map(|key| found.remove(key)).collect())
    }

    #[instrument(skip(self))]
    async fn smembers(&self, key: &str) -> Result<BTreeSet<String>> {
        let conn = self.pool.get().await?;
        let now = self.clock.now();
        let rows = conn.query(SMEMBERS, &[&key, &now]).await?;
        Ok(rows.into_iter().map(|row| row.get::<_, String>(0)).collect())
    }

    async fn zrange_by_score(&self, key: &str, min: f64, max: f64) -> Result<Vec<(String, f64)>> {
        let conn = self.pool.get().await?;
        let now = self.clock.now();
        let rows = conn.query(ZRANGE, &[&key, &min, &max, &now]).await?;
        Ok(rows
            .into_iter()
            .map(|row| (row.get::<_, String>(0), row.get::<_, f64>(1)))
            .collect())
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>> {
        let conn = self.pool.get().await?;
        let now = self.clock.now();
        let row = conn.query_one(TTL, &[&key]).await?;
        let expires_at: Option<DateTime<Utc>> = row.get(0);
        Ok(expires_at
            .filter(|at| *at > now)
            .and_then(|at| (at - now).to_std().ok()))
    }

    async fn purge_expired(&self) -> Result<u64> {
        let conn = self.pool.get().await?;
        let now = self.clock.now();
        let mut removed = 0;
        for statement in PURGE {
            removed += conn.execute(statement, &[&now]).await?;
        }
        debug!(removed, "Purged expired keys");
        Ok(removed)
    }

    async fn is_healthy(&self) -> bool {
        self.pool.is_healthy().await
    }

    /// Pipelines the whole batch on one pooled connection, so every
    /// statement is in flight before the first reply arrives. Statements
    /// are sent in batch order. A failure can leave any subset of the
    /// others applied.
    #[instrument(skip(self, batch), fields(ops = batch.len()))]
    async fn execute_batch(&self, batch: Batch) -> Result<Vec<BatchReply>> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.pool.get().await?;
        let client: &Client = &conn;
        let now = self.clock.now();
        let ops = batch.into_ops();

        let result = try_join_all(ops.iter().map(|op| self.apply_on(client, op, now))).await;
        if let Err(e) = &result {
            let keys: Vec<&str> = ops.iter().map(BatchOp::key).collect();
            warn!(?keys, error = %e, "Pipelined batch failed");
        }
        result
    }
}
