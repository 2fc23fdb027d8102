//! Activity Tracker
//!
//! Records actions into hour buckets and answers windowed counts and
//! active/inactive status. All mutation is delegated to store-side atomic
//! operations; nothing here takes a lock.

use chrono::{DateTime, Utc};
use futures_util::future::try_join_all;
use pulse_core::{Clock, SystemClock};
use pulse_store::{Batch, CountingStore};
use std::future::Future;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

use crate::config::{hours_to_duration, TrackerConfig};
use crate::error::{Result, TrackerError};
use crate::keys;
use crate::metrics::TrackerMetrics;
use crate::types::{Action, ActivityStatus, StatusReport};

pub struct ActivityTracker {
    store: Arc<dyn CountingStore>,
    clock: Arc<dyn Clock>,
    config: TrackerConfig,
    metrics: TrackerMetrics,
}

impl ActivityTracker {
    pub fn new(store: Arc<dyn CountingStore>, config: TrackerConfig) -> Self {
        Self::with_clock(store, config, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<dyn CountingStore>, config: TrackerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            config: config.normalized(),
            metrics: TrackerMetrics::default(),
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn metrics(&self) -> &TrackerMetrics {
        &self.metrics
    }

    pub fn store(&self) -> Arc<dyn CountingStore> {
        self.store.clone()
    }

    fn default_deadline(&self) -> Instant {
        Instant::now() + self.config.request_timeout
    }

    /// Record one action with the configured request timeout.
    pub async fn record_action(&self, action: &Action) -> Result<()> {
        self.record_action_until(action, self.default_deadline()).await
    }

    /// Count `action_type` over the trailing `hours` buckets with the
    /// configured request timeout.
    pub async fn count_action(&self, user_id: &str, action_type: &str, hours: i64) -> Result<i64> {
        self.count_action_until(user_id, action_type, hours, self.default_deadline())
            .await
    }

    /// Evaluate a user's status with the configured request timeout.
    pub async fn user_status(&self, user_id: &str, hours: i64, threshold: i64) -> Result<StatusReport> {
        self.user_status_until(user_id, hours, threshold, self.default_deadline())
            .await
    }

    /// Increment the hour bucket, extend the type set and recency index.
    ///
    /// The three writes travel in one batch. A failure part way through is
    /// reported as `StoreUnavailable` and not retried here; a caller retrying
    /// the same action will count it twice.
    #[instrument(
        skip(self, action, deadline),
        fields(user_id = %action.user_id, action_type = %action.action_type)
    )]
    pub async fn record_action_until(&self, action: &Action, deadline: Instant) -> Result<()> {
        self.observe(async {
            require("userID", &action.user_id)?;
            require("actionType", &action.action_type)?;
            let at = self.effective_time(action.timestamp)?;

            let ttl = self.config.counters_ttl();
            let unix = at.timestamp();
            let mut batch = Batch::new();
            batch
                .incr_with_expiry(keys::bucket_key(&action.user_id, &action.action_type, at), ttl)
                .sadd_with_expiry(keys::types_key(&action.user_id), action.action_type.as_str(), ttl)
                .zadd_with_expiry(
                    keys::recency_key(&action.user_id, &action.action_type),
                    unix as f64,
                    unix.to_string(),
                    ttl,
                );

            self.within(deadline, self.store.execute_batch(batch)).await?;
            self.metrics.actions_recorded.inc();
            debug!(at = %at, "Action recorded");
            Ok(())
        })
        .await
    }

    #[instrument(skip(self, deadline))]
    pub async fn count_action_until(
        &self,
        user_id: &str,
        action_type: &str,
        hours: i64,
        deadline: Instant,
    ) -> Result<i64> {
        self.observe(async {
            require("userID", user_id)?;
            require("actionType", action_type)?;
            let hours = self.window(hours)?;

            let now = self.clock.now();
            let total = self
                .within(deadline, self.sum_window(user_id, action_type, hours, now))
                .await?;
            self.metrics.counts_served.inc();
            debug!(hours, total, "Action counted");
            Ok(total)
        })
        .await
    }

    /// Sum every known action type over the window and compare against the
    /// threshold. The label is cached under the status key on a best-effort
    /// basis; failing to write it does not fail the call.
    #[instrument(skip(self, deadline))]
    pub async fn user_status_until(
        &self,
        user_id: &str,
        hours: i64,
        threshold: i64,
        deadline: Instant,
    ) -> Result<StatusReport> {
        self.observe(async {
            require("userID", user_id)?;
            let hours = self.window(hours)?;
            let threshold = self.config.effective_threshold(threshold);

            let now = self.clock.now();
            let total = self
                .within(deadline, self.sum_all_types(user_id, hours, now))
                .await?;
            let status = ActivityStatus::from_total(total, threshold);
            self.metrics.status_evaluations.inc();

            self.persist_status(user_id, status, hours, deadline).await;
            debug!(hours, threshold, total, status = %status, "Status evaluated");
            Ok(StatusReport { status, total })
        })
        .await
    }

    async fn persist_status(&self, user_id: &str, status: ActivityStatus, hours: i64, deadline: Instant) {
        let key = keys::status_key(user_id);
        let write = self
            .store
            .set_with_expiry(&key, status.as_str(), hours_to_duration(hours));
        let failure = match tokio::time::timeout_at(deadline, write).await {
            Ok(Ok(())) => return,
            Ok(Err(e)) => e.to_string(),
            Err(_) => "deadline exceeded".to_string(),
        };
        self.metrics.status_persist_failures.inc();
        warn!(user_id, error = %failure, "Failed to persist status record");
    }

    async fn sum_window(
        &self,
        user_id: &str,
        action_type: &str,
        hours: i64,
        now: DateTime<Utc>,
    ) -> pulse_store::Result<i64> {
        let keys = keys::window_keys(user_id, action_type, now, hours);
        let values = self.store.mget(&keys).await?;
        Ok(sum_counts(&values))
    }

    async fn sum_all_types(&self, user_id: &str, hours: i64, now: DateTime<Utc>) -> pulse_store::Result<i64> {
        let types = self.store.smembers(&keys::types_key(user_id)).await?;
        let counts = try_join_all(
            types
                .iter()
                .map(|action_type| self.sum_window(user_id, action_type, hours, now)),
        )
        .await?;
        Ok(counts.into_iter().fold(0, i64::saturating_add))
    }

    fn effective_time(&self, timestamp: Option<i64>) -> Result<DateTime<Utc>> {
        match timestamp {
            Some(secs) if secs > keys::LAST_BUCKET_SECS => Err(TrackerError::invalid(format!(
                "timestamp {} out of range",
                secs
            ))),
            Some(secs) if secs > 0 => DateTime::from_timestamp(secs, 0)
                .ok_or_else(|| TrackerError::invalid(format!("timestamp {} out of range", secs))),
            _ => Ok(self.clock.now()),
        }
    }

    fn window(&self, hours: i64) -> Result<i64> {
        let hours = self.config.effective_window(hours);
        let limit = self.config.max_window_hours();
        if hours > limit {
            return Err(TrackerError::invalid(format!(
                "hours {} exceeds maximum window of {}",
                hours, limit
            )));
        }
        Ok(hours)
    }

    async fn within<T, F>(&self, deadline: Instant, fut: F) -> Result<T>
    where
        F: Future<Output = pulse_store::Result<T>>,
    {
        match tokio::time::timeout_at(deadline, fut).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(TrackerError::DeadlineExceeded),
        }
    }

    async fn observe<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let started = std::time::Instant::now();
        let _in_flight = InFlight::enter(&self.metrics);
        let result = fut.await;
        self.metrics
            .latency_ms
            .record(started.elapsed().as_secs_f64() * 1000.0);

        if let Err(e) = &result {
            match e {
                TrackerError::InvalidInput(_) => self.metrics.invalid_requests.inc(),
                TrackerError::StoreUnavailable(_) => self.metrics.store_failures.inc(),
                TrackerError::DeadlineExceeded => self.metrics.deadline_exceeded.inc(),
            }
        }
        result
    }
}

/// Missing buckets and values that do not parse as integers add nothing.
fn sum_counts(values: &[Option<String>]) -> i64 {
    values
        .iter()
        .flatten()
        .filter_map(|raw| raw.parse::<i64>().ok())
        .fold(0, i64::saturating_add)
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(TrackerError::invalid(format!("missing {}", field)));
    }
    Ok(())
}

struct InFlight<'a>(&'a TrackerMetrics);

impl<'a> InFlight<'a> {
    fn enter(metrics: &'a TrackerMetrics) -> Self {
        metrics.in_flight.inc();
        Self(metrics)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.in_flight.dec();
    }
}
