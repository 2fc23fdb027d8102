//! Tracker metrics

use pulse_telemetry::{Counter, Gauge, Histogram};
use serde::Serialize;

#[derive(Clone, Default)]
pub struct TrackerMetrics {
    pub actions_recorded: Counter,
    pub counts_served: Counter,
    pub status_evaluations: Counter,
    pub invalid_requests: Counter,
    pub store_failures: Counter,
    pub deadline_exceeded: Counter,
    pub status_persist_failures: Counter,
    pub in_flight: Gauge,
    pub latency_ms: Histogram,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub actions_recorded: u64,
    pub counts_served: u64,
    pub status_evaluations: u64,
    pub invalid_requests: u64,
    pub store_failures: u64,
    pub deadline_exceeded: u64,
    pub status_persist_failures: u64,
    pub in_flight: u64,
    pub latency_mean_ms: f64,
    pub latency_p50_ms: f64,
    pub latency_p99_ms: f64,
}

impl TrackerMetrics {
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            actions_recorded: self.actions_recorded.get(),
            counts_served: self.counts_served.get(),
            status_evaluations: self.status_evaluations.get(),
            invalid_requests: self.invalid_requests.get(),
            store_failures: self.store_failures.get(),
            deadline_exceeded: self.deadline_exceeded.get(),
            status_persist_failures: self.status_persist_failures.get(),
            in_flight: self.in_flight.get(),
            latency_mean_ms: self.latency_ms.mean(),
            latency_p50_ms: self.latency_ms.percentile(50.0),
            latency_p99_ms: self.latency_ms.percentile(99.0),
        }
    }
}
