//! API module

pub mod rest;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use pulse_core::{DependencyStatus, HealthStatus, ReadinessStatus};
use std::sync::Arc;
use std::time::Instant;

use crate::tracker::ActivityTracker;

/// Largest accepted `POST /action` body.
pub const MAX_BODY_BYTES: usize = 1 << 20;

pub const SERVICE_ID: &str = "activity-tracker";

/// Shared by every handler and by the service's own probes.
#[derive(Clone)]
pub struct AppState {
    pub tracker: Arc<ActivityTracker>,
    pub started: Instant,
}

impl AppState {
    pub fn new(tracker: Arc<ActivityTracker>) -> Self {
        Self {
            tracker,
            started: Instant::now(),
        }
    }

    pub fn health(&self) -> HealthStatus {
        HealthStatus {
            healthy: true,
            service_id: SERVICE_ID.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: self.started.elapsed().as_secs(),
        }
    }

    /// Probe the counting store and time the round trip.
    pub async fn readiness(&self) -> ReadinessStatus {
        let started_at = Instant::now();
        let available = self.tracker.store().is_healthy().await;
        let latency_ms = started_at.elapsed().as_millis() as u64;

        ReadinessStatus {
            ready: available,
            dependencies: vec![DependencyStatus {
                name: "counting-store".to_string(),
                available,
                latency_ms: Some(latency_ms),
            }],
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health endpoints
        .route("/healthz", get(rest::healthz))
        .route("/health", get(rest::health_check))
        .route("/ready", get(rest::ready_check))

        // Counters
        .route("/action", post(rest::record_action))
        .route("/action/count", get(rest::count_action))
        .route("/user/status", get(rest::user_status))

        .route("/metrics", get(rest::metrics))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}
