//! REST API handlers for the Activity Tracker

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use pulse_core::{HealthStatus, ReadinessStatus};
use serde::{Deserialize, Serialize};
use serde_json::error::Category;

use super::AppState;
use crate::error::TrackerError;
use crate::metrics::MetricsSnapshot;
use crate::types::{Action, ActivityStatus};

#[derive(Debug, Serialize, Deserialize)]
pub struct RecordResponse {
    pub ok: bool,
}

#[derive(Debug, Deserialize)]
pub struct CountQuery {
    #[serde(rename = "userID", default)]
    pub user_id: String,
    #[serde(rename = "actionType", default)]
    pub action_type: String,
    pub hours: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CountResponse {
    #[serde(rename = "userID")]
    pub user_id: String,
    #[serde(rename = "actionType")]
    pub action_type: String,
    pub hours: i64,
    pub count: i64,
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    #[serde(rename = "userID", default)]
    pub user_id: String,
    pub hours: Option<String>,
    pub threshold: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    #[serde(rename = "userID")]
    pub user_id: String,
    pub hours: i64,
    pub threshold: i64,
    pub total: i64,
    pub status: ActivityStatus,
}

// Health
pub async fn healthz() -> &'static str {
    "ok"
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthStatus> {
    Json(state.health())
}

pub async fn ready_check(State(state): State<AppState>) -> Response {
    let readiness: ReadinessStatus = state.readiness().await;
    let status = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(readiness)).into_response()
}

// Counters
pub async fn record_action(State(AppState { tracker, .. }): State<AppState>, body: Bytes) -> Response {
    let action: Action = match serde_json::from_slice(&body) {
        Ok(action) => action,
        Err(e) => {
            tracker.metrics().invalid_requests.inc();
            return TrackerError::invalid(decode_failure(&body, &e)).into_response();
        }
    };

    match tracker.record_action(&action).await {
        Ok(()) => (StatusCode::CREATED, Json(RecordResponse { ok: true })).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn count_action(
    State(AppState { tracker, .. }): State<AppState>,
    Query(query): Query<CountQuery>,
) -> Result<Json<CountResponse>, TrackerError> {
    let config = tracker.config();
    let hours = config.effective_window(parse_int_or(
        query.hours.as_deref(),
        config.default_status_window_hours,
    ));

    let count = tracker
        .count_action(&query.user_id, &query.action_type, hours)
        .await?;

    Ok(Json(CountResponse {
        user_id: query.user_id,
        action_type: query.action_type,
        hours,
        count,
    }))
}

pub async fn user_status(
    State(AppState { tracker, .. }): State<AppState>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<StatusResponse>, TrackerError> {
    let config = tracker.config();
    let hours = config.effective_window(parse_int_or(
        query.hours.as_deref(),
        config.default_status_window_hours,
    ));
    let threshold = config.effective_threshold(parse_int_or(
        query.threshold.as_deref(),
        config.default_threshold,
    ));

    let report = tracker.user_status(&query.user_id, hours, threshold).await?;

    Ok(Json(StatusResponse {
        user_id: query.user_id,
        hours,
        threshold,
        total: report.total,
        status: report.status,
    }))
}

pub async fn metrics(State(AppState { tracker, .. }): State<AppState>) -> Json<MetricsSnapshot> {
    Json(tracker.metrics().snapshot())
}

/// A truncated or broken document is "malformed"; an empty body or a
/// well-formed document of the wrong shape is "invalid".
fn decode_failure(body: &[u8], err: &serde_json::Error) -> &'static str {
    if body.iter().all(u8::is_ascii_whitespace) {
        return "invalid json";
    }
    match err.classify() {
        Category::Syntax | Category::Eof => "malformed json",
        Category::Data | Category::Io => "invalid json",
    }
}

/// Absent or unparseable query values take the default.
fn parse_int_or(raw: Option<&str>, default: i64) -> i64 {
    raw.and_then(|s| s.trim().parse().ok()).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_failure_classification() {
        let classify = |raw: &str| {
            let err = serde_json::from_str::<Action>(raw).unwrap_err();
            decode_failure(raw.as_bytes(), &err)
        };
        assert_eq!(classify(""), "invalid json");
        assert_eq!(classify("  \n"), "invalid json");
        assert_eq!(classify("{\"userID\":"), "malformed json");
        assert_eq!(classify("nope"), "malformed json");
        assert_eq!(classify("{\"userID\":1}"), "invalid json");
    }

    #[test]
    fn test_parse_int_or() {
        assert_eq!(parse_int_or(None, 3), 3);
        assert_eq!(parse_int_or(Some(""), 3), 3);
        assert_eq!(parse_int_or(Some("abc"), 3), 3);
        assert_eq!(parse_int_or(Some("12"), 3), 12);
        assert_eq!(parse_int_or(Some("-4"), 3), -4);
    }
}
