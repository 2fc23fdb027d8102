//! Activity Tracker Microservice
//!
//! Per-user action counters in hourly buckets with a rolling
//! active/inactive status, served over HTTP.

use activity_tracker::ActivityTrackerService;
use pulse_core::{MicroserviceRuntime, PulseError, Result};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    pulse_telemetry::init("activity-tracker").map_err(|e| PulseError::Internal(e.to_string()))?;

    info!("Starting Activity Tracker microservice");

    let service = Arc::new(ActivityTrackerService::from_env().await?);
    MicroserviceRuntime::with_config(service.service_config().clone())
        .run_service(service)
        .await
}
