//! Activity Tracker
//!
//! Counts user actions in hourly buckets and derives a rolling
//! active/inactive status from recent volume:
//! - Hour-bucketed counters with TTL-based retention
//! - Windowed counts summed across trailing buckets
//! - Threshold status over every action type a user has triggered
//! - REST adapter and microservice bootstrap

pub mod api;
pub mod config;
pub mod error;
pub mod keys;
pub mod metrics;
pub mod service;
pub mod tracker;
pub mod types;


pub use config::{StoreBackend, StoreSettings, TrackerConfig};
pub use error::{Result, TrackerError};
pub use service::ActivityTrackerService;
pub use tracker::ActivityTracker;
pub use types::{Action, ActivityStatus, StatusReport};
