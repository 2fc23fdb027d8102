//! Pulse Core - Shared service infrastructure
//!
//! This crate provides:
//! - Standard service trait all microservices implement
//! - Injectable clock used wherever "now" matters
//! - Error handling utilities
//! - Configuration management

pub mod clock;
pub mod config;
pub mod error;
pub mod service;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::ServiceConfig;
pub use error::{PulseError, Result};
pub use service::{DependencyStatus, HealthStatus, MicroserviceRuntime, PulseService, ReadinessStatus};
