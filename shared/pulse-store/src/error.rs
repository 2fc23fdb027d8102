//! Counting store error types

use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Query error: {0}")]
    Query(#[from] tokio_postgres::Error),

    #[error("Pool error: {0}")]
    Pool(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("WRONGTYPE operation against key {key} holding the wrong kind of value")]
    WrongType { key: String },

    #[error("value at {key} is not an integer or out of range")]
    NotAnInteger { key: String },

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl From<deadpool_postgres::PoolError> for StoreError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

impl From<StoreError> for pulse_core::PulseError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Configuration(msg) => pulse_core::PulseError::Config(msg),
            other => pulse_core::PulseError::Storage(other.to_string()),
        }
    }
}
