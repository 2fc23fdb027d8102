//! Configuration management for microservices

use crate::error::{PulseError, Result};
use serde::Deserialize;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub http_bind: String,
    pub shutdown_grace_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            http_bind: "0.0.0.0:8080".to_string(),
            shutdown_grace_secs: 10,
        }
    }
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from an arbitrary variable source; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Ok(Self {
            http_bind: lookup("HTTP_BIND").unwrap_or(defaults.http_bind),
            shutdown_grace_secs: match lookup("SHUTDOWN_GRACE_SECS") {
                Some(raw) => raw
                    .parse()
                    .map_err(|e| PulseError::Config(format!("Invalid SHUTDOWN_GRACE_SECS: {}", e)))?,
                None => defaults.shutdown_grace_secs,
            },
        })
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = ServiceConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.http_bind, "0.0.0.0:8080");
        assert_eq!(config.shutdown_grace(), Duration::from_secs(10));
    }

    #[test]
    fn test_overrides() {
        let config = ServiceConfig::from_lookup(lookup_from(&[
            ("HTTP_BIND", "127.0.0.1:9000"),
            ("SHUTDOWN_GRACE_SECS", "3"),
        ]))
        .unwrap();
        assert_eq!(config.http_bind, "127.0.0.1:9000");
        assert_eq!(config.shutdown_grace_secs, 3);
    }

    #[test]
    fn test_invalid_grace_is_config_error() {
        let err = ServiceConfig::from_lookup(lookup_from(&[("SHUTDOWN_GRACE_SECS", "soon")]))
            .unwrap_err();
        assert!(matches!(err, PulseError::Config(_)));
    }
}
