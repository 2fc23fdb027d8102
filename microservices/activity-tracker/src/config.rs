//! Configuration for the Activity Tracker microservice

use pulse_core::{PulseError, Result};
use pulse_store::PoolConfig;
use std::time::Duration;

pub const FALLBACK_WINDOW_HOURS: i64 = 1;
pub const FALLBACK_THRESHOLD: i64 = 10;
pub const FALLBACK_COUNTERS_TTL_HOURS: i64 = 48;
pub const FALLBACK_REQUEST_TIMEOUT_MS: u64 = 3000;

/// Windows up to one leap year of buckets are always accepted; longer ones
/// only when counters are retained that long.
pub const WINDOW_LIMIT_FLOOR_HOURS: i64 = 8784;

/// Tracker defaults. Non-positive values fall back rather than fail.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerConfig {
    /// Window used when a query passes a non-positive `hours`
    pub default_status_window_hours: i64,
    /// Threshold used when a query passes a non-positive `threshold`
    pub default_threshold: i64,
    /// TTL applied to buckets, type sets and recency indexes on every write
    pub counters_ttl_hours: i64,
    /// Deadline for one tracker call, store round trips included
    pub request_timeout: Duration,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            default_status_window_hours: FALLBACK_WINDOW_HOURS,
            default_threshold: FALLBACK_THRESHOLD,
            counters_ttl_hours: FALLBACK_COUNTERS_TTL_HOURS,
            request_timeout: Duration::from_millis(FALLBACK_REQUEST_TIMEOUT_MS),
        }
    }
}

impl TrackerConfig {
    /// Replace every non-positive field with its fallback.
    pub fn normalized(self) -> Self {
        Self {
            default_status_window_hours: positive_or(
                self.default_status_window_hours,
                FALLBACK_WINDOW_HOURS,
            ),
            default_threshold: positive_or(self.default_threshold, FALLBACK_THRESHOLD),
            counters_ttl_hours: positive_or(self.counters_ttl_hours, FALLBACK_COUNTERS_TTL_HOURS),
            request_timeout: if self.request_timeout.is_zero() {
                Duration::from_millis(FALLBACK_REQUEST_TIMEOUT_MS)
            } else {
                self.request_timeout
            },
        }
    }

    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Unparseable values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let int = |name: &str, fallback: i64| {
            lookup(name)
                .and_then(|raw| raw.trim().parse::<i64>().ok())
                .unwrap_or(fallback)
        };

        Self {
            default_status_window_hours: int("WINDOW_HOURS", FALLBACK_WINDOW_HOURS),
            default_threshold: int("THRESHOLD", FALLBACK_THRESHOLD),
            counters_ttl_hours: int("COUNT_TTL_HOURS", FALLBACK_COUNTERS_TTL_HOURS),
            request_timeout: Duration::from_millis(
                int("REQUEST_TIMEOUT_MS", FALLBACK_REQUEST_TIMEOUT_MS as i64).max(0) as u64,
            ),
        }
        .normalized()
    }

    pub fn effective_window(&self, hours: i64) -> i64 {
        positive_or(hours, self.default_status_window_hours)
    }

    pub fn effective_threshold(&self, threshold: i64) -> i64 {
        positive_or(threshold, self.default_threshold)
    }

    /// Longest window a single query may ask for.
    pub fn max_window_hours(&self) -> i64 {
        self.counters_ttl_hours.max(WINDOW_LIMIT_FLOOR_HOURS)
    }

    pub fn counters_ttl(&self) -> Duration {
        hours_to_duration(self.counters_ttl_hours)
    }
}

fn positive_or(value: i64, fallback: i64) -> i64 {
    if value > 0 {
        value
    } else {
        fallback
    }
}

pub(crate) fn hours_to_duration(hours: i64) -> Duration {
    Duration::from_secs(u64::try_from(hours).unwrap_or(0).saturating_mul(3600))
}

/// Which counting store backs the tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    LumaDb,
}

impl StoreBackend {
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_lowercase().as_str() {
            "memory" | "" => Ok(Self::Memory),
            "lumadb" | "postgres" => Ok(Self::LumaDb),
            other => Err(PulseError::Config(format!(
                "Invalid STORE_BACKEND: {} (expected memory or lumadb)",
                other
            ))),
        }
    }
}

/// Store selection and maintenance settings
#[derive(Debug, Clone)]
pub struct StoreSettings {
    pub backend: StoreBackend,
    pub pool: PoolConfig,
    pub purge_interval: Duration,
}

impl StoreSettings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let backend = match lookup("STORE_BACKEND") {
            Some(raw) => StoreBackend::parse(&raw)?,
            None => StoreBackend::Memory,
        };
        let purge_secs = lookup("PURGE_INTERVAL_SECS")
            .and_then(|raw| raw.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .unwrap_or(60);

        Ok(Self {
            backend,
            pool: PoolConfig::from_lookup(&lookup),
            purge_interval: Duration::from_secs(purge_secs),
        })
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
    fn test_non_positive_values_fall_back() {
        let config = TrackerConfig {
            default_status_window_hours: 0,
            default_threshold: -3,
            counters_ttl_hours: 0,
            request_timeout: Duration::ZERO,
        }
        .normalized();
        assert_eq!(config, TrackerConfig::default());
    }

    #[test]
    fn test_from_lookup_reads_knobs() {
        let config = TrackerConfig::from_lookup(lookup_from(&[
            ("WINDOW_HOURS", "6"),
            ("THRESHOLD", "25"),
            ("COUNT_TTL_HOURS", "72"),
            ("REQUEST_TIMEOUT_MS", "500"),
        ]));
        assert_eq!(config.default_status_window_hours, 6);
        assert_eq!(config.default_threshold, 25);
        assert_eq!(config.counters_ttl(), Duration::from_secs(72 * 3600));
        assert_eq!(config.request_timeout, Duration::from_millis(500));
    }

    #[test]
    fn test_unparseable_and_negative_env_use_fallbacks() {
        let config = TrackerConfig::from_lookup(lookup_from(&[
            ("WINDOW_HOURS", "abc"),
            ("THRESHOLD", "-1"),
            ("REQUEST_TIMEOUT_MS", "-20"),
        ]));
        assert_eq!(config, TrackerConfig::default());
    }

    #[test]
    fn test_effective_window_and_threshold() {
        let config = TrackerConfig {
            default_status_window_hours: 3,
            default_threshold: 7,
            ..TrackerConfig::default()
        };
        assert_eq!(config.effective_window(0), 3);
        assert_eq!(config.effective_window(-5), 3);
        assert_eq!(config.effective_window(12), 12);
        assert_eq!(config.effective_threshold(0), 7);
        assert_eq!(config.effective_threshold(1), 1);
    }

    #[test]
    fn test_window_limit_follows_retention() {
        assert_eq!(TrackerConfig::default().max_window_hours(), WINDOW_LIMIT_FLOOR_HOURS);
        let long = TrackerConfig {
            counters_ttl_hours: 20_000,
            ..TrackerConfig::default()
        };
        assert_eq!(long.max_window_hours(), 20_000);
    }

    #[test]
    fn test_store_settings() {
        let settings = StoreSettings::from_lookup(lookup_from(&[
            ("STORE_BACKEND", "LumaDB"),
            ("LUMADB_URL", "postgres://u@db:5432/pulse"),
            ("PURGE_INTERVAL_SECS", "0"),
        ]))
        .unwrap();
        assert_eq!(settings.backend, StoreBackend::LumaDb);
        assert_eq!(settings.pool.url, "postgres://u@db:5432/pulse");
        assert_eq!(settings.purge_interval, Duration::from_secs(60));

        let defaults = StoreSettings::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(defaults.backend, StoreBackend::Memory);

        assert!(matches!(
            StoreSettings::from_lookup(lookup_from(&[("STORE_BACKEND", "redis")])),
            Err(PulseError::Config(_))
        ));
    }
}
