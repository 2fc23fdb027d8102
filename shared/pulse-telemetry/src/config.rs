//! Telemetry Configuration

/// Telemetry configuration
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub service_name: String,
    pub log_level: String,
    pub json_logs: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "pulse-service".to_string(),
            log_level: "info".to_string(),
            json_logs: true,
        }
    }
}

impl TelemetryConfig {
    pub fn from_env(default_service_name: &str) -> Self {
        Self::from_lookup(default_service_name, |name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(default_service_name: &str, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            service_name: lookup("SERVICE_NAME").unwrap_or_else(|| default_service_name.to_string()),
            log_level: lookup("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            json_logs: lookup("JSON_LOGS")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(true),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_logs_flag() {
        let plain = TelemetryConfig::from_lookup("activity-tracker", |name| match name {
            "JSON_LOGS" => Some("false".to_string()),
            _ => None,
        });
        assert!(!plain.json_logs);
        assert_eq!(plain.service_name, "activity-tracker");

        let json = TelemetryConfig::from_lookup("activity-tracker", |_| None);
        assert!(json.json_logs);
        assert_eq!(json.log_level, "info");
    }
}
