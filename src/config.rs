use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;

// ============================================================================
// Application Configuration
// ============================================================================
//
// Read from environment variables; anything unset falls back to a default.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub metrics_port: u16,
    pub redpanda_brokers: String,
    /// `None` = reservations never expire
    pub reservation_ttl: Option<Duration>,
    pub expiry_sweep_interval: Duration,
    pub health_check_interval: Duration,
    pub publish_max_attempts: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            metrics_port: 9090,
            redpanda_brokers: "127.0.0.1:9092".to_string(),
            reservation_ttl: None,
            expiry_sweep_interval: Duration::from_secs(30),
            health_check_interval: Duration::from_secs(10),
            publish_max_attempts: 5,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let defaults = Self::default();

        let config = Self {
            metrics_port: parse(&lookup, "METRICS_PORT")?.unwrap_or(defaults.metrics_port),
            redpanda_brokers: lookup("REDPANDA_BROKERS").unwrap_or(defaults.redpanda_brokers),
            reservation_ttl: parse(&lookup, "RESERVATION_TTL_SECS")?.map(Duration::from_secs),
            expiry_sweep_interval: parse(&lookup, "EXPIRY_SWEEP_INTERVAL_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.expiry_sweep_interval),
            health_check_interval: parse(&lookup, "HEALTH_CHECK_INTERVAL_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.health_check_interval),
            publish_max_attempts: parse(&lookup, "PUBLISH_MAX_ATTEMPTS")?
                .unwrap_or(defaults.publish_max_attempts),
        };

        if config.publish_max_attempts == 0 {
            anyhow::bail!("PUBLISH_MAX_ATTEMPTS must be at least 1");
        }
        if config.expiry_sweep_interval.is_zero() || config.health_check_interval.is_zero() {
            anyhow::bail!("Sweep and health check intervals must be positive");
        }

        Ok(config)
    }
}

fn parse<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    lookup(key)
        .map(|raw| raw.trim().parse::<T>().with_context(|| format!("Invalid {}: {:?}", key, raw)))
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> anyhow::Result<AppConfig> {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_when_unset() {
        assert_eq!(config_from(&[]).unwrap(), AppConfig::default());
    }

    #[test]
    fn test_overrides_are_parsed() {
        let config = config_from(&[
            ("METRICS_PORT", "9191"),
            ("RESERVATION_TTL_SECS", "900"),
            ("PUBLISH_MAX_ATTEMPTS", " 3 "),
        ])
        .unwrap();

        assert_eq!(config.metrics_port, 9191);
        assert_eq!(config.reservation_ttl, Some(Duration::from_secs(900)));
        assert_eq!(config.publish_max_attempts, 3);
    }

    #[test]
    fn test_invalid_values_are_errors() {
        let err = config_from(&[("METRICS_PORT", "not-a-port")]).unwrap_err();
        assert!(err.to_string().contains("METRICS_PORT"));
        assert!(config_from(&[("PUBLISH_MAX_ATTEMPTS", "0")]).is_err());
    }
}
