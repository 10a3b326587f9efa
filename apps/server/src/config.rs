use std::time::Duration;

use poptimizer_core::bus::Backoff;
use poptimizer_core::constants::{DEFAULT_BACKOFF_FACTOR, DEFAULT_FIRST_RETRY};

const DEFAULT_DB_PATH: &str = "./db/poptimizer.db";
const DEFAULT_DATA_URL: &str = "http://localhost:8000";
const DEFAULT_CHECK_INTERVAL_SECS: u64 = 60 * 60;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub db_path: String,
    pub data_url: String,
    pub check_interval: Duration,
    pub http_timeout: Duration,
    pub retry: Backoff,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let db_path = lookup("PO_DB_PATH").unwrap_or_else(|| DEFAULT_DB_PATH.to_string());
        let data_url = lookup("PO_DATA_URL").unwrap_or_else(|| DEFAULT_DATA_URL.to_string());

        let secs = |key: &str, default: u64| {
            lookup(key)
                .and_then(|v| v.parse::<u64>().ok())
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(Duration::from_secs(default))
        };
        let check_interval = secs("PO_CHECK_INTERVAL_SECS", DEFAULT_CHECK_INTERVAL_SECS);
        let http_timeout = secs("PO_HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS);
        let first_delay = secs("PO_RETRY_FIRST_DELAY_SECS", DEFAULT_FIRST_RETRY.as_secs());

        let factor = lookup("PO_RETRY_BACKOFF_FACTOR")
            .and_then(|v| v.parse::<f64>().ok())
            .filter(|f| f.is_finite() && *f >= 1.0)
            .unwrap_or(DEFAULT_BACKOFF_FACTOR);

        Self {
            db_path,
            data_url,
            check_interval,
            http_timeout,
            retry: Backoff::new(first_delay, factor),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]);
        assert_eq!(config.db_path, "./db/poptimizer.db");
        assert_eq!(config.data_url, "http://localhost:8000");
        assert_eq!(config.check_interval, Duration::from_secs(3600));
        assert_eq!(config.http_timeout, Duration::from_secs(30));
        assert_eq!(config.retry, Backoff::default());
    }

    #[test]
    fn test_overrides_and_bad_values() {
        let config = config_from(&[
            ("PO_DB_PATH", "/tmp/po.db"),
            ("PO_CHECK_INTERVAL_SECS", "120"),
            ("PO_RETRY_FIRST_DELAY_SECS", "5"),
            ("PO_RETRY_BACKOFF_FACTOR", "0.5"),
            ("PO_HTTP_TIMEOUT_SECS", "soon"),
        ]);
        assert_eq!(config.db_path, "/tmp/po.db");
        assert_eq!(config.check_interval, Duration::from_secs(120));
        assert_eq!(config.retry.first_delay(), Duration::from_secs(5));
        // A shrinking backoff falls back to the default factor.
        assert_eq!(config.retry.factor(), 2.0);
        assert_eq!(config.http_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_zero_durations_fall_back_to_defaults() {
        let config = config_from(&[
            ("PO_CHECK_INTERVAL_SECS", "0"),
            ("PO_HTTP_TIMEOUT_SECS", "0"),
            ("PO_RETRY_FIRST_DELAY_SECS", "0"),
        ]);
        // A zero period would make the checker's interval panic.
        assert_eq!(config.check_interval, Duration::from_secs(3600));
        assert_eq!(config.http_timeout, Duration::from_secs(30));
        assert_eq!(config.retry.first_delay(), Duration::from_secs(30));
    }
}
