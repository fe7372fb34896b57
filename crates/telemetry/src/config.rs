//! Tracker configuration.

use std::time::Duration;

use steno_core::classifier::ClassifierConfig;

/// Default collector endpoint for buffered failure batches.
const DEFAULT_COLLECTOR_ENDPOINT: &str = "http://localhost:3000/api/payment-failures";

/// Default endpoint for immediate high-priority alerts.
const DEFAULT_ALERT_ENDPOINT: &str = "http://localhost:3000/api/alerts/payment-failure";

/// How often the buffer ships to the collector.
const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(30);

/// Delay before a queued (or automatic) retry becomes due.
const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Upper bound on retries per failed attempt.
const DEFAULT_MAX_RETRIES: u32 = 3;

/// How long failure records are retained before the sweep deletes them.
const DEFAULT_RETENTION_DAYS: i64 = 30;

/// How often the background retention sweep runs.
const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Configuration for the failure tracker service.
///
/// All fields have defaults suitable for local development; production
/// deployments override via environment variables or the builder.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Collector URL receiving `payment_failures` batches.
    pub collector_endpoint: String,
    /// Alert URL receiving `immediate_alert` posts for high-priority
    /// failures.
    pub alert_endpoint: String,
    /// Interval of the periodic buffer flush (default: 30 s).
    pub flush_interval: Duration,
    /// Delay before a retry becomes due (default: 5 s).
    pub retry_delay: Duration,
    /// Maximum retries per failed attempt (default: 3).
    pub max_retries: u32,
    /// Failure record retention horizon in days (default: 30).
    pub retention_max_age_days: i64,
    /// Interval of the background retention sweep (default: daily).
    pub sweep_interval: Duration,
    /// Priority thresholds for the failure classifier.
    pub classifier: ClassifierConfig,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            collector_endpoint: DEFAULT_COLLECTOR_ENDPOINT.to_string(),
            alert_endpoint: DEFAULT_ALERT_ENDPOINT.to_string(),
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            retry_delay: DEFAULT_RETRY_DELAY,
            max_retries: DEFAULT_MAX_RETRIES,
            retention_max_age_days: DEFAULT_RETENTION_DAYS,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            classifier: ClassifierConfig::default(),
        }
    }
}

impl TrackerConfig {
    /// Load configuration from environment variables, falling back to the
    /// defaults for anything unset or unparsable.
    ///
    /// | Env Var                  | Default                                            |
    /// |--------------------------|----------------------------------------------------|
    /// | `COLLECTOR_ENDPOINT`     | `http://localhost:3000/api/payment-failures`       |
    /// | `ALERT_ENDPOINT`         | `http://localhost:3000/api/alerts/payment-failure` |
    /// | `FLUSH_INTERVAL_SECS`    | `30`                                               |
    /// | `RETRY_DELAY_SECS`       | `5`                                                |
    /// | `MAX_RETRIES`            | `3`                                                |
    /// | `FAILURE_RETENTION_DAYS` | `30`                                               |
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            collector_endpoint: std::env::var("COLLECTOR_ENDPOINT")
                .unwrap_or(defaults.collector_endpoint),
            alert_endpoint: std::env::var("ALERT_ENDPOINT").unwrap_or(defaults.alert_endpoint),
            flush_interval: env_secs("FLUSH_INTERVAL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.flush_interval),
            retry_delay: env_secs("RETRY_DELAY_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.retry_delay),
            max_retries: std::env::var("MAX_RETRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_retries),
            retention_max_age_days: std::env::var("FAILURE_RETENTION_DAYS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.retention_max_age_days),
            sweep_interval: defaults.sweep_interval,
            classifier: defaults.classifier,
        }
    }
}

fn env_secs(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}
