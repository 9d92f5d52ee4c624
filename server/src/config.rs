//! Configuration management for the queue server.
//!
//! Loads configuration from environment variables with sensible defaults.
//! Values that are missing or fail to parse fall back to the default.

use std::env;
use std::str::FromStr;
use std::time::Duration;
use turnstile_core::QueueConfig;

/// Default tracing filter when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info,turnstile=debug,tower_http=debug";

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server configuration
    pub server: ServerConfig,
    /// Queue timing and topic naming
    pub queue: QueueConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to bind to
    pub port: u16,
    /// Tracing filter directive
    pub log_level: String,
    /// Whether to install the Prometheus recorder and serve `/metrics`
    pub metrics_enabled: bool,
    /// Graceful shutdown timeout in seconds, per background task
    pub shutdown_timeout: u64,
}

impl ServerConfig {
    /// Address to bind the listener to.
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Config {
    /// Load configuration from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key/value source.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = QueueConfig::default();

        Self {
            server: ServerConfig {
                host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port: parse_or(&lookup, "PORT", 8080),
                log_level: lookup("RUST_LOG").unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
                metrics_enabled: lookup("METRICS_ENABLED")
                    .and_then(|raw| parse_flag(&raw))
                    .unwrap_or(true),
                shutdown_timeout: parse_or(&lookup, "SHUTDOWN_TIMEOUT", 10),
            },
            queue: QueueConfig {
                sweep_interval: seconds_or(
                    &lookup,
                    "QUEUE_SWEEP_INTERVAL_SECS",
                    defaults.sweep_interval,
                ),
                processing_timeout: seconds_or(
                    &lookup,
                    "QUEUE_PROCESSING_TIMEOUT_SECS",
                    defaults.processing_timeout,
                ),
                reap_interval: seconds_or(
                    &lookup,
                    "QUEUE_REAP_INTERVAL_SECS",
                    defaults.reap_interval,
                ),
                idle_window: seconds_or(&lookup, "QUEUE_IDLE_WINDOW_SECS", defaults.idle_window),
                publish_timeout: lookup("QUEUE_PUBLISH_TIMEOUT_MS")
                    .and_then(|raw| raw.trim().parse::<u64>().ok())
                    .filter(|millis| *millis > 0)
                    .map_or(defaults.publish_timeout, Duration::from_millis),
                topic_prefix: lookup("QUEUE_TOPIC_PREFIX")
                    .filter(|prefix| !prefix.trim().is_empty())
                    .unwrap_or(defaults.topic_prefix),
            },
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    lookup(key)
        .and_then(|raw| raw.trim().parse().ok())
        .unwrap_or(default)
}

// Zero would make `tokio::time::interval` panic, so it counts as unparseable.
fn seconds_or<F>(lookup: &F, key: &str, default: Duration) -> Duration
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|raw| raw.trim().parse::<u64>().ok())
        .filter(|secs| *secs > 0)
        .map_or(default, Duration::from_secs)
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]);

        assert_eq!(config.server.bind_address(), "0.0.0.0:8080");
        assert_eq!(config.server.log_level, DEFAULT_LOG_FILTER);
        assert!(config.server.metrics_enabled);
        assert_eq!(config.server.shutdown_timeout, 10);
        assert_eq!(config.queue, QueueConfig::default());
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("HOST", "127.0.0.1"),
            ("PORT", "9000"),
            ("METRICS_ENABLED", "false"),
            ("SHUTDOWN_TIMEOUT", "3"),
            ("QUEUE_SWEEP_INTERVAL_SECS", "5"),
            ("QUEUE_PROCESSING_TIMEOUT_SECS", "90"),
            ("QUEUE_REAP_INTERVAL_SECS", "600"),
            ("QUEUE_IDLE_WINDOW_SECS", "7200"),
            ("QUEUE_PUBLISH_TIMEOUT_MS", "250"),
            ("QUEUE_TOPIC_PREFIX", "tickets"),
        ]);

        assert_eq!(config.server.bind_address(), "127.0.0.1:9000");
        assert!(!config.server.metrics_enabled);
        assert_eq!(config.server.shutdown_timeout, 3);
        assert_eq!(config.queue.sweep_interval, Duration::from_secs(5));
        assert_eq!(config.queue.processing_timeout, Duration::from_secs(90));
        assert_eq!(config.queue.reap_interval, Duration::from_secs(600));
        assert_eq!(config.queue.idle_window, Duration::from_secs(7200));
        assert_eq!(config.queue.publish_timeout, Duration::from_millis(250));
        assert_eq!(config.queue.topic_prefix, "tickets");
    }

    #[test]
    fn test_unparseable_values_fall_back() {
        let config = config_from(&[
            ("PORT", "eighty"),
            ("METRICS_ENABLED", "maybe"),
            ("QUEUE_SWEEP_INTERVAL_SECS", "-1"),
            ("QUEUE_PROCESSING_TIMEOUT_SECS", "0"),
            ("QUEUE_TOPIC_PREFIX", "  "),
        ]);
        let defaults = QueueConfig::default();

        assert_eq!(config.server.port, 8080);
        assert!(config.server.metrics_enabled);
        assert_eq!(config.queue.sweep_interval, defaults.sweep_interval);
        assert_eq!(config.queue.processing_timeout, defaults.processing_timeout);
        assert_eq!(config.queue.topic_prefix, defaults.topic_prefix);
    }

    #[test]
    fn test_log_level_from_rust_log() {
        let config = config_from(&[("RUST_LOG", "warn")]);
        assert_eq!(config.server.log_level, "warn");
    }
}
