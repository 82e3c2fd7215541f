//! Application configuration loaded from environment variables.

use std::time::Duration;

use orchestrator::NotifyConfig;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Text
        }
    }
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` (default: `"0.0.0.0"`), `PORT` (default: `3000`)
/// - `RUST_LOG` (default: `"info"`), `LOG_FORMAT` (`text` or `json`)
/// - `DATABASE_URL`: PostgreSQL; unset runs on the in-memory store
/// - `DATABASE_MAX_CONNECTIONS` (default: `5`)
/// - `PROCESSOR_API_BASE`, `PROCESSOR_API_KEY`: unset key runs on the in-memory processor
/// - `PROCESSOR_TIMEOUT_MS` (default: `5000`)
/// - `CLAIM_TTL_SECS` (default: `300`): age at which an unfinished action claim is retaken
/// - `NOTIFY_WEBHOOK_URL`: unset logs notifications instead
/// - `NOTIFY_TIMEOUT_MS`, `NOTIFY_MAX_IN_FLIGHT`, `NOTIFY_QUEUE_CAPACITY`
/// - `ADMIN_EMAILS`, `ADMIN_DOMAINS`: comma-separated operator allowlist
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub processor_api_base: String,
    pub processor_api_key: Option<String>,
    pub processor_timeout: Duration,
    pub claim_ttl: Duration,
    pub notify_webhook_url: Option<String>,
    pub notify: NotifyConfig,
    pub admin_emails: Vec<String>,
    pub admin_domains: Vec<String>,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let parsed = |key: &str| non_empty(key).and_then(|v| v.trim().parse::<u64>().ok());

        Self {
            host: non_empty("HOST").unwrap_or(defaults.host),
            port: non_empty("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: non_empty("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: non_empty("LOG_FORMAT")
                .map(|v| LogFormat::parse(&v))
                .unwrap_or(defaults.log_format),
            database_url: non_empty("DATABASE_URL"),
            database_max_connections: non_empty("DATABASE_MAX_CONNECTIONS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.database_max_connections),
            processor_api_base: non_empty("PROCESSOR_API_BASE")
                .unwrap_or(defaults.processor_api_base),
            processor_api_key: non_empty("PROCESSOR_API_KEY"),
            processor_timeout: parsed("PROCESSOR_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.processor_timeout),
            claim_ttl: parsed("CLAIM_TTL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.claim_ttl),
            notify_webhook_url: non_empty("NOTIFY_WEBHOOK_URL"),
            notify: NotifyConfig {
                queue_capacity: parsed("NOTIFY_QUEUE_CAPACITY")
                    .map(|v| v as usize)
                    .unwrap_or(defaults.notify.queue_capacity),
                max_in_flight: parsed("NOTIFY_MAX_IN_FLIGHT")
                    .map(|v| v as usize)
                    .unwrap_or(defaults.notify.max_in_flight),
                send_timeout: parsed("NOTIFY_TIMEOUT_MS")
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.notify.send_timeout),
            },
            admin_emails: split_list(non_empty("ADMIN_EMAILS")),
            admin_domains: split_list(non_empty("ADMIN_DOMAINS")),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn split_list(raw: Option<String>) -> Vec<String> {
    raw.map(|raw| {
        raw.split(',')
            .map(|s| s.trim().to_ascii_lowercase())
            .filter(|s| !s.is_empty())
            .collect()
    })
    .unwrap_or_default()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            database_url: None,
            database_max_connections: 5,
            processor_api_base: "https://api.stripe.com".to_string(),
            processor_api_key: None,
            processor_timeout: Duration::from_millis(5000),
            claim_ttl: orchestrator::DEFAULT_CLAIM_TTL,
            notify_webhook_url: None,
            notify: NotifyConfig {
                queue_capacity: 256,
                max_in_flight: 8,
                send_timeout: Duration::from_millis(3000),
            },
            admin_emails: Vec::new(),
            admin_domains: Vec::new(),
        }
    }
}
