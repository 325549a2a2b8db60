//! Connector configuration.

use std::env;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 10_000;
pub const DEFAULT_STATUS_TIMEOUT_MS: u64 = 15_000;
pub const DEFAULT_POLL_FAILURE_THRESHOLD: u32 = 3;
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 20_000;
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 2_000;
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;
pub const DEFAULT_RESTART_POLL_DELAY_MS: u64 = 3_000;

/// REST paths for the WhatsApp integration. Paths differ between backend
/// revisions, so every one of them is configurable.
#[derive(Debug, Clone)]
pub struct WhatsAppEndpoints {
    pub status_path: String,
    pub qr_path: String,
    pub restart_path: String,
    pub disconnect_path: String,
    pub send_message_path: String,
    pub validate_path: String,
}

impl Default for WhatsAppEndpoints {
    fn default() -> Self {
        Self {
            status_path: "/whatsapp/status".to_string(),
            qr_path: "/whatsapp/qr".to_string(),
            restart_path: "/whatsapp/restart".to_string(),
            disconnect_path: "/whatsapp/disconnect".to_string(),
            send_message_path: "/whatsapp/send-message".to_string(),
            validate_path: "/whatsapp/validate-number".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConnectorConfig {
    /// Base URL of the REST backend.
    pub api_base_url: String,
    /// ws:// or wss:// URL of the push event stream.
    pub socket_url: String,
    pub endpoints: WhatsAppEndpoints,
    pub poll_interval: Duration,
    /// Per-request timeout for status fetches; a timed-out fetch counts as
    /// a poll failure.
    pub status_timeout: Duration,
    /// Consecutive poll failures tolerated before the phase degrades to
    /// the error phase.
    pub poll_failure_threshold: u32,
    pub connect_timeout: Duration,
    pub reconnect_delay: Duration,
    pub max_reconnect_attempts: u32,
    /// Delay before the one extra poll triggered after a restart command.
    pub restart_poll_delay: Duration,
}

impl ConnectorConfig {
    #[must_use]
    pub fn new(api_base_url: impl Into<String>, socket_url: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            socket_url: socket_url.into(),
            endpoints: WhatsAppEndpoints::default(),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            status_timeout: Duration::from_millis(DEFAULT_STATUS_TIMEOUT_MS),
            poll_failure_threshold: DEFAULT_POLL_FAILURE_THRESHOLD,
            connect_timeout: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
            reconnect_delay: Duration::from_millis(DEFAULT_RECONNECT_DELAY_MS),
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            restart_poll_delay: Duration::from_millis(DEFAULT_RESTART_POLL_DELAY_MS),
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. `from_env` passes the process
    /// environment; callers with their own override layer pass a closure.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_base_url = lookup("APTO_API_BASE_URL")
            .map(|value| value.trim().trim_end_matches('/').to_string())
            .filter(|value| !value.is_empty())
            .ok_or(ConfigError::MissingApiBaseUrl)?;
        let socket_url = lookup("APTO_SOCKET_URL")
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .ok_or(ConfigError::MissingSocketUrl)?;

        let mut config = Self::new(api_base_url, socket_url);
        config.poll_interval = Duration::from_millis(parse_ms(
            &lookup,
            "APTO_POLL_INTERVAL_MS",
            DEFAULT_POLL_INTERVAL_MS,
            1_000,
            600_000,
        )?);
        config.status_timeout = Duration::from_millis(parse_ms(
            &lookup,
            "APTO_STATUS_TIMEOUT_MS",
            DEFAULT_STATUS_TIMEOUT_MS,
            250,
            20_000,
        )?);
        config.poll_failure_threshold = parse_u32(
            &lookup,
            "APTO_POLL_FAILURE_THRESHOLD",
            DEFAULT_POLL_FAILURE_THRESHOLD,
            1,
            100,
        )?;
        config.connect_timeout = Duration::from_millis(parse_ms(
            &lookup,
            "APTO_CONNECT_TIMEOUT_MS",
            DEFAULT_CONNECT_TIMEOUT_MS,
            250,
            60_000,
        )?);
        config.reconnect_delay = Duration::from_millis(parse_ms(
            &lookup,
            "APTO_RECONNECT_DELAY_MS",
            DEFAULT_RECONNECT_DELAY_MS,
            100,
            60_000,
        )?);
        config.max_reconnect_attempts = parse_u32(
            &lookup,
            "APTO_MAX_RECONNECT_ATTEMPTS",
            DEFAULT_MAX_RECONNECT_ATTEMPTS,
            1,
            100,
        )?;
        config.restart_poll_delay = Duration::from_millis(parse_ms(
            &lookup,
            "APTO_RESTART_POLL_DELAY_MS",
            DEFAULT_RESTART_POLL_DELAY_MS,
            0,
            60_000,
        )?);
        Ok(config)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("APTO_API_BASE_URL must be set")]
    MissingApiBaseUrl,
    #[error("APTO_SOCKET_URL must be set")]
    MissingSocketUrl,
    #[error("invalid {key}: {message}")]
    InvalidValue { key: String, message: String },
}

fn parse_ms(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: u64,
    min: u64,
    max: u64,
) -> Result<u64, ConfigError> {
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(|value| value.clamp(min, max))
            .map_err(|error| ConfigError::InvalidValue {
                key: key.to_string(),
                message: error.to_string(),
            }),
        None => Ok(default),
    }
}

fn parse_u32(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: u32,
    min: u32,
    max: u32,
) -> Result<u32, ConfigError> {
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<u32>()
            .map(|value| value.clamp(min, max))
            .map_err(|error| ConfigError::InvalidValue {
                key: key.to_string(),
                message: error.to_string(),
            }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn lookup_parser_applies_overrides_and_bounds() {
        let values = HashMap::from([
            ("APTO_API_BASE_URL", "https://api.apto.example/"),
            ("APTO_SOCKET_URL", "wss://socket.apto.example"),
            ("APTO_POLL_INTERVAL_MS", "5000"),
            ("APTO_STATUS_TIMEOUT_MS", "999999"),
            ("APTO_MAX_RECONNECT_ATTEMPTS", "3"),
        ]);
        let config = ConnectorConfig::from_lookup(|key| values.get(key).map(ToString::to_string))
            .expect("config parse");

        assert_eq!(config.api_base_url, "https://api.apto.example");
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        // Clamped to the 20s ceiling.
        assert_eq!(config.status_timeout, Duration::from_secs(20));
        assert_eq!(config.max_reconnect_attempts, 3);
        assert_eq!(config.poll_failure_threshold, DEFAULT_POLL_FAILURE_THRESHOLD);
    }

    #[test]
    fn missing_urls_are_rejected() {
        let error = ConnectorConfig::from_lookup(|_| None).expect_err("missing urls");
        assert!(matches!(error, ConfigError::MissingApiBaseUrl));

        let values = HashMap::from([("APTO_API_BASE_URL", "https://api.apto.example")]);
        let error = ConnectorConfig::from_lookup(|key| values.get(key).map(ToString::to_string))
            .expect_err("missing socket url");
        assert!(matches!(error, ConfigError::MissingSocketUrl));
    }

    #[test]
    fn invalid_numeric_override_is_rejected() {
        let values = HashMap::from([
            ("APTO_API_BASE_URL", "https://api.apto.example"),
            ("APTO_SOCKET_URL", "wss://socket.apto.example"),
            ("APTO_POLL_INTERVAL_MS", "soon"),
        ]);
        let error = ConnectorConfig::from_lookup(|key| values.get(key).map(ToString::to_string))
            .expect_err("invalid interval");
        match error {
            ConfigError::InvalidValue { key, .. } => assert_eq!(key, "APTO_POLL_INTERVAL_MS"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
