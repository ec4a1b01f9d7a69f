//! Configuration types, built from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Hard ceiling on confirmation polls per request.
pub const MAX_CONFIRM_ATTEMPTS: u32 = 5;

/// Relay configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Address the HTTP server binds to.
    pub bind: String,
    /// HTTP listen port.
    pub port: u16,
    /// Directory uploaded attachments are staged in before dispatch.
    pub upload_dir: PathBuf,
    /// Maximum accepted request body for `/send-message`.
    pub max_upload_bytes: usize,
    /// Number of messages returned by `/get-messages`.
    pub history_limit: usize,
    /// chrono format string for history timestamps (local time).
    pub date_format: String,
    /// How often to re-check the channel session during startup.
    pub ready_poll_interval: Duration,
    /// Rolling log directory; stdout only when unset.
    pub log_dir: Option<PathBuf>,
    pub bridge: BridgeConfig,
    pub dispatch: DispatchConfig,
    pub confirm: ConfirmConfig,
}

/// Connection settings for the channel bridge process.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub base_url: String,
    pub token: Option<SecretString>,
    pub request_timeout: Duration,
}

/// Pre-send jitter window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchConfig {
    pub jitter_min: Duration,
    pub jitter_max: Duration,
}

/// Confirmation polling policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmConfig {
    pub max_attempts: u32,
    pub interval: Duration,
    /// Most recent messages inspected per attempt.
    pub sample_size: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 3000,
            upload_dir: PathBuf::from("uploads"),
            max_upload_bytes: 64 * 1024 * 1024,
            history_limit: 10,
            date_format: "%d/%m/%Y, %H:%M:%S".to_string(),
            ready_poll_interval: Duration::from_secs(2),
            log_dir: None,
            bridge: BridgeConfig::default(),
            dispatch: DispatchConfig::default(),
            confirm: ConfirmConfig::default(),
        }
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:3001".to_string(),
            token: None,
            request_timeout: Duration::from_secs(60),
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            jitter_min: Duration::from_secs(10),
            jitter_max: Duration::from_secs(30),
        }
    }
}

impl Default for ConfirmConfig {
    fn default() -> Self {
        Self {
            max_attempts: MAX_CONFIRM_ATTEMPTS,
            interval: Duration::from_secs(3),
            sample_size: 2,
        }
    }
}

impl RelayConfig {
    /// Build config from `RELAY_*` environment variables, falling back to
    /// defaults for anything unset or unparseable.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let token = std::env::var("RELAY_BRIDGE_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty())
            .map(SecretString::from);

        Self {
            bind: std::env::var("RELAY_BIND").unwrap_or(defaults.bind),
            port: env_parse("RELAY_PORT").unwrap_or(defaults.port),
            upload_dir: std::env::var("RELAY_UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.upload_dir),
            max_upload_bytes: env_parse::<usize>("RELAY_MAX_UPLOAD_MB")
                .map(|mb| mb * 1024 * 1024)
                .unwrap_or(defaults.max_upload_bytes),
            history_limit: env_parse("RELAY_HISTORY_LIMIT").unwrap_or(defaults.history_limit),
            date_format: std::env::var("RELAY_DATE_FORMAT").unwrap_or(defaults.date_format),
            ready_poll_interval: env_parse("RELAY_READY_POLL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.ready_poll_interval),
            log_dir: std::env::var("RELAY_LOG_DIR").ok().map(PathBuf::from),
            bridge: BridgeConfig {
                base_url: std::env::var("RELAY_BRIDGE_URL")
                    .map(|u| u.trim_end_matches('/').to_string())
                    .unwrap_or(defaults.bridge.base_url),
                token,
                request_timeout: env_parse("RELAY_BRIDGE_TIMEOUT_SECS")
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.bridge.request_timeout),
            },
            dispatch: DispatchConfig {
                jitter_min: env_parse("RELAY_JITTER_MIN_MS")
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.dispatch.jitter_min),
                jitter_max: env_parse("RELAY_JITTER_MAX_MS")
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.dispatch.jitter_max),
            },
            confirm: ConfirmConfig {
                max_attempts: env_parse::<u32>("RELAY_CONFIRM_ATTEMPTS")
                    .map(|n| n.clamp(1, MAX_CONFIRM_ATTEMPTS))
                    .unwrap_or(defaults.confirm.max_attempts),
                interval: env_parse("RELAY_CONFIRM_INTERVAL_MS")
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.confirm.interval),
                sample_size: env_parse("RELAY_CONFIRM_SAMPLE")
                    .unwrap_or(defaults.confirm.sample_size),
            },
        }
    }

    /// Reject combinations the relay cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dispatch.jitter_min > self.dispatch.jitter_max {
            return Err(ConfigError::InvalidValue {
                key: "RELAY_JITTER_MIN_MS".into(),
                message: format!(
                    "{}ms is above RELAY_JITTER_MAX_MS ({}ms)",
                    self.dispatch.jitter_min.as_millis(),
                    self.dispatch.jitter_max.as_millis()
                ),
            });
        }
        if self.confirm.sample_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "RELAY_CONFIRM_SAMPLE".into(),
                message: "must be at least 1".into(),
            });
        }
        if self.history_limit == 0 {
            return Err(ConfigError::InvalidValue {
                key: "RELAY_HISTORY_LIMIT".into(),
                message: "must be at least 1".into(),
            });
        }
        if !self.bridge.base_url.starts_with("http://") && !self.bridge.base_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue {
                key: "RELAY_BRIDGE_URL".into(),
                message: format!("{} is not an http(s) URL", self.bridge.base_url),
            });
        }
        Ok(())
    }

    /// Create the upload and log directories if they are missing.
    pub async fn ensure_dirs(&self) -> Result<(), ConfigError> {
        tokio::fs::create_dir_all(&self.upload_dir).await?;
        if let Some(ref dir) = self.log_dir {
            tokio::fs::create_dir_all(dir).await?;
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_delivery_protocol() {
        let config = RelayConfig::default();
        assert_eq!(config.port, 3000);
        assert_eq!(config.dispatch.jitter_min, Duration::from_secs(10));
        assert_eq!(config.dispatch.jitter_max, Duration::from_secs(30));
        assert_eq!(config.confirm.max_attempts, 5);
        assert_eq!(config.confirm.interval, Duration::from_secs(3));
        assert_eq!(config.confirm.sample_size, 2);
        assert_eq!(config.history_limit, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn inverted_jitter_window_is_rejected() {
        let mut config = RelayConfig::default();
        config.dispatch.jitter_min = Duration::from_secs(40);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("RELAY_JITTER_MIN_MS"));
    }

    #[test]
    fn bridge_url_must_be_http() {
        let mut config = RelayConfig::default();
        config.bridge.base_url = "localhost:3001".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn listen_addr_joins_bind_and_port() {
        let config = RelayConfig {
            bind: "127.0.0.1".into(),
            port: 8081,
            ..RelayConfig::default()
        };
        assert_eq!(config.listen_addr(), "127.0.0.1:8081");
    }
}
