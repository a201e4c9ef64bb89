//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (REVREST_*)
//! 2. TOML config file (if REVREST_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (REVREST_*)
/// 2. TOML config file (if REVREST_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Origin of the review server, without the site path.
    ///
    /// Set via REVREST_SERVER_URL environment variable.
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// Site base path the server is mounted under (e.g. "/gerrit").
    ///
    /// Doubles as the cache partition key. Set via REVREST_CANONICAL_PATH.
    #[serde(default)]
    pub canonical_path: String,

    /// Value of the request-origin header when a caller did not set one.
    ///
    /// Set via REVREST_REQUEST_ORIGIN environment variable.
    #[serde(default = "default_request_origin")]
    pub request_origin: String,

    /// User-Agent string for HTTP requests.
    ///
    /// Set via REVREST_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// HTTP request timeout in milliseconds.
    ///
    /// Set via REVREST_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Concurrent requests allowed on the read lane.
    #[serde(default = "default_read_max_in_flight")]
    pub read_max_in_flight: usize,

    /// Concurrent requests allowed on the write lane.
    #[serde(default = "default_write_max_in_flight")]
    pub write_max_in_flight: usize,

    /// How many times a request throttled with 429 is retried. 0 disables retries.
    #[serde(default = "default_retry_max_attempts")]
    pub retry_max_attempts: u32,

    /// First backoff delay in milliseconds; doubled on every further retry.
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    /// Upper bound for a single backoff delay in milliseconds.
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,

    /// Bearer token attached to every request by the transport.
    ///
    /// Set via REVREST_AUTH_TOKEN environment variable.
    #[serde(default)]
    pub auth_token: Option<String>,

    /// JSON file whose entries seed the result cache at startup.
    #[serde(default)]
    pub initial_data_path: Option<PathBuf>,
}

fn default_server_url() -> String {
    "http://localhost:8080".into()
}

fn default_request_origin() -> String {
    "polygerrit".into()
}

fn default_user_agent() -> String {
    "revrest/0.1".into()
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_read_max_in_flight() -> usize {
    10
}

fn default_write_max_in_flight() -> usize {
    5
}

fn default_retry_max_attempts() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    1_000
}

fn default_retry_max_delay_ms() -> u64 {
    30_000
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            canonical_path: String::new(),
            request_origin: default_request_origin(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            read_max_in_flight: default_read_max_in_flight(),
            write_max_in_flight: default_write_max_in_flight(),
            retry_max_attempts: default_retry_max_attempts(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
            auth_token: None,
            initial_data_path: None,
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn retry_max_delay(&self) -> Duration {
        Duration::from_millis(self.retry_max_delay_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `REVREST_`
    /// 2. TOML file from `REVREST_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("REVREST_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("REVREST_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server_url, "http://localhost:8080");
        assert_eq!(config.canonical_path, "");
        assert_eq!(config.request_origin, "polygerrit");
        assert_eq!(config.user_agent, "revrest/0.1");
        assert_eq!(config.timeout_ms, 30_000);
        assert_eq!(config.read_max_in_flight, 10);
        assert_eq!(config.write_max_in_flight, 5);
        assert_eq!(config.retry_max_attempts, 3);
        assert!(config.auth_token.is_none());
        assert!(config.initial_data_path.is_none());
    }

    #[test]
    fn test_durations() {
        let config = AppConfig::default();
        assert_eq!(config.timeout(), Duration::from_millis(30_000));
        assert_eq!(config.retry_base_delay(), Duration::from_secs(1));
        assert_eq!(config.retry_max_delay(), Duration::from_secs(30));
    }

    #[test]
    fn test_load_layers_file_and_env() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "revrest.toml",
                r#"
                server_url = "https://review.example.org"
                canonical_path = "/r"
                write_max_in_flight = 2
                "#,
            )?;
            jail.set_env("REVREST_CONFIG_FILE", "revrest.toml");
            jail.set_env("REVREST_CANONICAL_PATH", "/gerrit");

            let config = AppConfig::load().map_err(|e| figment::Error::from(e.to_string()))?;
            assert_eq!(config.server_url, "https://review.example.org");
            assert_eq!(config.canonical_path, "/gerrit");
            assert_eq!(config.write_max_in_flight, 2);
            assert_eq!(config.read_max_in_flight, 10);
            Ok(())
        });
    }

    #[test]
    fn test_load_rejects_invalid_env() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("REVREST_READ_MAX_IN_FLIGHT", "0");
            let result = AppConfig::load();
            assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "read_max_in_flight"));
            Ok(())
        });
    }
}
