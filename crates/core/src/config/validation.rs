//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `server_url` is not an http(s) URL
    /// - `canonical_path` is neither empty nor a `/`-prefixed path without trailing `/`
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `user_agent` or `request_origin` is empty
    /// - a lane allows zero requests in flight
    /// - the retry base delay exceeds the retry cap
    pub fn validate(&self) -> Result<(), ConfigError> {
        match url::Url::parse(&self.server_url) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
            Ok(_) => return Err(invalid("server_url", "scheme must be http or https")),
            Err(e) => return Err(invalid("server_url", &e.to_string())),
        }

        if !self.canonical_path.is_empty()
            && (!self.canonical_path.starts_with('/') || self.canonical_path.ends_with('/'))
        {
            return Err(invalid("canonical_path", "must start with '/' and must not end with '/'"));
        }

        if self.timeout_ms < 100 {
            return Err(invalid("timeout_ms", "must be at least 100ms"));
        }
        if self.timeout_ms > 300_000 {
            return Err(invalid("timeout_ms", "must not exceed 5 minutes (300000ms)"));
        }

        if self.user_agent.is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }
        if self.request_origin.is_empty() {
            return Err(invalid("request_origin", "must not be empty"));
        }

        if self.read_max_in_flight == 0 {
            return Err(invalid("read_max_in_flight", "must be at least 1"));
        }
        if self.write_max_in_flight == 0 {
            return Err(invalid("write_max_in_flight", "must be at least 1"));
        }

        if self.retry_base_delay_ms > self.retry_max_delay_ms {
            return Err(invalid("retry_base_delay_ms", "must not exceed retry_max_delay_ms"));
        }

        if self.retry_max_attempts == 0 {
            tracing::warn!("retry_max_attempts is 0; throttled requests will surface as 429 responses");
        }

        Ok(())
    }
}
