//! Session client configuration.
//!
//! Values come from the environment (see [`ClientConfig::from_env`]) or are
//! set explicitly through the builder methods.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Environment variable names read by [`ClientConfig::from_env`].
pub mod env_vars {
    /// Scheme, host and port of the API server.
    pub const API_ORIGIN: &str = "ADMIN_CONSOLE_API_ORIGIN";
    /// Path prefix of every API route.
    pub const API_BASE_PATH: &str = "ADMIN_CONSOLE_API_BASE_PATH";
    /// Key under which the access token is persisted.
    pub const TOKEN_STORAGE_KEY: &str = "ADMIN_CONSOLE_TOKEN_STORAGE_KEY";
    /// File backing the durable credential store.
    pub const STORAGE_PATH: &str = "ADMIN_CONSOLE_STORAGE_PATH";
    /// Enables request analytics reporting.
    pub const ANALYTICS: &str = "ADMIN_CONSOLE_ANALYTICS";
    /// Request timeout in seconds.
    pub const TIMEOUT_SECS: &str = "ADMIN_CONSOLE_TIMEOUT_SECS";
}

/// Configuration error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A variable was set to a value that cannot be parsed.
    #[error("Invalid value for {var}: {value}")]
    InvalidValue {
        /// Variable name.
        var: String,
        /// Offending value.
        value: String,
    },

    /// Configuration validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// Session client configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Scheme, host and port of the API server (e.g. "https://admin.example.com").
    ///
    /// Default: `http://localhost:8000`
    pub origin: String,

    /// Path prefix prepended to every API route.
    ///
    /// Default: `/api`
    pub base_path: String,

    /// Key under which the access token is persisted.
    ///
    /// Default: `access_token`
    pub storage_key: String,

    /// File backing the durable credential store.
    ///
    /// Default: `.admin-console/storage.json`
    pub storage_path: PathBuf,

    /// Emit per-request analytics events.
    ///
    /// Default: false
    pub analytics_enabled: bool,

    /// Timeout applied to every request.
    ///
    /// Default: 30 seconds
    pub request_timeout: Duration,
}

impl ClientConfig {
    /// Create a configuration for the given API origin.
    #[must_use]
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            ..Self::default()
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Unset variables keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns error if a variable holds an unparsable value or the result
    /// fails validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns error if a variable holds an unparsable value or the result
    /// fails validation.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(origin) = lookup(env_vars::API_ORIGIN) {
            config.origin = origin;
        }
        if let Some(base_path) = lookup(env_vars::API_BASE_PATH) {
            config.base_path = base_path;
        }
        if let Some(key) = lookup(env_vars::TOKEN_STORAGE_KEY) {
            config.storage_key = key;
        }
        if let Some(path) = lookup(env_vars::STORAGE_PATH) {
            config.storage_path = PathBuf::from(path);
        }
        if let Some(flag) = lookup(env_vars::ANALYTICS) {
            config.analytics_enabled = parse_flag(env_vars::ANALYTICS, &flag)?;
        }
        if let Some(secs) = lookup(env_vars::TIMEOUT_SECS) {
            let secs: u64 = secs.trim().parse().map_err(|_| ConfigError::InvalidValue {
                var: env_vars::TIMEOUT_SECS.to_string(),
                value: secs.clone(),
            })?;
            config.request_timeout = Duration::from_secs(secs);
        }

        config.validate()?;
        Ok(config)
    }

    /// Set the API base path.
    #[must_use]
    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = base_path.into();
        self
    }

    /// Set the storage key.
    #[must_use]
    pub fn with_storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = key.into();
        self
    }

    /// Set the credential store file.
    #[must_use]
    pub fn with_storage_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.storage_path = path.into();
        self
    }

    /// Enable or disable analytics reporting.
    #[must_use]
    pub const fn with_analytics(mut self, enabled: bool) -> Self {
        self.analytics_enabled = enabled;
        self
    }

    /// Set the request timeout.
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the origin is not an http(s) URL, the storage key is
    /// empty, or the timeout is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.origin.starts_with("http://") && !self.origin.starts_with("https://") {
            return Err(ConfigError::ValidationError(format!(
                "origin must start with http:// or https://, got {}",
                self.origin
            )));
        }
        if self.storage_key.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "storage key must not be empty".to_string(),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::ValidationError(
                "request timeout must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Full URL for an API path such as `/v1/people`.
    #[must_use]
    pub fn url_for(&self, path: &str) -> String {
        let origin = self.origin.trim_end_matches('/');
        let base = self.base_path.trim_matches('/');
        let path = path.trim_start_matches('/');

        if base.is_empty() {
            format!("{origin}/{path}")
        } else {
            format!("{origin}/{base}/{path}")
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            origin: "http://localhost:8000".to_string(),
            base_path: "/api".to_string(),
            storage_key: "access_token".to_string(),
            storage_path: PathBuf::from(".admin-console/storage.json"),
            analytics_enabled: false,
            request_timeout: Duration::from_secs(30),
        }
    }
}

fn parse_flag(var: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            var: var.to_string(),
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ClientConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.base_path, "/api");
        assert_eq!(config.storage_key, "access_token");
        assert!(!config.analytics_enabled);
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = ClientConfig::from_lookup(lookup_from(&[
            (env_vars::API_ORIGIN, "https://admin.example.com"),
            (env_vars::API_BASE_PATH, "/backend"),
            (env_vars::TOKEN_STORAGE_KEY, "admin_token"),
            (env_vars::ANALYTICS, "true"),
            (env_vars::TIMEOUT_SECS, "5"),
        ]))
        .unwrap();

        assert_eq!(config.origin, "https://admin.example.com");
        assert_eq!(config.base_path, "/backend");
        assert_eq!(config.storage_key, "admin_token");
        assert!(config.analytics_enabled);
        assert_eq!(config.request_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = ClientConfig::from_lookup(lookup_from(&[(env_vars::ANALYTICS, "maybe")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));

        let err = ClientConfig::from_lookup(lookup_from(&[(env_vars::API_ORIGIN, "localhost")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));

        let err = ClientConfig::from_lookup(lookup_from(&[(env_vars::TIMEOUT_SECS, "0")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_url_for_joins_segments() {
        let config = ClientConfig::new("http://localhost:8000/");
        assert_eq!(config.url_for("/v1/people"), "http://localhost:8000/api/v1/people");

        let config = ClientConfig::new("http://localhost:8000").with_base_path("");
        assert_eq!(config.url_for("/v1/people"), "http://localhost:8000/v1/people");
    }
}
