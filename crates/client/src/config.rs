//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Optional
//! - `ZDRINK_API_BASE_URL` - Ordering API base URL (default: `http://127.0.0.1:8000/api`)
//! - `ZDRINK_REQUEST_TIMEOUT_SECS` - Overall request deadline (default: 10)
//! - `ZDRINK_STATE_FILE` - Credential storage file (default: `.zdrink/session.json`)
//! - `ZDRINK_CATALOG_CACHE_TTL_SECS` - Catalog cache lifetime (default: 300)

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:8000/api";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
const DEFAULT_STATE_FILE: &str = ".zdrink/session.json";
const DEFAULT_CATALOG_CACHE_TTL_SECS: u64 = 300;

/// Login entry point announced when the session is invalidated.
pub const LOGIN_PATH: &str = "/login";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Ordering client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL every endpoint path is appended to
    pub api_base_url: Url,
    /// Overall deadline for a single request
    pub request_timeout: Duration,
    /// File holding the persisted credential
    pub state_file: PathBuf,
    /// Lifetime of cached catalog reads
    pub catalog_cache_ttl: Duration,
    /// Path the application navigates to after a forced logout
    pub login_path: String,
}

impl ClientConfig {
    /// Configuration for `api_base_url` with every other setting at its default.
    #[must_use]
    pub fn new(api_base_url: Url) -> Self {
        Self {
            api_base_url,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            state_file: PathBuf::from(DEFAULT_STATE_FILE),
            catalog_cache_ttl: Duration::from_secs(DEFAULT_CATALOG_CACHE_TTL_SECS),
            login_path: LOGIN_PATH.to_string(),
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let api_base_url = parse_base_url(
            "ZDRINK_API_BASE_URL",
            &get_env_or_default("ZDRINK_API_BASE_URL", DEFAULT_API_BASE_URL),
        )?;
        let request_timeout = Duration::from_secs(get_secs_or_default(
            "ZDRINK_REQUEST_TIMEOUT_SECS",
            DEFAULT_REQUEST_TIMEOUT_SECS,
        )?);
        let state_file = PathBuf::from(get_env_or_default("ZDRINK_STATE_FILE", DEFAULT_STATE_FILE));
        let catalog_cache_ttl = Duration::from_secs(get_secs_or_default(
            "ZDRINK_CATALOG_CACHE_TTL_SECS",
            DEFAULT_CATALOG_CACHE_TTL_SECS,
        )?);

        Ok(Self {
            api_base_url,
            request_timeout,
            state_file,
            catalog_cache_ttl,
            login_path: LOGIN_PATH.to_string(),
        })
    }

    /// Set the credential storage file.
    #[must_use]
    pub fn with_state_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.state_file = path.into();
        self
    }

    /// Set the request deadline.
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Build the absolute URL for an endpoint path such as `/auth/me/`.
    ///
    /// # Errors
    ///
    /// Returns `url::ParseError` if the joined URL is invalid.
    pub fn endpoint(&self, path: &str) -> Result<Url, url::ParseError> {
        let base = self.api_base_url.as_str().trim_end_matches('/');
        let path = path.trim_start_matches('/');
        Url::parse(&format!("{base}/{path}"))
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Get a whole number of seconds, rejecting zero.
fn get_secs_or_default(key: &str, default: u64) -> Result<u64, ConfigError> {
    let Ok(raw) = std::env::var(key) else {
        return Ok(default);
    };
    match raw.trim().parse::<u64>() {
        Ok(0) => Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "must be greater than zero".to_string(),
        )),
        Ok(secs) => Ok(secs),
        Err(e) => Err(ConfigError::InvalidEnvVar(key.to_string(), e.to_string())),
    }
}

/// Parse and validate the API base URL.
fn parse_base_url(key: &str, raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }
    if url.cannot_be_a_base() || url.host_str().is_none() {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "must be an absolute http(s) URL with a host".to_string(),
        ));
    }
    Ok(url)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn config(base: &str) -> ClientConfig {
        ClientConfig::new(Url::parse(base).unwrap())
    }

    #[test]
    fn test_endpoint_joins_with_single_slash() {
        let cfg = config("http://localhost:8000/api");
        assert_eq!(
            cfg.endpoint("/auth/me/").unwrap().as_str(),
            "http://localhost:8000/api/auth/me/"
        );

        let cfg = config("http://localhost:8000/api/");
        assert_eq!(
            cfg.endpoint("orders/carts/my_cart/").unwrap().as_str(),
            "http://localhost:8000/api/orders/carts/my_cart/"
        );
    }

    #[test]
    fn test_defaults() {
        let cfg = config("http://localhost:8000/api");
        assert_eq!(cfg.request_timeout, Duration::from_secs(10));
        assert_eq!(cfg.login_path, "/login");
        assert_eq!(cfg.catalog_cache_ttl, Duration::from_secs(300));
    }

    #[test]
    fn test_parse_base_url_rejects_bad_input() {
        assert!(parse_base_url("K", "not a url").is_err());
        assert!(parse_base_url("K", "ftp://example.com/api").is_err());
        assert!(parse_base_url("K", "https://example.com/api").is_ok());
    }

    #[test]
    fn test_builders() {
        let cfg = config("http://localhost:8000/api")
            .with_state_file("/tmp/zdrink.json")
            .with_request_timeout(Duration::from_secs(3));
        assert_eq!(cfg.state_file, PathBuf::from("/tmp/zdrink.json"));
        assert_eq!(cfg.request_timeout, Duration::from_secs(3));
    }
}
