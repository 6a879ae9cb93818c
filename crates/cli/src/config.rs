//! CLI configuration.
//!
//! # Environment Variables
//!
//! All `ZDRINK_*` client variables (see [`ClientConfig::from_env`]), plus:
//!
//! ## Optional
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Environment name for Sentry (e.g., "production")

use zdrink_client::{ClientConfig, ConfigError};

/// Configuration for the `zdrink` binary.
#[derive(Debug, Clone)]
pub struct CliConfig {
    /// API client settings
    pub client: ClientConfig,
    /// Sentry DSN for error tracking (optional)
    pub sentry_dsn: Option<String>,
    /// Sentry environment name (optional)
    pub sentry_environment: Option<String>,
}

impl CliConfig {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a client variable is invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        let client = ClientConfig::from_env()?;

        Ok(Self {
            client,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }
}

/// Get an optional environment variable, treating empty as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}
