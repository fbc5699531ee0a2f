//! Application settings and configuration
//!
//! This module provides configuration management for the application,
//! loading settings from environment variables with sensible defaults.

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::services::client_pool::TransportOptions;
use crate::utils::RetryConfig;

/// Application environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[value(alias = "dev")]
    Development,
    #[value(alias = "stage")]
    Staging,
    #[value(alias = "prod")]
    Production,
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Staging => write!(f, "staging"),
            Environment::Production => write!(f, "production"),
        }
    }
}

impl Default for Environment {
    fn default() -> Self {
        Environment::Development
    }
}

impl FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "staging" | "stage" => Ok(Environment::Staging),
            "production" | "prod" => Ok(Environment::Production),
            _ => anyhow::bail!("Invalid environment: {}. Expected: development, staging, or production", s),
        }
    }
}

/// Fetch retry configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FetchConfig {
    /// Retries after the first attempt; each retry selects a client afresh
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay_ms: 200,
            max_delay_ms: 5_000,
        }
    }
}

/// Main application settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    // App settings
    pub app_name: String,
    pub app_version: String,
    pub environment: Environment,
    pub log_level: String,

    // Pool settings
    /// JSON file listing the pooled clients
    pub clients_file: PathBuf,
    /// How long a penalized client is kept out of rotation
    pub backoff_seconds: u64,

    // Transport settings
    pub request_timeout_seconds: u64,
    pub connect_timeout_seconds: u64,
    pub user_agent: String,

    // Fetching
    pub fetch: FetchConfig,
}

impl Settings {
    /// Load settings from environment variables with defaults
    pub fn load() -> Result<Self> {
        // Load .env file if it exists (ignored in production typically)
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        let settings = Self {
            // App settings
            app_name: env_or_default("APP_NAME", &defaults.app_name),
            app_version: defaults.app_version,
            environment: env_parse("ENVIRONMENT", "development")?,
            log_level: env_or_default("LOG_LEVEL", "info"),

            // Pool settings
            clients_file: env::var("CLIENT_POOL_CONFIG")
                .map(PathBuf::from)
                .unwrap_or(defaults.clients_file),
            backoff_seconds: env_parse("POOL_BACKOFF_SECONDS", "1800")?,

            // Transport settings
            request_timeout_seconds: env_parse("REQUEST_TIMEOUT_SECONDS", "30")?,
            connect_timeout_seconds: env_parse("CONNECT_TIMEOUT_SECONDS", "10")?,
            user_agent: env_or_default("USER_AGENT", &defaults.user_agent),

            // Fetching
            fetch: FetchConfig {
                max_retries: env_parse("FETCH_MAX_RETRIES", "2")?,
                initial_delay_ms: env_parse("FETCH_INITIAL_DELAY_MS", "200")?,
                max_delay_ms: env_parse("FETCH_MAX_DELAY_MS", "5000")?,
            },
        };

        // Validate settings
        settings.validate()?;

        Ok(settings)
    }

    /// Validate settings
    pub fn validate(&self) -> Result<()> {
        if self.backoff_seconds == 0 {
            anyhow::bail!("POOL_BACKOFF_SECONDS must be > 0");
        }
        if self.request_timeout_seconds == 0 {
            anyhow::bail!("REQUEST_TIMEOUT_SECONDS must be > 0");
        }
        if self.connect_timeout_seconds == 0 {
            anyhow::bail!("CONNECT_TIMEOUT_SECONDS must be > 0");
        }
        if self.fetch.initial_delay_ms > self.fetch.max_delay_ms {
            anyhow::bail!("FETCH_INITIAL_DELAY_MS must not exceed FETCH_MAX_DELAY_MS");
        }

        Ok(())
    }

    /// Backoff applied to penalized clients
    pub fn backoff(&self) -> Duration {
        Duration::from_secs(self.backoff_seconds)
    }

    /// Options for building the clients' HTTP transports
    pub fn transport_options(&self) -> TransportOptions {
        TransportOptions {
            request_timeout: Duration::from_secs(self.request_timeout_seconds),
            connect_timeout: Duration::from_secs(self.connect_timeout_seconds),
            user_agent: self.user_agent.clone(),
        }
    }

    /// Retry policy for the fetch service
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::new()
            .with_max_retries(self.fetch.max_retries)
            .with_initial_delay(Duration::from_millis(self.fetch.initial_delay_ms))
            .with_max_delay(Duration::from_millis(self.fetch.max_delay_ms))
    }

    /// Check if running in production mode
    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            app_name: "client-pool".to_string(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            environment: Environment::Development,
            log_level: "info".to_string(),
            clients_file: PathBuf::from("clients.json"),
            backoff_seconds: 30 * 60,
            request_timeout_seconds: 30,
            connect_timeout_seconds: 10,
            user_agent: concat!("client-pool/", env!("CARGO_PKG_VERSION")).to_string(),
            fetch: FetchConfig::default(),
        }
    }
}

/// Helper function to get environment variable with default
fn env_or_default(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable, falling back to `default` when unset
///
/// A value that is set but malformed is an error naming the variable.
fn env_parse<T>(key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: Into<anyhow::Error>,
{
    env_or_default(key, default)
        .parse::<T>()
        .map_err(Into::<anyhow::Error>::into)
        .with_context(|| format!("Invalid {} value", key))
}
