//! Configuration management for the reservation core

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct BackendConfig {
    /// Base URL of the external reservation store (REST)
    pub base_url: String,
    /// Per-request timeout in seconds
    pub timeout_seconds: u64,
}

/// Reservation policy thresholds.
///
/// These are deployment policy, not core invariants; the ledger itself only
/// enforces window well-formedness and overlap rules.
#[derive(Debug, Deserialize, Clone)]
pub struct PolicyConfig {
    /// Minimum reservation duration in minutes
    pub min_duration_minutes: i64,
    /// Maximum reservation duration in minutes (0 = unlimited)
    pub max_duration_minutes: i64,
    /// Look-ahead horizon for free-slot search, in days
    pub search_horizon_days: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SweeperConfig {
    /// Seconds between expiry sweeps
    pub interval_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub backend: BackendConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default)]
    pub sweeper: SweeperConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let config = Config::builder()
            // Start with default configuration
            .add_source(File::with_name("config/default"))
            // Layer on the environment-specific file
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Add environment variables (with prefix CAMPUS_RESERVE_)
            .add_source(
                Environment::with_prefix("CAMPUS_RESERVE")
                    .separator("_")
                    .try_parsing(true),
            )
            // Override backend URL from BACKEND_URL env var if present
            .set_override_option("backend.base_url", env::var("BACKEND_URL").ok())?
            .build()?;

        config.try_deserialize()
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api/v1".to_string(),
            timeout_seconds: 10,
        }
    }
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            min_duration_minutes: 15,
            max_duration_minutes: 480,
            search_horizon_days: 14,
        }
    }
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 60,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
