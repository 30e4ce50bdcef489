//! Application configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section.

pub mod allocation;
pub mod database;
pub mod logging;

use serde::{Deserialize, Serialize};
use validator::Validate;

pub use self::allocation::AllocationConfig;
pub use self::database::{DatabaseConfig, IsolationLevel};
pub use self::logging::LoggingConfig;

use crate::error::AppError;

/// Prefix for environment variable overrides, e.g.
/// `INDEXPOOL__ALLOCATION__MAX_RETRIES=3`.
pub const ENV_PREFIX: &str = "INDEXPOOL";

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Database connection settings.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Allocation engine settings.
    #[serde(default)]
    pub allocation: AllocationConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    ///
    /// The environment overlay is chosen by `INDEXPOOL_ENV`
    /// (default `development`).
    pub fn load(config_path: &str) -> Result<Self, AppError> {
        let env = std::env::var("INDEXPOOL_ENV").unwrap_or_else(|_| "development".to_string());
        Self::load_with_env(config_path, &env)
    }

    /// Load configuration from a TOML file, merging `config/{env}` and
    /// environment variables prefixed with `INDEXPOOL__`.
    pub fn load_with_env(config_path: &str, env: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        let loaded: Self = config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))?;

        loaded.validate()?;
        Ok(loaded)
    }

    /// Check cross-field constraints and per-section ranges.
    pub fn validate(&self) -> Result<(), AppError> {
        self.allocation.validate().map_err(|e| {
            AppError::configuration(format!("Invalid allocation configuration: {e}"))
        })?;

        if self.allocation.max_backoff_ms < self.allocation.base_backoff_ms {
            return Err(AppError::configuration(
                "allocation.max_backoff_ms must be >= allocation.base_backoff_ms",
            ));
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(AppError::configuration(
                "database.min_connections must be <= database.max_connections",
            ));
        }

        Ok(())
    }
}
