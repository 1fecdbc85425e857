//! Application configuration module
//!
//! This module provides type-safe configuration loading from environment variables
//! using the `config` and `dotenvy` crates. Configuration is loaded with the
//! `AI_DEBATE` prefix and nested values use double underscores as separators.
//!
//! # Example
//!
//! ```no_run
//! use ai_debate::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//!
//! println!("Exports go to {}", config.export.output_dir.display());
//! ```

mod activity;
mod ai;
mod error;
mod export;
mod logging;

pub use activity::ActivityConfig;
pub use ai::AiConfig;
pub use error::{ConfigError, ValidationError};
pub use export::ExportConfig;
pub use logging::{Environment, LoggingConfig};

use serde::Deserialize;

/// Root application configuration
///
/// Every section has defaults, so an empty environment is a valid
/// configuration. Load using [`AppConfig::load()`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// AI text-generation service (Gemini)
    #[serde(default)]
    pub ai: AiConfig,

    /// Locale and activity thresholds
    #[serde(default)]
    pub activity: ActivityConfig,

    /// Transcript export destination
    #[serde(default)]
    pub export: ExportConfig,

    /// Log filter and format
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `AI_DEBATE` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    /// 4. Deserializes into typed configuration structs
    ///
    /// # Environment Variable Format
    ///
    /// - `AI_DEBATE__AI__GEMINI_API_KEY=...` -> `ai.gemini_api_key = ...`
    /// - `AI_DEBATE__ACTIVITY__DEFAULT_LOCALE=it` -> `activity.default_locale = "it"`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if values cannot be parsed into expected types.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (development)
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("AI_DEBATE")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if any configuration value is invalid.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.ai.validate()?;
        self.activity.validate()?;
        self.export.validate()?;
        self.logging.validate()?;
        Ok(())
    }

    /// Check if running in production environment
    pub fn is_production(&self) -> bool {
        self.logging.is_production()
    }
}
