//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid AI request timeout")]
    InvalidTimeout,

    #[error("Too many AI retries (maximum 10)")]
    TooManyRetries,

    #[error("Invalid AI base URL: {0}")]
    InvalidBaseUrl(String),

    #[error("Temperature must be between 0.0 and 2.0")]
    InvalidTemperature,

    #[error("Unsupported locale: {0}")]
    InvalidLocale(String),

    #[error("End-of-chat threshold must be at least 1")]
    InvalidMessageThreshold,

    #[error("Minimum reflection length must be at least 1")]
    InvalidReflectionLength,

    #[error("Export output directory is empty")]
    EmptyOutputDir,

    #[error("Invalid log level directive: {0}")]
    InvalidLogLevel(String),
}
