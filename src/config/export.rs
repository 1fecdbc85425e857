//! Transcript export configuration

use serde::Deserialize;
use std::path::PathBuf;

use super::error::ValidationError;

/// Export configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ExportConfig {
    /// Directory the transcripts are written to
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Footer brand
    #[serde(default = "default_brand")]
    pub brand: String,
}

impl ExportConfig {
    /// Validate export configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.output_dir.as_os_str().is_empty() {
            return Err(ValidationError::EmptyOutputDir);
        }
        if self.brand.trim().is_empty() {
            return Err(ValidationError::MissingRequired("EXPORT__BRAND"));
        }
        Ok(())
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            brand: default_brand(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./exports")
}

fn default_brand() -> String {
    "AI-Debate.Tech".to_string()
}
