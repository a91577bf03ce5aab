//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use crate::error::Result;
use std::path::Path;

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }
}

impl LoaderConfig {
    /// Validate loader settings without a target section.
    pub fn validate(&self) -> Result<()> {
        validation::validate_loader(self)
    }
}
