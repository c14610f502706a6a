//! Catalog configuration.
//!
//! Loaded from YAML files and `VELLUM__`-prefixed environment variables.

use serde::Deserialize;

use crate::error::Result;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "vellum.yaml";
/// Environment variable for configuration file path.
pub const CONFIG_ENV_VAR: &str = "VELLUM_CONFIG";
/// Prefix for configuration environment variables.
pub const CONFIG_ENV_PREFIX: &str = "VELLUM";
/// Environment variable for logging configuration.
pub const LOG_ENV_VAR: &str = "VELLUM_LOG";

/// Snapshot registry settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Versions kept in each collection's window.
    pub num_versions: usize,
    /// Replay every active collection when the registry is created.
    pub preload: bool,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            num_versions: 1,
            preload: true,
        }
    }
}

impl CatalogConfig {
    /// Load configuration from file and environment.
    ///
    /// Sources, lowest priority first: `vellum.yaml` in the working
    /// directory, `path` if given, the file named by `VELLUM_CONFIG`, then
    /// `VELLUM__*` environment variables.
    pub fn load(path: Option<&str>) -> Result<Self> {
        use ::config::{Config as ConfigLib, Environment, File, FileFormat};

        let mut builder = ConfigLib::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

        if let Some(config_path) = path {
            builder = builder.add_source(File::new(config_path, FileFormat::Yaml).required(true));
        }

        if let Ok(config_path) = std::env::var(CONFIG_ENV_VAR) {
            builder = builder.add_source(File::new(&config_path, FileFormat::Yaml).required(true));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Create config for testing.
    pub fn for_test() -> Self {
        Self::default()
    }

    pub fn with_num_versions(mut self, num_versions: usize) -> Self {
        self.num_versions = num_versions;
        self
    }

    pub fn with_preload(mut self, preload: bool) -> Self {
        self.preload = preload;
        self
    }
}

#[cfg(test)]
mod tests;
