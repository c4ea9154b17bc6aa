//! Configuration loader
//!
//! Layers a YAML file with `DEPLOYD_`-prefixed environment variables using
//! the `config` crate. Nested keys use a double underscore, so
//! `DEPLOYD_EXECUTION__WORKERS=8` overrides `execution.workers`.

use std::path::{Path, PathBuf};

use config::{Config, Environment as EnvSource, File, FileFormat};
use tracing::debug;

use super::DeploydConfig;
use crate::error::Result;

/// Prefix of environment variable overrides
pub const ENV_PREFIX: &str = "DEPLOYD";

/// File name looked up in the working directory and the user config dir
pub const CONFIG_FILE_NAME: &str = "deployd.yaml";

/// Loads [`DeploydConfig`] from YAML plus environment overrides
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    env_prefix: String,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            env_prefix: ENV_PREFIX.to_string(),
        }
    }

    /// Use a different environment variable prefix
    pub fn with_env_prefix(prefix: impl Into<String>) -> Self {
        Self {
            env_prefix: prefix.into(),
        }
    }

    /// Configuration path used when none is given
    ///
    /// `./deployd.yaml` when it exists, otherwise
    /// `<user config dir>/deployd/deployd.yaml`.
    pub fn default_path() -> PathBuf {
        let local = PathBuf::from(CONFIG_FILE_NAME);
        if local.exists() {
            return local;
        }
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("deployd")
            .join(CONFIG_FILE_NAME)
    }

    /// Load, deserialize and validate a configuration file
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or unreadable, is not valid
    /// YAML, does not match the schema, or fails
    /// [`DeploydConfig::validate`].
    pub fn load(&self, path: impl AsRef<Path>) -> Result<DeploydConfig> {
        let path = path.as_ref();
        debug!(path = %path.display(), prefix = %self.env_prefix, "Loading configuration");

        let source = File::from(path).format(FileFormat::Yaml).required(true);
        self.finish(Config::builder().add_source(source))
    }

    /// Load from YAML text instead of a file
    pub fn load_str(&self, content: &str) -> Result<DeploydConfig> {
        let source = File::from_str(content, FileFormat::Yaml);
        self.finish(Config::builder().add_source(source))
    }

    fn finish(
        &self,
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<DeploydConfig> {
        let config = builder
            .add_source(
                EnvSource::with_prefix(&self.env_prefix)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let deployd: DeploydConfig = config.try_deserialize()?;
        deployd.validate()?;

        debug!(
            environments = deployd.environments.len(),
            mode = ?deployd.execution.mode,
            "Configuration loaded"
        );
        Ok(deployd)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
