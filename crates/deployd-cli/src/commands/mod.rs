// Command handlers for the deployd CLI

pub mod check;
pub mod registry;
pub mod run;

pub use check::CheckCommand;
pub use registry::RegistryCommand;
pub use run::RunCommand;

use std::path::PathBuf;

use deployd_dispatch::{ConfigLoader, DeploydConfig};
use tracing::info;

use crate::error::CliResult;

/// Resolve the configuration path and load it
pub(crate) fn load_config(path: Option<PathBuf>) -> CliResult<(PathBuf, DeploydConfig)> {
    let path = path.unwrap_or_else(ConfigLoader::default_path);
    info!(path = %path.display(), "Loading configuration");
    let config = DeploydConfig::load(&path)?;
    Ok((path, config))
}
