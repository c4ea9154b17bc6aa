//! Dispatcher configuration
//!
//! A configuration file describes the environments to start, how their
//! inboxes are sized, how long a single action may run, where actions run
//! and where results go:
//!
//! ```yaml
//! inbox_capacity: 64
//! action_timeout_ms: 600000
//! execution:
//!   mode: pool
//!   workers: 4
//! results:
//!   sink: jsonl
//!   path: /var/lib/deployd/results.jsonl
//! environments:
//!   - name: prod
//!     data:
//!       git-branch: main
//!       deploy-command: ./scripts/deploy.sh
//! ```

pub mod loader;

pub use loader::ConfigLoader;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{
    environment::DEFAULT_INBOX_CAPACITY,
    error::{DispatchError, Result},
    store::KvStore,
};

/// Default upper bound on a single action run (10 minutes)
pub const DEFAULT_ACTION_TIMEOUT_MS: u64 = 600_000;

/// Default number of pooled workers
pub const DEFAULT_WORKERS: usize = 4;

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploydConfig {
    #[serde(default = "default_inbox_capacity")]
    pub inbox_capacity: usize,

    /// Per-action limit in milliseconds; `0` disables the limit
    #[serde(default = "default_action_timeout_ms")]
    pub action_timeout_ms: u64,

    #[serde(default)]
    pub execution: ExecutionConfig,

    #[serde(default)]
    pub results: ResultsConfig,

    #[serde(default)]
    pub environments: Vec<EnvironmentConfig>,
}

impl Default for DeploydConfig {
    fn default() -> Self {
        Self {
            inbox_capacity: DEFAULT_INBOX_CAPACITY,
            action_timeout_ms: DEFAULT_ACTION_TIMEOUT_MS,
            execution: ExecutionConfig::default(),
            results: ResultsConfig::default(),
            environments: Vec::new(),
        }
    }
}

impl DeploydConfig {
    /// Load and validate a configuration file
    ///
    /// See [`ConfigLoader::load`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        ConfigLoader::new().load(path)
    }

    /// Action limit as a duration, `None` when disabled
    pub fn action_timeout(&self) -> Option<Duration> {
        (self.action_timeout_ms > 0).then(|| Duration::from_millis(self.action_timeout_ms))
    }

    /// Check the values serde cannot check
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::InvalidConfiguration`] when the inbox
    /// capacity is zero, pool mode has no workers, a jsonl sink has no path,
    /// or environment names are empty or repeated.
    pub fn validate(&self) -> Result<()> {
        if self.inbox_capacity == 0 {
            return Err(DispatchError::InvalidConfiguration(
                "inbox_capacity must be greater than 0".to_string(),
            ));
        }

        if self.execution.mode == ExecutionMode::Pool && self.execution.workers == 0 {
            return Err(DispatchError::InvalidConfiguration(
                "execution.workers must be greater than 0 in pool mode".to_string(),
            ));
        }

        if self.results.sink == SinkKind::Jsonl && self.results.path.is_none() {
            return Err(DispatchError::InvalidConfiguration(
                "results.path is required for the jsonl sink".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for env in &self.environments {
            if env.name.trim().is_empty() {
                return Err(DispatchError::InvalidConfiguration(
                    "environment names must not be empty".to_string(),
                ));
            }
            if !seen.insert(env.name.as_str()) {
                return Err(DispatchError::InvalidConfiguration(format!(
                    "duplicate environment name: {}",
                    env.name
                )));
            }
        }

        Ok(())
    }
}

/// Where actions run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Inside the environment actor, one at a time
    #[default]
    Inline,
    /// On a worker pool shared by all environments
    Pool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionConfig {
    #[serde(default)]
    pub mode: ExecutionMode,

    /// Pool size; ignored in inline mode
    #[serde(default = "default_workers")]
    pub workers: usize,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::Inline,
            workers: DEFAULT_WORKERS,
        }
    }
}

/// Result sink selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    #[default]
    Log,
    Jsonl,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultsConfig {
    #[serde(default)]
    pub sink: SinkKind,

    /// Output file for the jsonl sink
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// One deployable environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    pub name: String,

    #[serde(default)]
    pub data: KvStore,
}

fn default_inbox_capacity() -> usize {
    DEFAULT_INBOX_CAPACITY
}

fn default_action_timeout_ms() -> u64 {
    DEFAULT_ACTION_TIMEOUT_MS
}

fn default_workers() -> usize {
    DEFAULT_WORKERS
}
