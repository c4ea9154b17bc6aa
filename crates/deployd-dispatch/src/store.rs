//! String key-value store carried by events and environments
//!
//! The store is untyped at the boundary and producers may attach
//! arbitrary keys. Keys the engine itself relies on are named by
//! [`WellKnownKey`] and read through the typed accessors on [`KvStore`].

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Keys with a meaning to checks, factories or the actor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WellKnownKey {
    /// Branch a push was made to, or the branch an environment deploys from
    GitBranch,
    /// Commit identifier of a push
    GitCommit,
    /// Program an environment runs to deploy
    DeployCommand,
    /// Whitespace-separated arguments for the deploy command
    DeployArgs,
    /// Working directory for the deploy command
    DeployDir,
    /// Name of the environment a dispatch is for
    Environment,
    /// Identifier of the event being dispatched
    EventId,
    /// Wire name of the event type being dispatched
    EventType,
    /// Identifier of the last event an environment finished processing
    LastEventId,
}

impl WellKnownKey {
    /// Wire name of the key
    pub fn as_str(self) -> &'static str {
        match self {
            Self::GitBranch => "git-branch",
            Self::GitCommit => "git-commit",
            Self::DeployCommand => "deploy-command",
            Self::DeployArgs => "deploy-args",
            Self::DeployDir => "deploy-dir",
            Self::Environment => "environment",
            Self::EventId => "event-id",
            Self::EventType => "event-type",
            Self::LastEventId => "last-event-id",
        }
    }
}

impl fmt::Display for WellKnownKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Prefix under which event keys are copied into dispatch options
pub const EVENT_KEY_PREFIX: &str = "event.";

/// Unordered string-to-string map with last-writer-wins updates
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KvStore {
    entries: HashMap<String, String>,
}

impl KvStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// Look up a key
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Look up a key, falling back to `default` when it is absent
    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    /// Insert or overwrite a key
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Look up a well-known key
    pub fn known(&self, key: WellKnownKey) -> Option<&str> {
        self.get(key.as_str())
    }

    /// Look up a well-known key, treating an empty value as absent
    pub fn known_non_empty(&self, key: WellKnownKey) -> Option<&str> {
        self.known(key).filter(|v| !v.is_empty())
    }

    /// Insert or overwrite a well-known key
    pub fn set_known(&mut self, key: WellKnownKey, value: impl Into<String>) {
        self.set(key.as_str(), value);
    }

    /// Non-empty `git-branch` value
    pub fn git_branch(&self) -> Option<&str> {
        self.known_non_empty(WellKnownKey::GitBranch)
    }

    /// Non-empty `deploy-command` value
    pub fn deploy_command(&self) -> Option<&str> {
        self.known_non_empty(WellKnownKey::DeployCommand)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over entries in no particular order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K, V> FromIterator<(K, V)> for KvStore
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl From<HashMap<String, String>> for KvStore {
    fn from(entries: HashMap<String, String>) -> Self {
        Self { entries }
    }
}
