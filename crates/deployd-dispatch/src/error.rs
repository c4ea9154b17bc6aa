//! Error types for the dispatch engine
//!
//! Nothing in this module escapes an environment actor: the actor converts
//! every failure into a log line plus a skipped dispatch. The variants exist
//! so that producers, configuration loading and the sinks can report what
//! went wrong with enough context for an operator.

use thiserror::Error;

use crate::types::ActionKind;

/// Errors that can occur while routing events and running actions
#[derive(Debug, Error)]
pub enum DispatchError {
    /// A producer supplied an event type name the engine does not know
    #[error("Unknown event type: {0}")]
    UnknownEventType(String),

    /// Invalid registry or dispatcher configuration
    ///
    /// Common causes:
    /// - A descriptor references an action kind with no registered factory
    /// - Duplicate or empty environment names
    /// - Zero inbox capacity or worker count
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// An action factory refused to build an action from the dispatch options
    #[error("Failed to construct {kind} action: {reason}")]
    ActionConstruction { kind: ActionKind, reason: String },

    /// Running an action failed
    #[error("Action execution failed: {0}")]
    ExecutionFailed(String),

    /// Running an action took longer than the configured limit
    #[error("Action timed out after {0}ms")]
    Timeout(u64),

    /// The environment's inbox is at capacity
    #[error("Inbox for environment '{environment}' is full ({capacity} events)")]
    InboxFull {
        environment: String,
        capacity: usize,
    },

    /// The environment's actor has stopped accepting events
    #[error("Environment '{0}' is no longer accepting events")]
    InboxClosed(String),

    /// No environment with this name is registered
    #[error("Environment not found: {0}")]
    EnvironmentNotFound(String),

    /// An environment with this name already exists
    #[error("Environment already exists: {0}")]
    DuplicateEnvironment(String),

    /// The result sink could not store a record
    #[error("Result sink error: {0}")]
    Sink(String),

    /// Process backend error
    #[error(transparent)]
    Process(#[from] deployd_process::ProcessError),

    /// Configuration source error
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for dispatch operations
pub type Result<T> = std::result::Result<T, DispatchError>;
