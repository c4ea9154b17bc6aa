//! Error types for process management

use std::io;
use thiserror::Error;

/// Process management errors
#[derive(Debug, Error)]
pub enum ProcessError {
    /// Failed to spawn process
    #[error("Failed to spawn process '{command}': {source}")]
    SpawnFailed {
        command: String,
        #[source]
        source: io::Error,
    },

    /// Process timed out
    #[error("Process timed out after {millis}ms")]
    Timeout { millis: u64 },

    /// Reading output or waiting on the process failed
    #[error("Process I/O error: {0}")]
    Io(#[from] io::Error),

    /// Failed to kill process
    #[error("Failed to kill process: {0}")]
    KillFailed(String),

    /// Invalid configuration
    #[error("Invalid process configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for process operations
pub type Result<T> = std::result::Result<T, ProcessError>;
