// CLI error types

use deployd_dispatch::DispatchError;
use thiserror::Error;

/// CLI-specific errors
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Invalid input on line {line}: {reason}")]
    InvalidInput { line: usize, reason: String },

    #[error("Interrupted while draining environments")]
    Interrupted,

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Get a user-friendly error message with suggestions
    pub fn user_message(&self) -> String {
        match self {
            CliError::InvalidInput { line, reason } => format!(
                "Line {} is not a valid event: {}\n\nExpected: {{\"type\": \"push\", \"environment\": \"prod\", \"data\": {{\"git-branch\": \"main\"}}}}",
                line, reason
            ),
            CliError::Interrupted => {
                "Interrupted twice; in-flight deploy actions were abandoned and their results are lost.".to_string()
            }
            CliError::Dispatch(DispatchError::Config(e)) => {
                format!("Failed to load configuration: {}\n\nRun 'deployd check' to validate your configuration.", e)
            }
            other => other.to_string(),
        }
    }
}

impl CliError {
    /// Process exit status for this error
    pub fn exit_code(&self) -> u8 {
        match self {
            CliError::Interrupted => 130,
            _ => 1,
        }
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;
