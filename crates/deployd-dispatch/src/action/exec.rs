//! External process execution action

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use deployd_process::{ProcessConfig, ProcessError, ProcessManager};
use serde::{Serialize, Serializer};
use tracing::{debug, info};

use super::{Action, ActionResult};
use crate::{
    error::{DispatchError, Result},
    types::ActionKind,
};

/// Command line to execute
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandRequest {
    /// Program to run
    pub command: String,
    /// Program arguments
    pub args: Vec<String>,
    /// Extra environment variables for the child
    pub env: BTreeMap<String, String>,
    /// Working directory (None = current dir)
    pub working_dir: Option<PathBuf>,
}

impl CommandRequest {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Self::default()
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }
}

/// Captured output of an executed command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when the process was terminated by a signal
    pub exit_code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub duration_ms: u64,
}

/// Runs external commands on behalf of [`ExecAction`]
///
/// Implementations return an error only when the command could not be
/// started or did not finish in time; exit codes are reported in the
/// [`CommandOutput`].
#[async_trait]
pub trait ProcessBackend: Send + Sync + fmt::Debug {
    async fn execute(&self, request: &CommandRequest) -> Result<CommandOutput>;

    /// Time limit the backend applies to each command, including its own
    /// cleanup of an overrunning one
    fn enforced_timeout(&self) -> Option<Duration> {
        None
    }
}

/// [`ProcessBackend`] that spawns real processes through [`ProcessManager`]
#[derive(Debug, Clone, Default)]
pub struct ManagedProcessBackend {
    manager: ProcessManager,
    timeout: Option<Duration>,
}

impl ManagedProcessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Kill commands that run longer than `timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[async_trait]
impl ProcessBackend for ManagedProcessBackend {
    async fn execute(&self, request: &CommandRequest) -> Result<CommandOutput> {
        let mut config = ProcessConfig::new(&request.command)
            .args(request.args.iter().cloned())
            .envs(request.env.iter().map(|(k, v)| (k.clone(), v.clone())));
        if let Some(dir) = &request.working_dir {
            config = config.working_dir(dir);
        }
        if let Some(timeout) = self.timeout {
            config = config.timeout(timeout);
        }

        let output = self.manager.run(config).await.map_err(|e| match e {
            ProcessError::Timeout { millis } => DispatchError::Timeout(millis),
            other => DispatchError::Process(other),
        })?;

        Ok(CommandOutput {
            exit_code: output.code(),
            stdout: output.stdout,
            stderr: output.stderr,
            duration_ms: output.duration.as_millis() as u64,
        })
    }

    fn enforced_timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

/// Action that executes one external command
#[derive(Clone)]
pub struct ExecAction {
    kind: ActionKind,
    request: CommandRequest,
    backend: Arc<dyn ProcessBackend>,
}

impl ExecAction {
    pub fn new(kind: ActionKind, request: CommandRequest, backend: Arc<dyn ProcessBackend>) -> Self {
        Self {
            kind,
            request,
            backend,
        }
    }

    /// Command line this action will run
    pub fn request(&self) -> &CommandRequest {
        &self.request
    }
}

impl fmt::Debug for ExecAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecAction")
            .field("kind", &self.kind)
            .field("command", &self.request.command)
            .field("args", &self.request.args)
            .finish()
    }
}

#[async_trait]
impl Action for ExecAction {
    fn kind(&self) -> ActionKind {
        self.kind
    }

    async fn run(&self) -> Result<Box<dyn ActionResult>> {
        debug!(
            command = %self.request.command,
            args = ?self.request.args,
            "Executing command action"
        );

        let output = self.backend.execute(&self.request).await?;
        let result = ExecResult::new(&self.request, output);

        info!(
            command = %result.command,
            exit_code = ?result.exit_code,
            duration_ms = result.duration_ms,
            "Command finished"
        );

        Ok(Box::new(result))
    }
}

/// Whether an executed command exited successfully
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecStatus {
    Succeeded,
    Failed,
}

/// Result of an [`ExecAction`]
#[derive(Debug, Clone, Serialize)]
pub struct ExecResult {
    pub command: String,
    pub args: Vec<String>,
    pub exit_code: Option<i32>,
    pub status: ExecStatus,
    #[serde(serialize_with = "lossy_utf8")]
    pub stdout: Vec<u8>,
    #[serde(serialize_with = "lossy_utf8")]
    pub stderr: Vec<u8>,
    pub duration_ms: u64,
}

impl ExecResult {
    fn new(request: &CommandRequest, output: CommandOutput) -> Self {
        let status = if output.exit_code == Some(0) {
            ExecStatus::Succeeded
        } else {
            ExecStatus::Failed
        };
        Self {
            command: request.command.clone(),
            args: request.args.clone(),
            exit_code: output.exit_code,
            status,
            stdout: output.stdout,
            stderr: output.stderr,
            duration_ms: output.duration_ms,
        }
    }
}

impl ActionResult for ExecResult {
    fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    fn summary(&self) -> String {
        match self.exit_code {
            Some(code) => format!("'{}' exited with code {}", self.command, code),
            None => format!("'{}' was terminated by a signal", self.command),
        }
    }
}

fn lossy_utf8<S: Serializer>(bytes: &[u8], serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&String::from_utf8_lossy(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct FixedBackend(Option<i32>);

    #[async_trait]
    impl ProcessBackend for FixedBackend {
        async fn execute(&self, _request: &CommandRequest) -> Result<CommandOutput> {
            Ok(CommandOutput {
                exit_code: self.0,
                stdout: b"deployed\n".to_vec(),
                stderr: vec![0xff, b'!'],
                duration_ms: 7,
            })
        }
    }

    #[derive(Debug)]
    struct BrokenBackend;

    #[async_trait]
    impl ProcessBackend for BrokenBackend {
        async fn execute(&self, request: &CommandRequest) -> Result<CommandOutput> {
            Err(DispatchError::ExecutionFailed(format!(
                "cannot start '{}'",
                request.command
            )))
        }
    }

    fn action(backend: Arc<dyn ProcessBackend>) -> ExecAction {
        ExecAction::new(
            ActionKind::Deploy,
            CommandRequest::new("deploy.sh").args(["--fast"]),
            backend,
        )
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_a_result_not_an_error() {
        let result = action(Arc::new(FixedBackend(Some(2)))).run().await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&result.to_bytes().unwrap()).unwrap();

        assert_eq!(json["status"], "failed");
        assert_eq!(json["exit_code"], 2);
        assert_eq!(result.summary(), "'deploy.sh' exited with code 2");
    }

    #[tokio::test]
    async fn test_result_serializes_output_lossily() {
        let result = action(Arc::new(FixedBackend(Some(0)))).run().await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&result.to_bytes().unwrap()).unwrap();

        assert_eq!(json["status"], "succeeded");
        assert_eq!(json["stdout"], "deployed\n");
        assert_eq!(json["stderr"], "\u{fffd}!");
        assert_eq!(json["args"], serde_json::json!(["--fast"]));
    }

    #[tokio::test]
    async fn test_backend_error_propagates() {
        let err = action(Arc::new(BrokenBackend)).run().await.unwrap_err();
        assert!(matches!(err, DispatchError::ExecutionFailed(_)));
    }

    #[tokio::test]
    async fn test_managed_backend_runs_real_process() {
        let backend = ManagedProcessBackend::new();
        let mut request = CommandRequest::new("sh").args(["-c", "echo \"$GREETING\"; exit 4"]);
        request.env.insert("GREETING".to_string(), "hi".to_string());

        let output = backend.execute(&request).await.unwrap();
        assert_eq!(output.exit_code, Some(4));
        assert_eq!(output.stdout, b"hi\n");
    }

    #[tokio::test]
    async fn test_managed_backend_maps_timeout() {
        let backend = ManagedProcessBackend::new().with_timeout(Duration::from_millis(50));
        let request = CommandRequest::new("sleep").args(["5"]);

        let err = backend.execute(&request).await.unwrap_err();
        assert!(matches!(err, DispatchError::Timeout(50)));
    }

    #[tokio::test]
    async fn test_managed_backend_reports_spawn_failure() {
        let backend = ManagedProcessBackend::new();
        let request = CommandRequest::new("deployd-no-such-program");

        let err = backend.execute(&request).await.unwrap_err();
        assert!(matches!(
            err,
            DispatchError::Process(ProcessError::SpawnFailed { .. })
        ));
    }
}
