//! Spawning managed processes

use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

use crate::{
    child::{ManagedChild, ProcessOutput},
    config::ProcessConfig,
    error::{ProcessError, Result},
};

/// Stateless entry point for starting processes
#[derive(Debug, Clone, Default)]
pub struct ProcessManager;

impl ProcessManager {
    pub fn new() -> Self {
        Self
    }

    /// Spawn a managed process
    ///
    /// The child gets a null stdin and, on Unix, its own process group so the
    /// whole tree can be signalled on timeout.
    ///
    /// # Examples
    /// ```no_run
    /// use deployd_process::{ProcessManager, ProcessConfig};
    ///
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let manager = ProcessManager::new();
    /// let config = ProcessConfig::new("echo").args(["hello"]);
    /// let child = manager.spawn(config).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn spawn(&self, config: ProcessConfig) -> Result<ManagedChild> {
        config.validate()?;

        debug!(
            command = %config.command,
            args = ?config.args,
            "Spawning process"
        );

        let mut cmd = Command::new(&config.command);
        cmd.args(&config.args).envs(&config.env);
        if let Some(dir) = &config.working_dir {
            cmd.current_dir(dir);
        }

        let output = || {
            if config.capture_output {
                Stdio::piped()
            } else {
                Stdio::null()
            }
        };
        cmd.stdin(Stdio::null())
            .stdout(output())
            .stderr(output())
            .kill_on_drop(true);

        #[cfg(unix)]
        cmd.process_group(0);

        let child = cmd.spawn().map_err(|source| ProcessError::SpawnFailed {
            command: config.command.clone(),
            source,
        })?;

        info!(
            pid = child.id().unwrap_or(0),
            command = %config.command,
            "Process spawned"
        );

        Ok(ManagedChild::new(child, config))
    }

    /// Spawn a process and wait for it, capturing its output
    pub async fn run(&self, config: ProcessConfig) -> Result<ProcessOutput> {
        self.spawn(config).await?.wait_with_output().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_spawn_echo() {
        let manager = ProcessManager::new();
        let config = ProcessConfig::new("echo").args(["hello"]);

        let child = manager.spawn(config).await.unwrap();
        assert!(child.pid() > 0);
    }

    #[tokio::test]
    async fn test_spawn_missing_binary_fails() {
        let manager = ProcessManager::new();
        let config = ProcessConfig::new("deployd-definitely-not-a-binary");

        let err = manager.spawn(config).await.unwrap_err();
        assert!(matches!(err, ProcessError::SpawnFailed { .. }));
    }

    #[tokio::test]
    async fn test_run_passes_environment() {
        let manager = ProcessManager::new();
        let config = ProcessConfig::new("sh")
            .args(["-c", "printf '%s' \"$DEPLOYD_TEST_VALUE\""])
            .env("DEPLOYD_TEST_VALUE", "from-env");

        let output = manager.run(config).await.unwrap();
        assert_eq!(output.stdout, b"from-env");
    }
}
