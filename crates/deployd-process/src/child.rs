//! Running children: output capture, timeouts and process-tree kills

use std::process::ExitStatus;
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Child;
#[cfg(unix)]
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::{
    config::ProcessConfig,
    error::{ProcessError, Result},
};

/// Time a process group gets between SIGTERM and SIGKILL
pub const TERM_GRACE: Duration = Duration::from_millis(200);

/// Captured outcome of a finished process
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    /// Exit status reported by the OS
    pub status: ExitStatus,
    /// Raw stdout bytes (empty when capture was disabled)
    pub stdout: Vec<u8>,
    /// Raw stderr bytes (empty when capture was disabled)
    pub stderr: Vec<u8>,
    /// Wall-clock time between spawn and exit
    pub duration: Duration,
}

impl ProcessOutput {
    /// Exit code, `None` when the process was killed by a signal
    pub fn code(&self) -> Option<i32> {
        self.status.code()
    }

    /// Whether the process exited with status zero
    pub fn success(&self) -> bool {
        self.status.success()
    }
}

/// A spawned process together with the settings it was started with
#[derive(Debug)]
pub struct ManagedChild {
    child: Child,
    config: ProcessConfig,
    pid: u32,
    started: Instant,
}

impl ManagedChild {
    pub(crate) fn new(child: Child, config: ProcessConfig) -> Self {
        let pid = child.id().unwrap_or(0);
        Self {
            child,
            config,
            pid,
            started: Instant::now(),
        }
    }

    /// OS process id, `0` if the child had already been reaped at spawn
    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn config(&self) -> &ProcessConfig {
        &self.config
    }

    /// Whether the child has not exited yet
    pub fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Wait for the process to exit while draining stdout and stderr
    ///
    /// Both pipes are read concurrently with the wait so a chatty process
    /// cannot deadlock on a full pipe. When the configured timeout elapses
    /// the process tree is killed and [`ProcessError::Timeout`] is returned.
    pub async fn wait_with_output(mut self) -> Result<ProcessOutput> {
        let stdout = self.child.stdout.take();
        let stderr = self.child.stderr.take();
        let timeout = self.config.timeout;

        let finished = {
            let collect = async {
                let (stdout, stderr, status) = tokio::join!(
                    read_stream(stdout),
                    read_stream(stderr),
                    self.child.wait()
                );
                Ok::<_, ProcessError>((status?, stdout?, stderr?))
            };

            match timeout {
                Some(limit) => tokio::time::timeout(limit, collect).await.ok(),
                None => Some(collect.await),
            }
        };

        match finished {
            Some(result) => {
                let (status, stdout, stderr) = result?;
                let duration = self.started.elapsed();
                debug!(
                    pid = self.pid,
                    exit_code = ?status.code(),
                    duration_ms = duration.as_millis() as u64,
                    "Process exited"
                );
                Ok(ProcessOutput {
                    status,
                    stdout,
                    stderr,
                    duration,
                })
            }
            None => {
                let millis = timeout.map(|t| t.as_millis() as u64).unwrap_or_default();
                warn!(
                    pid = self.pid,
                    command = %self.config.command,
                    timeout_ms = millis,
                    "Process exceeded timeout, killing process tree"
                );
                if let Err(e) = self.kill_tree().await {
                    warn!(pid = self.pid, error = %e, "Failed to kill timed out process");
                }
                Err(ProcessError::Timeout { millis })
            }
        }
    }

    /// Terminate the child and everything it started
    ///
    /// On Unix the child leads its own process group. The group gets SIGTERM,
    /// then [`TERM_GRACE`] later SIGKILL, whether or not the leader is still
    /// alive, so members that ignore SIGTERM go down too. Elsewhere only the
    /// child itself is killed. The child is reaped before returning.
    pub async fn kill_tree(&mut self) -> Result<()> {
        debug!(pid = self.pid, "Terminating process group");

        #[cfg(unix)]
        {
            use nix::errno::Errno;
            use nix::sys::signal::{killpg, Signal};
            use nix::unistd::Pid;

            let group = Pid::from_raw(self.pid as i32);
            if let Err(e) = killpg(group, Signal::SIGTERM) {
                warn!(pid = self.pid, error = %e, "SIGTERM to process group failed");
            }

            sleep(TERM_GRACE).await;

            // ESRCH: every member already exited
            match killpg(group, Signal::SIGKILL) {
                Ok(()) | Err(Errno::ESRCH) => {}
                Err(e) => {
                    warn!(pid = self.pid, error = %e, "SIGKILL to process group failed");
                    self.child
                        .start_kill()
                        .map_err(|e| ProcessError::KillFailed(e.to_string()))?;
                }
            }
        }

        #[cfg(not(unix))]
        self.child
            .start_kill()
            .map_err(|e| ProcessError::KillFailed(e.to_string()))?;

        self.child.wait().await?;
        Ok(())
    }
}

async fn read_stream<R>(stream: Option<R>) -> std::io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    if let Some(mut stream) = stream {
        stream.read_to_end(&mut buf).await?;
    }
    Ok(buf)
}
