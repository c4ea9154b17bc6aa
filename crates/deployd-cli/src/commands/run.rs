//! `deployd run`: feed stdin events to the dispatcher until EOF or Ctrl-C

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use deployd_dispatch::{DeploydConfig, Dispatcher, EnvironmentReport, ManagedProcessBackend};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use super::load_config;
use crate::{
    error::{CliError, CliResult},
    input::parse_line,
};

/// Runs the dispatcher against stdin
#[derive(Debug)]
pub struct RunCommand {
    config: Option<PathBuf>,
}

/// Counters of one input pump
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PumpStats {
    /// Lines holding an event
    pub events: usize,
    /// Deliveries accepted by an environment inbox
    pub delivered: usize,
    /// Lines that could not be parsed or delivered anywhere
    pub rejected: usize,
}

impl RunCommand {
    pub fn new(config: Option<PathBuf>) -> Self {
        Self { config }
    }

    pub async fn execute(&self) -> CliResult<()> {
        let (path, config) = load_config(self.config.clone())?;

        let dispatcher = Dispatcher::from_config(&config, Arc::new(process_backend(&config))).await?;
        info!(
            config = %path.display(),
            environments = ?dispatcher.environment_names(),
            "Reading events from stdin"
        );

        tokio::select! {
            result = pump(BufReader::new(tokio::io::stdin()), &dispatcher) => {
                let stats = result?;
                info!(
                    events = stats.events,
                    delivered = stats.delivered,
                    rejected = stats.rejected,
                    "Input closed"
                );
            }
            _ = tokio::signal::ctrl_c() => {
                warn!("Interrupted, draining queued events (interrupt again to abandon them)");
            }
        }

        let reports = drain(dispatcher, tokio::signal::ctrl_c()).await?;
        print_reports(&reports)?;
        Ok(())
    }
}

/// Process backend for `config`
///
/// The backend enforces `action_timeout_ms` itself so an overrunning deploy
/// gets its whole process group killed.
pub fn process_backend(config: &DeploydConfig) -> ManagedProcessBackend {
    let backend = ManagedProcessBackend::new();
    match config.action_timeout() {
        Some(limit) => backend.with_timeout(limit),
        None => backend,
    }
}

/// Shut the dispatcher down unless `abort` resolves first
///
/// Aborting drops the drain; actions still running are cancelled when the
/// runtime goes away and their results are never recorded.
pub async fn drain<F>(dispatcher: Dispatcher, abort: F) -> CliResult<Vec<EnvironmentReport>>
where
    F: Future,
{
    tokio::select! {
        reports = dispatcher.shutdown() => Ok(reports),
        _ = abort => {
            warn!("Interrupted again, abandoning queued and running actions");
            Err(CliError::Interrupted)
        }
    }
}

/// Route every line of `reader` to the dispatcher
///
/// Bad lines and undeliverable events are logged and counted; only a read
/// error stops the pump.
pub async fn pump<R>(reader: R, dispatcher: &Dispatcher) -> CliResult<PumpStats>
where
    R: AsyncBufRead + Unpin,
{
    let mut stats = PumpStats::default();
    let mut lines = reader.lines();
    let mut line_no = 0;

    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        let inbound = match parse_line(line_no, &line) {
            Ok(Some(inbound)) => inbound,
            Ok(None) => continue,
            Err(e) => {
                warn!(line = line_no, error = %e, "Skipping input line");
                stats.rejected += 1;
                continue;
            }
        };

        stats.events += 1;
        match inbound.into_event() {
            (Some(environment), event) => match dispatcher.submit(&environment, event).await {
                Ok(()) => stats.delivered += 1,
                Err(e) => {
                    warn!(line = line_no, environment = %environment, error = %e, "Event not delivered");
                    stats.rejected += 1;
                }
            },
            (None, event) => {
                let accepted = dispatcher.broadcast(event).await;
                if accepted == 0 {
                    warn!(line = line_no, "No environment accepted the event");
                    stats.rejected += 1;
                }
                stats.delivered += accepted;
            }
        }
    }

    Ok(stats)
}

/// Print one JSON report per environment on stdout
pub fn print_reports(reports: &[EnvironmentReport]) -> CliResult<()> {
    for report in reports {
        println!("{}", serde_json::to_string(report)?);
    }
    Ok(())
}
