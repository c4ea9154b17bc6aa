//! Deployable environments and their event inboxes
//!
//! Each environment runs as one actor task that owns the environment's
//! state. Producers only ever hold an [`EnvironmentHandle`], the sending
//! half of a bounded inbox, so events for one environment are processed
//! strictly one at a time in arrival order while different environments
//! proceed independently.

pub mod actor;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::info;

use crate::{
    error::{DispatchError, Result},
    pool::WorkerPool,
    registry::ActionRegistry,
    sink::ResultSink,
    store::KvStore,
    types::Event,
};

use actor::EnvironmentActor;

/// Default inbox capacity per environment
pub const DEFAULT_INBOX_CAPACITY: usize = 64;

/// State owned exclusively by an environment's actor
#[derive(Debug, Clone)]
pub struct EnvironmentState {
    name: String,
    data: KvStore,
}

impl EnvironmentState {
    pub fn new(name: impl Into<String>, data: KvStore) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Configuration and bookkeeping data of the environment
    pub fn data(&self) -> &KvStore {
        &self.data
    }

    pub(crate) fn data_mut(&mut self) -> &mut KvStore {
        &mut self.data
    }
}

/// Where eligible actions run
#[derive(Debug, Clone, Default)]
pub enum ExecutionStrategy {
    /// Run each action inside the actor before looking at the next one
    #[default]
    Inline,
    /// Run actions on a pool shared by all environments
    Pool(WorkerPool),
}

/// Per-actor tuning
#[derive(Debug, Clone)]
pub struct ActorSettings {
    /// Inbox capacity; producers wait (or are rejected) beyond it
    pub inbox_capacity: usize,
    /// Upper bound on a single action run; `None` disables the limit
    pub action_timeout: Option<Duration>,
    pub strategy: ExecutionStrategy,
}

impl Default for ActorSettings {
    fn default() -> Self {
        Self {
            inbox_capacity: DEFAULT_INBOX_CAPACITY,
            action_timeout: None,
            strategy: ExecutionStrategy::Inline,
        }
    }
}

/// Live counters for one environment
#[derive(Debug, Default)]
pub struct DispatchStats {
    pub(crate) events_processed: AtomicU64,
    pub(crate) unknown_events: AtomicU64,
    pub(crate) descriptors_skipped: AtomicU64,
    pub(crate) actions_dispatched: AtomicU64,
    pub(crate) actions_succeeded: AtomicU64,
    pub(crate) actions_failed: AtomicU64,
    pub(crate) sink_failures: AtomicU64,
}

impl DispatchStats {
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, name: &str) -> EnvironmentReport {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        EnvironmentReport {
            name: name.to_string(),
            events_processed: load(&self.events_processed),
            unknown_events: load(&self.unknown_events),
            descriptors_skipped: load(&self.descriptors_skipped),
            actions_dispatched: load(&self.actions_dispatched),
            actions_succeeded: load(&self.actions_succeeded),
            actions_failed: load(&self.actions_failed),
            sink_failures: load(&self.sink_failures),
        }
    }
}

/// Snapshot of an environment's counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EnvironmentReport {
    pub name: String,
    /// Events taken from the inbox, including unknown ones
    pub events_processed: u64,
    /// Events whose type had no registered descriptors
    pub unknown_events: u64,
    /// Descriptors whose check chain failed
    pub descriptors_skipped: u64,
    /// Actions a factory was asked to build
    pub actions_dispatched: u64,
    /// Actions that ran and produced a result
    pub actions_succeeded: u64,
    /// Actions that failed to build, run, or finish in time
    pub actions_failed: u64,
    /// Results the sink refused
    pub sink_failures: u64,
}

/// Producer-side handle to an environment's inbox
#[derive(Debug, Clone)]
pub struct EnvironmentHandle {
    name: Arc<str>,
    sender: mpsc::Sender<Event>,
    stats: Arc<DispatchStats>,
    capacity: usize,
}

impl EnvironmentHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Enqueue an event, waiting while the inbox is full
    pub async fn send(&self, event: Event) -> Result<()> {
        self.sender
            .send(event)
            .await
            .map_err(|_| DispatchError::InboxClosed(self.name.to_string()))
    }

    /// Enqueue an event, rejecting it when the inbox is full
    pub fn try_send(&self, event: Event) -> Result<()> {
        self.sender.try_send(event).map_err(|e| match e {
            TrySendError::Full(_) => DispatchError::InboxFull {
                environment: self.name.to_string(),
                capacity: self.capacity,
            },
            TrySendError::Closed(_) => DispatchError::InboxClosed(self.name.to_string()),
        })
    }

    pub(crate) fn stats(&self) -> Arc<DispatchStats> {
        self.stats.clone()
    }

    /// Whether the actor has stopped
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Current counters
    ///
    /// Pooled actions keep updating these after the actor itself stopped.
    pub fn report(&self) -> EnvironmentReport {
        self.stats.snapshot(&self.name)
    }
}

/// Start an environment actor
///
/// The actor runs until every [`EnvironmentHandle`] clone has been dropped
/// and the inbox is drained; the returned join handle then resolves to the
/// environment's final report.
///
/// # Errors
///
/// Returns [`DispatchError::InvalidConfiguration`] for an empty name or a
/// zero inbox capacity.
pub fn spawn_environment(
    state: EnvironmentState,
    registry: Arc<ActionRegistry>,
    sink: Arc<dyn ResultSink>,
    settings: ActorSettings,
) -> Result<(EnvironmentHandle, JoinHandle<EnvironmentReport>)> {
    if state.name().trim().is_empty() {
        return Err(DispatchError::InvalidConfiguration(
            "environment name must not be empty".to_string(),
        ));
    }
    if settings.inbox_capacity == 0 {
        return Err(DispatchError::InvalidConfiguration(
            "inbox capacity must be greater than zero".to_string(),
        ));
    }

    let (sender, inbox) = mpsc::channel(settings.inbox_capacity);
    let stats = Arc::new(DispatchStats::default());
    let handle = EnvironmentHandle {
        name: Arc::from(state.name()),
        sender,
        stats: stats.clone(),
        capacity: settings.inbox_capacity,
    };

    info!(
        environment = %state.name(),
        inbox_capacity = settings.inbox_capacity,
        pooled = matches!(settings.strategy, ExecutionStrategy::Pool(_)),
        "Starting environment actor"
    );

    let actor = EnvironmentActor::new(state, inbox, registry, sink, settings, stats);
    let task = tokio::spawn(actor.run());

    Ok((handle, task))
}
