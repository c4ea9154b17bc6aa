//! Dispatcher owning every environment actor
//!
//! The dispatcher is the producer-facing entry point. It holds the shared
//! registry, result sink and optional worker pool, starts one actor per
//! environment, routes events by environment name and shuts everything down
//! in order: inboxes first, then actors, then the pool.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use deployd_process::TERM_GRACE;

use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::{
    action::ProcessBackend,
    config::{DeploydConfig, ExecutionMode, SinkKind},
    environment::{
        spawn_environment, ActorSettings, DispatchStats, EnvironmentHandle, EnvironmentReport,
        EnvironmentState, ExecutionStrategy,
    },
    error::{DispatchError, Result},
    pool::WorkerPool,
    registry::ActionRegistry,
    sink::{JsonLinesSink, LogSink, ResultSink},
    store::KvStore,
    types::Event,
};

/// Extra time the actor grants a backend that enforces its own limit, so the
/// backend's process-group kill finishes before the actor gives up
pub const KILL_HEADROOM: Duration = TERM_GRACE.saturating_add(Duration::from_secs(1));

struct RunningEnvironment {
    handle: EnvironmentHandle,
    task: JoinHandle<EnvironmentReport>,
}

/// Routes events to per-environment actors
pub struct Dispatcher {
    registry: Arc<ActionRegistry>,
    sink: Arc<dyn ResultSink>,
    settings: ActorSettings,
    environments: BTreeMap<String, RunningEnvironment>,
}

impl Dispatcher {
    /// Create a dispatcher with no environments
    ///
    /// `settings` is used for every environment added later. A pool in
    /// `settings.strategy` is shared by all of them.
    pub fn new(
        registry: Arc<ActionRegistry>,
        sink: Arc<dyn ResultSink>,
        settings: ActorSettings,
    ) -> Self {
        Self {
            registry,
            sink,
            settings,
            environments: BTreeMap::new(),
        }
    }

    /// Build a dispatcher from configuration
    ///
    /// Uses the default registry on top of `backend`, opens the configured
    /// result sink and starts every configured environment. Must be called
    /// from within a tokio runtime.
    pub async fn from_config(
        config: &DeploydConfig,
        backend: Arc<dyn ProcessBackend>,
    ) -> Result<Self> {
        config.validate()?;

        let action_timeout = actor_timeout(config.action_timeout(), backend.enforced_timeout());
        let registry = ActionRegistry::with_defaults(backend)?;

        let sink: Arc<dyn ResultSink> = match config.results.sink {
            SinkKind::Log => Arc::new(LogSink),
            SinkKind::Jsonl => {
                let path = config.results.path.as_ref().ok_or_else(|| {
                    DispatchError::InvalidConfiguration(
                        "results.path is required for the jsonl sink".to_string(),
                    )
                })?;
                Arc::new(JsonLinesSink::open(path).await?)
            }
        };

        let strategy = match config.execution.mode {
            ExecutionMode::Inline => ExecutionStrategy::Inline,
            ExecutionMode::Pool => ExecutionStrategy::Pool(WorkerPool::new(config.execution.workers)?),
        };

        let settings = ActorSettings {
            inbox_capacity: config.inbox_capacity,
            action_timeout,
            strategy,
        };

        let mut dispatcher = Self::new(registry, sink, settings);
        for env in &config.environments {
            dispatcher.add_environment(env.name.clone(), env.data.clone())?;
        }

        info!(
            environments = dispatcher.environments.len(),
            mode = ?config.execution.mode,
            action_timeout_ms = action_timeout.map(|t| t.as_millis() as u64),
            "Dispatcher started"
        );
        Ok(dispatcher)
    }

    /// Start an actor for a new environment
    ///
    /// The returned handle borrows the dispatcher; clone it only for
    /// producers that are dropped before [`Dispatcher::shutdown`], since a
    /// live clone keeps the inbox open and the drain waiting.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::DuplicateEnvironment`] when the name is
    /// taken and [`DispatchError::InvalidConfiguration`] when it is empty.
    pub fn add_environment(
        &mut self,
        name: impl Into<String>,
        data: KvStore,
    ) -> Result<&EnvironmentHandle> {
        let slot = match self.environments.entry(name.into()) {
            Entry::Occupied(taken) => {
                return Err(DispatchError::DuplicateEnvironment(taken.key().clone()))
            }
            Entry::Vacant(slot) => slot,
        };

        let (handle, task) = spawn_environment(
            EnvironmentState::new(slot.key().clone(), data),
            self.registry.clone(),
            self.sink.clone(),
            self.settings.clone(),
        )?;

        Ok(&slot.insert(RunningEnvironment { handle, task }).handle)
    }

    /// Producer handle of an environment
    ///
    /// Clones of the handle keep the environment's inbox open, so drop them
    /// before calling [`Dispatcher::shutdown`].
    pub fn handle(&self, name: &str) -> Result<&EnvironmentHandle> {
        self.environments
            .get(name)
            .map(|env| &env.handle)
            .ok_or_else(|| DispatchError::EnvironmentNotFound(name.to_string()))
    }

    /// Enqueue an event for one environment, waiting while its inbox is full
    pub async fn submit(&self, name: &str, event: Event) -> Result<()> {
        self.handle(name)?.send(event).await
    }

    /// Enqueue an event for one environment without waiting
    pub fn try_submit(&self, name: &str, event: Event) -> Result<()> {
        self.handle(name)?.try_send(event)
    }

    /// Enqueue a copy of the event for every environment
    ///
    /// Returns the number of environments that accepted it.
    pub async fn broadcast(&self, event: Event) -> usize {
        let mut accepted = 0;
        for (name, env) in &self.environments {
            match env.handle.send(event.clone()).await {
                Ok(()) => accepted += 1,
                Err(e) => warn!(environment = %name, event_id = %event.id(), error = %e, "Broadcast rejected"),
            }
        }
        accepted
    }

    /// Names of all environments, sorted
    pub fn environment_names(&self) -> Vec<String> {
        self.environments.keys().cloned().collect()
    }

    pub fn registry(&self) -> &Arc<ActionRegistry> {
        &self.registry
    }

    /// Current counters of every environment, sorted by name
    pub fn reports(&self) -> Vec<EnvironmentReport> {
        self.environments
            .values()
            .map(|env| env.handle.report())
            .collect()
    }

    /// Stop accepting events and wait for all work to finish
    ///
    /// Closes every inbox, waits for each actor to drain its queue, then
    /// waits for pooled actions still in flight. No queued event or running
    /// action is dropped.
    pub async fn shutdown(self) -> Vec<EnvironmentReport> {
        info!(environments = self.environments.len(), "Shutting down dispatcher");

        let mut finished: Vec<(String, Arc<DispatchStats>)> = Vec::new();
        let mut tasks = Vec::new();
        for (name, env) in self.environments {
            finished.push((name.clone(), env.handle.stats()));
            drop(env.handle);
            tasks.push((name, env.task));
        }

        for (name, task) in tasks {
            if let Err(e) = task.await {
                error!(environment = %name, error = %e, "Environment actor panicked");
            }
        }

        if let ExecutionStrategy::Pool(pool) = &self.settings.strategy {
            pool.shutdown().await;
        }

        let reports: Vec<EnvironmentReport> = finished
            .into_iter()
            .map(|(name, stats)| stats.snapshot(&name))
            .collect();

        info!(environments = reports.len(), "Dispatcher stopped");
        reports
    }
}

/// Actor-level limit for one action
///
/// When the backend kills overrunning commands itself, the actor waits
/// [`KILL_HEADROOM`] past the backend's limit. Cancelling the backend's
/// future mid-kill would leave the rest of the process group running.
fn actor_timeout(configured: Option<Duration>, enforced: Option<Duration>) -> Option<Duration> {
    match (configured, enforced) {
        (Some(limit), Some(backend)) => Some(limit.max(backend.saturating_add(KILL_HEADROOM))),
        (limit, _) => limit,
    }
}
