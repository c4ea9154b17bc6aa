//! deployd dispatch engine
//!
//! Turns source-control events into deployment actions, one environment at a
//! time.
//!
//! # Overview
//!
//! Producers hand [`Event`]s to a [`Dispatcher`]. Every deployable
//! environment runs as its own actor with a bounded FIFO inbox; the actor
//! looks the event type up in the [`ActionRegistry`], evaluates each
//! descriptor's eligibility checks against the environment and the event,
//! builds an [`Action`] through the descriptor's factory, runs it and hands
//! the serialized result to a [`ResultSink`].
//!
//! # Architecture
//!
//! 1. **Store** (`store`): string key-value data for events and environments
//! 2. **Registry** (`registry`): event type to ordered action descriptors
//! 3. **Checks** (`checks`): short-circuiting eligibility predicates
//! 4. **Actions** (`action`): the action/result abstraction and the deploy action
//! 5. **Environments** (`environment`): per-environment actors and their inboxes
//! 6. **Dispatcher** (`dispatcher`): owns actors, routes events, shuts down
//! 7. **Configuration** (`config`): YAML plus environment variable overrides
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use deployd_dispatch::{
//!     ActionRegistry, ActorSettings, Dispatcher, Event, EventType, KvStore, LogSink,
//!     ManagedProcessBackend,
//! };
//!
//! # async fn run() -> deployd_dispatch::Result<()> {
//! let registry = ActionRegistry::with_defaults(Arc::new(ManagedProcessBackend::new()))?;
//! let mut dispatcher = Dispatcher::new(registry, Arc::new(LogSink), ActorSettings::default());
//!
//! dispatcher.add_environment(
//!     "prod",
//!     KvStore::new()
//!         .with("git-branch", "main")
//!         .with("deploy-command", "./scripts/deploy.sh"),
//! )?;
//!
//! let push = Event::new(EventType::Push, KvStore::new().with("git-branch", "main"));
//! dispatcher.submit("prod", push).await?;
//!
//! for report in dispatcher.shutdown().await {
//!     println!("{}: {} succeeded", report.name, report.actions_succeeded);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Error Handling
//!
//! All fallible operations return [`Result<T>`], an alias for
//! `std::result::Result<T, DispatchError>`. Inside an actor nothing is
//! fatal: failures are logged, counted in the [`EnvironmentReport`] and the
//! next descriptor or event is processed.

pub mod action;
pub mod checks;
pub mod config;
pub mod dispatcher;
pub mod environment;
pub mod error;
pub mod pool;
pub mod registry;
pub mod sink;
pub mod store;
pub mod types;

// Re-export public types
pub use action::{
    Action, ActionFactory, ActionResult, CommandOutput, CommandRequest, DeployFactory,
    ExecAction, ExecResult, ExecStatus, ManagedProcessBackend, ProcessBackend,
};
pub use checks::{first_failing_check, Check, HasDeployCommand, SameBranch};
pub use config::{
    ConfigLoader, DeploydConfig, EnvironmentConfig, ExecutionConfig, ExecutionMode,
    ResultsConfig, SinkKind,
};
pub use dispatcher::{Dispatcher, KILL_HEADROOM};
pub use environment::{
    spawn_environment, ActorSettings, EnvironmentHandle, EnvironmentReport, EnvironmentState,
    ExecutionStrategy, DEFAULT_INBOX_CAPACITY,
};
pub use error::{DispatchError, Result};
pub use pool::WorkerPool;
pub use registry::{ActionDescriptor, ActionRegistry, ActionRegistryBuilder, DescriptorSpec};
pub use sink::{JsonLinesSink, LogSink, MemorySink, ResultRecord, ResultSink};
pub use store::{KvStore, WellKnownKey, EVENT_KEY_PREFIX};
pub use types::{ActionKind, Event, EventType};
