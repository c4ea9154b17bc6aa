//! Environment actor loop
//!
//! For every event taken from the inbox the actor:
//! 1. looks the event type up in the registry (a miss is logged and skipped),
//! 2. evaluates each descriptor's check chain in registry order,
//! 3. builds dispatch options and asks the descriptor's factory for an action,
//! 4. runs the action inline or on the worker pool, and
//! 5. hands the serialized result to the result sink.
//!
//! Failures never leave the loop. A failing descriptor is logged and counted
//! and the next descriptor (and the next event) is processed as usual; only
//! closing the inbox ends the actor.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::{ActorSettings, DispatchStats, EnvironmentReport, EnvironmentState, ExecutionStrategy};
use crate::{
    action::Action,
    checks::first_failing_check,
    error::DispatchError,
    registry::ActionRegistry,
    sink::{ResultRecord, ResultSink},
    store::{KvStore, WellKnownKey, EVENT_KEY_PREFIX},
    types::{ActionKind, Event, EventType},
};

/// Which dispatch an action run belongs to
#[derive(Debug, Clone)]
struct DispatchContext {
    environment: String,
    event_id: String,
    event_type: EventType,
    action: ActionKind,
}

pub(crate) struct EnvironmentActor {
    state: EnvironmentState,
    inbox: mpsc::Receiver<Event>,
    registry: Arc<ActionRegistry>,
    sink: Arc<dyn ResultSink>,
    settings: ActorSettings,
    stats: Arc<DispatchStats>,
}

impl EnvironmentActor {
    pub(crate) fn new(
        state: EnvironmentState,
        inbox: mpsc::Receiver<Event>,
        registry: Arc<ActionRegistry>,
        sink: Arc<dyn ResultSink>,
        settings: ActorSettings,
        stats: Arc<DispatchStats>,
    ) -> Self {
        Self {
            state,
            inbox,
            registry,
            sink,
            settings,
            stats,
        }
    }

    pub(crate) async fn run(mut self) -> EnvironmentReport {
        while let Some(event) = self.inbox.recv().await {
            self.process(&event).await;
        }
        let report = self.stats.snapshot(self.state.name());
        info!(
            environment = %self.state.name(),
            events_processed = report.events_processed,
            actions_succeeded = report.actions_succeeded,
            actions_failed = report.actions_failed,
            "Inbox closed and drained, actor stopped"
        );
        report
    }

    async fn process(&mut self, event: &Event) {
        DispatchStats::bump(&self.stats.events_processed);
        debug!(
            environment = %self.state.name(),
            event_id = %event.id(),
            event_type = %event.event_type(),
            "Processing event"
        );

        self.dispatch_descriptors(event).await;

        self.state
            .data_mut()
            .set_known(WellKnownKey::LastEventId, event.id());
    }

    async fn dispatch_descriptors(&self, event: &Event) {
        let Some(descriptors) = self.registry.lookup(event.event_type()) else {
            warn!(
                environment = %self.state.name(),
                event_id = %event.id(),
                event_type = %event.event_type(),
                "No actions registered for event type"
            );
            DispatchStats::bump(&self.stats.unknown_events);
            return;
        };

        for descriptor in descriptors {
            if let Some(check) = first_failing_check(descriptor.checks(), &self.state, event) {
                debug!(
                    environment = %self.state.name(),
                    event_id = %event.id(),
                    action = %descriptor.kind(),
                    check,
                    "Action not eligible"
                );
                DispatchStats::bump(&self.stats.descriptors_skipped);
                continue;
            }

            DispatchStats::bump(&self.stats.actions_dispatched);
            let options = self.dispatch_options(event);
            let action = match descriptor.factory().make_action(&options) {
                Ok(action) => action,
                Err(e) => {
                    error!(
                        environment = %self.state.name(),
                        event_id = %event.id(),
                        action = %descriptor.kind(),
                        error = %e,
                        "Failed to construct action"
                    );
                    DispatchStats::bump(&self.stats.actions_failed);
                    continue;
                }
            };

            let ctx = DispatchContext {
                environment: self.state.name().to_string(),
                event_id: event.id().to_string(),
                event_type: event.event_type(),
                action: descriptor.kind(),
            };
            let timeout = self.settings.action_timeout;

            match &self.settings.strategy {
                ExecutionStrategy::Inline => {
                    execute_action(action, ctx, self.sink.as_ref(), &self.stats, timeout).await;
                }
                ExecutionStrategy::Pool(pool) => {
                    let sink = self.sink.clone();
                    let stats = self.stats.clone();
                    let submitted = pool
                        .submit(async move {
                            execute_action(action, ctx, sink.as_ref(), &stats, timeout).await;
                        })
                        .await;
                    if let Err(e) = submitted {
                        error!(
                            environment = %self.state.name(),
                            event_id = %event.id(),
                            error = %e,
                            "Failed to hand action to worker pool"
                        );
                        DispatchStats::bump(&self.stats.actions_failed);
                    }
                }
            }
        }
    }

    /// Options handed to action factories
    ///
    /// Environment data first, event data under the `event.` prefix, then the
    /// dispatch bindings (environment name, event id and type).
    fn dispatch_options(&self, event: &Event) -> KvStore {
        let mut options = self.state.data().clone();
        for (key, value) in event.data().iter() {
            options.set(format!("{}{}", EVENT_KEY_PREFIX, key), value);
        }
        options.set_known(WellKnownKey::Environment, self.state.name());
        options.set_known(WellKnownKey::EventId, event.id());
        options.set_known(WellKnownKey::EventType, event.event_type().as_str());
        options
    }
}

async fn execute_action(
    action: Box<dyn Action>,
    ctx: DispatchContext,
    sink: &dyn ResultSink,
    stats: &DispatchStats,
    timeout: Option<Duration>,
) {
    let outcome = match timeout {
        Some(limit) => tokio::time::timeout(limit, action.run())
            .await
            .unwrap_or_else(|_| Err(DispatchError::Timeout(limit.as_millis() as u64))),
        None => action.run().await,
    };

    let result = match outcome {
        Ok(result) => result,
        Err(e) => {
            error!(
                environment = %ctx.environment,
                event_id = %ctx.event_id,
                action = %ctx.action,
                error = %e,
                "Action failed"
            );
            DispatchStats::bump(&stats.actions_failed);
            return;
        }
    };

    DispatchStats::bump(&stats.actions_succeeded);
    info!(
        environment = %ctx.environment,
        event_id = %ctx.event_id,
        action = %ctx.action,
        summary = %result.summary(),
        "Action completed"
    );

    let stored = match result.to_bytes() {
        Ok(payload) => {
            sink.accept(ResultRecord {
                environment: ctx.environment.clone(),
                event_id: ctx.event_id.clone(),
                event_type: ctx.event_type,
                action: ctx.action,
                payload,
            })
            .await
        }
        Err(e) => Err(e),
    };

    if let Err(e) = stored {
        error!(
            environment = %ctx.environment,
            event_id = %ctx.event_id,
            action = %ctx.action,
            error = %e,
            "Failed to record action result"
        );
        DispatchStats::bump(&stats.sink_failures);
    }
}
