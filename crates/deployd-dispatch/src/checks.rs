//! Eligibility checks for action descriptors
//!
//! A descriptor is eligible when every one of its checks passes. Checks run
//! in list order and stop at the first failure, so they must be pure: the
//! same environment state and event always give the same answer, and
//! nothing is mutated along the way. A check that cannot decide answers
//! `false`.

use std::fmt;
use std::sync::Arc;

use tracing::trace;

use crate::{environment::EnvironmentState, types::Event};

/// Predicate over environment state and an event
pub trait Check: Send + Sync + fmt::Debug {
    /// Short name used in logs and registry listings
    fn name(&self) -> &'static str;

    /// Whether the descriptor owning this check may run for `event`
    fn evaluate(&self, env: &EnvironmentState, event: &Event) -> bool;
}

/// Passes when the environment is configured with a deploy command
///
/// Reads environment configuration only; event data is ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct HasDeployCommand;

impl Check for HasDeployCommand {
    fn name(&self) -> &'static str {
        "has-deploy-command"
    }

    fn evaluate(&self, env: &EnvironmentState, _event: &Event) -> bool {
        env.data().deploy_command().is_some()
    }
}

/// Passes when the event's branch is set and matches the environment's
#[derive(Debug, Clone, Copy, Default)]
pub struct SameBranch;

impl Check for SameBranch {
    fn name(&self) -> &'static str {
        "same-branch"
    }

    fn evaluate(&self, env: &EnvironmentState, event: &Event) -> bool {
        match (event.data().git_branch(), env.data().git_branch()) {
            (Some(event_branch), Some(env_branch)) => event_branch == env_branch,
            _ => false,
        }
    }
}

/// Evaluate a check chain, returning the name of the first failing check
///
/// `None` means every check passed and the descriptor is eligible.
pub fn first_failing_check(
    checks: &[Arc<dyn Check>],
    env: &EnvironmentState,
    event: &Event,
) -> Option<&'static str> {
    for check in checks {
        let passed = check.evaluate(env, event);
        trace!(
            environment = %env.name(),
            check = check.name(),
            passed,
            "Evaluated check"
        );
        if !passed {
            return Some(check.name());
        }
    }
    None
}
