//! Actions, their results, and the factories that build them
//!
//! An [`Action`] is anything that can run and produce an [`ActionResult`];
//! an [`ActionResult`] is anything that can be turned into bytes for the
//! result sink. Factories are registered per [`ActionKind`] and build a
//! fresh action for every dispatch from a key-value options store.

pub mod deploy;
pub mod exec;

pub use deploy::DeployFactory;
pub use exec::{
    CommandOutput, CommandRequest, ExecAction, ExecResult, ExecStatus, ManagedProcessBackend,
    ProcessBackend,
};

use std::fmt;

use async_trait::async_trait;

use crate::{error::Result, store::KvStore, types::ActionKind};

/// A runnable unit of work produced by a factory
#[async_trait]
pub trait Action: Send + Sync + fmt::Debug {
    /// Kind of the action, used in logs and result records
    fn kind(&self) -> ActionKind;

    /// Run the action
    ///
    /// Returns an error only when the action could not be carried out at
    /// all. An action that ran but reported failure (for example a non-zero
    /// exit code) still returns a result describing that failure.
    async fn run(&self) -> Result<Box<dyn ActionResult>>;
}

/// Outcome of a completed action
pub trait ActionResult: Send + Sync + fmt::Debug {
    /// Wire/storage representation handed to the result sink
    fn to_bytes(&self) -> Result<Vec<u8>>;

    /// One-line description for logs
    fn summary(&self) -> String;
}

/// Builds actions of one kind from dispatch options
///
/// Factories are pure constructors: no I/O and no global state mutation.
/// Anything wrong with the options is reported as
/// [`DispatchError::ActionConstruction`](crate::DispatchError::ActionConstruction).
pub trait ActionFactory: Send + Sync + fmt::Debug {
    /// Kind of the actions this factory builds
    fn kind(&self) -> ActionKind;

    /// Build an action for one dispatch
    fn make_action(&self, options: &KvStore) -> Result<Box<dyn Action>>;
}
