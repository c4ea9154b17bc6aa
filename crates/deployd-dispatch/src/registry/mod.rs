//! Event-to-action descriptor registry
//!
//! The registry maps each [`EventType`] to an ordered list of
//! [`ActionDescriptor`]s. It is assembled once through
//! [`ActionRegistryBuilder`] and never changes afterwards, so every
//! environment actor can read it through a shared `Arc` without locking.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use deployd_dispatch::{
//!     ActionKind, ActionRegistry, DeployFactory, DescriptorSpec, EventType,
//!     ManagedProcessBackend, SameBranch,
//! };
//!
//! let backend = Arc::new(ManagedProcessBackend::new());
//! let registry = ActionRegistry::builder()
//!     .register_factory(Arc::new(DeployFactory::new(backend)))
//!     .on(EventType::Push, DescriptorSpec::new(ActionKind::Deploy).check(SameBranch))
//!     .build()?;
//!
//! assert_eq!(registry.lookup(EventType::Push).map(|d| d.len()), Some(1));
//! assert!(registry.lookup(EventType::Tag).is_none());
//! # Ok::<(), deployd_dispatch::DispatchError>(())
//! ```

pub mod builder;

pub use builder::{ActionRegistryBuilder, DescriptorSpec};

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::{
    action::{ActionFactory, DeployFactory, ProcessBackend},
    checks::{Check, HasDeployCommand, SameBranch},
    error::Result,
    types::{ActionKind, EventType},
};

/// Static binding of an action kind to its checks and factory
#[derive(Clone)]
pub struct ActionDescriptor {
    kind: ActionKind,
    checks: Vec<Arc<dyn Check>>,
    factory: Arc<dyn ActionFactory>,
}

impl ActionDescriptor {
    pub fn kind(&self) -> ActionKind {
        self.kind
    }

    /// Checks in evaluation order
    pub fn checks(&self) -> &[Arc<dyn Check>] {
        &self.checks
    }

    pub fn factory(&self) -> &Arc<dyn ActionFactory> {
        &self.factory
    }

    /// Names of the checks in evaluation order
    pub fn check_names(&self) -> Vec<&'static str> {
        self.checks.iter().map(|c| c.name()).collect()
    }
}

impl fmt::Debug for ActionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionDescriptor")
            .field("kind", &self.kind)
            .field("checks", &self.check_names())
            .finish()
    }
}

/// Immutable table of descriptors per event type
#[derive(Debug, Default)]
pub struct ActionRegistry {
    table: HashMap<EventType, Vec<ActionDescriptor>>,
}

impl ActionRegistry {
    /// Start building a registry
    pub fn builder() -> ActionRegistryBuilder {
        ActionRegistryBuilder::new()
    }

    /// The stock table: a push deploys environments whose branch matches
    pub fn with_defaults(backend: Arc<dyn ProcessBackend>) -> Result<Arc<Self>> {
        Self::builder()
            .register_factory(Arc::new(DeployFactory::new(backend)))
            .on(
                EventType::Push,
                DescriptorSpec::new(ActionKind::Deploy)
                    .check(HasDeployCommand)
                    .check(SameBranch),
            )
            .build()
    }

    /// Descriptors for an event type in trigger order
    ///
    /// `None` means the event type has nothing registered.
    pub fn lookup(&self, event_type: EventType) -> Option<&[ActionDescriptor]> {
        self.table.get(&event_type).map(Vec::as_slice)
    }

    /// Registered event types in their declaration order
    pub fn event_types(&self) -> Vec<EventType> {
        EventType::ALL
            .into_iter()
            .filter(|t| self.table.contains_key(t))
            .collect()
    }

    /// Total number of descriptors across all event types
    pub fn descriptor_count(&self) -> usize {
        self.table.values().map(Vec::len).sum()
    }
}
