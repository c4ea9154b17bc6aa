//! Builder for [`ActionRegistry`]

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use super::{ActionDescriptor, ActionRegistry};
use crate::{
    action::ActionFactory,
    checks::Check,
    error::{DispatchError, Result},
    types::{ActionKind, EventType},
};

/// Descriptor declaration before its factory is resolved
#[derive(Debug, Clone)]
pub struct DescriptorSpec {
    kind: ActionKind,
    checks: Vec<Arc<dyn Check>>,
}

impl DescriptorSpec {
    pub fn new(kind: ActionKind) -> Self {
        Self {
            kind,
            checks: Vec::new(),
        }
    }

    /// Append a check to the end of the chain
    pub fn check(mut self, check: impl Check + 'static) -> Self {
        self.checks.push(Arc::new(check));
        self
    }

    /// Append an already shared check to the end of the chain
    pub fn check_arc(mut self, check: Arc<dyn Check>) -> Self {
        self.checks.push(check);
        self
    }
}

/// Assembles an immutable [`ActionRegistry`]
#[derive(Debug, Default)]
pub struct ActionRegistryBuilder {
    factories: HashMap<ActionKind, Arc<dyn ActionFactory>>,
    entries: Vec<(EventType, DescriptorSpec)>,
}

impl ActionRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the factory for its action kind, replacing any earlier one
    pub fn register_factory(mut self, factory: Arc<dyn ActionFactory>) -> Self {
        self.factories.insert(factory.kind(), factory);
        self
    }

    /// Append a descriptor to an event type's trigger list
    pub fn on(mut self, event_type: EventType, spec: DescriptorSpec) -> Self {
        self.entries.push((event_type, spec));
        self
    }

    /// Resolve factories and freeze the table
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::InvalidConfiguration`] when a descriptor
    /// names an action kind with no registered factory.
    pub fn build(self) -> Result<Arc<ActionRegistry>> {
        let mut table: HashMap<EventType, Vec<ActionDescriptor>> = HashMap::new();

        for (event_type, spec) in self.entries {
            let factory = self.factories.get(&spec.kind).cloned().ok_or_else(|| {
                DispatchError::InvalidConfiguration(format!(
                    "no factory registered for action kind '{}' (event type '{}')",
                    spec.kind, event_type
                ))
            })?;

            debug!(
                event_type = %event_type,
                action = %spec.kind,
                checks = spec.checks.len(),
                "Registered action descriptor"
            );

            table.entry(event_type).or_default().push(ActionDescriptor {
                kind: spec.kind,
                checks: spec.checks,
                factory,
            });
        }

        Ok(Arc::new(ActionRegistry { table }))
    }
}
