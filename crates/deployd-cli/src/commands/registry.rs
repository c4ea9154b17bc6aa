//! `deployd registry`: print the event to action table

use std::fmt::Write;
use std::sync::Arc;

use deployd_dispatch::{ActionRegistry, EventType, ManagedProcessBackend};

use crate::error::CliResult;

/// Prints the default registry
#[derive(Debug, Default)]
pub struct RegistryCommand;

impl RegistryCommand {
    pub fn new() -> Self {
        Self
    }

    pub fn execute(&self) -> CliResult<()> {
        let registry = ActionRegistry::with_defaults(Arc::new(ManagedProcessBackend::new()))?;
        print!("{}", render_registry(&registry));
        Ok(())
    }
}

/// One line per event type, descriptors in evaluation order
pub fn render_registry(registry: &ActionRegistry) -> String {
    let mut out = String::new();
    for event_type in EventType::ALL {
        match registry.lookup(event_type) {
            Some(descriptors) => {
                for descriptor in descriptors {
                    let _ = writeln!(
                        out,
                        "{:<14} -> {} [{}]",
                        event_type.as_str(),
                        descriptor.kind(),
                        descriptor.check_names().join(", ")
                    );
                }
            }
            None => {
                let _ = writeln!(out, "{:<14} -> (no actions)", event_type.as_str());
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry_table() {
        let registry = ActionRegistry::with_defaults(Arc::new(ManagedProcessBackend::new())).unwrap();
        let table = render_registry(&registry);
        let lines: Vec<&str> = table.lines().collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "push           -> deploy [has-deploy-command, same-branch]");
        assert_eq!(lines[1], "pull-request   -> (no actions)");
        assert_eq!(lines[2], "tag            -> (no actions)");
    }
}
