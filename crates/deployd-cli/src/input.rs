//! Line-delimited JSON event input
//!
//! Each non-empty line on stdin is one event:
//!
//! ```json
//! {"type": "push", "environment": "prod", "data": {"git-branch": "main"}}
//! ```
//!
//! Without `environment` the event goes to every environment. Lines starting
//! with `#` are ignored.

use deployd_dispatch::{Event, EventType, KvStore};
use serde::Deserialize;

use crate::error::{CliError, CliResult};

/// One parsed input line
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InboundEvent {
    #[serde(rename = "type")]
    pub event_type: EventType,

    #[serde(default)]
    pub environment: Option<String>,

    #[serde(default)]
    pub data: KvStore,
}

impl InboundEvent {
    /// Split into the target environment and a fresh event
    pub fn into_event(self) -> (Option<String>, Event) {
        (self.environment, Event::new(self.event_type, self.data))
    }
}

/// Parse one input line; blank and comment lines yield `None`
pub fn parse_line(line_no: usize, line: &str) -> CliResult<Option<InboundEvent>> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }

    serde_json::from_str(trimmed)
        .map(Some)
        .map_err(|e| CliError::InvalidInput {
            line: line_no,
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_targeted_event() {
        let line = r#"{"type": "push", "environment": "prod", "data": {"git-branch": "main", "git-commit": "abc"}}"#;
        let inbound = parse_line(1, line).unwrap().unwrap();

        assert_eq!(inbound.event_type, EventType::Push);
        assert_eq!(inbound.environment.as_deref(), Some("prod"));
        assert_eq!(inbound.data.get("git-commit"), Some("abc"));

        let (target, event) = inbound.into_event();
        assert_eq!(target.as_deref(), Some("prod"));
        assert_eq!(event.data().git_branch(), Some("main"));
        assert!(!event.id().is_empty());
    }

    #[test]
    fn test_parse_broadcast_event_without_data() {
        let inbound = parse_line(1, r#"{"type": "tag"}"#).unwrap().unwrap();
        assert_eq!(inbound.event_type, EventType::Tag);
        assert_eq!(inbound.environment, None);
        assert!(inbound.data.is_empty());
    }

    #[test]
    fn test_blank_and_comment_lines_are_skipped() {
        assert_eq!(parse_line(1, "").unwrap(), None);
        assert_eq!(parse_line(2, "   \t").unwrap(), None);
        assert_eq!(parse_line(3, "# replayed from webhook log").unwrap(), None);
    }

    #[test]
    fn test_unknown_event_type_is_rejected_with_line_number() {
        let err = parse_line(7, r#"{"type": "merge"}"#).unwrap_err();
        assert!(matches!(err, CliError::InvalidInput { line: 7, .. }));
    }

    #[test]
    fn test_malformed_json_is_rejected() {
        assert!(parse_line(1, "{not json").is_err());
        assert!(parse_line(1, r#"{"environment": "prod"}"#).is_err());
    }
}
