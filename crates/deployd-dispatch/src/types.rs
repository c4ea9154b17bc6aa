//! Core data types for the dispatch engine
//!
//! Events are immutable once constructed: their fields are private and only
//! readable through accessors, so checks and factories can read an event's
//! data without copying or locking.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::{DispatchError, Result},
    store::KvStore,
};

/// Kinds of events a producer can submit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventType {
    /// Commits were pushed to a branch
    Push,
    /// A pull request was opened or updated
    PullRequest,
    /// A tag was created
    Tag,
}

impl EventType {
    /// All known event types
    pub const ALL: [EventType; 3] = [EventType::Push, EventType::PullRequest, EventType::Tag];

    /// Wire name of the event type
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Push => "push",
            Self::PullRequest => "pull-request",
            Self::Tag => "tag",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| DispatchError::UnknownEventType(s.to_string()))
    }
}

/// Kinds of actions the engine can dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionKind {
    /// Run the environment's deploy command
    Deploy,
}

impl ActionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Deploy => "deploy",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Something that happened and may trigger actions
///
/// # Examples
///
/// ```
/// use deployd_dispatch::{Event, EventType, KvStore};
///
/// let event = Event::new(EventType::Push, KvStore::new().with("git-branch", "main"));
/// assert_eq!(event.data().git_branch(), Some("main"));
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    id: String,
    event_type: EventType,
    data: KvStore,
    received_at: String,
}

impl Event {
    /// Create an event with a fresh identifier and the current timestamp
    pub fn new(event_type: EventType, data: KvStore) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            event_type,
            data,
            received_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Unique identifier of this event
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    /// Payload supplied by the producer
    pub fn data(&self) -> &KvStore {
        &self.data
    }

    /// RFC 3339 timestamp of construction
    pub fn received_at(&self) -> &str {
        &self.received_at
    }
}
