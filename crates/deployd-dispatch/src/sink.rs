//! Result sinks
//!
//! Every successfully executed action's result is handed to a
//! [`ResultSink`] exactly once, already serialized. The engine does not care
//! where it goes; the sinks here cover logging, in-process collection and an
//! append-only JSON-lines file.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::{
    error::{DispatchError, Result},
    types::{ActionKind, EventType},
};

/// A serialized action result with the dispatch it belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultRecord {
    pub environment: String,
    pub event_id: String,
    pub event_type: EventType,
    pub action: ActionKind,
    /// Output of [`ActionResult::to_bytes`](crate::ActionResult::to_bytes)
    pub payload: Vec<u8>,
}

/// Destination for action results
#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn accept(&self, record: ResultRecord) -> Result<()>;
}

/// Writes each record to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

#[async_trait]
impl ResultSink for LogSink {
    async fn accept(&self, record: ResultRecord) -> Result<()> {
        info!(
            environment = %record.environment,
            event_id = %record.event_id,
            event_type = %record.event_type,
            action = %record.action,
            result = %String::from_utf8_lossy(&record.payload),
            "Recorded action result"
        );
        Ok(())
    }
}

/// Keeps records in memory
///
/// # Examples
///
/// ```
/// use deployd_dispatch::{ActionKind, EventType, MemorySink, ResultRecord, ResultSink};
///
/// # tokio_test::block_on(async {
/// let sink = MemorySink::new();
/// sink.accept(ResultRecord {
///     environment: "prod".to_string(),
///     event_id: "evt-1".to_string(),
///     event_type: EventType::Push,
///     action: ActionKind::Deploy,
///     payload: b"{}".to_vec(),
/// })
/// .await
/// .unwrap();
///
/// assert_eq!(sink.records()[0].environment, "prod");
/// # });
/// ```
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<ResultRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far, in arrival order
    pub fn records(&self) -> Vec<ResultRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ResultSink for MemorySink {
    async fn accept(&self, record: ResultRecord) -> Result<()> {
        self.records
            .lock()
            .map_err(|e| DispatchError::Sink(format!("Failed to acquire lock: {}", e)))?
            .push(record);
        Ok(())
    }
}

#[derive(Serialize)]
struct JsonLine<'a> {
    environment: &'a str,
    event_id: &'a str,
    event_type: EventType,
    action: ActionKind,
    recorded_at: String,
    result: serde_json::Value,
}

/// Appends one JSON object per record to a file
#[derive(Debug)]
pub struct JsonLinesSink {
    path: PathBuf,
    file: tokio::sync::Mutex<tokio::fs::File>,
}

impl JsonLinesSink {
    /// Open (or create) the file for appending, creating parent directories
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        Ok(Self {
            path,
            file: tokio::sync::Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ResultSink for JsonLinesSink {
    async fn accept(&self, record: ResultRecord) -> Result<()> {
        // Payloads are JSON for every built-in action; anything else is kept as text.
        let result = serde_json::from_slice(&record.payload).unwrap_or_else(|_| {
            serde_json::Value::String(String::from_utf8_lossy(&record.payload).into_owned())
        });
        let line = JsonLine {
            environment: &record.environment,
            event_id: &record.event_id,
            event_type: record.event_type,
            action: record.action,
            recorded_at: chrono::Utc::now().to_rfc3339(),
            result,
        };

        let mut bytes = serde_json::to_vec(&line)?;
        bytes.push(b'\n');

        let mut file = self.file.lock().await;
        file.write_all(&bytes).await?;
        file.flush().await?;
        Ok(())
    }
}
