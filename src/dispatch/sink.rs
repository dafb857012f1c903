//! Consumers of command results: logs, displays, live web clients.

use crate::cec::{CommandKind, CommandOutcome};
use crate::input::Button;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{info, warn};

/// Where a command came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", content = "button", rename_all = "snake_case")]
pub enum Source {
    Button(Button),
    Api,
}

/// One finished command, as seen by result sinks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandEvent {
    pub timestamp: DateTime<Utc>,
    pub source: Source,
    pub kind: CommandKind,
    pub outcome: CommandOutcome,
}

impl CommandEvent {
    pub fn new(source: Source, kind: CommandKind, outcome: CommandOutcome) -> Self {
        Self {
            timestamp: Utc::now(),
            source,
            kind,
            outcome,
        }
    }
}

/// Receives every command result.
///
/// `notify` runs on the dispatch path and must return promptly; sinks that
/// do slow work should hand the event to their own task.
pub trait ResultSink: Send + Sync {
    fn notify(&self, event: &CommandEvent);
}

/// Writes results to the tracing log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl ResultSink for LogSink {
    fn notify(&self, event: &CommandEvent) {
        match &event.outcome {
            CommandOutcome::Success { output } => {
                info!("{} ({:?}) -> {}", event.kind.label(), event.source, output.trim_end())
            }
            CommandOutcome::RateLimited => {
                info!("{} ({:?}) suppressed by cooldown", event.kind.label(), event.source)
            }
            outcome => warn!("{} ({:?}) {}", event.kind.label(), event.source, outcome),
        }
    }
}

/// Fans results out to live subscribers such as WebSocket clients.
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    tx: broadcast::Sender<CommandEvent>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CommandEvent> {
        self.tx.subscribe()
    }
}

impl ResultSink for BroadcastSink {
    fn notify(&self, event: &CommandEvent) {
        // No subscribers is normal.
        let _ = self.tx.send(event.clone());
    }
}
