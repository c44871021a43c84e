//! Event types for the ingestion event stream
//!
//! Provides the shared `IngestEvent` enum and the broadcast `EventBus` used to
//! push run progress to SSE clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Ingestion run events
///
/// Events are broadcast via EventBus and serialized for SSE transmission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum IngestEvent {
    /// A run was launched for an event
    RunStarted {
        run_id: Uuid,
        event_id: i64,
        file_path: String,
        timestamp: DateTime<Utc>,
    },

    /// A chunk was committed to the store
    ChunkCommitted {
        run_id: Uuid,
        rows_read: u64,
        rows_written: u64,
        rows_skipped: u64,
        commit_count: u64,
        progress_percentage: u8,
        timestamp: DateTime<Utc>,
    },

    /// A run reached the Completed state
    RunCompleted {
        run_id: Uuid,
        rows_read: u64,
        rows_written: u64,
        rows_skipped: u64,
        duration_seconds: u64,
        timestamp: DateTime<Utc>,
    },

    /// A run reached the Failed state
    RunFailed {
        run_id: Uuid,
        reason: String,
        rows_written: u64,
        timestamp: DateTime<Utc>,
    },
}

impl IngestEvent {
    /// SSE event name
    pub fn event_type(&self) -> &'static str {
        match self {
            IngestEvent::RunStarted { .. } => "RunStarted",
            IngestEvent::ChunkCommitted { .. } => "ChunkCommitted",
            IngestEvent::RunCompleted { .. } => "RunCompleted",
            IngestEvent::RunFailed { .. } => "RunFailed",
        }
    }

    /// Run the event belongs to
    pub fn run_id(&self) -> Uuid {
        match self {
            IngestEvent::RunStarted { run_id, .. }
            | IngestEvent::ChunkCommitted { run_id, .. }
            | IngestEvent::RunCompleted { run_id, .. }
            | IngestEvent::RunFailed { run_id, .. } => *run_id,
        }
    }
}

/// Broadcast bus for ingestion events
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<IngestEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// Slow subscribers lose the oldest events once `capacity` is exceeded.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<IngestEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: IngestEvent,
    ) -> Result<usize, broadcast::error::SendError<IngestEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: IngestEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
