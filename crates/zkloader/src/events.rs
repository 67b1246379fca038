//! Loader event bus: progress and diagnostics for acquisition attempts.
//!
//! Events flow through a `tokio::sync::broadcast` channel to any number of
//! subscribers. When nobody is subscribed, events are silently dropped.
//! They are informational only; nothing in the loader depends on them.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::types::SourceFailure;

/// Default channel capacity. A full sequence emits a handful of events per
/// source, so this only overflows for a subscriber that never reads.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Every event the loader emits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LoaderEvent {
    /// A fallback sequence started.
    SequenceStarted { source_count: usize },
    /// The toolkit was already in the registry slot; no request was made.
    AlreadyPresent,
    /// Injection from a source has begun.
    SourceAttempt { index: usize, url: String },
    /// A source was abandoned and the sequence moved on.
    SourceFailed {
        index: usize,
        url: String,
        failure: SourceFailure,
    },
    /// The toolkit is registered and usable.
    Loaded {
        url: Option<String>,
        elapsed_ms: u64,
    },
    /// Every source in one sequence failed.
    SequenceFailed { attempted: usize, elapsed_ms: u64 },
    /// `preload` will try again after a delay.
    RetryScheduled {
        attempt: u32,
        max_attempts: u32,
        delay_ms: u64,
    },
    /// Coordinator state was reset and the slot cleared.
    Reset { had_toolkit: bool },
}

/// Broadcast bus for [`LoaderEvent`]s.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<LoaderEvent>,
}

impl EventBus {
    /// Create a new event bus with the given buffer capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Emit an event to all subscribers. Silently ignores if no subscribers.
    pub fn emit(&self, event: LoaderEvent) {
        let _ = self.sender.send(event);
    }

    /// Subscribe to receive all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<LoaderEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}
