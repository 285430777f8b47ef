//! # Event Bus System
//!
//! Broadcasts typed migration events using `tokio::sync::broadcast` so the
//! operator surface (progress bar, log summaries) stays decoupled from the
//! migration pipeline.
//!
//! ## Overview
//!
//! The event bus system consists of:
//! - **Event Types**: [`CoreEvent`] wrapping the [`MigrationEvent`] domain
//! - **EventBus**: Central broadcast channel for publishing events
//! - **EventStream**: Wrapper for consuming events with filtering
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────┐   emit    ┌───────────┐   subscribe   ┌──────────────┐
//! │ Folder replication ├──────────>│           ├──────────────>│ Progress bar │
//! └────────────────────┘           │ EventBus  │               └──────────────┘
//! ┌────────────────────┐   emit    │           │   subscribe   ┌──────────────┐
//! │ File transfer      ├──────────>│           ├──────────────>│ Other hosts  │
//! └────────────────────┘           └───────────┘               └──────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, MigrationEvent};
//!
//! let event_bus = EventBus::new(100);
//! let mut stream = event_bus.subscribe();
//!
//! event_bus
//!     .emit(CoreEvent::Migration(MigrationEvent::FileMigrated {
//!         path: "/Photos/img.jpg".to_string(),
//!         bytes: 1024,
//!     }))
//!     .ok();
//!
//! assert!(stream.try_recv().is_ok());
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: Subscriber was too slow and missed `n` events.
//!   This is non-fatal; the subscriber can continue receiving new events.
//! - **`RecvError::Closed`**: All senders have been dropped. This indicates shutdown.
//!
//! Emitting without subscribers returns `SendError`; publishers treat that as
//! a no-op since nobody is listening.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
///
/// Per-file events arrive in bursts during fast transfers; subscribers that
/// can't keep up receive `RecvError::Lagged`.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 256;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum published on the bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Migration run events
    Migration(MigrationEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Migration(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Migration(MigrationEvent::FileFailed { .. })
            | CoreEvent::Migration(MigrationEvent::Aborted { .. }) => EventSeverity::Error,
            CoreEvent::Migration(MigrationEvent::FolderSkipped { .. })
            | CoreEvent::Migration(MigrationEvent::FileSkipped { .. }) => EventSeverity::Warning,
            CoreEvent::Migration(MigrationEvent::Started { .. })
            | CoreEvent::Migration(MigrationEvent::Completed { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Migration Events
// ============================================================================

/// Events emitted while a migration run executes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum MigrationEvent {
    /// File transfer phase is about to begin.
    Started {
        /// Identifier of this run, used to correlate log lines.
        run_id: String,
        /// Number of files in the plan.
        total_files: u64,
        /// Sum of the sizes of the planned files.
        total_bytes: u64,
    },
    /// A destination folder was created.
    FolderCreated {
        path: String,
        folder_id: String,
    },
    /// An existing destination folder was adopted instead of creating a duplicate.
    FolderReused {
        path: String,
        folder_id: String,
    },
    /// The operator declined a folder in interactive mode.
    FolderSkipped {
        path: String,
    },
    /// A file reached the destination.
    FileMigrated {
        path: String,
        bytes: u64,
    },
    /// A file was skipped by the conflict policy.
    FileSkipped {
        path: String,
    },
    /// A file failed after exhausting retries.
    FileFailed {
        path: String,
        reason: String,
    },
    /// Byte-level progress over the whole plan.
    Progress {
        bytes_done: u64,
        total_bytes: u64,
    },
    /// File transfer phase finished.
    Completed {
        migrated: u64,
        failed: u64,
        skipped: u64,
    },
    /// The run stopped early (operator quit, cancellation or fatal error).
    Aborted {
        reason: String,
    },
}

impl MigrationEvent {
    fn description(&self) -> &str {
        match self {
            MigrationEvent::Started { .. } => "Migration started",
            MigrationEvent::FolderCreated { .. } => "Folder created",
            MigrationEvent::FolderReused { .. } => "Existing folder reused",
            MigrationEvent::FolderSkipped { .. } => "Folder skipped",
            MigrationEvent::FileMigrated { .. } => "File migrated",
            MigrationEvent::FileSkipped { .. } => "File skipped",
            MigrationEvent::FileFailed { .. } => "File failed",
            MigrationEvent::Progress { .. } => "Migration in progress",
            MigrationEvent::Completed { .. } => "Migration completed",
            MigrationEvent::Aborted { .. } => "Migration aborted",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to events.
///
/// Cloning the bus is cheap; all clones share the same channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    ///
    /// # Arguments
    ///
    /// * `capacity` - Maximum number of events to buffer per subscriber.
    ///   When a subscriber falls behind by more than this amount, it will
    ///   receive a `RecvError::Lagged` error.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an
    /// error if there are no active subscribers.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber to receive events.
    ///
    /// Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A wrapper around `broadcast::Receiver` with optional filtering.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventSeverity, EventStream};
///
/// let event_bus = EventBus::new(16);
/// let errors_only = EventStream::new(event_bus.subscribe())
///     .filter(|event| event.severity() >= EventSeverity::Error);
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` will be returned by `recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    /// Receives the next event that passes the filter.
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Lagged(n)` if the subscriber fell behind by `n` events.
    /// Returns `RecvError::Closed` if all senders have been dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.matches(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive an event without blocking.
    ///
    /// Returns `None` if no matching events are currently available.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.matches(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }

    fn matches(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn migrated(path: &str) -> CoreEvent {
        CoreEvent::Migration(MigrationEvent::FileMigrated {
            path: path.to_string(),
            bytes: 10,
        })
    }

    #[tokio::test]
    async fn test_event_bus_creation() {
        let bus = EventBus::new(10);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_event_emission_no_subscribers() {
        let bus = EventBus::new(10);
        assert!(bus.emit(migrated("/a")).is_err());
    }

    #[tokio::test]
    async fn test_multiple_subscribers_receive_same_event() {
        let bus = EventBus::new(10);
        let mut sub1 = bus.subscribe();
        let mut sub2 = bus.subscribe();

        let event = CoreEvent::Migration(MigrationEvent::Started {
            run_id: "run-1".to_string(),
            total_files: 3,
            total_bytes: 300,
        });
        assert_eq!(bus.emit(event.clone()).unwrap(), 2);

        assert_eq!(sub1.recv().await.unwrap(), event);
        assert_eq!(sub2.recv().await.unwrap(), event);
    }

    #[tokio::test]
    async fn test_event_stream_filter_skips_non_matching() {
        let bus = EventBus::new(10);
        let mut stream = EventStream::new(bus.subscribe())
            .filter(|event| event.severity() == EventSeverity::Error);

        bus.emit(migrated("/a")).unwrap();
        bus.emit(CoreEvent::Migration(MigrationEvent::FileFailed {
            path: "/b".to_string(),
            reason: "quota".to_string(),
        }))
        .unwrap();

        let received = stream.recv().await.unwrap();
        assert!(matches!(
            received,
            CoreEvent::Migration(MigrationEvent::FileFailed { .. })
        ));
        assert!(stream.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_lagged_subscriber() {
        let bus = EventBus::new(2);
        let mut sub = bus.subscribe();

        for i in 0..5 {
            bus.emit(migrated(&format!("/f{}", i))).unwrap();
        }

        assert!(matches!(sub.recv().await, Err(RecvError::Lagged(_))));
    }

    #[test]
    fn test_severity_levels() {
        let aborted = CoreEvent::Migration(MigrationEvent::Aborted {
            reason: "quit".to_string(),
        });
        assert_eq!(aborted.severity(), EventSeverity::Error);

        let skipped = CoreEvent::Migration(MigrationEvent::FolderSkipped {
            path: "/Docs".to_string(),
        });
        assert_eq!(skipped.severity(), EventSeverity::Warning);

        let progress = CoreEvent::Migration(MigrationEvent::Progress {
            bytes_done: 1,
            total_bytes: 2,
        });
        assert_eq!(progress.severity(), EventSeverity::Debug);
        assert_eq!(progress.description(), "Migration in progress");
    }

    #[test]
    fn test_event_serialization() {
        let event = migrated("/Photos/img.jpg");
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"Migration\""));
        assert!(json.contains("\"event\":\"FileMigrated\""));

        let back: CoreEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
