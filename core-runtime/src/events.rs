//! # Event Bus System
//!
//! Typed notifications from the player core, delivered over
//! `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! The playback controller exposes its full state through an observable
//! snapshot; the event bus complements that with discrete, ordered
//! notifications (a track started, a retry was scheduled, the queue ran out)
//! that UIs and integrations such as media-session widgets or scrobblers can
//! react to without diffing snapshots.
//!
//! ```text
//! ┌────────────────────┐   emit    ┌───────────┐  subscribe  ┌────────────┐
//! │ PlaybackController ├──────────>│ EventBus  ├────────────>│ Subscriber │
//! └────────────────────┘           │(broadcast)├────────────>│ Subscriber │
//!                                  └───────────┘             └────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let event_bus = EventBus::new(100);
//! let mut stream = event_bus.subscribe();
//!
//! event_bus
//!     .emit(CoreEvent::Playback(PlaybackEvent::Started {
//!         track_id: "track-1".to_string(),
//!     }))
//!     .ok();
//!
//! let event = stream.recv().await.unwrap();
//! assert_eq!(event.description(), "Playback started");
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: the subscriber fell behind by `n` events.
//!   Non-fatal; keep receiving.
//! - **`RecvError::Closed`**: every sender was dropped; the controller is gone.
//!
//! Emitting with no subscribers returns `Err`; the controller ignores that.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
///
/// Subscribers that can't keep up will receive `RecvError::Lagged`.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event published through the bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Transport and load lifecycle
    Playback(PlaybackEvent),
    /// Queue replacement and navigation
    Queue(QueueEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Playback(e) => e.description(),
            CoreEvent::Queue(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Playback(PlaybackEvent::Error {
                recoverable: false, ..
            }) => EventSeverity::Error,
            CoreEvent::Playback(PlaybackEvent::Error { .. })
            | CoreEvent::Playback(PlaybackEvent::RetryScheduled { .. }) => EventSeverity::Warning,
            CoreEvent::Playback(PlaybackEvent::Started { .. })
            | CoreEvent::Playback(PlaybackEvent::TrackChanged { .. })
            | CoreEvent::Queue(QueueEvent::Replaced { .. }) => EventSeverity::Info,
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
// Playback Events
// ============================================================================

/// Events related to the current track and transport.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum PlaybackEvent {
    /// A new track became current (before it is loaded).
    TrackChanged {
        track_id: String,
        title: String,
        artist: String,
    },
    /// A load attempt started. `attempt` is 1-based.
    Loading { track_id: String, attempt: u32 },
    /// The current track started playing after a load.
    Started { track_id: String },
    Paused { track_id: String },
    Resumed { track_id: String },
    /// Playback stopped and the position was reset.
    Stopped,
    /// Position changed by a seek.
    Seeked { track_id: String, position_ms: u64 },
    /// Periodic progress update (only when position events are enabled).
    PositionChanged {
        track_id: String,
        position_ms: u64,
        duration_ms: u64,
    },
    /// The current track reached its natural end.
    Completed { track_id: String },
    /// A failed load will be attempted again after `delay_ms`.
    RetryScheduled {
        track_id: String,
        attempt: u32,
        delay_ms: u64,
    },
    /// Playback failed.
    Error {
        track_id: Option<String>,
        /// Failure class, e.g. `"resolve_not_found"` or `"autoplay_blocked"`.
        kind: String,
        /// User-facing message.
        message: String,
        /// Whether an explicit retry may succeed.
        recoverable: bool,
    },
    VolumeChanged { volume_percent: u8, muted: bool },
    /// The controller released its media handle.
    Shutdown,
}

impl PlaybackEvent {
    fn description(&self) -> &str {
        match self {
            PlaybackEvent::TrackChanged { .. } => "Current track changed",
            PlaybackEvent::Loading { .. } => "Loading track",
            PlaybackEvent::Started { .. } => "Playback started",
            PlaybackEvent::Paused { .. } => "Playback paused",
            PlaybackEvent::Resumed { .. } => "Playback resumed",
            PlaybackEvent::Stopped => "Playback stopped",
            PlaybackEvent::Seeked { .. } => "Playback position changed by seek",
            PlaybackEvent::PositionChanged { .. } => "Playback position updated",
            PlaybackEvent::Completed { .. } => "Track finished",
            PlaybackEvent::RetryScheduled { .. } => "Retrying track load",
            PlaybackEvent::Error { .. } => "Playback error",
            PlaybackEvent::VolumeChanged { .. } => "Volume changed",
            PlaybackEvent::Shutdown => "Player shut down",
        }
    }
}

// ============================================================================
// Queue Events
// ============================================================================

/// Events related to the playback queue.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum QueueEvent {
    /// The queue was replaced by a new playback context.
    Replaced { length: usize, position: usize },
    /// The position moved to a neighbour.
    Advanced { from: usize, to: usize },
    /// Auto-advance reached the end of the queue.
    Exhausted { length: usize },
    /// The queue was emptied.
    Cleared,
}

impl QueueEvent {
    fn description(&self) -> &str {
        match self {
            QueueEvent::Replaced { .. } => "Queue replaced",
            QueueEvent::Advanced { .. } => "Queue position moved",
            QueueEvent::Exhausted { .. } => "Queue finished",
            QueueEvent::Cleared => "Queue cleared",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central broadcast channel for player events.
///
/// Cloning is cheap; all clones publish into the same channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus.
    ///
    /// `capacity` is the number of events buffered per subscriber before it
    /// starts receiving `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all current subscribers.
    ///
    /// Returns the number of subscribers that received it, or an error if
    /// there were none.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
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

/// A `broadcast::Receiver` with optional filtering.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream};
///
/// let event_bus = EventBus::new(100);
/// let queue_only = EventStream::new(event_bus.subscribe())
///     .filter(|event| matches!(event, CoreEvent::Queue(_)));
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

    /// Only events matching `predicate` will be returned.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter.
    ///
    /// # Errors
    ///
    /// `RecvError::Lagged(n)` if the subscriber fell behind, `RecvError::Closed`
    /// once every sender is gone.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive an event without waiting.
    ///
    /// Returns `None` if no matching event is currently available.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.accepts(&event) {
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
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn started(track_id: &str) -> CoreEvent {
        CoreEvent::Playback(PlaybackEvent::Started {
            track_id: track_id.to_string(),
        })
    }

    #[tokio::test]
    async fn test_event_bus_creation() {
        let bus = EventBus::new(10);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_event_bus_subscription() {
        let bus = EventBus::new(10);
        let _sub1 = bus.subscribe();
        let _sub2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[tokio::test]
    async fn test_event_emission_no_subscribers() {
        let bus = EventBus::new(10);
        assert!(bus.emit(CoreEvent::Playback(PlaybackEvent::Stopped)).is_err());
    }

    #[tokio::test]
    async fn test_multiple_subscribers_receive_same_event() {
        let bus = EventBus::new(10);
        let mut sub1 = bus.subscribe();
        let mut sub2 = bus.subscribe();

        let event = CoreEvent::Queue(QueueEvent::Replaced {
            length: 3,
            position: 0,
        });
        assert_eq!(bus.emit(event.clone()).unwrap(), 2);

        assert_eq!(sub1.recv().await.unwrap(), event);
        assert_eq!(sub2.recv().await.unwrap(), event);
    }

    #[tokio::test]
    async fn test_event_stream_with_filter() {
        let bus = EventBus::new(10);
        let mut stream =
            EventStream::new(bus.subscribe()).filter(|event| matches!(event, CoreEvent::Queue(_)));

        bus.emit(started("track-1")).ok();
        let queue_event = CoreEvent::Queue(QueueEvent::Advanced { from: 0, to: 1 });
        bus.emit(queue_event.clone()).ok();

        assert_eq!(stream.recv().await.unwrap(), queue_event);
    }

    #[tokio::test]
    async fn test_lagged_subscriber() {
        let bus = EventBus::new(2);
        let mut sub = bus.subscribe();

        for i in 0..5 {
            bus.emit(started(&format!("track-{}", i))).ok();
        }

        assert!(matches!(sub.recv().await, Err(RecvError::Lagged(_))));
    }

    #[test]
    fn test_event_severity() {
        let terminal = CoreEvent::Playback(PlaybackEvent::Error {
            track_id: Some("track-1".to_string()),
            kind: "autoplay_blocked".to_string(),
            message: "Press play to start listening.".to_string(),
            recoverable: false,
        });
        assert_eq!(terminal.severity(), EventSeverity::Error);

        let retry = CoreEvent::Playback(PlaybackEvent::RetryScheduled {
            track_id: "track-1".to_string(),
            attempt: 1,
            delay_ms: 1000,
        });
        assert_eq!(retry.severity(), EventSeverity::Warning);

        assert_eq!(started("track-1").severity(), EventSeverity::Info);

        let tick = CoreEvent::Playback(PlaybackEvent::PositionChanged {
            track_id: "track-1".to_string(),
            position_ms: 5000,
            duration_ms: 180000,
        });
        assert_eq!(tick.severity(), EventSeverity::Debug);
    }

    #[test]
    fn test_event_description() {
        assert_eq!(started("track-1").description(), "Playback started");
        assert_eq!(
            CoreEvent::Queue(QueueEvent::Exhausted { length: 2 }).description(),
            "Queue finished"
        );
    }

    #[tokio::test]
    async fn test_concurrent_publishers() {
        let bus = EventBus::new(100);
        let mut sub = bus.subscribe();

        let bus1 = bus.clone();
        let bus2 = bus.clone();

        let handle1 = tokio::spawn(async move {
            for i in 0..10 {
                bus1.emit(started(&format!("track-{}", i))).ok();
            }
        });
        let handle2 = tokio::spawn(async move {
            for i in 0..10 {
                bus2.emit(CoreEvent::Queue(QueueEvent::Advanced { from: i, to: i + 1 }))
                    .ok();
            }
        });

        handle1.await.ok();
        handle2.await.ok();

        let mut count = 0;
        while sub.try_recv().is_ok() {
            count += 1;
        }
        assert_eq!(count, 20);
    }

    #[test]
    fn test_event_serialization() {
        let event = CoreEvent::Playback(PlaybackEvent::RetryScheduled {
            track_id: "track-9".to_string(),
            attempt: 2,
            delay_ms: 2000,
        });

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"Playback\""));
        assert!(json.contains("\"event\":\"RetryScheduled\""));

        let deserialized: CoreEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, event);
    }

    #[tokio::test]
    async fn test_try_recv_empty() {
        let bus = EventBus::new(10);
        let mut stream = EventStream::new(bus.subscribe());
        assert!(stream.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_try_recv_skips_filtered_events() {
        let bus = EventBus::new(10);
        let mut stream = EventStream::new(bus.subscribe())
            .filter(|event| matches!(event, CoreEvent::Playback(PlaybackEvent::Stopped)));

        bus.emit(started("track-1")).ok();
        bus.emit(CoreEvent::Playback(PlaybackEvent::Stopped)).ok();

        let received = stream.try_recv().unwrap().unwrap();
        assert_eq!(received, CoreEvent::Playback(PlaybackEvent::Stopped));
        assert!(stream.try_recv().is_none());
    }
}
