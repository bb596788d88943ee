//! # Event Bus System
//!
//! Push-only event channel from the engine to its consumer, built on
//! `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! - **Event Types**: [`CoreEvent`] wraps one sub-enum per session kind
//! - **EventBus**: cloneable broadcast sender shared by every session
//! - **EventStream**: receiver wrapper with an optional filter, typically used
//!   to follow one session key
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐  PositionChanged   ┌───────────┐
//! │Player session├───────────────────>│           │
//! └──────────────┘  PlaybackFinished  │           │
//!                                     │ EventBus  │    subscribe   ┌──────────┐
//! ┌──────────────┐  Progress          │ (broadcast├───────────────>│ Consumer │
//! │  Extractor   ├───────────────────>│  channel) │                └──────────┘
//! └──────────────┘                    │           │
//! ┌──────────────┐  Amplitude         │           │
//! │   Recorder   ├───────────────────>│           │
//! └──────────────┘                    └───────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, EventStream, PlayerEvent};
//! use core_runtime::session::SessionKey;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let bus = EventBus::new(100);
//! let key = SessionKey::new("track-a").unwrap();
//! let wanted = key.clone();
//! let mut stream =
//!     EventStream::new(bus.subscribe()).filter(move |e| e.session_key() == Some(&wanted));
//!
//! bus.emit(CoreEvent::Player(PlayerEvent::PositionChanged {
//!     session_key: key,
//!     position_ms: 1200,
//! }))
//! .ok();
//!
//! let event = stream.recv().await.unwrap();
//! assert_eq!(event.description(), "Playback position changed");
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: the subscriber fell `n` events behind. Non-fatal;
//!   position ticks are idempotent so consumers simply continue.
//! - **`RecvError::Closed`**: the engine was dropped.
//!
//! Emitting with no subscriber returns `Err`; sessions ignore that case.

use crate::session::{FinishMode, PlayerState, SessionKey};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event published through the bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    Player(PlayerEvent),
    Extraction(ExtractionEvent),
    Recorder(RecorderEvent),
}

impl CoreEvent {
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Player(e) => e.description(),
            CoreEvent::Extraction(e) => e.description(),
            CoreEvent::Recorder(e) => e.description(),
        }
    }

    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Extraction(ExtractionEvent::Failed { .. }) => EventSeverity::Error,
            CoreEvent::Player(PlayerEvent::PlaybackFinished { .. })
            | CoreEvent::Extraction(ExtractionEvent::Completed { .. })
            | CoreEvent::Recorder(RecorderEvent::Started { .. })
            | CoreEvent::Recorder(RecorderEvent::Stopped { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }

    /// Session the event belongs to. Recorder events have none.
    pub fn session_key(&self) -> Option<&SessionKey> {
        match self {
            CoreEvent::Player(e) => Some(e.session_key()),
            CoreEvent::Extraction(e) => Some(e.session_key()),
            CoreEvent::Recorder(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Player Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum PlayerEvent {
    /// Periodic position tick, also flushed on pause and stop.
    PositionChanged {
        session_key: SessionKey,
        position_ms: u64,
    },
    /// Natural end of stream handled according to the finish mode.
    PlaybackFinished {
        session_key: SessionKey,
        finish_type: FinishMode,
    },
    StateChanged {
        session_key: SessionKey,
        state: PlayerState,
    },
}

impl PlayerEvent {
    fn description(&self) -> &str {
        match self {
            PlayerEvent::PositionChanged { .. } => "Playback position changed",
            PlayerEvent::PlaybackFinished { .. } => "Playback finished",
            PlayerEvent::StateChanged { .. } => "Player state changed",
        }
    }

    pub fn session_key(&self) -> &SessionKey {
        match self {
            PlayerEvent::PositionChanged { session_key, .. }
            | PlayerEvent::PlaybackFinished { session_key, .. }
            | PlayerEvent::StateChanged { session_key, .. } => session_key,
        }
    }
}

// ============================================================================
// Extraction Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum ExtractionEvent {
    /// A bucket was closed. `samples` holds the raw RMS buckets so far.
    Progress {
        session_key: SessionKey,
        progress: f32,
        samples: Vec<f32>,
    },
    Completed {
        session_key: SessionKey,
        bucket_count: usize,
    },
    Cancelled {
        session_key: SessionKey,
    },
    Failed {
        session_key: SessionKey,
        message: String,
    },
}

impl ExtractionEvent {
    fn description(&self) -> &str {
        match self {
            ExtractionEvent::Progress { .. } => "Waveform extraction in progress",
            ExtractionEvent::Completed { .. } => "Waveform extraction completed",
            ExtractionEvent::Cancelled { .. } => "Waveform extraction cancelled",
            ExtractionEvent::Failed { .. } => "Waveform extraction failed",
        }
    }

    pub fn session_key(&self) -> &SessionKey {
        match self {
            ExtractionEvent::Progress { session_key, .. }
            | ExtractionEvent::Completed { session_key, .. }
            | ExtractionEvent::Cancelled { session_key }
            | ExtractionEvent::Failed { session_key, .. } => session_key,
        }
    }
}

// ============================================================================
// Recorder Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum RecorderEvent {
    /// Amplitude tick. Decibels in legacy mode, linear peak otherwise.
    Amplitude { decibel: f32 },
    Started { path: String },
    Paused,
    Resumed,
    Stopped { path: String, duration_ms: i64 },
}

impl RecorderEvent {
    fn description(&self) -> &str {
        match self {
            RecorderEvent::Amplitude { .. } => "Recording amplitude",
            RecorderEvent::Started { .. } => "Recording started",
            RecorderEvent::Paused => "Recording paused",
            RecorderEvent::Resumed => "Recording resumed",
            RecorderEvent::Stopped { .. } => "Recording stopped",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus.
///
/// Clones share one channel, so every session holds its own clone.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a bus whose subscribers buffer up to `capacity` events.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes to all subscribers, returning how many received the event.
    ///
    /// Fails only when nobody is subscribed.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// New receiver for all future events. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

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

/// `broadcast::Receiver` with an optional predicate.
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

    /// Only events matching `predicate` are returned.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    /// Events for one session key.
    pub fn for_session(self, key: SessionKey) -> Self {
        self.filter(move |event| event.session_key() == Some(&key))
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Next matching event.
    ///
    /// # Errors
    ///
    /// `RecvError::Lagged(n)` when `n` events were dropped,
    /// `RecvError::Closed` when all senders are gone.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Non-blocking variant of [`recv`](Self::recv). `None` when empty.
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

    /// Drain everything currently buffered that matches the filter.
    pub fn drain(&mut self) -> Vec<CoreEvent> {
        let mut events = Vec::new();
        while let Some(result) = self.try_recv() {
            match result {
                Ok(event) => events.push(event),
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
        events
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

    fn key(name: &str) -> SessionKey {
        SessionKey::new(name).unwrap()
    }

    fn position(name: &str, position_ms: u64) -> CoreEvent {
        CoreEvent::Player(PlayerEvent::PositionChanged {
            session_key: key(name),
            position_ms,
        })
    }

    #[tokio::test]
    async fn test_event_bus_subscription() {
        let bus = EventBus::new(10);
        assert_eq!(bus.subscriber_count(), 0);
        let _sub1 = bus.subscribe();
        let _sub2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[tokio::test]
    async fn test_event_emission_no_subscribers() {
        let bus = EventBus::new(10);
        assert!(bus.emit(position("a", 0)).is_err());
    }

    #[tokio::test]
    async fn test_multiple_subscribers_receive_same_event() {
        let bus = EventBus::new(10);
        let mut sub1 = bus.subscribe();
        let mut sub2 = bus.subscribe();

        let event = CoreEvent::Recorder(RecorderEvent::Amplitude { decibel: -12.5 });
        assert_eq!(bus.emit(event.clone()).unwrap(), 2);

        assert_eq!(sub1.recv().await.unwrap(), event);
        assert_eq!(sub2.recv().await.unwrap(), event);
    }

    #[tokio::test]
    async fn test_stream_for_session_skips_other_keys() {
        let bus = EventBus::new(10);
        let mut stream = EventStream::new(bus.subscribe()).for_session(key("b"));

        bus.emit(position("a", 100)).ok();
        bus.emit(CoreEvent::Recorder(RecorderEvent::Paused)).ok();
        let wanted = CoreEvent::Player(PlayerEvent::PlaybackFinished {
            session_key: key("b"),
            finish_type: FinishMode::Loop,
        });
        bus.emit(wanted.clone()).ok();

        assert_eq!(stream.recv().await.unwrap(), wanted);
    }

    #[tokio::test]
    async fn test_lagged_subscriber() {
        let bus = EventBus::new(2);
        let mut sub = bus.subscribe();

        for i in 0..5 {
            bus.emit(position("a", i * 100)).ok();
        }

        assert!(matches!(sub.recv().await, Err(RecvError::Lagged(_))));
    }

    #[test]
    fn test_event_severity() {
        let failed = CoreEvent::Extraction(ExtractionEvent::Failed {
            session_key: key("a"),
            message: "unsupported codec".to_string(),
        });
        assert_eq!(failed.severity(), EventSeverity::Error);

        let finished = CoreEvent::Player(PlayerEvent::PlaybackFinished {
            session_key: key("a"),
            finish_type: FinishMode::Stop,
        });
        assert_eq!(finished.severity(), EventSeverity::Info);

        assert_eq!(position("a", 5).severity(), EventSeverity::Debug);
    }

    #[test]
    fn test_recorder_events_have_no_session() {
        let event = CoreEvent::Recorder(RecorderEvent::Started {
            path: "take.m4a".to_string(),
        });
        assert!(event.session_key().is_none());
        assert_eq!(event.description(), "Recording started");
    }

    #[tokio::test]
    async fn test_concurrent_publishers() {
        let bus = EventBus::new(100);
        let mut stream = EventStream::new(bus.subscribe());

        let bus1 = bus.clone();
        let bus2 = bus.clone();

        let handle1 = tokio::spawn(async move {
            for i in 0..10 {
                bus1.emit(position("a", i)).ok();
            }
        });
        let handle2 = tokio::spawn(async move {
            for i in 0..10 {
                bus2.emit(CoreEvent::Extraction(ExtractionEvent::Progress {
                    session_key: key("b"),
                    progress: i as f32 / 10.0,
                    samples: vec![0.1; i],
                }))
                .ok();
            }
        });

        handle1.await.ok();
        handle2.await.ok();

        assert_eq!(stream.drain().len(), 20);
    }

    #[test]
    fn test_event_serialization() {
        let event = CoreEvent::Extraction(ExtractionEvent::Progress {
            session_key: key("wave-1"),
            progress: 0.5,
            samples: vec![0.25, 0.5],
        });

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"Extraction\""));
        assert!(json.contains("\"event\":\"Progress\""));
        assert!(json.contains("wave-1"));

        let deserialized: CoreEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, event);
    }

    #[test]
    fn test_finish_type_serializes_lowercase() {
        let event = CoreEvent::Player(PlayerEvent::PlaybackFinished {
            session_key: key("a"),
            finish_type: FinishMode::Pause,
        });
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"finish_type\":\"pause\""));
    }

    #[tokio::test]
    async fn test_try_recv_empty() {
        let bus = EventBus::new(10);
        let mut stream = EventStream::new(bus.subscribe());
        assert!(stream.try_recv().is_none());
    }
}
