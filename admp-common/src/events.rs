//! Event types for the ADM Player event system
//!
//! The player uses hybrid communication:
//! - **EventBus** (tokio::broadcast): one-to-many event broadcasting to the
//!   control plane and SSE clients
//! - **Notice channels** (tokio::mpsc): render thread → forwarder, emitted
//!   with `try_send()` so the audio thread never blocks
//! - **Shared atomics**: position/state published from the render callback

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Transport state of the render engine
///
/// `Idle` means no file is open. `Stopped` means a file is open with the
/// position at frame 0 and playback halted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportState {
    Idle,
    Stopped,
    Playing,
    Paused,
}

impl std::fmt::Display for TransportState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportState::Idle => write!(f, "idle"),
            TransportState::Stopped => write!(f, "stopped"),
            TransportState::Playing => write!(f, "playing"),
            TransportState::Paused => write!(f, "paused"),
        }
    }
}

/// Player event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PlayerEvent {
    /// Transport state changed
    StateChanged {
        state: TransportState,
        timestamp: DateTime<Utc>,
    },

    /// A file was opened and is ready for playback
    FileLoaded {
        file_name: String,
        channels: usize,
        sample_rate: u32,
        total_frames: u64,
        /// Set when the file's channel count differs from the configured
        /// expected count (playback still proceeds)
        channel_count_mismatch: bool,
        timestamp: DateTime<Utc>,
    },

    /// A file failed to open
    FileLoadFailed {
        file_name: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// End of file reached with looping disabled
    PlaybackFinished {
        timestamp: DateTime<Utc>,
    },

    /// Loop flag changed
    LoopChanged {
        looping: bool,
        timestamp: DateTime<Utc>,
    },

    /// Gain changed
    GainChanged {
        gain: f32,
        timestamp: DateTime<Utc>,
    },

    /// A chunk load failed during playback; the affected callbacks emitted
    /// silence and the load will be retried
    StreamReadFailed {
        start_frame: u64,
        timestamp: DateTime<Utc>,
    },

    /// Playback stopped after repeated consecutive stream read failures
    PlaybackAborted {
        consecutive_failures: u32,
        timestamp: DateTime<Utc>,
    },
}

impl PlayerEvent {
    /// Event type name, used as the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            PlayerEvent::StateChanged { .. } => "StateChanged",
            PlayerEvent::FileLoaded { .. } => "FileLoaded",
            PlayerEvent::FileLoadFailed { .. } => "FileLoadFailed",
            PlayerEvent::PlaybackFinished { .. } => "PlaybackFinished",
            PlayerEvent::LoopChanged { .. } => "LoopChanged",
            PlayerEvent::GainChanged { .. } => "GainChanged",
            PlayerEvent::StreamReadFailed { .. } => "StreamReadFailed",
            PlayerEvent::PlaybackAborted { .. } => "PlaybackAborted",
        }
    }
}

/// Broadcast bus for player events
///
/// Wraps `tokio::sync::broadcast`. Subscribers receive all events emitted
/// after subscription; slow subscribers lag and drop the oldest events.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<PlayerEvent>,
    capacity: usize,
}

impl EventBus {
    /// Create a new EventBus with the given channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)`, or `Err` if no subscribers are
    /// listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: PlayerEvent,
    ) -> std::result::Result<usize, broadcast::error::SendError<PlayerEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring the case where no subscribers are listening
    pub fn emit_lossy(&self, event: PlayerEvent) {
        let _ = self.tx.send(event);
    }

    /// Configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_eventbus_new() {
        let bus = EventBus::new(100);
        assert_eq!(bus.capacity(), 100);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_eventbus_subscribe() {
        let bus = EventBus::new(100);
        let _rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        let _rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[tokio::test]
    async fn test_eventbus_emit_no_subscribers() {
        let bus = EventBus::new(100);
        let event = PlayerEvent::StateChanged {
            state: TransportState::Playing,
            timestamp: chrono::Utc::now(),
        };

        // Should return error when no subscribers
        assert!(bus.emit(event).is_err());
    }

    #[tokio::test]
    async fn test_eventbus_emit_with_subscriber() {
        let bus = Arc::new(EventBus::new(100));
        let mut rx = bus.subscribe();

        let event = PlayerEvent::StateChanged {
            state: TransportState::Playing,
            timestamp: chrono::Utc::now(),
        };

        assert!(bus.emit(event).is_ok());

        let received = rx.recv().await.unwrap();
        match received {
            PlayerEvent::StateChanged { state, .. } => {
                assert_eq!(state, TransportState::Playing);
            }
            _ => panic!("Wrong event type received"),
        }
    }

    #[tokio::test]
    async fn test_eventbus_emit_lossy() {
        let bus = EventBus::new(100);
        let event = PlayerEvent::PlaybackFinished {
            timestamp: chrono::Utc::now(),
        };

        // Should not panic even without subscribers
        bus.emit_lossy(event);
    }

    #[test]
    fn test_event_serialization_roundtrip() {
        let event = PlayerEvent::FileLoaded {
            file_name: "render.wav".to_string(),
            channels: 56,
            sample_rate: 48000,
            total_frames: 2_880_000,
            channel_count_mismatch: false,
            timestamp: chrono::Utc::now(),
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"FileLoaded\""));
        assert!(json.contains("\"channels\":56"));

        let back: PlayerEvent = serde_json::from_str(&json).unwrap();
        match back {
            PlayerEvent::FileLoaded {
                channels,
                sample_rate,
                total_frames,
                ..
            } => {
                assert_eq!(channels, 56);
                assert_eq!(sample_rate, 48000);
                assert_eq!(total_frames, 2_880_000);
            }
            _ => panic!("Wrong event type deserialized"),
        }
    }

    #[test]
    fn test_event_type_names() {
        let ts = chrono::Utc::now();
        assert_eq!(
            PlayerEvent::PlaybackFinished { timestamp: ts }.event_type(),
            "PlaybackFinished"
        );
        assert_eq!(
            PlayerEvent::StreamReadFailed {
                start_frame: 0,
                timestamp: ts
            }
            .event_type(),
            "StreamReadFailed"
        );
    }

    #[test]
    fn test_transport_state_display() {
        assert_eq!(TransportState::Idle.to_string(), "idle");
        assert_eq!(TransportState::Playing.to_string(), "playing");
    }
}
