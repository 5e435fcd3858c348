//! Playback notification system.
//!
//! [`EventBus`] wraps a `tokio::sync::broadcast` channel with a bounded
//! ring-buffer of recent events so that late-joining clients can catch up.
//! The session controller is the only producer, which keeps notifications in
//! the order the underlying transitions happened.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::error::ErrorKind;
use crate::ids::{DeviceId, EntryId, PlaylistId};

/// Maximum number of events retained in the ring buffer.
const MAX_RECENT_EVENTS: usize = 100;

// ---------------------------------------------------------------------------
// PlaybackState
// ---------------------------------------------------------------------------

/// State of the single playback session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    Idle,
    Connecting,
    Navigating,
    Loading,
    Playing,
    Paused,
    Stopped,
    Disconnected,
    Error,
}

impl PlaybackState {
    /// Whether a file is loaded on the device.
    pub fn has_media(self) -> bool {
        matches!(self, Self::Playing | Self::Paused)
    }

    /// Whether a mutually exclusive operation is running.
    pub fn is_busy(self) -> bool {
        matches!(self, Self::Connecting | Self::Navigating | Self::Loading)
    }
}

// ---------------------------------------------------------------------------
// EventPayload
// ---------------------------------------------------------------------------

/// Payload describing what happened.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    // -- Session lifecycle ---------------------------------------------------
    StateChanged {
        from: PlaybackState,
        to: PlaybackState,
    },
    DeviceConnected {
        device_id: DeviceId,
    },
    Disconnected {
        device_id: Option<DeviceId>,
    },

    // -- Media lifecycle -----------------------------------------------------
    FileLoading {
        entry_id: EntryId,
    },
    FileLoaded {
        entry_id: EntryId,
        title: String,
        duration_secs: f64,
        seek_secs: f64,
    },
    TimeChanged {
        entry_id: EntryId,
        elapsed_secs: f64,
        played_percentage: f64,
    },
    Paused {
        entry_id: EntryId,
    },
    Resumed {
        entry_id: EntryId,
    },
    EndReached {
        entry_id: EntryId,
    },
    VolumeChanged {
        level: f64,
        muted: bool,
    },
    Stopped,
    PlaybackError {
        entry_id: Option<EntryId>,
        kind: ErrorKind,
        message: String,
    },

    // -- Library -------------------------------------------------------------
    EntryUpdated {
        playlist_id: PlaylistId,
        entry_id: EntryId,
    },
    PlaylistUpdated {
        playlist_id: PlaylistId,
    },
    LoopChanged {
        entry_id: EntryId,
        looping: bool,
    },
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// A timestamped, sequenced event ready for broadcast.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Unique event identifier.
    pub id: Uuid,
    /// Monotonic sequence number assigned by the bus.
    pub seq: u64,
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
    /// What happened.
    pub payload: EventPayload,
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Broadcast channel with a bounded ring buffer of recent events.
pub struct EventBus {
    tx: broadcast::Sender<Event>,
    recent: RwLock<VecDeque<Event>>,
}

impl EventBus {
    /// Create a new event bus.
    ///
    /// `capacity` controls the broadcast channel buffer size (not the ring
    /// buffer, which is always [`MAX_RECENT_EVENTS`]).
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            recent: RwLock::new(VecDeque::with_capacity(MAX_RECENT_EVENTS)),
        }
    }

    /// Subscribe to the broadcast channel.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Broadcast an event to all current subscribers and store it in the
    /// ring buffer.
    pub fn broadcast(&self, payload: EventPayload) {
        // Sequence assignment and send happen under the same write lock so
        // subscribers observe events in sequence order.
        let mut recent = self.recent.write();
        let seq = recent.front().map(|e| e.seq + 1).unwrap_or(0);
        let event = Event {
            id: Uuid::new_v4(),
            seq,
            timestamp: Utc::now(),
            payload,
        };

        if recent.len() >= MAX_RECENT_EVENTS {
            recent.pop_back();
        }
        recent.push_front(event.clone());

        // Ignore send errors (no subscribers).
        let _ = self.tx.send(event);
    }

    /// Return the `n` most recent events (newest first).
    pub fn recent_events(&self, n: usize) -> Vec<Event> {
        let recent = self.recent.read();
        recent.iter().take(n).cloned().collect()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broadcast_and_receive() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        let entry_id = EntryId::new();
        bus.broadcast(EventPayload::FileLoading { entry_id });

        let event = rx.try_recv().unwrap();
        match &event.payload {
            EventPayload::FileLoading { entry_id: received } => assert_eq!(*received, entry_id),
            other => panic!("unexpected payload: {:?}", other),
        }
    }

    #[test]
    fn sequence_numbers_are_monotonic() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        bus.broadcast(EventPayload::Stopped);
        bus.broadcast(EventPayload::StateChanged {
            from: PlaybackState::Stopped,
            to: PlaybackState::Idle,
        });

        let first = rx.try_recv().unwrap();
        let second = rx.try_recv().unwrap();
        assert_eq!(first.seq + 1, second.seq);
    }

    #[test]
    fn recent_events_capped() {
        let bus = EventBus::new(256);
        for _ in 0..150 {
            bus.broadcast(EventPayload::Stopped);
        }
        let recent = bus.recent_events(200);
        assert_eq!(recent.len(), MAX_RECENT_EVENTS);
        assert_eq!(recent[0].seq, 149);
    }

    #[test]
    fn no_subscribers_does_not_panic() {
        let bus = EventBus::new(4);
        bus.broadcast(EventPayload::PlaybackError {
            entry_id: None,
            kind: ErrorKind::NoDevice,
            message: "test".into(),
        });
    }

    #[test]
    fn payload_serializes_with_type_tag() {
        let json = serde_json::to_string(&EventPayload::VolumeChanged {
            level: 0.5,
            muted: false,
        })
        .unwrap();
        assert!(json.contains("\"type\":\"volume_changed\""));
    }

    #[test]
    fn state_helpers() {
        assert!(PlaybackState::Paused.has_media());
        assert!(!PlaybackState::Loading.has_media());
        assert!(PlaybackState::Navigating.is_busy());
        assert!(!PlaybackState::Stopped.is_busy());
    }
}
