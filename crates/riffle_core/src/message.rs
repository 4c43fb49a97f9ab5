//! Message Types for Thread Communication
//!
//! Native callbacks flow from engine threads -> event thread (`BridgeMessage`)
//! Events flow from the core -> host listeners (`PlayerEvent`)

use riffle_engine::NativeEvent;
use serde::{Deserialize, Serialize};

use crate::state::PlaybackState;

/// Messages consumed by the event thread
#[derive(Debug, Clone)]
pub(crate) enum BridgeMessage {
    /// Decoded native callback
    Native(NativeEvent),

    /// Stop the event thread
    Shutdown,
}

/// Category of an error event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    MediaLoad,
    Playback,
    DeviceSwitch,
}

/// Events delivered to host listeners
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum PlayerEvent {
    /// Public playback state changed along a legal edge
    StateChanged {
        old: PlaybackState,
        new: PlaybackState,
    },

    /// Playback position update
    TimeChanged { time_ms: u64 },

    /// Volume or mute changed
    VolumeChanged { volume: u8, muted: bool },

    /// Output device applied (`verified` once read back from the engine)
    AudioDeviceChanged {
        device_id: Option<String>,
        module: Option<String>,
        verified: bool,
    },

    /// Media metadata finished parsing
    MediaParsed { duration_ms: Option<u64> },

    Error { kind: ErrorKind, message: String },
}

impl PlayerEvent {
    /// Create an error event from any error type
    pub fn error<E: std::fmt::Display>(kind: ErrorKind, err: E) -> Self {
        PlayerEvent::Error {
            kind,
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = PlayerEvent::StateChanged {
            old: PlaybackState::Loading,
            new: PlaybackState::Playing,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("StateChanged"));

        let deserialized: PlayerEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, event);
    }

    #[test]
    fn test_error_event() {
        let event = PlayerEvent::error(ErrorKind::DeviceSwitch, "device gone");
        if let PlayerEvent::Error { kind, message } = event {
            assert_eq!(kind, ErrorKind::DeviceSwitch);
            assert_eq!(message, "device gone");
        } else {
            panic!("Should be Error variant");
        }
    }
}
