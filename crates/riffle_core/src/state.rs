//! Playback state machine
//!
//! ```text
//!            load              native playing
//! Stopped ─────────▶ Loading ─────────────────▶ Playing ◀──┐
//!    ▲  ▲               │                         │ pause  │ resume
//!    │  └───── stop ────┤                         ▼        │
//!    │                  │                      Paused ─────┘
//!    └──── stop ────────┴──── (Playing/Paused) ───┘
//!
//! any ──▶ Error ──load──▶ Loading
//! ```

use std::fmt;

use riffle_engine::NativeState;
use serde::{Deserialize, Serialize};

/// Public playback state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlaybackState {
    #[default]
    Stopped,
    Loading,
    Playing,
    Paused,
    Error,
}

impl PlaybackState {
    /// Whether `self -> next` is a legal edge
    pub fn can_transition_to(self, next: PlaybackState) -> bool {
        use PlaybackState::*;

        match (self, next) {
            (_, Error) => self != Error,
            (Stopped | Paused | Error, Loading) => true,
            (Loading, Playing) => true,
            (Playing, Paused) | (Paused, Playing) => true,
            (Playing | Paused | Loading, Stopped) => true,
            _ => false,
        }
    }

    /// Public state implied by a native state, if any
    pub fn from_native(native: NativeState) -> Option<PlaybackState> {
        match native {
            NativeState::Opening | NativeState::Buffering => Some(Self::Loading),
            NativeState::Playing => Some(Self::Playing),
            NativeState::Paused => Some(Self::Paused),
            NativeState::Stopped | NativeState::Ended => Some(Self::Stopped),
            NativeState::Error => Some(Self::Error),
            NativeState::NothingSpecial => None,
        }
    }

    /// Media is bound and an output is (or is about to be) active
    pub fn is_active(self) -> bool {
        matches!(self, Self::Loading | Self::Playing | Self::Paused)
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Stopped => "stopped",
            Self::Loading => "loading",
            Self::Playing => "playing",
            Self::Paused => "paused",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::PlaybackState::*;
    use super::*;

    const ALL: [PlaybackState; 5] = [Stopped, Loading, Playing, Paused, Error];

    #[test]
    fn test_legal_edges() {
        assert!(Stopped.can_transition_to(Loading));
        assert!(Paused.can_transition_to(Loading));
        assert!(Loading.can_transition_to(Playing));
        assert!(Loading.can_transition_to(Error));
        assert!(Playing.can_transition_to(Paused));
        assert!(Paused.can_transition_to(Playing));
        assert!(Error.can_transition_to(Loading));
        for state in [Playing, Paused, Loading] {
            assert!(state.can_transition_to(Stopped));
        }
    }

    #[test]
    fn test_illegal_edges() {
        assert!(!Stopped.can_transition_to(Playing));
        assert!(!Stopped.can_transition_to(Paused));
        assert!(!Loading.can_transition_to(Paused));
        assert!(!Playing.can_transition_to(Loading));
        assert!(!Error.can_transition_to(Playing));
        assert!(!Error.can_transition_to(Stopped));
        for state in ALL {
            assert!(!state.can_transition_to(state), "{state} -> {state}");
        }
    }

    #[test]
    fn test_any_state_can_fail() {
        for state in [Stopped, Loading, Playing, Paused] {
            assert!(state.can_transition_to(Error));
        }
    }

    #[test]
    fn test_native_mapping() {
        assert_eq!(PlaybackState::from_native(NativeState::Ended), Some(Stopped));
        assert_eq!(PlaybackState::from_native(NativeState::Buffering), Some(Loading));
        assert_eq!(PlaybackState::from_native(NativeState::NothingSpecial), None);
    }
}
