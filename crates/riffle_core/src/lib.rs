//! Riffle Core - Playback State Machine and Audio Device Switching
//!
//! Wraps one native media player behind a small, thread-safe API:
//! - Five-state playback machine driven by owner calls and native callbacks
//! - Output device catalog with a short-lived cache
//! - Device switching with read-back verification, retry and backoff
//! - Event fan-out to any number of host listeners
//!
//! # Threads
//!
//! ```text
//! owner ──calls──▶ Player ──▶ Mutex<Shared> ◀── event thread ◀── native callbacks
//!                    │              ▲
//!                    └─ mailbox ─▶ switch worker
//! ```
//!
//! Native callbacks never touch the player directly; they are forwarded to
//! the event thread. Every native call happens under the player mutex.

mod bridge;
mod config;
mod context;
mod device;
mod error;
mod message;
mod player;
mod settings;
mod source;
mod state;
mod switch;

#[cfg(test)]
mod testing;

pub use config::{PlayerConfig, SwitchPolicy};
pub use context::EngineContext;
pub use device::{
    normalize_device_id, same_device, AudioDeviceDescriptor, DeviceCatalog, DeviceSelection,
    DEFAULT_DEVICE_SENTINEL,
};
pub use error::{PlayerError, PlayerResult};
pub use message::{ErrorKind, PlayerEvent};
pub use player::{DeviceStatus, EventCapabilities, Player, MAX_RATE, MIN_RATE};
pub use settings::PlayerSettings;
pub use source::{MediaInfo, MediaKind, MediaSource};
pub use state::PlaybackState;

pub use riffle_engine::{EngineInfo, LoadSource, NativeTrack, ResolverConfig};
