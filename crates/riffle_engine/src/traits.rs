//! Native Engine Traits
//!
//! Defines the boundary every native media engine implementation must provide.
//! The libVLC binding in [`crate::vlc`] is the production implementation; the
//! playback core is written against these traits only.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::EngineResult;

/// Where the loaded engine came from (diagnostics only)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LoadSource {
    /// Runtime shipped inside the application package
    Bundled,
    /// Portable copy next to the executable or working directory
    ApplicationDirectory,
    /// System-wide installation
    SystemInstalled,
    /// No candidate could be used
    Unavailable,
}

impl fmt::Display for LoadSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoadSource::Bundled => "bundled",
            LoadSource::ApplicationDirectory => "application directory",
            LoadSource::SystemInstalled => "system installed",
            LoadSource::Unavailable => "unavailable",
        };
        f.write_str(name)
    }
}

/// What the native engine should open
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaLocator {
    /// Local filesystem path
    Path(PathBuf),
    /// URL / MRL understood by the engine (http, rtsp, ...)
    Location(String),
}

impl fmt::Display for MediaLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaLocator::Path(path) => write!(f, "{}", path.display()),
            MediaLocator::Location(url) => f.write_str(url),
        }
    }
}

/// Player state as reported by the native engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeState {
    NothingSpecial,
    Opening,
    Buffering,
    Playing,
    Paused,
    Stopped,
    Ended,
    Error,
}

/// Native callback types the engine may let us subscribe to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeEventKind {
    EndReached,
    TimeChanged,
    StateChanged,
    Playing,
    MediaParsedChanged,
}

impl NativeEventKind {
    pub const ALL: [NativeEventKind; 5] = [
        NativeEventKind::EndReached,
        NativeEventKind::TimeChanged,
        NativeEventKind::StateChanged,
        NativeEventKind::Playing,
        NativeEventKind::MediaParsedChanged,
    ];
}

/// A native callback, already decoded from the engine's representation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeEvent {
    EndReached,
    TimeChanged(Duration),
    StateChanged(NativeState),
    Playing,
    MediaParsed,
}

/// Callback invoked from engine-owned threads
///
/// Implementations must not call back into the native player; forward the
/// event to another thread instead.
pub type EventSink = Arc<dyn Fn(NativeEvent) + Send + Sync>;

/// One output endpoint as listed by the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeOutputDevice {
    /// Engine device identifier (may be empty or a sentinel for "default")
    pub id: String,

    /// Human-readable description
    pub description: String,
}

/// One decoded audio track of the current media
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeTrack {
    pub id: i32,
    pub name: String,
}

/// Optional engine features discovered once when the library is loaded
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineCapabilities {
    /// Event attach/detach is available
    pub events: bool,
    /// Per-player output device enumeration
    pub device_enumeration: bool,
    /// Per-module output device listing on the instance
    pub module_device_listing: bool,
    /// Reading back the active output device
    pub device_readback: bool,
    /// Asynchronous media parsing
    pub media_parsing: bool,
    /// Audio track descriptions
    pub track_descriptions: bool,
}

/// A loaded native engine instance (the process-wide engine handle)
pub trait MediaEngine: Send + Sync + 'static {
    type Media: NativeMedia;
    type Player: NativePlayer<Media = Self::Media>;

    /// Engine version string
    fn version(&self) -> String;

    /// Optional features of the loaded library
    fn capabilities(&self) -> EngineCapabilities;

    /// Create a player bound to this engine
    fn new_player(&self) -> EngineResult<Self::Player>;

    /// Create a media object for a locator
    fn new_media(&self, locator: &MediaLocator) -> EngineResult<Self::Media>;

    /// List output devices of one output module (empty string = engine default)
    fn list_output_devices(&self, module: &str) -> EngineResult<Vec<NativeOutputDevice>>;
}

/// A native media object (released on drop)
pub trait NativeMedia: Send + 'static {
    /// Start parsing metadata; completion is signalled by `MediaParsed`
    fn parse(&self) -> EngineResult<()>;

    /// Whether parsing has completed
    fn is_parsed(&self) -> bool;

    /// Duration if already known
    fn duration(&self) -> Option<Duration>;
}

/// A native player (released on drop)
pub trait NativePlayer: Send + 'static {
    type Media: NativeMedia;

    /// Bind media; the player keeps its own native reference
    fn set_media(&mut self, media: &Self::Media);

    fn play(&mut self) -> EngineResult<()>;
    fn set_pause(&mut self, paused: bool);
    fn stop(&mut self);
    fn state(&self) -> NativeState;

    fn time(&self) -> Option<Duration>;
    fn set_time(&mut self, time: Duration);
    fn length(&self) -> Option<Duration>;
    fn position(&self) -> Option<f32>;
    fn set_position(&mut self, position: f32);

    /// Volume 0-100, `None` while no audio output exists
    fn volume(&self) -> Option<u8>;
    fn set_volume(&mut self, volume: u8) -> EngineResult<()>;
    fn is_muted(&self) -> Option<bool>;
    fn set_mute(&mut self, muted: bool);
    fn rate(&self) -> f32;
    fn set_rate(&mut self, rate: f32) -> EngineResult<()>;

    fn audio_track(&self) -> Option<i32>;
    fn set_audio_track(&mut self, id: i32) -> EngineResult<()>;
    fn audio_tracks(&self) -> Vec<NativeTrack>;

    fn set_fullscreen(&mut self, fullscreen: bool);

    /// Select the audio output module (e.g. "pulse", "directsound")
    fn set_output_module(&mut self, module: &str) -> EngineResult<()>;

    /// Select an output device; `module` of `None` keeps the current module
    fn set_output_device(&mut self, module: Option<&str>, device_id: &str);

    /// Read back the active output device identifier
    fn output_device(&self) -> Option<String>;

    /// Enumerate devices of the player's current output module
    fn enumerate_output_devices(&self) -> Vec<NativeOutputDevice>;

    /// Attach a callback; `Err` means this signal is unavailable
    fn subscribe(&mut self, kind: NativeEventKind, sink: EventSink) -> EngineResult<()>;
}
