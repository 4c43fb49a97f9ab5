//! In-memory engine for unit tests
//!
//! Behaves like a small libVLC: native play reports opening then playing,
//! stop rewinds to zero, device changes are reflected in the read-back
//! unless the device is marked sticky. Callbacks are delivered synchronously
//! through the registered sinks after the fake's own lock is released.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use riffle_engine::{
    EngineCapabilities, EngineError, EngineResult, EventSink, LoadSource, MediaEngine,
    MediaLocator, NativeEvent, NativeEventKind, NativeMedia, NativeOutputDevice, NativePlayer,
    NativeState, NativeTrack, ResolvedEngine,
};

use crate::config::{PlayerConfig, SwitchPolicy};
use crate::context::EngineContext;

/// Upper bound for waiting on asynchronous effects in tests
pub(crate) const WAIT: Duration = Duration::from_secs(5);

pub(crate) struct FakeState {
    // Device listing
    pub module_devices: HashMap<String, Vec<NativeOutputDevice>>,
    pub module_listing_supported: bool,
    pub list_calls: usize,
    pub player_devices: Vec<NativeOutputDevice>,

    // Playback
    pub native_state: NativeState,
    pub time: Duration,
    pub length: Option<Duration>,
    pub media_duration: Option<Duration>,
    pub position: f32,
    pub fullscreen: bool,

    // Audio
    pub volume: Option<u8>,
    pub muted: bool,
    pub rate: f32,
    pub audio_track: Option<i32>,
    pub tracks: Vec<NativeTrack>,
    pub output_device: Option<String>,
    pub output_module: Option<String>,

    /// Devices whose selection never shows up in the read-back
    pub sticky_devices: HashSet<String>,
    /// Every `set_output_device` call as (module, id)
    pub device_log: Vec<(Option<String>, String)>,

    pub play_calls: usize,
    pub stop_calls: usize,
    pub set_media_calls: usize,
    pub set_time_log: Vec<Duration>,
    pub media_created: usize,
    pub media_released: usize,
    pub parse_calls: usize,
    /// Parsed status reported by media objects
    pub parsed: bool,

    pub fail_play: bool,
    pub fail_media: bool,

    pub unsupported_events: HashSet<NativeEventKind>,
    sinks: HashMap<NativeEventKind, Vec<EventSink>>,
}

impl Default for FakeState {
    fn default() -> Self {
        Self {
            module_devices: HashMap::new(),
            module_listing_supported: true,
            list_calls: 0,
            player_devices: Vec::new(),
            native_state: NativeState::NothingSpecial,
            time: Duration::ZERO,
            length: None,
            media_duration: Some(Duration::from_secs(180)),
            position: 0.0,
            fullscreen: false,
            volume: Some(100),
            muted: false,
            rate: 1.0,
            audio_track: None,
            tracks: Vec::new(),
            output_device: None,
            output_module: None,
            sticky_devices: HashSet::new(),
            device_log: Vec::new(),
            play_calls: 0,
            stop_calls: 0,
            set_media_calls: 0,
            set_time_log: Vec::new(),
            media_created: 0,
            media_released: 0,
            parse_calls: 0,
            parsed: true,
            fail_play: false,
            fail_media: false,
            unsupported_events: HashSet::new(),
            sinks: HashMap::new(),
        }
    }
}

fn kind_of(event: NativeEvent) -> NativeEventKind {
    match event {
        NativeEvent::EndReached => NativeEventKind::EndReached,
        NativeEvent::TimeChanged(_) => NativeEventKind::TimeChanged,
        NativeEvent::StateChanged(_) => NativeEventKind::StateChanged,
        NativeEvent::Playing => NativeEventKind::Playing,
        NativeEvent::MediaParsed => NativeEventKind::MediaParsedChanged,
    }
}

fn notify(state: &Mutex<FakeState>, events: &[NativeEvent]) {
    for &event in events {
        let sinks = state
            .lock()
            .sinks
            .get(&kind_of(event))
            .cloned()
            .unwrap_or_default();
        for sink in sinks {
            sink(event);
        }
    }
}

#[derive(Clone)]
pub(crate) struct FakeEngine {
    pub state: Arc<Mutex<FakeState>>,
    pub caps: EngineCapabilities,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(FakeState::default())),
            caps: EngineCapabilities {
                events: true,
                device_enumeration: true,
                module_device_listing: true,
                device_readback: true,
                media_parsing: true,
                track_descriptions: true,
            },
        }
    }

    /// Deliver a native callback as the engine would
    pub fn emit(&self, event: NativeEvent) {
        notify(&self.state, &[event]);
    }
}

impl MediaEngine for FakeEngine {
    type Media = FakeMedia;
    type Player = FakePlayer;

    fn version(&self) -> String {
        "3.0.20 Vetinari (fake)".to_string()
    }

    fn capabilities(&self) -> EngineCapabilities {
        self.caps
    }

    fn new_player(&self) -> EngineResult<FakePlayer> {
        Ok(FakePlayer {
            state: Arc::clone(&self.state),
        })
    }

    fn new_media(&self, locator: &MediaLocator) -> EngineResult<FakeMedia> {
        let mut state = self.state.lock();
        if state.fail_media {
            return Err(EngineError::MediaCreation(locator.to_string()));
        }
        state.media_created += 1;
        Ok(FakeMedia {
            state: Arc::clone(&self.state),
        })
    }

    fn list_output_devices(&self, module: &str) -> EngineResult<Vec<NativeOutputDevice>> {
        let mut state = self.state.lock();
        state.list_calls += 1;
        if !state.module_listing_supported {
            return Err(EngineError::Unsupported("audio output device listing"));
        }
        Ok(state.module_devices.get(module).cloned().unwrap_or_default())
    }
}

pub(crate) struct FakeMedia {
    state: Arc<Mutex<FakeState>>,
}

impl NativeMedia for FakeMedia {
    fn parse(&self) -> EngineResult<()> {
        self.state.lock().parse_calls += 1;
        Ok(())
    }

    fn is_parsed(&self) -> bool {
        self.state.lock().parsed
    }

    fn duration(&self) -> Option<Duration> {
        self.state.lock().media_duration
    }
}

impl Drop for FakeMedia {
    fn drop(&mut self) {
        self.state.lock().media_released += 1;
    }
}

pub(crate) struct FakePlayer {
    state: Arc<Mutex<FakeState>>,
}

impl NativePlayer for FakePlayer {
    type Media = FakeMedia;

    fn set_media(&mut self, _media: &FakeMedia) {
        let mut state = self.state.lock();
        state.set_media_calls += 1;
        state.length = state.media_duration;
    }

    fn play(&mut self) -> EngineResult<()> {
        {
            let mut state = self.state.lock();
            if state.fail_play {
                return Err(EngineError::NativeCall("play failed".into()));
            }
            state.play_calls += 1;
            state.native_state = NativeState::Playing;
        }
        notify(
            &self.state,
            &[NativeEvent::StateChanged(NativeState::Opening), NativeEvent::Playing],
        );
        Ok(())
    }

    fn set_pause(&mut self, paused: bool) {
        let event = {
            let mut state = self.state.lock();
            if paused {
                state.native_state = NativeState::Paused;
                NativeEvent::StateChanged(NativeState::Paused)
            } else {
                state.native_state = NativeState::Playing;
                NativeEvent::Playing
            }
        };
        notify(&self.state, &[event]);
    }

    fn stop(&mut self) {
        {
            let mut state = self.state.lock();
            state.stop_calls += 1;
            state.native_state = NativeState::Stopped;
            state.time = Duration::ZERO;
        }
        notify(&self.state, &[NativeEvent::StateChanged(NativeState::Stopped)]);
    }

    fn state(&self) -> NativeState {
        self.state.lock().native_state
    }

    fn time(&self) -> Option<Duration> {
        Some(self.state.lock().time)
    }

    fn set_time(&mut self, time: Duration) {
        let mut state = self.state.lock();
        state.time = time;
        state.set_time_log.push(time);
    }

    fn length(&self) -> Option<Duration> {
        self.state.lock().length
    }

    fn position(&self) -> Option<f32> {
        Some(self.state.lock().position)
    }

    fn set_position(&mut self, position: f32) {
        self.state.lock().position = position;
    }

    fn volume(&self) -> Option<u8> {
        self.state.lock().volume
    }

    fn set_volume(&mut self, volume: u8) -> EngineResult<()> {
        self.state.lock().volume = Some(volume);
        Ok(())
    }

    fn is_muted(&self) -> Option<bool> {
        Some(self.state.lock().muted)
    }

    fn set_mute(&mut self, muted: bool) {
        self.state.lock().muted = muted;
    }

    fn rate(&self) -> f32 {
        self.state.lock().rate
    }

    fn set_rate(&mut self, rate: f32) -> EngineResult<()> {
        self.state.lock().rate = rate;
        Ok(())
    }

    fn audio_track(&self) -> Option<i32> {
        self.state.lock().audio_track
    }

    fn set_audio_track(&mut self, id: i32) -> EngineResult<()> {
        let mut state = self.state.lock();
        if !state.tracks.iter().any(|track| track.id == id) {
            return Err(EngineError::NativeCall(format!("audio track {} rejected", id)));
        }
        state.audio_track = Some(id);
        Ok(())
    }

    fn audio_tracks(&self) -> Vec<NativeTrack> {
        self.state.lock().tracks.clone()
    }

    fn set_fullscreen(&mut self, fullscreen: bool) {
        self.state.lock().fullscreen = fullscreen;
    }

    fn set_output_module(&mut self, module: &str) -> EngineResult<()> {
        self.state.lock().output_module = Some(module.to_string());
        Ok(())
    }

    fn set_output_device(&mut self, module: Option<&str>, device_id: &str) {
        let mut state = self.state.lock();
        state
            .device_log
            .push((module.map(str::to_string), device_id.to_string()));
        if let Some(module) = module {
            state.output_module = Some(module.to_string());
        }
        if !state.sticky_devices.contains(device_id) {
            state.output_device = Some(device_id.to_string());
        }
    }

    fn output_device(&self) -> Option<String> {
        self.state.lock().output_device.clone()
    }

    fn enumerate_output_devices(&self) -> Vec<NativeOutputDevice> {
        self.state.lock().player_devices.clone()
    }

    fn subscribe(&mut self, kind: NativeEventKind, sink: EventSink) -> EngineResult<()> {
        let mut state = self.state.lock();
        if state.unsupported_events.contains(&kind) {
            return Err(EngineError::Unsupported("native event"));
        }
        state.sinks.entry(kind).or_default().push(sink);
        Ok(())
    }
}

pub(crate) fn native_device(id: &str, description: &str) -> NativeOutputDevice {
    NativeOutputDevice {
        id: id.to_string(),
        description: description.to_string(),
    }
}

/// Poll `condition` until it holds or `timeout` passes
pub(crate) fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(5));
    }
}

/// Default config with switch timings shrunk for tests
pub(crate) fn fast_config() -> PlayerConfig {
    PlayerConfig {
        switch: SwitchPolicy {
            max_attempts: 3,
            initial_delay_ms: 10,
            backoff_multiplier: 2,
            max_delay_ms: 40,
            settle_ms: 10,
            playing_wait_ms: 500,
        },
        ..PlayerConfig::default()
    }
}

pub(crate) fn context(engine: FakeEngine) -> EngineContext<FakeEngine> {
    let resolved = ResolvedEngine {
        engine,
        source: LoadSource::Bundled,
        root: PathBuf::from("/opt/riffle/vlc"),
    };
    EngineContext::new(resolved, fast_config())
}
