//! Playback Core
//!
//! [`Player`] owns one native player and the media bound to it. Public
//! operations run on the owner thread; native callbacks are applied on the
//! event thread and device switches run on the switch worker. All three
//! serialize on one mutex, so native calls never overlap.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::{Mutex, MutexGuard};
use riffle_engine::{
    EngineCapabilities, MediaEngine, NativeEvent, NativeEventKind, NativeMedia, NativePlayer,
    NativeState, NativeTrack,
};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::bridge::{self, Listeners};
use crate::config::PlayerConfig;
use crate::device::{
    normalize_device_id, same_device, AudioDeviceDescriptor, DeviceCatalog, DeviceSelection,
};
use crate::error::{PlayerError, PlayerResult};
use crate::message::{BridgeMessage, ErrorKind, PlayerEvent};
use crate::source::{MediaInfo, MediaSource};
use crate::state::PlaybackState;
use crate::switch::{self, SwitchMailbox};

/// Slowest accepted playback rate
pub const MIN_RATE: f32 = 0.25;
/// Fastest accepted playback rate
pub const MAX_RATE: f32 = 4.0;

/// Native signals that could be subscribed when the player was created
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EventCapabilities {
    pub end_reached: bool,
    pub time_changed: bool,
    pub state_changed: bool,
    pub playing: bool,
    pub media_parsed: bool,
}

impl EventCapabilities {
    fn mark(&mut self, kind: NativeEventKind) {
        match kind {
            NativeEventKind::EndReached => self.end_reached = true,
            NativeEventKind::TimeChanged => self.time_changed = true,
            NativeEventKind::StateChanged => self.state_changed = true,
            NativeEventKind::Playing => self.playing = true,
            NativeEventKind::MediaParsedChanged => self.media_parsed = true,
        }
    }

    pub fn count(&self) -> usize {
        [
            self.end_reached,
            self.time_changed,
            self.state_changed,
            self.playing,
            self.media_parsed,
        ]
        .iter()
        .filter(|supported| **supported)
        .count()
    }
}

/// Snapshot of the output device situation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceStatus {
    /// Most recent selection (`None` = never selected)
    pub desired: Option<DeviceSelection>,
    /// Device id read back from the engine, normalized
    pub active_id: Option<String>,
    pub last_verified: Option<DeviceSelection>,
    /// Selection must be reapplied when playback next starts
    pub pending: bool,
    /// A switch is running on the worker
    pub switching: bool,
    pub output_module: Option<String>,
}

/// State guarded by the player mutex
pub(crate) struct Shared<E: MediaEngine> {
    // Field order is release order: media before player
    pub media: Option<E::Media>,
    pub player: E::Player,
    pub source: Option<MediaSource>,
    pub state: PlaybackState,
    pub events: EventCapabilities,
    pub desired: Option<DeviceSelection>,
    pub device_pending: bool,
    pub last_verified: Option<DeviceSelection>,
    pub output_module: Option<String>,
    pub volume: u8,
    pub muted: bool,
    pub rate: f32,
    /// Native stop/opening signals belong to a restart cycle until playing resumes
    pub suppress_until_playing: bool,
}

impl<E: MediaEngine> Shared<E> {
    pub fn apply_device(&mut self, target: &DeviceSelection) {
        self.player
            .set_output_device(target.module.as_deref(), target.native_id());
    }

    /// Remember that the selection must be reapplied on the next start
    pub fn mark_pending(&mut self) {
        if self.desired.is_some() {
            self.device_pending = true;
        }
    }

    pub fn apply_audio_settings(&mut self) {
        if let Err(e) = self.player.set_volume(self.volume) {
            debug!("Volume not applied yet: {}", e);
        }
        self.player.set_mute(self.muted);
        if let Err(e) = self.player.set_rate(self.rate) {
            debug!("Rate not applied yet: {}", e);
        }
    }

    pub fn duration(&self) -> Option<Duration> {
        self.player
            .length()
            .or_else(|| self.media.as_ref().and_then(|media| media.duration()))
    }
}

/// Everything shared between the owner thread, event thread and switch worker
pub(crate) struct Core<E: MediaEngine> {
    pub engine: Arc<E>,
    pub config: PlayerConfig,
    pub engine_caps: EngineCapabilities,
    pub shared: Mutex<Shared<E>>,
    pub listeners: Listeners,
    pub mailbox: SwitchMailbox,
}

impl<E: MediaEngine> Core<E> {
    pub fn lock(&self) -> MutexGuard<'_, Shared<E>> {
        self.shared.lock()
    }

    pub fn emit(&self, event: PlayerEvent) {
        self.listeners.emit(event);
    }

    /// Move along a legal edge; illegal or no-op transitions change nothing
    pub fn transition(&self, shared: &mut Shared<E>, next: PlaybackState) -> bool {
        let old = shared.state;
        if !old.can_transition_to(next) {
            if old != next {
                debug!("Ignoring illegal transition {} -> {}", old, next);
            }
            return false;
        }

        shared.state = next;
        debug!("Playback state {} -> {}", old, next);
        self.emit(PlayerEvent::StateChanged { old, new: next });
        true
    }

    /// Device changes on the active module only take effect after a restart
    pub fn requires_restart(&self, shared: &Shared<E>, target: &DeviceSelection) -> bool {
        shared.state == PlaybackState::Playing
            && target
                .module
                .as_deref()
                .or(shared.output_module.as_deref())
                .map(|module| self.config.is_restart_module(module))
                .unwrap_or(false)
    }

    fn enter_playing(&self, shared: &mut Shared<E>) {
        shared.suppress_until_playing = false;
        self.transition(shared, PlaybackState::Playing);
        if shared.state != PlaybackState::Playing {
            return;
        }

        if shared.device_pending {
            if let Some(target) = shared.desired.clone() {
                debug!("Reapplying pending output device {:?}", target.id);
                shared.apply_device(&target);
                self.emit(PlayerEvent::AudioDeviceChanged {
                    device_id: target.id.clone(),
                    module: target.module.clone(),
                    verified: false,
                });
                // Output opened on the selection; the worker only confirms it
                self.mailbox.submit(target, false, &self.config.switch);
            }
            shared.device_pending = false;
        }
        shared.apply_audio_settings();
    }

    fn enter_stopped(&self, shared: &mut Shared<E>) {
        if self.transition(shared, PlaybackState::Stopped) {
            shared.mark_pending();
        }
    }

    /// Apply one native callback (event thread)
    ///
    /// Loading and pausing are driven by the owner. Native signals only
    /// complete a start, report the end of playback or report an error, so
    /// callbacks queued before an owner transition cannot undo it.
    pub fn handle_native(&self, event: NativeEvent) {
        let mut guard = self.lock();
        let shared = &mut *guard;

        match event {
            NativeEvent::TimeChanged(time) => self.emit(PlayerEvent::TimeChanged {
                time_ms: time.as_millis() as u64,
            }),
            NativeEvent::EndReached => {
                debug!("End of media reached");
                self.native_stopped(shared);
            }
            NativeEvent::Playing => self.native_playing(shared),
            NativeEvent::StateChanged(native) => {
                if shared.suppress_until_playing && native != NativeState::Error {
                    debug!("Ignoring native {:?} during restart cycle", native);
                    return;
                }
                match PlaybackState::from_native(native) {
                    Some(PlaybackState::Playing) => self.native_playing(shared),
                    Some(PlaybackState::Stopped) => self.native_stopped(shared),
                    Some(PlaybackState::Error) => {
                        shared.suppress_until_playing = false;
                        if self.transition(shared, PlaybackState::Error) {
                            error!("Native player reported a playback error");
                            self.emit(PlayerEvent::error(
                                ErrorKind::Playback,
                                "native player reported a playback error",
                            ));
                        }
                    }
                    _ => {}
                }
            }
            NativeEvent::MediaParsed => {
                // Also fired when parsing fails or times out
                let Some(media) = shared.media.as_ref().filter(|media| media.is_parsed()) else {
                    debug!("Media parse did not complete");
                    return;
                };
                let duration = media.duration();
                debug!("Media parsed, duration {:?}", duration);
                self.emit(PlayerEvent::MediaParsed {
                    duration_ms: duration.map(|d| d.as_millis() as u64),
                });
            }
        }
    }

    fn native_playing(&self, shared: &mut Shared<E>) {
        shared.suppress_until_playing = false;
        if shared.state == PlaybackState::Loading {
            self.enter_playing(shared);
        }
    }

    fn native_stopped(&self, shared: &mut Shared<E>) {
        if matches!(shared.state, PlaybackState::Playing | PlaybackState::Paused) {
            self.enter_stopped(shared);
        }
    }
}

/// Media player bound to one loaded engine
///
/// Created through [`EngineContext::create_player`](crate::EngineContext::create_player).
pub struct Player<E: MediaEngine> {
    core: Arc<Core<E>>,
    catalog: Mutex<DeviceCatalog>,
    bridge_tx: Sender<BridgeMessage>,
    event_thread: Option<JoinHandle<()>>,
    switch_thread: Option<JoinHandle<()>>,
}

impl<E: MediaEngine> Player<E> {
    pub(crate) fn new(engine: Arc<E>, config: PlayerConfig) -> PlayerResult<Self> {
        config.validate().map_err(PlayerError::InvalidInput)?;

        let engine_caps = engine.capabilities();
        let mut native = engine.new_player()?;

        if let Some(module) = &config.output_module {
            if let Err(e) = native.set_output_module(module) {
                warn!("Output module {} not available: {}", module, e);
            }
        }

        let (bridge_tx, bridge_rx) = unbounded();
        let sink = bridge::native_sink(bridge_tx.clone());
        let mut events = EventCapabilities::default();
        for kind in NativeEventKind::ALL {
            match native.subscribe(kind, Arc::clone(&sink)) {
                Ok(()) => events.mark(kind),
                Err(e) => warn!("Native {:?} signal unavailable: {}", kind, e),
            }
        }

        let catalog = DeviceCatalog::new(config.device_cache_ttl(), config.probe_modules.clone());
        let shared = Shared {
            media: None,
            player: native,
            source: None,
            state: PlaybackState::Stopped,
            events,
            desired: None,
            device_pending: false,
            last_verified: None,
            output_module: config.output_module.clone(),
            volume: 100,
            muted: false,
            rate: 1.0,
            suppress_until_playing: false,
        };

        let core = Arc::new(Core {
            engine,
            config,
            engine_caps,
            shared: Mutex::new(shared),
            listeners: Listeners::default(),
            mailbox: SwitchMailbox::default(),
        });

        let event_core = Arc::clone(&core);
        let event_thread =
            bridge::spawn_event_thread(bridge_rx, move |event| event_core.handle_native(event))
                .map_err(|e| PlayerError::WorkerSpawn(e.to_string()))?;

        let switch_thread = match switch::spawn_switch_worker(Arc::clone(&core)) {
            Ok(handle) => handle,
            Err(e) => {
                let _ = bridge_tx.send(BridgeMessage::Shutdown);
                let _ = event_thread.join();
                return Err(PlayerError::WorkerSpawn(e.to_string()));
            }
        };

        info!(
            "Player created ({} of {} native signals available)",
            events.count(),
            NativeEventKind::ALL.len()
        );

        Ok(Self {
            core,
            catalog: Mutex::new(catalog),
            bridge_tx,
            event_thread: Some(event_thread),
            switch_thread: Some(switch_thread),
        })
    }

    /// Receive every event emitted from now on
    pub fn subscribe(&self) -> Receiver<PlayerEvent> {
        self.core.listeners.subscribe()
    }

    pub fn state(&self) -> PlaybackState {
        self.core.lock().state
    }

    pub fn event_capabilities(&self) -> EventCapabilities {
        self.core.lock().events
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.core.config
    }

    // --- Media ---

    /// Parse `input` and bind it; see [`MediaSource::parse`]
    pub fn load(&self, input: &str) -> PlayerResult<()> {
        match MediaSource::parse(input) {
            Ok(source) => self.load_source(source),
            Err(e) => {
                self.core.emit(PlayerEvent::error(ErrorKind::MediaLoad, &e));
                Err(e)
            }
        }
    }

    /// Release prior media, bind `source`, state -> Loading
    pub fn load_source(&self, source: MediaSource) -> PlayerResult<()> {
        let core = &self.core;
        let mut guard = core.lock();
        let shared = &mut *guard;

        // Acquire the new media before touching the old one
        let media = match core.engine.new_media(&source.locator()) {
            Ok(media) => media,
            Err(e) => {
                let err = PlayerError::MediaLoad {
                    media: source.to_string(),
                    reason: e.to_string(),
                };
                warn!("{}", err);
                core.emit(PlayerEvent::error(ErrorKind::MediaLoad, &err));
                return Err(err);
            }
        };

        if shared.state.is_active() {
            core.mailbox.supersede();
            shared.player.stop();
            core.enter_stopped(shared);
        }
        shared.suppress_until_playing = false;

        shared.player.set_media(&media);
        drop(shared.media.replace(media));

        if core.engine_caps.media_parsing {
            if let Some(media) = &shared.media {
                if let Err(e) = media.parse() {
                    debug!("Media parse request failed: {}", e);
                }
            }
        }

        info!("Loaded {}", source);
        shared.source = Some(source);
        core.transition(shared, PlaybackState::Loading);
        Ok(())
    }

    pub fn media_info(&self) -> Option<MediaInfo> {
        let shared = self.core.lock();
        let source = shared.source.as_ref()?;
        Some(MediaInfo {
            title: source.title(),
            source: source.to_string(),
            kind: source.kind(),
            duration: shared.duration(),
            current_time: shared.player.time(),
        })
    }

    // --- Transport ---

    /// Start playback of the bound media; resumes when paused
    pub fn play(&self) -> bool {
        let core = &self.core;
        let mut guard = core.lock();
        let shared = &mut *guard;

        if shared.media.is_none() {
            debug!("play() without media");
            return false;
        }
        match shared.state {
            PlaybackState::Paused => return self.resume_locked(shared),
            PlaybackState::Playing | PlaybackState::Error => return false,
            PlaybackState::Stopped => {
                core.transition(shared, PlaybackState::Loading);
            }
            PlaybackState::Loading => {}
        }

        if let Some(target) = shared.desired.clone() {
            shared.apply_device(&target);
        }

        if let Err(e) = shared.player.play() {
            error!("Native play failed: {}", e);
            core.transition(shared, PlaybackState::Error);
            core.emit(PlayerEvent::error(ErrorKind::Playback, &e));
            return false;
        }

        // Without a playing signal nothing else will complete the transition
        if !shared.events.playing {
            core.enter_playing(shared);
        }
        true
    }

    pub fn pause(&self) -> bool {
        let mut guard = self.core.lock();
        let shared = &mut *guard;
        if shared.state != PlaybackState::Playing {
            return false;
        }
        shared.player.set_pause(true);
        self.core.transition(shared, PlaybackState::Paused)
    }

    pub fn resume(&self) -> bool {
        let mut guard = self.core.lock();
        self.resume_locked(&mut guard)
    }

    fn resume_locked(&self, shared: &mut Shared<E>) -> bool {
        if shared.state != PlaybackState::Paused {
            return false;
        }
        let pending = if shared.device_pending {
            shared.desired.clone()
        } else {
            None
        };
        shared.device_pending = false;
        if let Some(target) = &pending {
            shared.apply_device(target);
        }
        shared.player.set_pause(false);
        if !self.core.transition(shared, PlaybackState::Playing) {
            return false;
        }

        // The paused output is still open on the old device
        if let Some(target) = pending {
            let requires_restart = self.core.requires_restart(shared, &target);
            self.core
                .mailbox
                .submit(target, requires_restart, &self.core.config.switch);
        }
        true
    }

    /// Always accepted; keeps the device selection pending for the next start
    pub fn stop(&self) -> bool {
        let core = &self.core;
        let mut guard = core.lock();
        let shared = &mut *guard;

        core.mailbox.supersede();
        shared.suppress_until_playing = false;
        match shared.state {
            PlaybackState::Stopped => {}
            PlaybackState::Error => shared.player.stop(),
            _ => {
                shared.player.stop();
                core.transition(shared, PlaybackState::Stopped);
            }
        }
        shared.mark_pending();
        true
    }

    pub fn toggle_play_pause(&self) -> bool {
        match self.state() {
            PlaybackState::Playing => self.pause(),
            PlaybackState::Paused => self.resume(),
            _ => self.play(),
        }
    }

    /// Pull the native state through the state machine (for engines
    /// without state signals)
    pub fn sync_state(&self) -> PlaybackState {
        let core = &self.core;
        let mut guard = core.lock();
        let shared = &mut *guard;

        let native = shared.player.state();
        match PlaybackState::from_native(native) {
            Some(PlaybackState::Playing) => core.enter_playing(shared),
            Some(PlaybackState::Stopped) => core.enter_stopped(shared),
            Some(next) => {
                core.transition(shared, next);
            }
            None => {}
        }
        shared.state
    }

    // --- Position ---

    pub fn current_time(&self) -> Option<Duration> {
        let shared = self.core.lock();
        shared.media.as_ref()?;
        shared.player.time()
    }

    pub fn duration(&self) -> Option<Duration> {
        let shared = self.core.lock();
        shared.media.as_ref()?;
        shared.duration()
    }

    /// Seek to an absolute time, clamped to the media duration
    pub fn seek_to(&self, time: Duration) -> PlayerResult<Duration> {
        let mut shared = self.core.lock();
        if shared.media.is_none() {
            return Err(PlayerError::NoMedia);
        }
        let duration = shared.duration().ok_or(PlayerError::DurationUnknown)?;
        let target = time.min(duration);
        shared.player.set_time(target);
        debug!("Seek to {:?}", target);
        Ok(target)
    }

    /// Seek forward by `step` (configured step when `None`)
    pub fn seek_forward(&self, step: Option<Duration>) -> PlayerResult<Duration> {
        self.seek_relative(step, true)
    }

    /// Seek backward by `step` (configured step when `None`)
    pub fn seek_backward(&self, step: Option<Duration>) -> PlayerResult<Duration> {
        self.seek_relative(step, false)
    }

    fn seek_relative(&self, step: Option<Duration>, forward: bool) -> PlayerResult<Duration> {
        let step = step.unwrap_or_else(|| self.core.config.seek_step());
        let mut shared = self.core.lock();
        if shared.media.is_none() {
            return Err(PlayerError::NoMedia);
        }
        let duration = shared.duration().ok_or(PlayerError::DurationUnknown)?;
        let current = shared.player.time().unwrap_or_default();

        let target = if forward {
            current.saturating_add(step).min(duration)
        } else {
            current.saturating_sub(step)
        };
        shared.player.set_time(target);
        debug!("Seek {:?} -> {:?}", current, target);
        Ok(target)
    }

    /// Relative position 0.0-1.0
    pub fn position(&self) -> Option<f32> {
        let shared = self.core.lock();
        shared.media.as_ref()?;
        shared.player.position()
    }

    pub fn set_position(&self, position: f32) -> PlayerResult<()> {
        if !(0.0..=1.0).contains(&position) {
            return Err(PlayerError::InvalidInput(format!(
                "position {} out of range 0.0-1.0",
                position
            )));
        }
        let mut shared = self.core.lock();
        if shared.media.is_none() {
            return Err(PlayerError::NoMedia);
        }
        shared.player.set_position(position);
        Ok(())
    }

    // --- Audio ---

    /// Set volume 0-100; out-of-range values are rejected, never clamped
    pub fn set_volume(&self, volume: u8) -> PlayerResult<()> {
        if volume > 100 {
            return Err(PlayerError::InvalidInput(format!(
                "volume {} out of range 0-100",
                volume
            )));
        }
        let mut shared = self.core.lock();
        shared.volume = volume;
        if let Err(e) = shared.player.set_volume(volume) {
            debug!("Volume cached until output starts: {}", e);
        }
        self.core.emit(PlayerEvent::VolumeChanged {
            volume,
            muted: shared.muted,
        });
        Ok(())
    }

    pub fn volume(&self) -> u8 {
        self.core.lock().volume
    }

    pub fn set_mute(&self, muted: bool) {
        let mut shared = self.core.lock();
        shared.muted = muted;
        shared.player.set_mute(muted);
        self.core.emit(PlayerEvent::VolumeChanged {
            volume: shared.volume,
            muted,
        });
    }

    /// Flip mute; returns the new mute state
    pub fn toggle_mute(&self) -> bool {
        let muted = !self.is_muted();
        self.set_mute(muted);
        muted
    }

    pub fn is_muted(&self) -> bool {
        self.core.lock().muted
    }

    /// Set playback rate within [`MIN_RATE`]..=[`MAX_RATE`]
    pub fn set_rate(&self, rate: f32) -> PlayerResult<()> {
        if !rate.is_finite() || !(MIN_RATE..=MAX_RATE).contains(&rate) {
            return Err(PlayerError::InvalidInput(format!(
                "rate {} out of range {}-{}",
                rate, MIN_RATE, MAX_RATE
            )));
        }
        let mut shared = self.core.lock();
        shared.rate = rate;
        if let Err(e) = shared.player.set_rate(rate) {
            debug!("Rate cached until output starts: {}", e);
        }
        Ok(())
    }

    pub fn rate(&self) -> f32 {
        self.core.lock().rate
    }

    pub fn set_audio_track(&self, id: i32) -> PlayerResult<()> {
        let mut shared = self.core.lock();
        if shared.media.is_none() {
            return Err(PlayerError::NoMedia);
        }
        shared
            .player
            .set_audio_track(id)
            .map_err(|e| PlayerError::Playback(e.to_string()))
    }

    pub fn audio_track(&self) -> Option<i32> {
        let shared = self.core.lock();
        shared.media.as_ref()?;
        shared.player.audio_track()
    }

    /// Decoded audio tracks; empty until the media has been parsed
    pub fn available_audio_tracks(&self) -> Vec<NativeTrack> {
        let shared = self.core.lock();
        if shared.media.is_none() {
            return Vec::new();
        }
        shared.player.audio_tracks()
    }

    pub fn set_fullscreen(&self, fullscreen: bool) {
        self.core.lock().player.set_fullscreen(fullscreen);
    }

    // --- Devices ---

    /// Output devices, default entry first; cached unless `force_refresh`
    pub fn available_audio_devices(&self, force_refresh: bool) -> Vec<AudioDeviceDescriptor> {
        let mut catalog = self.catalog.lock();
        let shared = self.core.lock();
        catalog.devices(&*self.core.engine, Some(&shared.player), force_refresh)
    }

    /// Request an output device; always accepted immediately
    ///
    /// While playing the switch is applied, verified and retried on the
    /// switch worker. Otherwise the device is applied now and kept pending
    /// until playback starts.
    pub fn select_device(&self, descriptor: &AudioDeviceDescriptor) -> bool {
        self.select(DeviceSelection::from(descriptor))
    }

    /// Same as [`select_device`](Self::select_device) for a bare id
    pub fn select_device_id(&self, id: Option<&str>, module: Option<&str>) -> bool {
        self.select(DeviceSelection::new(id, module))
    }

    fn select(&self, target: DeviceSelection) -> bool {
        {
            // A device missing from the listing means the listing is stale
            let mut catalog = self.catalog.lock();
            let listed = catalog.cached().map(|devices| {
                devices
                    .iter()
                    .any(|device| same_device(device.id.as_deref(), target.id.as_deref()))
            });
            if listed == Some(false) {
                debug!("Selected device not in cached listing, dropping cache");
                catalog.invalidate();
            }
        }

        let core = &self.core;
        let mut guard = core.lock();
        let shared = &mut *guard;

        info!(
            "Output device requested: {} ({})",
            target.id.as_deref().unwrap_or("system default"),
            target.module.as_deref().unwrap_or("current module")
        );
        shared.desired = Some(target.clone());
        if let Some(module) = &target.module {
            shared.output_module = Some(module.clone());
        }

        if shared.state != PlaybackState::Playing {
            core.mailbox.supersede();
            shared.apply_device(&target);
            shared.device_pending = true;
            core.emit(PlayerEvent::AudioDeviceChanged {
                device_id: target.id.clone(),
                module: target.module.clone(),
                verified: false,
            });
            return true;
        }

        let requires_restart = core.requires_restart(shared, &target);
        core.mailbox
            .submit(target, requires_restart, &core.config.switch);
        true
    }

    pub fn current_device_info(&self) -> DeviceStatus {
        let shared = self.core.lock();
        DeviceStatus {
            desired: shared.desired.clone(),
            active_id: shared
                .player
                .output_device()
                .and_then(|id| normalize_device_id(Some(&id))),
            last_verified: shared.last_verified.clone(),
            pending: shared.device_pending,
            switching: self.core.mailbox.is_busy(),
            output_module: shared.output_module.clone(),
        }
    }
}

impl<E: MediaEngine> Drop for Player<E> {
    fn drop(&mut self) {
        self.core.mailbox.shutdown();
        if let Some(handle) = self.switch_thread.take() {
            let _ = handle.join();
        }

        let _ = self.bridge_tx.send(BridgeMessage::Shutdown);
        if let Some(handle) = self.event_thread.take() {
            let _ = handle.join();
        }

        let mut shared = self.core.lock();
        if shared.state.is_active() {
            shared.player.stop();
        }
        debug!("Player shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{context, native_device, wait_until, FakeEngine, WAIT};

    const SONG: &str = "http://example.com/song.mp3";

    fn playing_player(engine: &FakeEngine) -> Player<FakeEngine> {
        let player = context(engine.clone()).create_player().unwrap();
        player.load(SONG).unwrap();
        assert!(player.play());
        assert!(wait_until(WAIT, || player.state() == PlaybackState::Playing));
        player
    }

    #[test]
    fn test_initial_state() {
        let player = context(FakeEngine::new()).create_player().unwrap();
        assert_eq!(player.state(), PlaybackState::Stopped);
        assert_eq!(player.volume(), 100);
        assert_eq!(player.event_capabilities().count(), 5);
        assert!(player.media_info().is_none());
    }

    #[test]
    fn test_load_play_reaches_playing_via_native_signal() {
        let engine = FakeEngine::new();
        let player = context(engine.clone()).create_player().unwrap();
        let events = player.subscribe();

        player.load(SONG).unwrap();
        assert_eq!(player.state(), PlaybackState::Loading);
        assert!(player.play());
        assert!(wait_until(WAIT, || player.state() == PlaybackState::Playing));

        let states: Vec<_> = events
            .try_iter()
            .filter_map(|event| match event {
                PlayerEvent::StateChanged { old, new } => Some((old, new)),
                _ => None,
            })
            .collect();
        assert_eq!(
            states,
            vec![
                (PlaybackState::Stopped, PlaybackState::Loading),
                (PlaybackState::Loading, PlaybackState::Playing),
            ]
        );
    }

    #[test]
    fn test_pending_device_is_reapplied_on_playing() {
        let engine = FakeEngine::new();
        let player = context(engine.clone()).create_player().unwrap();

        assert!(player.select_device_id(Some("usb-dac"), None));
        assert!(player.current_device_info().pending);

        player.load(SONG).unwrap();
        assert!(player.play());
        assert!(wait_until(WAIT, || player.state() == PlaybackState::Playing));
        assert!(wait_until(WAIT, || !player.current_device_info().pending));

        let log = engine.state.lock().device_log.clone();
        assert!(log.len() >= 2);
        assert_eq!(log.last().unwrap().1, "usb-dac");
    }

    #[test]
    fn test_illegal_calls_return_false_without_state_change() {
        let engine = FakeEngine::new();
        let player = context(engine.clone()).create_player().unwrap();

        assert!(!player.play(), "no media bound");
        assert!(!player.pause());
        assert!(!player.resume());
        assert_eq!(player.state(), PlaybackState::Stopped);

        player.load(SONG).unwrap();
        assert!(!player.pause(), "loading is not playing");
        assert!(!player.resume());
        assert_eq!(player.state(), PlaybackState::Loading);
    }

    #[test]
    fn test_pause_resume_stop_cycle() {
        let engine = FakeEngine::new();
        let player = playing_player(&engine);

        assert!(player.pause());
        assert_eq!(player.state(), PlaybackState::Paused);
        assert!(!player.pause());
        assert!(player.resume());
        assert_eq!(player.state(), PlaybackState::Playing);
        assert!(!player.resume());

        assert!(player.stop());
        assert_eq!(player.state(), PlaybackState::Stopped);
        assert!(player.stop(), "stop is idempotent");
        assert_eq!(player.state(), PlaybackState::Stopped);
    }

    #[test]
    fn test_toggle_play_pause() {
        let engine = FakeEngine::new();
        let player = playing_player(&engine);
        assert!(player.toggle_play_pause());
        assert_eq!(player.state(), PlaybackState::Paused);
        assert!(player.toggle_play_pause());
        assert_eq!(player.state(), PlaybackState::Playing);
    }

    #[test]
    fn test_device_selection_survives_stop_play() {
        let engine = FakeEngine::new();
        let player = context(engine.clone()).create_player().unwrap();
        player.select_device_id(Some("hdmi"), Some("alsa"));
        player.load(SONG).unwrap();
        assert!(player.play());
        assert!(wait_until(WAIT, || player.state() == PlaybackState::Playing));

        assert!(player.stop());
        engine.state.lock().device_log.clear();
        assert!(player.current_device_info().pending);

        assert!(player.play());
        assert!(wait_until(WAIT, || player.state() == PlaybackState::Playing));
        let log = engine.state.lock().device_log.clone();
        assert!(!log.is_empty());
        assert!(log
            .iter()
            .all(|(module, id)| id == "hdmi" && module.as_deref() == Some("alsa")));
        assert_eq!(
            player.current_device_info().desired,
            Some(DeviceSelection::new(Some("hdmi"), Some("alsa")))
        );
    }

    #[test]
    fn test_end_of_media_collapses_to_stopped() {
        let engine = FakeEngine::new();
        let player = playing_player(&engine);
        let events = player.subscribe();

        engine.emit(NativeEvent::EndReached);
        assert!(wait_until(WAIT, || player.state() == PlaybackState::Stopped));

        // A late native stop signal does not produce a second transition
        engine.emit(NativeEvent::StateChanged(NativeState::Stopped));
        engine.emit(NativeEvent::TimeChanged(Duration::from_millis(1)));
        assert!(wait_until(WAIT, || events.len() >= 2));
        let stops = events
            .try_iter()
            .filter(|event| matches!(event, PlayerEvent::StateChanged { .. }))
            .count();
        assert_eq!(stops, 1);
    }

    #[test]
    fn test_native_error_requires_fresh_load() {
        let engine = FakeEngine::new();
        let player = playing_player(&engine);
        let events = player.subscribe();

        engine.emit(NativeEvent::StateChanged(NativeState::Error));
        assert!(wait_until(WAIT, || player.state() == PlaybackState::Error));
        assert!(wait_until(WAIT, || events
            .try_iter()
            .any(|event| matches!(event, PlayerEvent::Error { kind: ErrorKind::Playback, .. }))));

        assert!(!player.play());
        assert!(player.stop());
        assert_eq!(player.state(), PlaybackState::Error);

        player.load(SONG).unwrap();
        assert_eq!(player.state(), PlaybackState::Loading);
    }

    #[test]
    fn test_failed_native_play_enters_error() {
        let engine = FakeEngine::new();
        let player = context(engine.clone()).create_player().unwrap();
        player.load(SONG).unwrap();
        engine.state.lock().fail_play = true;

        assert!(!player.play());
        assert_eq!(player.state(), PlaybackState::Error);
    }

    #[test]
    fn test_media_replacement_releases_exactly_once() {
        let engine = FakeEngine::new();
        {
            let player = context(engine.clone()).create_player().unwrap();
            player.load(SONG).unwrap();
            player.load("http://example.com/other.ogg").unwrap();
            player.load("rtsp://example.com/live").unwrap();
            assert_eq!(engine.state.lock().media_released, 2);
            assert_eq!(player.media_info().unwrap().title, "live");
        }
        let state = engine.state.lock();
        assert_eq!(state.media_created, 3);
        assert_eq!(state.media_released, 3);
    }

    #[test]
    fn test_load_failure_keeps_player_usable() {
        let engine = FakeEngine::new();
        let player = context(engine.clone()).create_player().unwrap();
        let events = player.subscribe();

        engine.state.lock().fail_media = true;
        let err = player.load(SONG).unwrap_err();
        assert!(matches!(err, PlayerError::MediaLoad { .. }));
        assert_eq!(player.state(), PlaybackState::Stopped);
        assert!(matches!(
            events.try_recv().unwrap(),
            PlayerEvent::Error { kind: ErrorKind::MediaLoad, .. }
        ));

        engine.state.lock().fail_media = false;
        player.load(SONG).unwrap();
        assert_eq!(player.state(), PlaybackState::Loading);

        assert!(player.load("").is_err());
    }

    #[test]
    fn test_load_while_playing_stops_first() {
        let engine = FakeEngine::new();
        let player = playing_player(&engine);
        player.load("http://example.com/next.mp3").unwrap();

        assert_eq!(player.state(), PlaybackState::Loading);
        assert_eq!(engine.state.lock().stop_calls, 1);
        assert_eq!(player.media_info().unwrap().title, "next.mp3");
    }

    #[test]
    fn test_volume_roundtrip_and_rejection() {
        let engine = FakeEngine::new();
        let player = context(engine.clone()).create_player().unwrap();

        for v in [0, 1, 42, 99, 100] {
            player.set_volume(v).unwrap();
            assert_eq!(player.volume(), v);
        }
        assert!(matches!(
            player.set_volume(101),
            Err(PlayerError::InvalidInput(_))
        ));
        assert!(player.set_volume(255).is_err());
        assert_eq!(player.volume(), 100);
    }

    #[test]
    fn test_mute_and_rate() {
        let engine = FakeEngine::new();
        let player = context(engine.clone()).create_player().unwrap();

        assert!(player.toggle_mute());
        assert!(player.is_muted());
        assert!(engine.state.lock().muted);
        assert!(!player.toggle_mute());

        player.set_rate(1.5).unwrap();
        assert_eq!(player.rate(), 1.5);
        assert!(player.set_rate(0.2).is_err());
        assert!(player.set_rate(4.5).is_err());
        assert!(player.set_rate(f32::NAN).is_err());
        assert_eq!(player.rate(), 1.5);
        player.set_rate(MIN_RATE).unwrap();
        player.set_rate(MAX_RATE).unwrap();
    }

    #[test]
    fn test_seek_clamps_to_duration() {
        let engine = FakeEngine::new();
        let player = playing_player(&engine);
        engine.state.lock().time = Duration::from_secs(170);

        let target = player.seek_forward(None).unwrap();
        assert_eq!(target, Duration::from_secs(175));
        let target = player.seek_forward(Some(Duration::from_secs(60))).unwrap();
        assert_eq!(target, Duration::from_secs(180));

        engine.state.lock().time = Duration::from_secs(3);
        assert_eq!(player.seek_backward(None).unwrap(), Duration::ZERO);
        assert_eq!(
            player.seek_to(Duration::from_secs(999)).unwrap(),
            Duration::from_secs(180)
        );
    }

    #[test]
    fn test_seek_requires_known_duration() {
        let engine = FakeEngine::new();
        let player = context(engine.clone()).create_player().unwrap();
        assert!(matches!(
            player.seek_forward(None),
            Err(PlayerError::NoMedia)
        ));

        engine.state.lock().media_duration = None;
        player.load(SONG).unwrap();
        assert!(matches!(
            player.seek_forward(None),
            Err(PlayerError::DurationUnknown)
        ));
    }

    #[test]
    fn test_position_validation() {
        let engine = FakeEngine::new();
        let player = playing_player(&engine);
        player.set_position(0.5).unwrap();
        assert_eq!(player.position(), Some(0.5));
        assert!(player.set_position(1.5).is_err());
        assert!(player.set_position(-0.1).is_err());
    }

    #[test]
    fn test_audio_tracks() {
        let engine = FakeEngine::new();
        let player = context(engine.clone()).create_player().unwrap();
        assert!(player.available_audio_tracks().is_empty());
        assert!(matches!(
            player.set_audio_track(1),
            Err(PlayerError::NoMedia)
        ));

        engine.state.lock().tracks = vec![
            NativeTrack { id: -1, name: "Disable".into() },
            NativeTrack { id: 1, name: "English".into() },
        ];
        player.load(SONG).unwrap();
        assert_eq!(player.available_audio_tracks().len(), 2);
        player.set_audio_track(1).unwrap();
        assert_eq!(player.audio_track(), Some(1));
        assert!(player.set_audio_track(7).is_err());
    }

    #[test]
    fn test_degraded_engine_without_signals() {
        let engine = FakeEngine::new();
        {
            let mut state = engine.state.lock();
            state.unsupported_events = NativeEventKind::ALL.into_iter().collect();
        }
        let player = context(engine.clone()).create_player().unwrap();
        assert_eq!(player.event_capabilities().count(), 0);

        player.load(SONG).unwrap();
        assert!(player.play());
        assert_eq!(player.state(), PlaybackState::Playing);

        engine.state.lock().native_state = NativeState::Ended;
        assert_eq!(player.sync_state(), PlaybackState::Stopped);
    }

    #[test]
    fn test_media_parsed_event_reports_duration() {
        let engine = FakeEngine::new();
        let player = context(engine.clone()).create_player().unwrap();
        let events = player.subscribe();
        player.load(SONG).unwrap();
        assert_eq!(engine.state.lock().parse_calls, 1);

        engine.emit(NativeEvent::MediaParsed);
        assert!(wait_until(WAIT, || events.try_iter().any(|event| {
            event
                == PlayerEvent::MediaParsed {
                    duration_ms: Some(180_000),
                }
        })));
    }

    #[test]
    fn test_failed_parse_emits_no_media_parsed() {
        let engine = FakeEngine::new();
        let player = context(engine.clone()).create_player().unwrap();
        let events = player.subscribe();
        player.load(SONG).unwrap();
        engine.state.lock().parsed = false;

        engine.emit(NativeEvent::MediaParsed);
        engine.emit(NativeEvent::TimeChanged(Duration::from_millis(10)));
        let mut seen = Vec::new();
        assert!(wait_until(WAIT, || {
            seen.extend(events.try_iter());
            seen.iter()
                .any(|event| matches!(event, PlayerEvent::TimeChanged { .. }))
        }));
        assert!(!seen
            .iter()
            .any(|event| matches!(event, PlayerEvent::MediaParsed { .. })));
    }

    #[test]
    fn test_selecting_unlisted_device_drops_cached_listing() {
        let engine = FakeEngine::new();
        {
            let mut state = engine.state.lock();
            state.module_listing_supported = false;
            state.player_devices = vec![native_device("hw:0", "Onboard")];
        }
        let player = context(engine.clone()).create_player().unwrap();
        assert_eq!(player.available_audio_devices(false).len(), 2);

        engine
            .state
            .lock()
            .player_devices
            .push(native_device("hw:1", "USB DAC"));
        player.select_device_id(Some("hw:0"), None);
        assert_eq!(player.available_audio_devices(false).len(), 2);

        player.select_device_id(Some("hw:1"), None);
        let devices = player.available_audio_devices(false);
        assert_eq!(devices.len(), 3);
        assert_eq!(devices[2].id.as_deref(), Some("hw:1"));
    }

    #[test]
    fn test_fullscreen_passthrough() {
        let engine = FakeEngine::new();
        let player = context(engine.clone()).create_player().unwrap();
        player.set_fullscreen(true);
        assert!(engine.state.lock().fullscreen);
    }

    #[test]
    fn test_time_events_are_forwarded() {
        let engine = FakeEngine::new();
        let player = context(engine.clone()).create_player().unwrap();
        let events = player.subscribe();
        engine.emit(NativeEvent::TimeChanged(Duration::from_millis(1234)));
        assert!(wait_until(WAIT, || events
            .try_iter()
            .any(|event| event == PlayerEvent::TimeChanged { time_ms: 1234 })));
    }
}
