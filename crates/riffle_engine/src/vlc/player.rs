use std::ffi::{c_int, CString};
use std::ptr::{self, NonNull};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use super::events::{event_types, native_state, Registration};
use super::ffi::{self, libvlc_media_player_t, libvlc_media_t};
use super::instance::{InstanceInner, VlcMedia};
use crate::error::{EngineError, EngineResult};
use crate::traits::{
    EventSink, NativeEventKind, NativeOutputDevice, NativePlayer, NativeState, NativeTrack,
};

/// Media bound to the player, retained so parse events can be attached
struct BoundMedia {
    raw: NonNull<libvlc_media_t>,
    parsed: Option<Registration>,
}

/// A libVLC media player
pub struct VlcPlayer {
    instance: Arc<InstanceInner>,
    raw: NonNull<libvlc_media_player_t>,
    registrations: Vec<Registration>,
    parsed_sink: Option<EventSink>,
    media: Option<BoundMedia>,
}

// SAFETY: libvlc media players are internally locked; the raw event manager
// pointers in registrations are only used to detach on drop.
unsafe impl Send for VlcPlayer {}

impl VlcPlayer {
    pub(crate) fn new(instance: Arc<InstanceInner>) -> EngineResult<Self> {
        // SAFETY: The instance is alive for as long as the Arc.
        let raw = unsafe { (instance.api.player_new)(instance.raw.as_ptr()) };
        let raw = NonNull::new(raw).ok_or(EngineError::PlayerCreation)?;
        debug!("libvlc media player created");
        Ok(Self {
            instance,
            raw,
            registrations: Vec::new(),
            parsed_sink: None,
            media: None,
        })
    }

    fn ptr(&self) -> *mut libvlc_media_player_t {
        self.raw.as_ptr()
    }

    fn release_media(&mut self) {
        if let Some(bound) = self.media.take() {
            let api = &self.instance.api;
            // SAFETY: The media is still retained, so its event manager is alive.
            unsafe {
                if let Some(registration) = bound.parsed {
                    registration.detach(api);
                }
                (api.media_release)(bound.raw.as_ptr());
            }
        }
    }

    fn attach_parsed(&self, media: NonNull<libvlc_media_t>) -> Option<Registration> {
        let sink = self.parsed_sink.clone()?;
        let api = &self.instance.api;
        let manager_of = api.media_event_manager?;

        // SAFETY: The media is retained by BoundMedia for the registration's lifetime.
        let result = unsafe {
            let manager = manager_of(media.as_ptr());
            Registration::attach(api, manager, ffi::MEDIA_PARSED_CHANGED, sink)
        };
        match result {
            Ok(registration) => Some(registration),
            Err(e) => {
                warn!("Could not attach media parse callback: {}", e);
                None
            }
        }
    }
}

impl NativePlayer for VlcPlayer {
    type Media = VlcMedia;

    fn set_media(&mut self, media: &VlcMedia) {
        self.release_media();

        let api = &self.instance.api;
        // SAFETY: Both objects are alive; the extra reference is released in
        // release_media.
        let raw = unsafe {
            (api.player_set_media)(self.ptr(), media.raw());
            (api.media_retain)(media.raw());
            NonNull::new_unchecked(media.raw())
        };
        let parsed = self.attach_parsed(raw);
        self.media = Some(BoundMedia { raw, parsed });
    }

    fn play(&mut self) -> EngineResult<()> {
        // SAFETY: Player is alive.
        let ret = unsafe { (self.instance.api.player_play)(self.ptr()) };
        if ret == 0 {
            Ok(())
        } else {
            Err(EngineError::NativeCall(format!(
                "play failed: {}",
                self.instance.api.last_error()
            )))
        }
    }

    fn set_pause(&mut self, paused: bool) {
        // SAFETY: Player is alive.
        unsafe { (self.instance.api.player_set_pause)(self.ptr(), paused as c_int) };
    }

    fn stop(&mut self) {
        // SAFETY: Player is alive.
        unsafe { (self.instance.api.player_stop)(self.ptr()) };
    }

    fn state(&self) -> NativeState {
        // SAFETY: Player is alive.
        native_state(unsafe { (self.instance.api.player_get_state)(self.ptr()) })
    }

    fn time(&self) -> Option<Duration> {
        // SAFETY: Player is alive.
        let ms = unsafe { (self.instance.api.player_get_time)(self.ptr()) };
        (ms >= 0).then(|| Duration::from_millis(ms as u64))
    }

    fn set_time(&mut self, time: Duration) {
        let ms = i64::try_from(time.as_millis()).unwrap_or(i64::MAX);
        // SAFETY: Player is alive.
        unsafe { (self.instance.api.player_set_time)(self.ptr(), ms) };
    }

    fn length(&self) -> Option<Duration> {
        // SAFETY: Player is alive.
        let ms = unsafe { (self.instance.api.player_get_length)(self.ptr()) };
        (ms > 0).then(|| Duration::from_millis(ms as u64))
    }

    fn position(&self) -> Option<f32> {
        // SAFETY: Player is alive.
        let position = unsafe { (self.instance.api.player_get_position)(self.ptr()) };
        (position >= 0.0).then_some(position)
    }

    fn set_position(&mut self, position: f32) {
        // SAFETY: Player is alive.
        unsafe { (self.instance.api.player_set_position)(self.ptr(), position) };
    }

    fn volume(&self) -> Option<u8> {
        // SAFETY: Player is alive.
        let volume = unsafe { (self.instance.api.audio_get_volume)(self.ptr()) };
        u8::try_from(volume).ok()
    }

    fn set_volume(&mut self, volume: u8) -> EngineResult<()> {
        // SAFETY: Player is alive.
        let ret = unsafe { (self.instance.api.audio_set_volume)(self.ptr(), volume as c_int) };
        if ret == 0 {
            Ok(())
        } else {
            Err(EngineError::NativeCall("volume out of range".into()))
        }
    }

    fn is_muted(&self) -> Option<bool> {
        // SAFETY: Player is alive.
        match unsafe { (self.instance.api.audio_get_mute)(self.ptr()) } {
            0 => Some(false),
            1 => Some(true),
            _ => None,
        }
    }

    fn set_mute(&mut self, muted: bool) {
        // SAFETY: Player is alive.
        unsafe { (self.instance.api.audio_set_mute)(self.ptr(), muted as c_int) };
    }

    fn rate(&self) -> f32 {
        // SAFETY: Player is alive.
        unsafe { (self.instance.api.player_get_rate)(self.ptr()) }
    }

    fn set_rate(&mut self, rate: f32) -> EngineResult<()> {
        // SAFETY: Player is alive.
        let ret = unsafe { (self.instance.api.player_set_rate)(self.ptr(), rate) };
        if ret == 0 {
            Ok(())
        } else {
            Err(EngineError::NativeCall(format!("rate {} rejected", rate)))
        }
    }

    fn audio_track(&self) -> Option<i32> {
        // SAFETY: Player is alive.
        let track = unsafe { (self.instance.api.audio_get_track)(self.ptr()) };
        (track >= 0).then_some(track)
    }

    fn set_audio_track(&mut self, id: i32) -> EngineResult<()> {
        // SAFETY: Player is alive.
        let ret = unsafe { (self.instance.api.audio_set_track)(self.ptr(), id) };
        if ret == 0 {
            Ok(())
        } else {
            Err(EngineError::NativeCall(format!("audio track {} rejected", id)))
        }
    }

    fn audio_tracks(&self) -> Vec<NativeTrack> {
        let api = &self.instance.api;
        let (Some(describe), Some(release)) =
            (api.audio_track_descriptions, api.track_descriptions_release)
        else {
            return Vec::new();
        };

        let mut tracks = Vec::new();
        // SAFETY: The list is walked once and released with its own release call.
        unsafe {
            let list = describe(self.ptr());
            let mut node = list;
            while !node.is_null() {
                let entry = &*node;
                tracks.push(NativeTrack {
                    id: entry.i_id,
                    name: ffi::string_from(entry.psz_name).unwrap_or_default(),
                });
                node = entry.p_next;
            }
            if !list.is_null() {
                release(list);
            }
        }
        tracks
    }

    fn set_fullscreen(&mut self, fullscreen: bool) {
        // SAFETY: Player is alive.
        unsafe { (self.instance.api.set_fullscreen)(self.ptr(), fullscreen as c_int) };
    }

    fn set_output_module(&mut self, module: &str) -> EngineResult<()> {
        let c_module = CString::new(module)
            .map_err(|_| EngineError::NativeCall(format!("invalid module name {:?}", module)))?;
        // SAFETY: Player is alive and c_module outlives the call.
        let ret = unsafe { (self.instance.api.audio_output_set)(self.ptr(), c_module.as_ptr()) };
        if ret == 0 {
            Ok(())
        } else {
            Err(EngineError::NativeCall(format!(
                "output module {} rejected",
                module
            )))
        }
    }

    fn set_output_device(&mut self, module: Option<&str>, device_id: &str) {
        let c_module = match module.map(CString::new).transpose() {
            Ok(c_module) => c_module,
            Err(_) => {
                warn!("Ignoring output module name with interior NUL");
                return;
            }
        };
        let Ok(c_device) = CString::new(device_id) else {
            warn!("Ignoring output device id with interior NUL");
            return;
        };
        let module_ptr = c_module.as_ref().map_or(ptr::null(), |m| m.as_ptr());

        // SAFETY: Player is alive; both strings outlive the call.
        unsafe {
            (self.instance.api.audio_output_device_set)(self.ptr(), module_ptr, c_device.as_ptr())
        };
    }

    fn output_device(&self) -> Option<String> {
        let api = &self.instance.api;
        let get = api.audio_output_device_get?;
        // SAFETY: The returned heap string is copied then freed with libvlc_free.
        unsafe {
            let raw = get(self.ptr());
            let device = ffi::string_from(raw);
            if !raw.is_null() {
                (api.free)(raw.cast());
            }
            device
        }
    }

    fn enumerate_output_devices(&self) -> Vec<NativeOutputDevice> {
        let api = &self.instance.api;
        match api.audio_output_device_enum {
            // SAFETY: Player is alive; collect_devices releases the list.
            Some(enumerate) => unsafe { api.collect_devices(enumerate(self.ptr())) },
            None => Vec::new(),
        }
    }

    fn subscribe(&mut self, kind: NativeEventKind, sink: EventSink) -> EngineResult<()> {
        if kind == NativeEventKind::MediaParsedChanged {
            if self.instance.api.media_event_manager.is_none() {
                return Err(EngineError::Unsupported("media events"));
            }
            self.parsed_sink = Some(sink);
            if let Some(raw) = self.media.as_ref().map(|bound| bound.raw) {
                let registration = self.attach_parsed(raw);
                if let Some(bound) = self.media.as_mut() {
                    bound.parsed = registration;
                }
            }
            return Ok(());
        }

        let api = &self.instance.api;
        // SAFETY: Player is alive.
        let manager = unsafe { (api.player_event_manager)(self.ptr()) };
        for &event_type in event_types(kind) {
            // SAFETY: The player outlives its registrations (detached in Drop).
            let registration =
                unsafe { Registration::attach(api, manager, event_type, Arc::clone(&sink))? };
            self.registrations.push(registration);
        }
        debug!("Subscribed to native {:?} events", kind);
        Ok(())
    }
}

impl Drop for VlcPlayer {
    fn drop(&mut self) {
        let api = &self.instance.api;
        // SAFETY: Detach every callback before the slots and player go away.
        unsafe {
            for registration in self.registrations.drain(..) {
                registration.detach(api);
            }
        }
        self.release_media();
        // SAFETY: No callbacks remain attached.
        unsafe { (self.instance.api.player_release)(self.ptr()) };
        debug!("libvlc media player released");
    }
}
