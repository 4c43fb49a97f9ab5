//! Dynamic libVLC symbol table
//!
//! The library is opened once with `libloading`; every function pointer is
//! copied out of its `Symbol` and stays valid for as long as the owning
//! [`Library`] lives in the same struct. Symbols newer than the 3.0 baseline
//! are optional and feed [`EngineCapabilities`].

use std::path::Path;

use libloading::{Library, Symbol};
use tracing::debug;

use super::ffi::*;
use crate::error::{EngineError, EngineResult};
use crate::traits::EngineCapabilities;

pub(crate) struct VlcLibrary {
    // Function pointers below are only valid while this is alive
    _lib: Library,

    pub new: fn_new,
    pub release: fn_release,
    pub get_version: fn_get_version,
    pub errmsg: Option<fn_errmsg>,
    pub free: fn_free,

    pub media_new_path: fn_media_new,
    pub media_new_location: fn_media_new,
    pub media_retain: fn_media_retain,
    pub media_release: fn_media_release,
    pub media_get_duration: fn_media_get_duration,
    pub media_parse_with_options: Option<fn_media_parse_with_options>,
    pub media_get_parsed_status: Option<fn_media_get_parsed_status>,
    pub media_event_manager: Option<fn_media_event_manager>,

    pub player_new: fn_player_new,
    pub player_release: fn_player_release,
    pub player_set_media: fn_player_set_media,
    pub player_play: fn_player_play,
    pub player_set_pause: fn_player_set_flag,
    pub player_stop: fn_player_action,
    pub player_get_state: fn_player_get_int,
    pub player_get_time: fn_player_get_time,
    pub player_set_time: fn_player_set_time,
    pub player_get_length: fn_player_get_time,
    pub player_get_position: fn_player_get_float,
    pub player_set_position: fn_player_set_position,
    pub player_get_rate: fn_player_get_float,
    pub player_set_rate: fn_player_set_rate,
    pub player_event_manager: fn_player_event_manager,
    pub set_fullscreen: fn_player_set_flag,

    pub audio_get_volume: fn_player_get_int,
    pub audio_set_volume: fn_player_set_int,
    pub audio_get_mute: fn_player_get_int,
    pub audio_set_mute: fn_player_set_flag,
    pub audio_get_track: fn_player_get_int,
    pub audio_set_track: fn_player_set_int,
    pub audio_track_descriptions: Option<fn_track_descriptions>,
    pub track_descriptions_release: Option<fn_track_descriptions_release>,

    pub audio_output_set: fn_audio_output_set,
    pub audio_output_device_set: fn_audio_output_device_set,
    pub audio_output_device_get: Option<fn_audio_output_device_get>,
    pub audio_output_device_enum: Option<fn_audio_output_device_enum>,
    pub audio_output_device_list_get: Option<fn_audio_output_device_list_get>,
    pub audio_output_device_list_release: Option<fn_audio_output_device_list_release>,

    pub event_attach: Option<fn_event_attach>,
    pub event_detach: Option<fn_event_detach>,
}

/// Copy a required function pointer out of the library
///
/// # Safety
/// `T` must be the exact function pointer type of the exported symbol.
unsafe fn required<T: Copy>(lib: &Library, name: &'static str) -> EngineResult<T> {
    let symbol: Symbol<T> = lib
        .get(name.as_bytes())
        .map_err(|_| EngineError::MissingSymbol(name))?;
    Ok(*symbol)
}

/// Copy an optional function pointer out of the library
///
/// # Safety
/// Same contract as [`required`].
unsafe fn optional<T: Copy>(lib: &Library, name: &'static str) -> Option<T> {
    match lib.get::<T>(name.as_bytes()) {
        Ok(symbol) => Some(*symbol),
        Err(_) => {
            debug!("Optional libvlc symbol {} not available", name);
            None
        }
    }
}

impl VlcLibrary {
    pub fn open(path: &Path) -> EngineResult<Self> {
        // SAFETY: Loading libvlc runs its initializers; the path was validated
        // as a complete installation by the resolver.
        let lib = unsafe { Library::new(path) }.map_err(|e| EngineError::LibraryLoad {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        // SAFETY: Every type below matches the libvlc 3.x C prototype of the
        // symbol it is looked up under.
        unsafe {
            Ok(Self {
                new: required(&lib, "libvlc_new")?,
                release: required(&lib, "libvlc_release")?,
                get_version: required(&lib, "libvlc_get_version")?,
                errmsg: optional(&lib, "libvlc_errmsg"),
                free: required(&lib, "libvlc_free")?,

                media_new_path: required(&lib, "libvlc_media_new_path")?,
                media_new_location: required(&lib, "libvlc_media_new_location")?,
                media_retain: required(&lib, "libvlc_media_retain")?,
                media_release: required(&lib, "libvlc_media_release")?,
                media_get_duration: required(&lib, "libvlc_media_get_duration")?,
                media_parse_with_options: optional(&lib, "libvlc_media_parse_with_options"),
                media_get_parsed_status: optional(&lib, "libvlc_media_get_parsed_status"),
                media_event_manager: optional(&lib, "libvlc_media_event_manager"),

                player_new: required(&lib, "libvlc_media_player_new")?,
                player_release: required(&lib, "libvlc_media_player_release")?,
                player_set_media: required(&lib, "libvlc_media_player_set_media")?,
                player_play: required(&lib, "libvlc_media_player_play")?,
                player_set_pause: required(&lib, "libvlc_media_player_set_pause")?,
                player_stop: required(&lib, "libvlc_media_player_stop")?,
                player_get_state: required(&lib, "libvlc_media_player_get_state")?,
                player_get_time: required(&lib, "libvlc_media_player_get_time")?,
                player_set_time: required(&lib, "libvlc_media_player_set_time")?,
                player_get_length: required(&lib, "libvlc_media_player_get_length")?,
                player_get_position: required(&lib, "libvlc_media_player_get_position")?,
                player_set_position: required(&lib, "libvlc_media_player_set_position")?,
                player_get_rate: required(&lib, "libvlc_media_player_get_rate")?,
                player_set_rate: required(&lib, "libvlc_media_player_set_rate")?,
                player_event_manager: required(&lib, "libvlc_media_player_event_manager")?,
                set_fullscreen: required(&lib, "libvlc_set_fullscreen")?,

                audio_get_volume: required(&lib, "libvlc_audio_get_volume")?,
                audio_set_volume: required(&lib, "libvlc_audio_set_volume")?,
                audio_get_mute: required(&lib, "libvlc_audio_get_mute")?,
                audio_set_mute: required(&lib, "libvlc_audio_set_mute")?,
                audio_get_track: required(&lib, "libvlc_audio_get_track")?,
                audio_set_track: required(&lib, "libvlc_audio_set_track")?,
                audio_track_descriptions: optional(&lib, "libvlc_audio_get_track_description"),
                track_descriptions_release: optional(
                    &lib,
                    "libvlc_track_description_list_release",
                ),

                audio_output_set: required(&lib, "libvlc_audio_output_set")?,
                audio_output_device_set: required(&lib, "libvlc_audio_output_device_set")?,
                audio_output_device_get: optional(&lib, "libvlc_audio_output_device_get"),
                audio_output_device_enum: optional(&lib, "libvlc_audio_output_device_enum"),
                audio_output_device_list_get: optional(
                    &lib,
                    "libvlc_audio_output_device_list_get",
                ),
                audio_output_device_list_release: optional(
                    &lib,
                    "libvlc_audio_output_device_list_release",
                ),

                event_attach: optional(&lib, "libvlc_event_attach"),
                event_detach: optional(&lib, "libvlc_event_detach"),

                _lib: lib,
            })
        }
    }

    pub fn capabilities(&self) -> EngineCapabilities {
        let device_release = self.audio_output_device_list_release.is_some();
        EngineCapabilities {
            events: self.event_attach.is_some() && self.event_detach.is_some(),
            device_enumeration: self.audio_output_device_enum.is_some() && device_release,
            module_device_listing: self.audio_output_device_list_get.is_some() && device_release,
            device_readback: self.audio_output_device_get.is_some(),
            media_parsing: self.media_parse_with_options.is_some()
                && self.media_get_parsed_status.is_some(),
            track_descriptions: self.audio_track_descriptions.is_some()
                && self.track_descriptions_release.is_some(),
        }
    }

    /// Last error message recorded by libvlc on this thread
    pub fn last_error(&self) -> String {
        self.errmsg
            // SAFETY: libvlc_errmsg returns null or a thread-local string.
            .and_then(|errmsg| unsafe { string_from(errmsg()) })
            .unwrap_or_else(|| "unknown error".to_string())
    }

    /// Walk and release a device list
    ///
    /// # Safety
    /// `list` must be null or a list returned by one of the device listing calls.
    pub unsafe fn collect_devices(
        &self,
        list: *mut libvlc_audio_output_device_t,
    ) -> Vec<crate::traits::NativeOutputDevice> {
        let mut devices = Vec::new();
        let mut node = list;
        while !node.is_null() {
            let entry = &*node;
            devices.push(crate::traits::NativeOutputDevice {
                id: string_from(entry.psz_device).unwrap_or_default(),
                description: string_from(entry.psz_description).unwrap_or_default(),
            });
            node = entry.p_next;
        }
        if !list.is_null() {
            if let Some(release) = self.audio_output_device_list_release {
                release(list);
            }
        }
        devices
    }
}
