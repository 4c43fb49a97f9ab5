//! Raw libVLC 3.x declarations used by the binding
//!
//! Only the subset the player needs. Function pointer types mirror the C
//! prototypes in `vlc/libvlc*.h`.

#![allow(non_camel_case_types)]

use std::ffi::{c_char, c_float, c_int, c_void, CStr};

#[repr(C)]
pub struct libvlc_instance_t {
    _private: [u8; 0],
}

#[repr(C)]
pub struct libvlc_media_t {
    _private: [u8; 0],
}

#[repr(C)]
pub struct libvlc_media_player_t {
    _private: [u8; 0],
}

#[repr(C)]
pub struct libvlc_event_manager_t {
    _private: [u8; 0],
}

#[repr(C)]
pub struct libvlc_audio_output_device_t {
    pub p_next: *mut libvlc_audio_output_device_t,
    pub psz_device: *mut c_char,
    pub psz_description: *mut c_char,
}

#[repr(C)]
pub struct libvlc_track_description_t {
    pub i_id: c_int,
    pub psz_name: *mut c_char,
    pub p_next: *mut libvlc_track_description_t,
}

/// The parts of the event payload union that are read
#[repr(C)]
#[derive(Clone, Copy)]
pub union libvlc_event_u {
    pub new_time: i64,
    pub new_status: c_int,
    _padding: [u64; 4],
}

#[repr(C)]
pub struct libvlc_event_t {
    pub type_: c_int,
    pub p_obj: *mut c_void,
    pub u: libvlc_event_u,
}

pub type libvlc_callback_t = unsafe extern "C" fn(*const libvlc_event_t, *mut c_void);

// Event types
pub const MEDIA_PARSED_CHANGED: c_int = 3;
pub const MEDIA_PLAYER_NOTHING_SPECIAL: c_int = 0x101;
pub const MEDIA_PLAYER_OPENING: c_int = 0x102;
pub const MEDIA_PLAYER_BUFFERING: c_int = 0x103;
pub const MEDIA_PLAYER_PLAYING: c_int = 0x104;
pub const MEDIA_PLAYER_PAUSED: c_int = 0x105;
pub const MEDIA_PLAYER_STOPPED: c_int = 0x106;
pub const MEDIA_PLAYER_END_REACHED: c_int = 0x109;
pub const MEDIA_PLAYER_ENCOUNTERED_ERROR: c_int = 0x10a;
pub const MEDIA_PLAYER_TIME_CHANGED: c_int = 0x10b;

// libvlc_state_t
pub const STATE_NOTHING_SPECIAL: c_int = 0;
pub const STATE_OPENING: c_int = 1;
pub const STATE_BUFFERING: c_int = 2;
pub const STATE_PLAYING: c_int = 3;
pub const STATE_PAUSED: c_int = 4;
pub const STATE_STOPPED: c_int = 5;
pub const STATE_ENDED: c_int = 6;
pub const STATE_ERROR: c_int = 7;

// libvlc_media_parsed_status_t
pub const MEDIA_PARSED_STATUS_DONE: c_int = 4;

// libvlc_media_parse_flag_t
pub const MEDIA_PARSE_LOCAL: c_int = 0x00;
pub const MEDIA_PARSE_NETWORK: c_int = 0x01;

pub type fn_new = unsafe extern "C" fn(c_int, *const *const c_char) -> *mut libvlc_instance_t;
pub type fn_release = unsafe extern "C" fn(*mut libvlc_instance_t);
pub type fn_get_version = unsafe extern "C" fn() -> *const c_char;
pub type fn_errmsg = unsafe extern "C" fn() -> *const c_char;
pub type fn_free = unsafe extern "C" fn(*mut c_void);

pub type fn_media_new =
    unsafe extern "C" fn(*mut libvlc_instance_t, *const c_char) -> *mut libvlc_media_t;
pub type fn_media_retain = unsafe extern "C" fn(*mut libvlc_media_t);
pub type fn_media_release = unsafe extern "C" fn(*mut libvlc_media_t);
pub type fn_media_get_duration = unsafe extern "C" fn(*mut libvlc_media_t) -> i64;
pub type fn_media_parse_with_options =
    unsafe extern "C" fn(*mut libvlc_media_t, c_int, c_int) -> c_int;
pub type fn_media_get_parsed_status = unsafe extern "C" fn(*mut libvlc_media_t) -> c_int;
pub type fn_media_event_manager =
    unsafe extern "C" fn(*mut libvlc_media_t) -> *mut libvlc_event_manager_t;

pub type fn_player_new =
    unsafe extern "C" fn(*mut libvlc_instance_t) -> *mut libvlc_media_player_t;
pub type fn_player_release = unsafe extern "C" fn(*mut libvlc_media_player_t);
pub type fn_player_set_media =
    unsafe extern "C" fn(*mut libvlc_media_player_t, *mut libvlc_media_t);
pub type fn_player_action = unsafe extern "C" fn(*mut libvlc_media_player_t);
pub type fn_player_play = unsafe extern "C" fn(*mut libvlc_media_player_t) -> c_int;
pub type fn_player_set_flag = unsafe extern "C" fn(*mut libvlc_media_player_t, c_int);
pub type fn_player_get_int = unsafe extern "C" fn(*mut libvlc_media_player_t) -> c_int;
pub type fn_player_set_int = unsafe extern "C" fn(*mut libvlc_media_player_t, c_int) -> c_int;
pub type fn_player_get_time = unsafe extern "C" fn(*mut libvlc_media_player_t) -> i64;
pub type fn_player_set_time = unsafe extern "C" fn(*mut libvlc_media_player_t, i64);
pub type fn_player_get_float = unsafe extern "C" fn(*mut libvlc_media_player_t) -> c_float;
pub type fn_player_set_position = unsafe extern "C" fn(*mut libvlc_media_player_t, c_float);
pub type fn_player_set_rate =
    unsafe extern "C" fn(*mut libvlc_media_player_t, c_float) -> c_int;
pub type fn_player_event_manager =
    unsafe extern "C" fn(*mut libvlc_media_player_t) -> *mut libvlc_event_manager_t;

pub type fn_track_descriptions =
    unsafe extern "C" fn(*mut libvlc_media_player_t) -> *mut libvlc_track_description_t;
pub type fn_track_descriptions_release = unsafe extern "C" fn(*mut libvlc_track_description_t);

pub type fn_audio_output_set =
    unsafe extern "C" fn(*mut libvlc_media_player_t, *const c_char) -> c_int;
pub type fn_audio_output_device_set =
    unsafe extern "C" fn(*mut libvlc_media_player_t, *const c_char, *const c_char);
pub type fn_audio_output_device_get =
    unsafe extern "C" fn(*mut libvlc_media_player_t) -> *mut c_char;
pub type fn_audio_output_device_enum =
    unsafe extern "C" fn(*mut libvlc_media_player_t) -> *mut libvlc_audio_output_device_t;
pub type fn_audio_output_device_list_get = unsafe extern "C" fn(
    *mut libvlc_instance_t,
    *const c_char,
) -> *mut libvlc_audio_output_device_t;
pub type fn_audio_output_device_list_release =
    unsafe extern "C" fn(*mut libvlc_audio_output_device_t);

pub type fn_event_attach = unsafe extern "C" fn(
    *mut libvlc_event_manager_t,
    c_int,
    libvlc_callback_t,
    *mut c_void,
) -> c_int;
pub type fn_event_detach =
    unsafe extern "C" fn(*mut libvlc_event_manager_t, c_int, libvlc_callback_t, *mut c_void);

/// Copy a C string owned by libVLC
///
/// # Safety
/// `ptr` must be null or point to a NUL-terminated string that stays valid
/// for the duration of the call.
pub unsafe fn string_from(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        None
    } else {
        Some(CStr::from_ptr(ptr).to_string_lossy().into_owned())
    }
}
