//! Native event registration
//!
//! libVLC invokes callbacks on its own threads. Each registration owns a boxed
//! slot whose address is the callback's user data; the trampoline decodes the
//! raw event and hands it to the slot's sink.

use std::ffi::{c_int, c_void};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Duration;

use super::ffi::{self, libvlc_event_manager_t, libvlc_event_t};
use super::library::VlcLibrary;
use crate::error::{EngineError, EngineResult};
use crate::traits::{EventSink, NativeEvent, NativeEventKind, NativeState};

struct EventSlot {
    sink: EventSink,
}

/// One attached callback; must be detached before the slot is dropped
pub(crate) struct Registration {
    manager: *mut libvlc_event_manager_t,
    event_type: c_int,
    slot: Box<EventSlot>,
}

impl Registration {
    fn user_data(&self) -> *mut c_void {
        &*self.slot as *const EventSlot as *mut c_void
    }

    /// Attach `sink` for one raw event type
    ///
    /// # Safety
    /// `manager` must belong to a live player or media that outlives the
    /// registration.
    pub unsafe fn attach(
        api: &VlcLibrary,
        manager: *mut libvlc_event_manager_t,
        event_type: c_int,
        sink: EventSink,
    ) -> EngineResult<Self> {
        let attach = api
            .event_attach
            .ok_or(EngineError::Unsupported("event attach"))?;
        if manager.is_null() {
            return Err(EngineError::NativeCall("no event manager".into()));
        }

        let registration = Self {
            manager,
            event_type,
            slot: Box::new(EventSlot { sink }),
        };
        if attach(manager, event_type, trampoline, registration.user_data()) != 0 {
            return Err(EngineError::NativeCall(format!(
                "event attach failed for type {:#x}",
                event_type
            )));
        }
        Ok(registration)
    }

    /// Detach the callback; the slot may be dropped afterwards
    ///
    /// # Safety
    /// The event manager must still be alive.
    pub unsafe fn detach(self, api: &VlcLibrary) {
        if let Some(detach) = api.event_detach {
            detach(self.manager, self.event_type, trampoline, self.user_data());
        }
    }
}

/// Raw event types backing one subscription kind
pub(crate) fn event_types(kind: NativeEventKind) -> &'static [c_int] {
    match kind {
        NativeEventKind::EndReached => &[ffi::MEDIA_PLAYER_END_REACHED],
        NativeEventKind::TimeChanged => &[ffi::MEDIA_PLAYER_TIME_CHANGED],
        NativeEventKind::Playing => &[ffi::MEDIA_PLAYER_PLAYING],
        NativeEventKind::StateChanged => &[
            ffi::MEDIA_PLAYER_NOTHING_SPECIAL,
            ffi::MEDIA_PLAYER_OPENING,
            ffi::MEDIA_PLAYER_BUFFERING,
            ffi::MEDIA_PLAYER_PAUSED,
            ffi::MEDIA_PLAYER_STOPPED,
            ffi::MEDIA_PLAYER_ENCOUNTERED_ERROR,
        ],
        NativeEventKind::MediaParsedChanged => &[ffi::MEDIA_PARSED_CHANGED],
    }
}

/// Map a `libvlc_state_t` value
pub(crate) fn native_state(raw: c_int) -> NativeState {
    match raw {
        ffi::STATE_NOTHING_SPECIAL => NativeState::NothingSpecial,
        ffi::STATE_OPENING => NativeState::Opening,
        ffi::STATE_BUFFERING => NativeState::Buffering,
        ffi::STATE_PLAYING => NativeState::Playing,
        ffi::STATE_PAUSED => NativeState::Paused,
        ffi::STATE_STOPPED => NativeState::Stopped,
        ffi::STATE_ENDED => NativeState::Ended,
        ffi::STATE_ERROR => NativeState::Error,
        _ => NativeState::NothingSpecial,
    }
}

/// Decode a raw event type and its time payload
pub(crate) fn decode(event_type: c_int, new_time: i64) -> Option<NativeEvent> {
    let event = match event_type {
        ffi::MEDIA_PLAYER_END_REACHED => NativeEvent::EndReached,
        ffi::MEDIA_PLAYER_TIME_CHANGED => {
            NativeEvent::TimeChanged(Duration::from_millis(new_time.max(0) as u64))
        }
        ffi::MEDIA_PLAYER_PLAYING => NativeEvent::Playing,
        ffi::MEDIA_PARSED_CHANGED => NativeEvent::MediaParsed,
        ffi::MEDIA_PLAYER_NOTHING_SPECIAL => NativeEvent::StateChanged(NativeState::NothingSpecial),
        ffi::MEDIA_PLAYER_OPENING => NativeEvent::StateChanged(NativeState::Opening),
        ffi::MEDIA_PLAYER_BUFFERING => NativeEvent::StateChanged(NativeState::Buffering),
        ffi::MEDIA_PLAYER_PAUSED => NativeEvent::StateChanged(NativeState::Paused),
        ffi::MEDIA_PLAYER_STOPPED => NativeEvent::StateChanged(NativeState::Stopped),
        ffi::MEDIA_PLAYER_ENCOUNTERED_ERROR => NativeEvent::StateChanged(NativeState::Error),
        _ => return None,
    };
    Some(event)
}

unsafe extern "C" fn trampoline(event: *const libvlc_event_t, user_data: *mut c_void) {
    if event.is_null() || user_data.is_null() {
        return;
    }
    // SAFETY: user_data is the address of a slot kept alive until detach.
    let slot = &*(user_data as *const EventSlot);
    let event = &*event;
    let new_time = if event.type_ == ffi::MEDIA_PLAYER_TIME_CHANGED {
        event.u.new_time
    } else {
        0
    };

    if let Some(decoded) = decode(event.type_, new_time) {
        // Unwinding into C is undefined behaviour
        let _ = catch_unwind(AssertUnwindSafe(|| (slot.sink)(decoded)));
    }
}
