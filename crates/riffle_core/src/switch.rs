//! Device Switch Worker
//!
//! A device change while playing is applied, read back and retried with
//! exponential backoff on a dedicated thread. Requests go through a
//! single-slot mailbox: a newer request, `stop()` or a new load bumps the
//! generation and the running switch abandons at its next check.

use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use riffle_engine::{MediaEngine, NativePlayer, NativeState};
use tracing::{debug, error, info, warn};

use crate::config::SwitchPolicy;
use crate::device::{same_device, DeviceSelection};
use crate::error::PlayerError;
use crate::message::{ErrorKind, PlayerEvent};
use crate::player::{Core, Shared};
use crate::state::PlaybackState;

const RESTART_POLL: Duration = Duration::from_millis(20);

/// One requested switch and its remaining budget
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PendingDeviceSwitch {
    pub target: DeviceSelection,
    pub attempts_remaining: u32,
    pub next_delay: Duration,
    pub requires_restart: bool,
    pub generation: u64,
}

#[derive(Default)]
struct Slot {
    request: Option<PendingDeviceSwitch>,
    shutdown: bool,
}

/// Latest-wins handoff between the owner thread and the switch worker
#[derive(Default)]
pub(crate) struct SwitchMailbox {
    slot: Mutex<Slot>,
    signal: Condvar,
    generation: AtomicU64,
    busy: AtomicBool,
}

impl SwitchMailbox {
    /// Queue a switch, replacing any queued or running one
    pub fn submit(&self, target: DeviceSelection, requires_restart: bool, policy: &SwitchPolicy) {
        let mut slot = self.slot.lock();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let request = PendingDeviceSwitch {
            target,
            attempts_remaining: policy.max_attempts,
            next_delay: policy.initial_delay(),
            requires_restart,
            generation,
        };
        if slot.request.replace(request).is_some() {
            debug!("Replacing queued device switch");
        }
        self.signal.notify_all();
    }

    /// Abandon any queued or running switch
    pub fn supersede(&self) {
        let mut slot = self.slot.lock();
        self.generation.fetch_add(1, Ordering::SeqCst);
        slot.request = None;
        self.signal.notify_all();
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst) || self.slot.lock().request.is_some()
    }

    /// Block until a request arrives; `None` once shut down
    pub fn take(&self) -> Option<PendingDeviceSwitch> {
        let mut slot = self.slot.lock();
        loop {
            if slot.shutdown {
                return None;
            }
            if let Some(request) = slot.request.take() {
                self.busy.store(true, Ordering::SeqCst);
                return Some(request);
            }
            self.signal.wait(&mut slot);
        }
    }

    pub fn finish(&self) {
        self.busy.store(false, Ordering::SeqCst);
    }

    /// Wait `duration`; false if the request was superseded meanwhile
    pub fn sleep(&self, generation: u64, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        let mut slot = self.slot.lock();
        loop {
            if slot.shutdown || !self.is_current(generation) {
                return false;
            }
            if self.signal.wait_until(&mut slot, deadline).timed_out() {
                return !slot.shutdown && self.is_current(generation);
            }
        }
    }

    pub fn shutdown(&self) {
        let mut slot = self.slot.lock();
        slot.shutdown = true;
        slot.request = None;
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.signal.notify_all();
    }
}

pub(crate) fn spawn_switch_worker<E: MediaEngine>(
    core: Arc<Core<E>>,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("riffle-device-switch".into())
        .spawn(move || {
            info!("Device switch worker started");
            while let Some(request) = core.mailbox.take() {
                run_switch(&core, request);
                core.mailbox.finish();
            }
            info!("Device switch worker stopped");
        })
}

/// Outcome of checking a request against the current player
enum Gate {
    Proceed,
    Abandon,
}

fn gate<E: MediaEngine>(core: &Core<E>, shared: &mut Shared<E>, generation: u64) -> Gate {
    if !core.mailbox.is_current(generation) {
        debug!("Device switch superseded");
        return Gate::Abandon;
    }
    if shared.state != PlaybackState::Playing {
        debug!("Playback left playing, device switch deferred to next start");
        shared.mark_pending();
        return Gate::Abandon;
    }
    Gate::Proceed
}

fn run_switch<E: MediaEngine>(core: &Core<E>, mut request: PendingDeviceSwitch) {
    let policy = &core.config.switch;
    let generation = request.generation;
    let mut restarted = false;

    info!(
        "Switching output device to {} (restart: {})",
        request.target.id.as_deref().unwrap_or("system default"),
        request.requires_restart
    );

    while request.attempts_remaining > 0 {
        request.attempts_remaining -= 1;
        let attempt = policy.max_attempts - request.attempts_remaining;

        let resume_at = {
            let mut guard = core.lock();
            let shared = &mut *guard;
            if let Gate::Abandon = gate(core, shared, generation) {
                return;
            }
            shared.apply_device(&request.target);

            if request.requires_restart && !restarted {
                restarted = true;
                match begin_restart(core, shared, &request.target) {
                    Some(resume_at) => Some(resume_at),
                    None => return,
                }
            } else {
                None
            }
        };

        if let Some(resume_at) = resume_at {
            if !finish_restart(core, generation, resume_at) {
                return;
            }
        }

        if !core.mailbox.sleep(generation, policy.settle()) {
            return;
        }

        {
            let mut guard = core.lock();
            let shared = &mut *guard;
            if let Gate::Abandon = gate(core, shared, generation) {
                return;
            }
            if is_applied(core, shared, &request.target) {
                info!("Output device confirmed after {} attempt(s)", attempt);
                shared.last_verified = Some(request.target.clone());
                shared.device_pending = false;
                core.emit(PlayerEvent::AudioDeviceChanged {
                    device_id: request.target.id.clone(),
                    module: request.target.module.clone(),
                    verified: true,
                });
                return;
            }
        }

        warn!(
            "Output device not confirmed (attempt {} of {})",
            attempt, policy.max_attempts
        );
        if request.attempts_remaining > 0 {
            if !core.mailbox.sleep(generation, request.next_delay) {
                return;
            }
            request.next_delay = policy.next_delay(request.next_delay);
        }
    }

    give_up(core, &request);
}

/// Stop, rebind and restart so the output module reopens on the new device
///
/// Returns the position to resume at, or `None` if the restart failed.
fn begin_restart<E: MediaEngine>(
    core: &Core<E>,
    shared: &mut Shared<E>,
    target: &DeviceSelection,
) -> Option<Duration> {
    let resume_at = shared.player.time().unwrap_or_default();
    debug!("Restarting playback for device switch at {:?}", resume_at);

    shared.suppress_until_playing = true;
    shared.player.stop();
    if let Some(media) = &shared.media {
        shared.player.set_media(media);
    }
    shared.apply_device(target);

    if let Err(e) = shared.player.play() {
        error!("Restart after device switch failed: {}", e);
        shared.suppress_until_playing = false;
        core.transition(shared, PlaybackState::Error);
        core.emit(PlayerEvent::error(ErrorKind::Playback, &e));
        return None;
    }
    Some(resume_at)
}

/// Wait for the restarted player, then seek back
fn finish_restart<E: MediaEngine>(core: &Core<E>, generation: u64, resume_at: Duration) -> bool {
    let deadline = Instant::now() + core.config.switch.playing_wait();
    loop {
        {
            let mut guard = core.lock();
            let shared = &mut *guard;
            if let Gate::Abandon = gate(core, shared, generation) {
                release_suppression(shared);
                return false;
            }

            let native_playing = shared.player.state() == NativeState::Playing;
            if native_playing || Instant::now() >= deadline {
                if !native_playing {
                    warn!(
                        "Player did not resume within {:?} after restart",
                        core.config.switch.playing_wait()
                    );
                    shared.suppress_until_playing = false;
                } else if !shared.events.playing {
                    shared.suppress_until_playing = false;
                }
                shared.player.set_time(resume_at);
                shared.apply_audio_settings();
                return true;
            }
        }

        if !core.mailbox.sleep(generation, RESTART_POLL) {
            release_suppression(&mut core.lock());
            return false;
        }
    }
}

/// Leave suppression to the native playing signal when there is one; the
/// restart's own stop may still be queued behind it
fn release_suppression<E: MediaEngine>(shared: &mut Shared<E>) {
    if !shared.events.playing {
        shared.suppress_until_playing = false;
    }
}

fn is_applied<E: MediaEngine>(core: &Core<E>, shared: &Shared<E>, target: &DeviceSelection) -> bool {
    if !core.engine_caps.device_readback || target.is_default() {
        return true;
    }
    let active = shared.player.output_device();
    debug!("Output device read back as {:?}", active);
    same_device(active.as_deref(), target.id.as_deref())
}

/// Every attempt failed: fall back to the last confirmed device
///
/// Restart-class modules get one more restart so the fallback takes effect.
fn give_up<E: MediaEngine>(core: &Core<E>, request: &PendingDeviceSwitch) {
    let resume_at = {
        let mut guard = core.lock();
        let shared = &mut *guard;
        if !core.mailbox.is_current(request.generation) {
            return;
        }

        let fallback = shared.last_verified.clone().unwrap_or_default();
        shared.apply_device(&fallback);
        if let Some(module) = &fallback.module {
            shared.output_module = Some(module.clone());
        }
        shared.desired = shared.last_verified.clone();
        shared.device_pending = false;

        let err = PlayerError::DeviceSwitch(format!(
            "output device {} could not be confirmed after {} attempts",
            request.target.id.as_deref().unwrap_or("system default"),
            core.config.switch.max_attempts
        ));
        error!(
            "{}, restored {}",
            err,
            fallback.id.as_deref().unwrap_or("system default")
        );
        core.emit(PlayerEvent::error(ErrorKind::DeviceSwitch, &err));

        if core.requires_restart(shared, &fallback) {
            begin_restart(core, shared, &fallback)
        } else {
            None
        }
    };

    if let Some(resume_at) = resume_at {
        if finish_restart(core, request.generation, resume_at) {
            debug!("Fallback device reopened at {:?}", resume_at);
        }
    }
}
