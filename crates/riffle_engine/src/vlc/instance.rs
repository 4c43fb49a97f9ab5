//! libVLC instance and media objects
//!
//! One instance per process. The instance owns the loaded library; players
//! and media hold an `Arc` to it so the library outlives every native object.

use std::ffi::{c_char, CString};
use std::path::Path;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use super::ffi::{self, libvlc_instance_t, libvlc_media_t};
use super::library::VlcLibrary;
use super::player::VlcPlayer;
use crate::error::{EngineError, EngineResult};
use crate::resolver::EngineLoader;
use crate::traits::{EngineCapabilities, MediaEngine, MediaLocator, NativeMedia, NativeOutputDevice};

static INSTANCE_LIVE: AtomicBool = AtomicBool::new(false);

pub(crate) struct InstanceInner {
    pub api: VlcLibrary,
    pub raw: NonNull<libvlc_instance_t>,
}

// SAFETY: libvlc instances are internally synchronized and may be used from
// any thread.
unsafe impl Send for InstanceInner {}
unsafe impl Sync for InstanceInner {}

impl Drop for InstanceInner {
    fn drop(&mut self) {
        // SAFETY: Last reference; every player and media holding this Arc is gone.
        unsafe { (self.api.release)(self.raw.as_ptr()) };
        INSTANCE_LIVE.store(false, Ordering::SeqCst);
        debug!("libvlc instance released");
    }
}

/// The loaded libVLC engine
#[derive(Clone)]
pub struct VlcEngine {
    inner: Arc<InstanceInner>,
}

impl VlcEngine {
    /// Open the library at `library` and create the process instance
    pub fn load(library: &Path, args: &[String]) -> EngineResult<Self> {
        if INSTANCE_LIVE.swap(true, Ordering::SeqCst) {
            return Err(EngineError::AlreadyLoaded);
        }

        match Self::create(library, args) {
            Ok(engine) => Ok(engine),
            Err(e) => {
                INSTANCE_LIVE.store(false, Ordering::SeqCst);
                Err(e)
            }
        }
    }

    fn create(library: &Path, args: &[String]) -> EngineResult<Self> {
        let api = VlcLibrary::open(library)?;

        let c_args = args
            .iter()
            .map(|arg| CString::new(arg.as_str()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| EngineError::InstanceCreation(e.to_string()))?;
        let argv: Vec<*const c_char> = c_args.iter().map(|arg| arg.as_ptr()).collect();

        // SAFETY: argv points into c_args, which outlives the call.
        let raw = unsafe { (api.new)(argv.len() as i32, argv.as_ptr()) };
        let raw = NonNull::new(raw).ok_or_else(|| EngineError::InstanceCreation(api.last_error()))?;

        let engine = Self {
            inner: Arc::new(InstanceInner { api, raw }),
        };
        info!(
            "libvlc {} initialized with {} arguments",
            engine.version(),
            args.len()
        );
        Ok(engine)
    }
}

impl MediaEngine for VlcEngine {
    type Media = VlcMedia;
    type Player = VlcPlayer;

    fn version(&self) -> String {
        // SAFETY: libvlc_get_version returns a static string.
        unsafe { ffi::string_from((self.inner.api.get_version)()) }.unwrap_or_default()
    }

    fn capabilities(&self) -> EngineCapabilities {
        self.inner.api.capabilities()
    }

    fn new_player(&self) -> EngineResult<VlcPlayer> {
        VlcPlayer::new(Arc::clone(&self.inner))
    }

    fn new_media(&self, locator: &MediaLocator) -> EngineResult<VlcMedia> {
        let api = &self.inner.api;
        let (constructor, text) = match locator {
            MediaLocator::Path(path) => (api.media_new_path, path.to_string_lossy().into_owned()),
            MediaLocator::Location(url) => (api.media_new_location, url.clone()),
        };
        let c_text =
            CString::new(text.as_str()).map_err(|_| EngineError::MediaCreation(text.clone()))?;

        // SAFETY: The instance is alive and c_text outlives the call.
        let raw = unsafe { constructor(self.inner.raw.as_ptr(), c_text.as_ptr()) };
        let raw = NonNull::new(raw).ok_or(EngineError::MediaCreation(text))?;

        Ok(VlcMedia {
            instance: Arc::clone(&self.inner),
            raw,
        })
    }

    fn list_output_devices(&self, module: &str) -> EngineResult<Vec<NativeOutputDevice>> {
        let api = &self.inner.api;
        let list_get = api
            .audio_output_device_list_get
            .ok_or(EngineError::Unsupported("audio output device listing"))?;
        let c_module = CString::new(module)
            .map_err(|_| EngineError::NativeCall(format!("invalid module name {:?}", module)))?;

        // SAFETY: The instance is alive; the returned list is walked and
        // released by collect_devices.
        let devices = unsafe {
            let list = list_get(self.inner.raw.as_ptr(), c_module.as_ptr());
            api.collect_devices(list)
        };
        Ok(devices)
    }
}

/// Loader used by the resolver in production
#[derive(Debug, Default, Clone, Copy)]
pub struct VlcLoader;

impl EngineLoader for VlcLoader {
    type Engine = VlcEngine;

    fn load(&self, library: &Path, args: &[String]) -> EngineResult<VlcEngine> {
        VlcEngine::load(library, args)
    }
}

/// A libVLC media object
pub struct VlcMedia {
    instance: Arc<InstanceInner>,
    raw: NonNull<libvlc_media_t>,
}

// SAFETY: Media objects are reference counted and thread-safe in libvlc.
unsafe impl Send for VlcMedia {}

impl VlcMedia {
    pub(crate) fn raw(&self) -> *mut libvlc_media_t {
        self.raw.as_ptr()
    }
}

impl NativeMedia for VlcMedia {
    fn parse(&self) -> EngineResult<()> {
        let parse = self
            .instance
            .api
            .media_parse_with_options
            .ok_or(EngineError::Unsupported("media parsing"))?;

        // SAFETY: Media is alive; -1 selects the default timeout.
        let ret = unsafe {
            parse(
                self.raw(),
                ffi::MEDIA_PARSE_LOCAL | ffi::MEDIA_PARSE_NETWORK,
                -1,
            )
        };
        if ret == 0 {
            Ok(())
        } else {
            Err(EngineError::NativeCall("media parse request rejected".into()))
        }
    }

    fn is_parsed(&self) -> bool {
        match self.instance.api.media_get_parsed_status {
            Some(status) => {
                // SAFETY: Media is alive.
                let parsed = unsafe { status(self.raw()) };
                parsed == ffi::MEDIA_PARSED_STATUS_DONE
            }
            None => false,
        }
    }

    fn duration(&self) -> Option<Duration> {
        // SAFETY: Media is alive.
        let ms = unsafe { (self.instance.api.media_get_duration)(self.raw()) };
        (ms > 0).then(|| Duration::from_millis(ms as u64))
    }
}

impl Drop for VlcMedia {
    fn drop(&mut self) {
        // SAFETY: Releases the reference taken at creation.
        unsafe { (self.instance.api.media_release)(self.raw()) };
    }
}
