//! Audio Output Device Catalog
//!
//! Enumerates output endpoints of the loaded engine. Per-module listings are
//! probed in configured order and the first non-empty one wins; the player's
//! own enumeration is the fallback. Results are cached for a fixed window.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use riffle_engine::{EngineError, MediaEngine, NativeOutputDevice, NativePlayer};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Identifier some backends report for "whatever the system default is"
pub const DEFAULT_DEVICE_SENTINEL: &str = "{00000000-0000-0000-0000-000000000000}";

/// Trim a device id; empty or the default sentinel mean "system default"
pub fn normalize_device_id(raw: Option<&str>) -> Option<String> {
    let trimmed = raw?.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case(DEFAULT_DEVICE_SENTINEL) {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Compare two device ids after normalization
pub fn same_device(a: Option<&str>, b: Option<&str>) -> bool {
    normalize_device_id(a) == normalize_device_id(b)
}

/// One output endpoint (immutable snapshot)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioDeviceDescriptor {
    /// `None` = system default
    pub id: Option<String>,
    pub name: String,
    pub description: String,
    /// Output module the device belongs to, when known
    pub module_name: Option<String>,
    pub is_default: bool,
}

impl AudioDeviceDescriptor {
    pub fn system_default() -> Self {
        Self {
            id: None,
            name: "System default".to_string(),
            description: "Follow the operating system default output".to_string(),
            module_name: None,
            is_default: true,
        }
    }

    fn from_native(device: &NativeOutputDevice, module: Option<&str>) -> Self {
        let id = normalize_device_id(Some(&device.id));
        let description = device.description.trim().to_string();
        let name = if description.is_empty() {
            id.clone().unwrap_or_else(|| "Unknown device".to_string())
        } else {
            description.clone()
        };
        Self {
            is_default: id.is_none(),
            id,
            name,
            description,
            module_name: module.map(str::to_string),
        }
    }
}

/// A device choice: normalized id plus the module to tag it with
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceSelection {
    pub id: Option<String>,
    pub module: Option<String>,
}

impl DeviceSelection {
    pub fn new(id: Option<&str>, module: Option<&str>) -> Self {
        Self {
            id: normalize_device_id(id),
            module: module
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(str::to_string),
        }
    }

    /// Id as passed to the native device-set call ("" = default)
    pub fn native_id(&self) -> &str {
        self.id.as_deref().unwrap_or("")
    }

    pub fn is_default(&self) -> bool {
        self.id.is_none()
    }
}

impl From<&AudioDeviceDescriptor> for DeviceSelection {
    fn from(descriptor: &AudioDeviceDescriptor) -> Self {
        Self::new(descriptor.id.as_deref(), descriptor.module_name.as_deref())
    }
}

struct CachedDevices {
    devices: Vec<AudioDeviceDescriptor>,
    fetched_at: Instant,
}

/// Cached enumeration of output devices
pub struct DeviceCatalog {
    ttl: Duration,
    probe_modules: Vec<String>,
    cache: Option<CachedDevices>,
}

impl DeviceCatalog {
    pub fn new(ttl: Duration, probe_modules: Vec<String>) -> Self {
        Self {
            ttl,
            probe_modules,
            cache: None,
        }
    }

    /// Cached list if still fresh
    pub fn cached(&self) -> Option<&[AudioDeviceDescriptor]> {
        self.cache
            .as_ref()
            .filter(|cache| cache.fetched_at.elapsed() < self.ttl)
            .map(|cache| cache.devices.as_slice())
    }

    pub fn invalidate(&mut self) {
        self.cache = None;
    }

    /// Device list, re-queried when stale or `force_refresh` is set
    ///
    /// The default entry always comes first.
    pub fn devices<E: MediaEngine>(
        &mut self,
        engine: &E,
        player: Option<&E::Player>,
        force_refresh: bool,
    ) -> Vec<AudioDeviceDescriptor> {
        if !force_refresh {
            if let Some(devices) = self.cached() {
                return devices.to_vec();
            }
        }

        let devices = self.enumerate(engine, player);
        self.cache = Some(CachedDevices {
            devices: devices.clone(),
            fetched_at: Instant::now(),
        });
        devices
    }

    fn enumerate<E: MediaEngine>(
        &self,
        engine: &E,
        player: Option<&E::Player>,
    ) -> Vec<AudioDeviceDescriptor> {
        let mut found: Option<(Vec<NativeOutputDevice>, Option<&str>)> = None;

        for module in &self.probe_modules {
            match engine.list_output_devices(module) {
                Ok(list) if !list.is_empty() => {
                    debug!("{} output devices listed by module {}", list.len(), module);
                    found = Some((list, Some(module.as_str())));
                    break;
                }
                Ok(_) => debug!("Module {} listed no output devices", module),
                Err(EngineError::Unsupported(what)) => {
                    debug!("Per-module device listing unavailable ({})", what);
                    break;
                }
                Err(e) => debug!("Device listing for module {} failed: {}", module, e),
            }
        }

        let (native, module) = match found {
            Some(found) => found,
            None => match player {
                Some(player) => (player.enumerate_output_devices(), None),
                None => (Vec::new(), None),
            },
        };
        if native.is_empty() {
            warn!("No output devices enumerated, offering system default only");
        }

        let mut seen = HashSet::new();
        let mut devices = vec![AudioDeviceDescriptor::system_default()];
        for device in &native {
            let descriptor = AudioDeviceDescriptor::from_native(device, module);
            let Some(id) = descriptor.id.clone() else {
                continue;
            };
            if seen.insert(id) {
                devices.push(descriptor);
            }
        }
        devices
    }
}
