//! Persistent Player Settings
//!
//! Plain user preferences restored at startup.
//!
//! # Storage Locations
//! - Linux: `~/.config/riffle/settings.json`
//! - Windows: `%APPDATA%\riffle\riffle\config\settings.json`
//! - macOS: `~/Library/Application Support/com.riffle.riffle/settings.json`

use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

/// Root settings structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSettings {
    /// Probe the bundled runtime before system installations
    #[serde(default)]
    pub prefer_bundled: bool,
    #[serde(default = "default_volume")]
    pub volume: u8,
    #[serde(default)]
    pub muted: bool,
    #[serde(default = "default_rate")]
    pub rate: f32,
    /// Last selected output device (`None` = system default)
    #[serde(default)]
    pub last_device_id: Option<String>,
    #[serde(default)]
    pub last_device_module: Option<String>,
}

fn default_volume() -> u8 {
    100
}

fn default_rate() -> f32 {
    1.0
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            prefer_bundled: false,
            volume: default_volume(),
            muted: false,
            rate: default_rate(),
            last_device_id: None,
            last_device_module: None,
        }
    }
}

impl PlayerSettings {
    /// Load settings from the platform config dir, or defaults
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => {
                info!("Using default settings");
                Self::default()
            }
        }
    }

    /// Load settings from `path`, or return default if missing/corrupt
    pub fn load_from(path: &Path) -> Self {
        if path.exists() {
            match fs::File::open(path) {
                Ok(file) => match serde_json::from_reader(file) {
                    Ok(settings) => {
                        info!("Settings loaded from {:?}", path);
                        return settings;
                    }
                    Err(e) => error!("Failed to parse settings file: {}", e),
                },
                Err(e) => error!("Failed to open settings file: {}", e),
            }
        }

        info!("Using default settings");
        Self::default()
    }

    /// Save settings to the platform config dir
    pub fn save(&self) -> Result<(), String> {
        let path = Self::config_path().ok_or("Could not determine config path")?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }

        let file = fs::File::create(path).map_err(|e| e.to_string())?;
        serde_json::to_writer_pretty(file, self).map_err(|e| e.to_string())?;

        info!("Settings saved to {:?}", path);
        Ok(())
    }

    /// Get the platform-specific configuration file path
    pub fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("com", "riffle", "riffle")
            .map(|proj| proj.config_dir().join("settings.json"))
    }
}
