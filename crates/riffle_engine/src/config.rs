//! Resolver Configuration
//!
//! Candidate installation roots, the completeness checks applied to each one,
//! and the argument set used to construct the native instance.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::traits::LoadSource;

/// Minimum plugin files for a root to count as a complete installation
pub const DEFAULT_MIN_PLUGIN_COUNT: usize = 20;

/// Configuration for the engine resolver
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Runtime shipped with the application package
    pub bundled_roots: Vec<PathBuf>,

    /// Portable copies next to the executable / working directory
    pub application_roots: Vec<PathBuf>,

    /// System-wide installations
    pub system_roots: Vec<PathBuf>,

    /// Core libraries that must exist at the top level of a root.
    /// The first entry is the library that gets loaded.
    pub required_libraries: Vec<String>,

    /// Plugin directory, relative to the root
    pub plugin_dir: PathBuf,

    /// File extension of plugin libraries (without dot)
    pub plugin_extension: String,

    /// Minimum number of plugin files
    pub min_plugin_count: usize,

    /// Plugins whose absence is reported by `missing_plugins`
    pub essential_plugins: Vec<String>,

    /// Arguments for instance construction
    pub instance_args: Vec<String>,

    /// Environment variable receiving the plugin directory
    pub plugin_path_var: String,

    /// Environment variable the root is prepended to
    pub library_path_var: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self::for_current_platform()
    }
}

impl ResolverConfig {
    /// Platform defaults, with application roots derived from the executable
    /// location and the working directory
    pub fn for_current_platform() -> Self {
        let exe_dir = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf));
        let cwd = std::env::current_dir().ok();

        let mut bundled_roots = Vec::new();
        let mut application_roots = Vec::new();

        if let Some(dir) = &exe_dir {
            bundled_roots.push(dir.join("vlc_runtime"));
            bundled_roots.push(dir.join("vlc_runtime").join("lib"));
        }
        for base in cwd.iter().chain(exe_dir.iter()) {
            application_roots.push(base.join("vlc"));
            application_roots.push(base.join("vlc_portable"));
        }

        Self {
            bundled_roots,
            application_roots,
            system_roots: platform::system_roots(),
            required_libraries: platform::required_libraries(),
            plugin_dir: platform::plugin_dir(),
            plugin_extension: platform::PLUGIN_EXTENSION.to_string(),
            min_plugin_count: DEFAULT_MIN_PLUGIN_COUNT,
            essential_plugins: platform::essential_plugins(),
            instance_args: default_instance_args(),
            plugin_path_var: "VLC_PLUGIN_PATH".to_string(),
            library_path_var: platform::LIBRARY_PATH_VAR.to_string(),
        }
    }

    /// Candidate roots of one source, in probe order
    pub fn roots_for(&self, source: LoadSource) -> &[PathBuf] {
        match source {
            LoadSource::Bundled => &self.bundled_roots,
            LoadSource::ApplicationDirectory => &self.application_roots,
            LoadSource::SystemInstalled => &self.system_roots,
            LoadSource::Unavailable => &[],
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.required_libraries.is_empty() {
            return Err("At least one required library must be configured".into());
        }
        if self.plugin_extension.is_empty() || self.plugin_extension.starts_with('.') {
            return Err(format!(
                "Invalid plugin extension: {:?}",
                self.plugin_extension
            ));
        }
        if self.min_plugin_count == 0 {
            return Err("Plugin threshold must be positive".into());
        }
        Ok(())
    }
}

/// Minimal, deterministic instance arguments plus platform backend hints
pub fn default_instance_args() -> Vec<String> {
    let mut args: Vec<String> = [
        "--quiet",
        "--no-stats",
        "--no-video-title-show",
        "--no-sub-autodetect-file",
        "--no-snapshot-preview",
        "--no-interact",
        "--ignore-config",
        "--no-plugins-cache",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    args.extend(platform::backend_hints().iter().map(|s| s.to_string()));
    args
}

#[cfg(target_os = "windows")]
mod platform {
    use std::path::PathBuf;

    pub const PLUGIN_EXTENSION: &str = "dll";
    pub const LIBRARY_PATH_VAR: &str = "PATH";

    pub fn system_roots() -> Vec<PathBuf> {
        let mut roots = Vec::new();
        for var in ["ProgramFiles", "ProgramFiles(x86)"] {
            if let Some(dir) = std::env::var_os(var) {
                roots.push(PathBuf::from(dir).join("VideoLAN").join("VLC"));
            }
        }
        roots.push(PathBuf::from(r"C:\Program Files\VideoLAN\VLC"));
        roots.push(PathBuf::from(r"C:\Program Files (x86)\VideoLAN\VLC"));
        roots.dedup();
        roots
    }

    pub fn required_libraries() -> Vec<String> {
        vec!["libvlc.dll".into(), "libvlccore.dll".into()]
    }

    pub fn plugin_dir() -> PathBuf {
        PathBuf::from("plugins")
    }

    pub fn essential_plugins() -> Vec<String> {
        [
            "libfilesystem_plugin.dll",
            "libmp4_plugin.dll",
            "libes_plugin.dll",
            "libdirectsound_plugin.dll",
            "libmmdevice_plugin.dll",
            "libavcodec_plugin.dll",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    pub fn backend_hints() -> &'static [&'static str] {
        &["--aout=directsound", "--vout=dummy"]
    }
}

#[cfg(target_os = "macos")]
mod platform {
    use std::path::PathBuf;

    pub const PLUGIN_EXTENSION: &str = "dylib";
    pub const LIBRARY_PATH_VAR: &str = "DYLD_LIBRARY_PATH";

    pub fn system_roots() -> Vec<PathBuf> {
        vec![
            PathBuf::from("/Applications/VLC.app/Contents/MacOS/lib"),
            PathBuf::from("/usr/local/lib"),
            PathBuf::from("/opt/homebrew/lib"),
        ]
    }

    pub fn required_libraries() -> Vec<String> {
        vec!["libvlc.dylib".into(), "libvlccore.dylib".into()]
    }

    pub fn plugin_dir() -> PathBuf {
        PathBuf::from("../plugins")
    }

    pub fn essential_plugins() -> Vec<String> {
        [
            "libfilesystem_plugin.dylib",
            "libmp4_plugin.dylib",
            "libes_plugin.dylib",
            "libauhal_plugin.dylib",
            "libavcodec_plugin.dylib",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    pub fn backend_hints() -> &'static [&'static str] {
        &["--aout=auhal"]
    }
}

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
mod platform {
    use std::path::PathBuf;

    pub const PLUGIN_EXTENSION: &str = "so";
    pub const LIBRARY_PATH_VAR: &str = "LD_LIBRARY_PATH";

    pub fn system_roots() -> Vec<PathBuf> {
        vec![
            PathBuf::from("/usr/lib/x86_64-linux-gnu"),
            PathBuf::from("/usr/lib/aarch64-linux-gnu"),
            PathBuf::from("/usr/lib64"),
            PathBuf::from("/usr/lib"),
            PathBuf::from("/usr/local/lib"),
        ]
    }

    pub fn required_libraries() -> Vec<String> {
        vec!["libvlc.so".into(), "libvlccore.so".into()]
    }

    pub fn plugin_dir() -> PathBuf {
        PathBuf::from("vlc").join("plugins")
    }

    pub fn essential_plugins() -> Vec<String> {
        [
            "libfilesystem_plugin.so",
            "libmp4_plugin.so",
            "libes_plugin.so",
            "libpulse_plugin.so",
            "libavcodec_plugin.so",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    pub fn backend_hints() -> &'static [&'static str] {
        &["--no-xlib"]
    }
}
