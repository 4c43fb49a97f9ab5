//! Process Environment Export
//!
//! A successful resolve exports the chosen root to the process environment
//! (plugin search path, prepended library search path). Writes go through the
//! [`Environment`] trait so they can be snapshotted and rolled back when a
//! validated candidate still fails to load.

use std::ffi::{OsStr, OsString};
use std::path::Path;

use crate::config::ResolverConfig;

/// Read/write access to environment variables
pub trait Environment {
    fn get(&self, key: &str) -> Option<OsString>;
    fn set(&self, key: &str, value: &OsStr);
    fn remove(&self, key: &str);
}

/// The real process environment
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessEnvironment;

impl Environment for ProcessEnvironment {
    fn get(&self, key: &str) -> Option<OsString> {
        std::env::var_os(key)
    }

    fn set(&self, key: &str, value: &OsStr) {
        std::env::set_var(key, value);
    }

    fn remove(&self, key: &str) {
        std::env::remove_var(key);
    }
}

/// Previous values of the variables touched by an export
#[derive(Debug, Clone)]
pub struct EnvSnapshot {
    saved: Vec<(String, Option<OsString>)>,
}

impl EnvSnapshot {
    fn capture(env: &dyn Environment, keys: &[&str]) -> Self {
        Self {
            saved: keys
                .iter()
                .map(|key| (key.to_string(), env.get(key)))
                .collect(),
        }
    }

    /// Put every captured variable back as it was
    pub fn restore(self, env: &dyn Environment) {
        for (key, value) in self.saved {
            match value {
                Some(value) => env.set(&key, &value),
                None => env.remove(&key),
            }
        }
    }
}

/// Export the engine root: plugin path set, root prepended to the library path
pub fn export_engine_paths(
    env: &dyn Environment,
    config: &ResolverConfig,
    root: &Path,
) -> EnvSnapshot {
    let snapshot = EnvSnapshot::capture(
        env,
        &[
            config.plugin_path_var.as_str(),
            config.library_path_var.as_str(),
        ],
    );

    let plugin_path = root.join(&config.plugin_dir);
    env.set(&config.plugin_path_var, plugin_path.as_os_str());

    // Empty entries mean the working directory to the dynamic loader
    let current = env.get(&config.library_path_var).unwrap_or_default();
    let existing: Vec<_> = std::env::split_paths(&current)
        .filter(|p| !p.as_os_str().is_empty())
        .collect();
    if !existing.iter().any(|p| p == root) {
        let paths = std::iter::once(root.to_path_buf()).chain(existing);
        match std::env::join_paths(paths) {
            Ok(joined) => env.set(&config.library_path_var, &joined),
            Err(e) => tracing::warn!(
                "Could not prepend {} to {}: {}",
                root.display(),
                config.library_path_var,
                e
            ),
        }
    }

    tracing::debug!(
        "Exported {}={} and prepended {} to {}",
        config.plugin_path_var,
        plugin_path.display(),
        root.display(),
        config.library_path_var
    );

    snapshot
}
