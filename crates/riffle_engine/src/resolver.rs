//! Engine Resolver
//!
//! Locates one usable engine installation from a prioritized candidate list,
//! validates that it is complete, exports its paths and loads it.
//!
//! # Candidate Order
//!
//! ```text
//! system-first (default):  SystemInstalled → ApplicationDirectory → Bundled
//! bundled-first:           Bundled → ApplicationDirectory → SystemInstalled
//! ```
//!
//! A root passes validation when the directory exists, every required core
//! library sits at its top level, and the plugin directory holds at least
//! `min_plugin_count` plugin files. Validation and load failures fall through
//! to the next candidate; only exhaustion is reported.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::ResolverConfig;
use crate::environment::{export_engine_paths, Environment, ProcessEnvironment};
use crate::error::{EngineError, EngineResult};
use crate::traits::{EngineCapabilities, LoadSource, MediaEngine};

/// Loads a native engine from a validated library path
pub trait EngineLoader {
    type Engine;

    fn load(&self, library: &Path, args: &[String]) -> EngineResult<Self::Engine>;
}

/// One installation root to try
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub source: LoadSource,
    pub root: PathBuf,
}

/// Result of a successful root validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootValidation {
    /// Path of the library to load (first required library)
    pub library: PathBuf,
    pub plugin_count: usize,
}

/// A loaded engine together with where it came from
pub struct ResolvedEngine<E> {
    pub engine: E,
    pub source: LoadSource,
    pub root: PathBuf,
}

/// Diagnostic snapshot of the loaded engine
#[derive(Debug, Clone, Serialize)]
pub struct EngineInfo {
    pub source: LoadSource,
    pub root: PathBuf,
    pub version: String,
    pub capabilities: EngineCapabilities,
}

impl<E: MediaEngine> ResolvedEngine<E> {
    pub fn info(&self) -> EngineInfo {
        EngineInfo {
            source: self.source,
            root: self.root.clone(),
            version: self.engine.version(),
            capabilities: self.engine.capabilities(),
        }
    }
}

/// Candidate source order for a preference
pub fn source_order(prefer_bundled: bool) -> [LoadSource; 3] {
    if prefer_bundled {
        [
            LoadSource::Bundled,
            LoadSource::ApplicationDirectory,
            LoadSource::SystemInstalled,
        ]
    } else {
        [
            LoadSource::SystemInstalled,
            LoadSource::ApplicationDirectory,
            LoadSource::Bundled,
        ]
    }
}

/// Finds, validates and loads the native engine
pub struct EngineResolver<L> {
    config: ResolverConfig,
    loader: L,
}

impl<L: EngineLoader> EngineResolver<L> {
    pub fn new(config: ResolverConfig, loader: L) -> Self {
        Self { config, loader }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// All candidate roots in probe order
    pub fn candidates(&self, prefer_bundled: bool) -> Vec<Candidate> {
        source_order(prefer_bundled)
            .into_iter()
            .flat_map(|source| {
                self.config
                    .roots_for(source)
                    .iter()
                    .map(move |root| Candidate {
                        source,
                        root: root.clone(),
                    })
            })
            .collect()
    }

    /// Resolve against the real process environment
    pub fn resolve(&self, prefer_bundled: bool) -> EngineResult<ResolvedEngine<L::Engine>> {
        self.resolve_with(prefer_bundled, &ProcessEnvironment)
    }

    /// Resolve, writing environment variables through `env`
    ///
    /// The environment is only touched for a candidate that validated, and is
    /// restored if that candidate then fails to load.
    pub fn resolve_with(
        &self,
        prefer_bundled: bool,
        env: &dyn Environment,
    ) -> EngineResult<ResolvedEngine<L::Engine>> {
        let candidates = self.candidates(prefer_bundled);

        for candidate in &candidates {
            let validation = match validate_root(&self.config, &candidate.root) {
                Ok(validation) => validation,
                Err(e) => {
                    debug!("Skipping {} candidate: {}", candidate.source, e);
                    continue;
                }
            };

            debug!(
                "{} candidate {} validated ({} plugins)",
                candidate.source,
                candidate.root.display(),
                validation.plugin_count
            );

            let snapshot = export_engine_paths(env, &self.config, &candidate.root);

            match self
                .loader
                .load(&validation.library, &self.config.instance_args)
            {
                Ok(engine) => {
                    info!(
                        "Media engine loaded from {} ({})",
                        candidate.root.display(),
                        candidate.source
                    );
                    return Ok(ResolvedEngine {
                        engine,
                        source: candidate.source,
                        root: candidate.root.clone(),
                    });
                }
                Err(e) => {
                    warn!(
                        "Validated {} candidate {} failed to load: {}",
                        candidate.source,
                        candidate.root.display(),
                        e
                    );
                    snapshot.restore(env);
                }
            }
        }

        warn!("No media engine available, playback disabled");
        Err(EngineError::NoCandidate {
            tried: candidates.len(),
        })
    }
}

/// Check that `root` is a complete installation
pub fn validate_root(config: &ResolverConfig, root: &Path) -> EngineResult<RootValidation> {
    let reject = |reason: String| EngineError::InvalidRoot {
        root: root.to_path_buf(),
        reason,
    };

    if !root.is_dir() {
        return Err(reject("directory does not exist".into()));
    }

    let mut library = None;
    for name in &config.required_libraries {
        match find_library(root, name) {
            Some(path) => {
                if library.is_none() {
                    library = Some(path);
                }
            }
            None => return Err(reject(format!("missing core library {}", name))),
        }
    }
    let library = library.ok_or_else(|| reject("no required libraries configured".into()))?;

    let plugin_dir = root.join(&config.plugin_dir);
    if !plugin_dir.is_dir() {
        return Err(reject(format!(
            "plugin directory {} does not exist",
            plugin_dir.display()
        )));
    }

    let plugin_count = count_plugins(&plugin_dir, &config.plugin_extension);
    if plugin_count < config.min_plugin_count {
        return Err(reject(format!(
            "only {} plugin files (need {})",
            plugin_count, config.min_plugin_count
        )));
    }

    Ok(RootValidation {
        library,
        plugin_count,
    })
}

/// Locate a core library at the top level of `root`
///
/// Accepts the exact name or a versioned variant (`libvlc.so.5`).
pub fn find_library(root: &Path, name: &str) -> Option<PathBuf> {
    let exact = root.join(name);
    if exact.is_file() {
        return Some(exact);
    }

    let prefix = format!("{}.", name);
    let mut versioned: Vec<PathBuf> = fs::read_dir(root)
        .ok()?
        .filter_map(Result::ok)
        .filter(|entry| entry.file_name().to_string_lossy().starts_with(&prefix))
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();
    versioned.sort();
    versioned.into_iter().next()
}

/// Count plugin files in `dir`, descending one level when the top level has none
pub fn count_plugins(dir: &Path, extension: &str) -> usize {
    let direct = plugin_files(dir, extension).len();
    if direct > 0 {
        return direct;
    }

    subdirectories(dir)
        .iter()
        .map(|sub| plugin_files(sub, extension).len())
        .sum()
}

/// Essential plugins that are not present under the root's plugin directory
pub fn missing_plugins(config: &ResolverConfig, root: &Path) -> Vec<String> {
    let plugin_dir = root.join(&config.plugin_dir);
    if !plugin_dir.is_dir() {
        return config.essential_plugins.clone();
    }

    let mut found: Vec<String> = plugin_files(&plugin_dir, &config.plugin_extension)
        .into_iter()
        .chain(
            subdirectories(&plugin_dir)
                .iter()
                .flat_map(|sub| plugin_files(sub, &config.plugin_extension)),
        )
        .filter_map(|path| path.file_name().map(|n| n.to_string_lossy().into_owned()))
        .collect();
    found.sort();

    config
        .essential_plugins
        .iter()
        .filter(|name| found.binary_search(name).is_err())
        .cloned()
        .collect()
}

fn plugin_files(dir: &Path, extension: &str) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .map(|ext| ext.eq_ignore_ascii_case(extension))
                    .unwrap_or(false)
        })
        .collect()
}

fn subdirectories(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect()
}
