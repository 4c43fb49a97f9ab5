//! Riffle Engine - Native Media Engine Boundary
//!
//! This crate owns everything that touches the native media library:
//! - Discovery and validation of candidate installations
//! - Process environment export for the chosen root
//! - Runtime-loaded libVLC bindings behind the [`MediaEngine`] traits
//!
//! # Resolution
//!
//! ```text
//! ResolverConfig ──candidates──▶ validate_root ──▶ export env ──▶ EngineLoader
//!                                     │ fail            │ load fails
//!                                     └──── next ◀──────┘ (env restored)
//! ```
//!
//! At most one engine instance is live per process.

mod config;
mod environment;
mod error;
mod resolver;
mod traits;

pub mod vlc;

pub use config::{default_instance_args, ResolverConfig, DEFAULT_MIN_PLUGIN_COUNT};
pub use environment::{export_engine_paths, EnvSnapshot, Environment, ProcessEnvironment};
pub use error::{EngineError, EngineResult};
pub use resolver::{
    count_plugins, find_library, missing_plugins, source_order, validate_root, Candidate,
    EngineInfo, EngineLoader, EngineResolver, ResolvedEngine, RootValidation,
};
pub use traits::{
    EngineCapabilities, EventSink, LoadSource, MediaEngine, MediaLocator, NativeEvent,
    NativeEventKind, NativeMedia, NativeOutputDevice, NativePlayer, NativeState, NativeTrack,
};
