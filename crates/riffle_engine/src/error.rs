//! Engine Error Types

use std::path::PathBuf;

use thiserror::Error;

/// Errors from the native engine boundary and the engine resolver
#[derive(Error, Debug)]
pub enum EngineError {
    /// Every candidate installation failed validation or loading
    #[error("No usable media engine installation found ({tried} candidates tried)")]
    NoCandidate { tried: usize },

    #[error("Candidate root rejected: {root}: {reason}")]
    InvalidRoot { root: PathBuf, reason: String },

    #[error("Failed to load native library {path}: {message}")]
    LibraryLoad { path: PathBuf, message: String },

    #[error("Missing native symbol: {0}")]
    MissingSymbol(&'static str),

    #[error("Native instance creation failed: {0}")]
    InstanceCreation(String),

    #[error("A media engine is already loaded in this process")]
    AlreadyLoaded,

    #[error("Failed to create native player")]
    PlayerCreation,

    #[error("Failed to create native media for {0}")]
    MediaCreation(String),

    #[error("Native call failed: {0}")]
    NativeCall(String),

    #[error("Not supported by the loaded engine: {0}")]
    Unsupported(&'static str),
}

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
