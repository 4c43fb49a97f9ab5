//! Player Error Types

use riffle_engine::EngineError;
use thiserror::Error;

/// Errors surfaced by the playback core
#[derive(Error, Debug)]
pub enum PlayerError {
    /// No engine could be loaded; playback stays disabled for the process
    #[error("Media engine unavailable: {0}")]
    Load(#[from] EngineError),

    /// The source could not be opened; the player remains usable
    #[error("Failed to load media {media}: {reason}")]
    MediaLoad { media: String, reason: String },

    #[error("Playback error: {0}")]
    Playback(String),

    #[error("Audio device switch failed: {0}")]
    DeviceSwitch(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("No media loaded")]
    NoMedia,

    #[error("Media duration is unknown")]
    DurationUnknown,

    #[error("Failed to spawn worker thread: {0}")]
    WorkerSpawn(String),
}

/// Result type alias for player operations
pub type PlayerResult<T> = Result<T, PlayerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PlayerError::MediaLoad {
            media: "song.mp3".into(),
            reason: "file not found".into(),
        };
        assert!(err.to_string().contains("song.mp3"));

        let err = PlayerError::InvalidInput("volume 150 out of range".into());
        assert!(err.to_string().contains("150"));
    }

    #[test]
    fn test_error_from_engine() {
        let engine_err = EngineError::NoCandidate { tried: 4 };
        let err: PlayerError = engine_err.into();
        assert!(matches!(err, PlayerError::Load(_)));
    }
}
