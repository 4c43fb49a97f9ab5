//! Media sources and kind detection

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use riffle_engine::MediaLocator;
use serde::{Deserialize, Serialize};

use crate::error::{PlayerError, PlayerResult};

const URL_SCHEMES: &[&str] = &["http", "https", "rtsp", "rtmp", "mms", "ftp", "file"];

const AUDIO_EXTENSIONS: &[&str] = &[
    "mp3", "wav", "flac", "aac", "m4a", "ogg", "wma", "ape", "opus", "m4p", "mp4a",
];
const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "avi", "mkv", "wmv", "mov", "webm", "flv", "m4v", "3gp", "ogv", "ts", "mts",
];
const PLAYLIST_EXTENSIONS: &[&str] = &["m3u", "m3u8", "pls", "xspf"];

/// Something the player can open
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaSource {
    File(PathBuf),
    Url(String),
}

impl MediaSource {
    /// Parse user input: known URL schemes become locations, anything else
    /// must be an existing local file
    pub fn parse(input: &str) -> PlayerResult<Self> {
        let input = input.trim();
        if input.is_empty() {
            return Err(PlayerError::MediaLoad {
                media: String::new(),
                reason: "empty source".into(),
            });
        }

        if let Some((scheme, rest)) = input.split_once("://") {
            if URL_SCHEMES.contains(&scheme.to_ascii_lowercase().as_str()) {
                if rest.is_empty() {
                    return Err(PlayerError::MediaLoad {
                        media: input.to_string(),
                        reason: "URL has no location".into(),
                    });
                }
                return Ok(Self::Url(input.to_string()));
            }
        }

        let path = PathBuf::from(input);
        if !path.is_file() {
            return Err(PlayerError::MediaLoad {
                media: input.to_string(),
                reason: "file not found".into(),
            });
        }
        Ok(Self::File(path))
    }

    pub fn locator(&self) -> MediaLocator {
        match self {
            Self::File(path) => MediaLocator::Path(path.clone()),
            Self::Url(url) => MediaLocator::Location(url.clone()),
        }
    }

    pub fn kind(&self) -> MediaKind {
        match self {
            Self::File(path) => MediaKind::from_name(&path.to_string_lossy()),
            Self::Url(url) => MediaKind::from_name(url),
        }
    }

    /// File stem, or the last path segment of a URL
    pub fn title(&self) -> String {
        match self {
            Self::File(path) => path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
            Self::Url(url) => {
                let trimmed = strip_query(url).trim_end_matches('/');
                match trimmed.rsplit_once('/') {
                    Some((_, last)) if !last.is_empty() => last.to_string(),
                    _ => url.clone(),
                }
            }
        }
    }
}

impl fmt::Display for MediaSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Url(url) => f.write_str(url),
        }
    }
}

/// Coarse media category by extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaKind {
    Audio,
    Video,
    Playlist,
    Unknown,
}

impl MediaKind {
    /// Detect from a file name, path or URL (query and fragment ignored)
    pub fn from_name(name: &str) -> Self {
        let name = strip_query(name);
        let extension = Path::new(name)
            .extension()
            .map(|ext| ext.to_string_lossy().to_ascii_lowercase());

        match extension.as_deref() {
            Some(ext) if AUDIO_EXTENSIONS.contains(&ext) => Self::Audio,
            Some(ext) if VIDEO_EXTENSIONS.contains(&ext) => Self::Video,
            Some(ext) if PLAYLIST_EXTENSIONS.contains(&ext) => Self::Playlist,
            _ => Self::Unknown,
        }
    }
}

fn strip_query(name: &str) -> &str {
    let end = name.find(['?', '#']).unwrap_or(name.len());
    &name[..end]
}

/// Snapshot of the currently bound media
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaInfo {
    pub title: String,
    pub source: String,
    pub kind: MediaKind,
    pub duration: Option<Duration>,
    pub current_time: Option<Duration>,
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_parse_url() {
        let source = MediaSource::parse("  https://example.com/music/track.flac?sig=1 ").unwrap();
        assert_eq!(
            source,
            MediaSource::Url("https://example.com/music/track.flac?sig=1".into())
        );
        assert_eq!(source.kind(), MediaKind::Audio);
        assert_eq!(source.title(), "track.flac");
    }

    #[test]
    fn test_parse_rejects_empty_and_missing_file() {
        assert!(matches!(
            MediaSource::parse("   "),
            Err(PlayerError::MediaLoad { .. })
        ));
        assert!(matches!(
            MediaSource::parse("/definitely/not/here.mp3"),
            Err(PlayerError::MediaLoad { .. })
        ));
        assert!(MediaSource::parse("http://").is_err());
    }

    #[test]
    fn test_parse_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Clip Name.MKV");
        std::fs::write(&path, b"").unwrap();

        let source = MediaSource::parse(path.to_str().unwrap()).unwrap();
        assert_eq!(source.kind(), MediaKind::Video);
        assert_eq!(source.title(), "Clip Name");
        assert_eq!(source.locator(), MediaLocator::Path(path));
    }

    #[test]
    fn test_unknown_scheme_is_treated_as_path() {
        assert!(MediaSource::parse("spotify://track/1").is_err());
    }

    #[test]
    fn test_kind_detection() {
        assert_eq!(MediaKind::from_name("a/b/list.M3U8"), MediaKind::Playlist);
        assert_eq!(MediaKind::from_name("stream.ts#t=10"), MediaKind::Video);
        assert_eq!(MediaKind::from_name("voice.opus"), MediaKind::Audio);
        assert_eq!(MediaKind::from_name("notes.txt"), MediaKind::Unknown);
        assert_eq!(MediaKind::from_name("noextension"), MediaKind::Unknown);
    }

    #[test]
    fn test_url_title_falls_back_to_url() {
        let source = MediaSource::Url("rtsp://camera.local/".into());
        assert_eq!(source.title(), "camera.local");
        let source = MediaSource::Url("http://".into());
        assert_eq!(source.title(), "http://");
    }
}
