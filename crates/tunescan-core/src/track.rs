//! Track records and skip classification.

use std::fmt;
use std::path::{Path, PathBuf};

use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, IntoStaticStr};

/// URL scheme prefix used for local files.
const FILE_URL_PREFIX: &str = "file://";

/// Identifier of the source that owns a set of tracks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(pub CompactString);

impl SourceId {
    /// Create a new source identifier.
    pub fn new(id: impl Into<CompactString>) -> Self {
        Self(id.into())
    }

    /// The local collection.
    pub fn local() -> Self {
        Self::new("local")
    }

    /// Get the identifier as a string.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Default for SourceId {
    fn default() -> Self {
        Self::local()
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata extracted from one audio file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackRecord {
    /// `file://` URL of the track.
    pub url: String,
    /// File modification time, seconds since the epoch (UTC).
    pub mtime: i64,
    /// File size in bytes.
    pub size: u64,
    /// MIME type derived from the extension.
    pub mimetype: CompactString,
    /// Duration in seconds.
    pub duration: u32,
    /// Bitrate in kbps.
    pub bitrate: u32,
    /// Track artist, never empty.
    pub artist: CompactString,
    /// Album title, may be empty.
    pub album: CompactString,
    /// Track title, never empty.
    pub title: CompactString,
    /// Position on the album (0 = unknown).
    pub album_pos: u32,
    /// Release year (0 = unknown).
    pub year: u32,
    /// Hex content hash, empty when hashing is deferred.
    #[serde(default)]
    pub hash: String,
}

impl TrackRecord {
    /// Build the URL for a local file.
    pub fn file_url(path: &Path) -> String {
        format!("{FILE_URL_PREFIX}{}", path.to_string_lossy())
    }

    /// Local filesystem path of the track.
    pub fn path(&self) -> PathBuf {
        PathBuf::from(self.url.strip_prefix(FILE_URL_PREFIX).unwrap_or(&self.url))
    }

    /// Directory that directly contains the track.
    pub fn dir(&self) -> Option<PathBuf> {
        self.path().parent().map(Path::to_path_buf)
    }

    /// Check the required-field invariant.
    pub fn is_valid(&self) -> bool {
        !self.artist.trim().is_empty() && !self.title.trim().is_empty()
    }
}

/// Why a candidate file produced no track record.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumIter,
    IntoStaticStr,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum SkipReason {
    /// The extension is not in the supported set.
    UnsupportedExtension,
    /// The file could not be opened or parsed, or has no tag container.
    Unreadable,
    /// Artist or title is empty.
    MissingRequiredTags,
}

/// A skipped file kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedFile {
    /// Path of the file.
    pub path: PathBuf,
    /// Why it was skipped.
    pub reason: SkipReason,
}

impl SkippedFile {
    /// Create a new skipped file entry.
    pub fn new(path: impl Into<PathBuf>, reason: SkipReason) -> Self {
        Self {
            path: path.into(),
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    fn record(url: &str, artist: &str, title: &str) -> TrackRecord {
        TrackRecord {
            url: url.to_string(),
            mtime: 0,
            size: 0,
            mimetype: "audio/mpeg".into(),
            duration: 0,
            bitrate: 0,
            artist: artist.into(),
            album: CompactString::default(),
            title: title.into(),
            album_pos: 0,
            year: 0,
            hash: String::new(),
        }
    }

    #[test]
    fn test_file_url_round_trips_to_path() {
        let url = TrackRecord::file_url(Path::new("/music/a b/song.mp3"));
        assert_eq!(url, "file:///music/a b/song.mp3");

        let track = record(&url, "Artist", "Title");
        assert_eq!(track.path(), PathBuf::from("/music/a b/song.mp3"));
        assert_eq!(track.dir(), Some(PathBuf::from("/music/a b")));
    }

    #[test]
    fn test_is_valid_requires_artist_and_title() {
        assert!(record("file:///a.mp3", "Artist", "Title").is_valid());
        assert!(!record("file:///a.mp3", "  ", "Title").is_valid());
        assert!(!record("file:///a.mp3", "Artist", "").is_valid());
    }

    #[test]
    fn test_skip_reason_names() {
        let names: Vec<&'static str> = SkipReason::iter().map(Into::into).collect();
        assert_eq!(
            names,
            vec!["unsupported-extension", "unreadable", "missing-required-tags"]
        );
    }

    #[test]
    fn test_source_id_default_is_local() {
        assert_eq!(SourceId::default().as_str(), "local");
        assert_eq!(SourceId::new("nas").to_string(), "nas");
    }
}
