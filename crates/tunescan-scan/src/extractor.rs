//! Track metadata extraction.
//!
//! Tag parsing is delegated to a [`TagReader`]; the production reader is
//! backed by `lofty`. Every failure degrades to a [`SkipReason`].

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use compact_str::CompactString;
use lofty::file::{AudioFile, TaggedFileExt};
use lofty::probe::Probe;
use lofty::tag::Accessor;
use thiserror::Error;
use tracing::{debug, trace};

use tunescan_core::{ScanConfig, SkipReason, TrackRecord, mime_for_extension, mtime_secs};

/// Tags and audio properties read from one file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTags {
    pub artist: Option<String>,
    pub album: Option<String>,
    pub title: Option<String>,
    pub track: Option<u32>,
    pub year: Option<u32>,
    /// Duration in seconds.
    pub duration: u32,
    /// Bitrate in kbps.
    pub bitrate: u32,
}

/// Failure to read tags from a file.
#[derive(Debug, Error)]
pub enum TagReadError {
    /// The file could not be opened or parsed.
    #[error("Cannot parse {0}")]
    Unreadable(String),
    /// The file parsed but carries no tag container.
    #[error("No tags found")]
    NoTags,
}

/// Reads tags and audio properties from a file.
pub trait TagReader: Send + Sync + 'static {
    fn read_tags(&self, path: &Path) -> Result<RawTags, TagReadError>;
}

/// Tag reader backed by `lofty`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoftyTagReader;

impl TagReader for LoftyTagReader {
    fn read_tags(&self, path: &Path) -> Result<RawTags, TagReadError> {
        let tagged_file = Probe::open(path)
            .and_then(|probe| probe.read())
            .map_err(|e| TagReadError::Unreadable(e.to_string()))?;

        let tag = tagged_file
            .primary_tag()
            .or_else(|| tagged_file.first_tag())
            .ok_or(TagReadError::NoTags)?;
        let properties = tagged_file.properties();

        Ok(RawTags {
            artist: tag.artist().map(|s| s.into_owned()),
            album: tag.album().map(|s| s.into_owned()),
            title: tag.title().map(|s| s.into_owned()),
            track: tag.track(),
            year: tag.year(),
            duration: u32::try_from(properties.duration().as_secs()).unwrap_or(u32::MAX),
            bitrate: properties.audio_bitrate().unwrap_or(0),
        })
    }
}

/// Turns candidate files into track records.
#[derive(Debug, Clone)]
pub struct MetadataExtractor<R = LoftyTagReader> {
    reader: R,
    extensions: BTreeSet<String>,
    compute_hashes: bool,
    min_hash_size: u64,
}

impl MetadataExtractor<LoftyTagReader> {
    /// Create an extractor using the `lofty` tag reader.
    pub fn new(config: &ScanConfig) -> Self {
        Self::with_reader(config, LoftyTagReader)
    }
}

impl<R: TagReader> MetadataExtractor<R> {
    /// Create an extractor with a custom tag reader.
    pub fn with_reader(config: &ScanConfig, reader: R) -> Self {
        Self {
            reader,
            extensions: config
                .extensions
                .iter()
                .map(|e| e.to_ascii_lowercase())
                .collect(),
            compute_hashes: config.compute_hashes,
            min_hash_size: config.min_hash_size,
        }
    }

    /// Extract a track record from `path`.
    ///
    /// Only reads the filesystem; never fails for more than this one file.
    pub fn extract(&self, path: &Path) -> Result<TrackRecord, SkipReason> {
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        if !self.extensions.contains(&extension) {
            return Err(SkipReason::UnsupportedExtension);
        }
        let mimetype = mime_for_extension(&extension).ok_or(SkipReason::UnsupportedExtension)?;

        let metadata = fs::metadata(path).map_err(|e| {
            debug!(path = %path.display(), error = %e, "cannot stat file");
            SkipReason::Unreadable
        })?;

        let tags = self.reader.read_tags(path).map_err(|e| {
            trace!(path = %path.display(), error = %e, "not a valid audio file");
            SkipReason::Unreadable
        })?;

        let artist = trimmed(tags.artist);
        let title = trimmed(tags.title);
        if artist.is_empty() || title.is_empty() {
            trace!(path = %path.display(), "missing artist or title");
            return Err(SkipReason::MissingRequiredTags);
        }

        let size = metadata.len();
        let hash = if self.compute_hashes && size >= self.min_hash_size {
            content_hash(path)
        } else {
            String::new()
        };

        Ok(TrackRecord {
            url: TrackRecord::file_url(path),
            mtime: metadata.modified().map(mtime_secs).unwrap_or(0),
            size,
            mimetype: mimetype.into(),
            duration: tags.duration,
            bitrate: tags.bitrate,
            artist,
            album: trimmed(tags.album),
            title,
            album_pos: tags.track.unwrap_or(0),
            year: tags.year.unwrap_or(0),
            hash,
        })
    }
}

fn trimmed(value: Option<String>) -> CompactString {
    value.as_deref().map(str::trim).unwrap_or_default().into()
}

/// BLAKE3 hex digest of the file, empty if it cannot be read.
fn content_hash(path: &Path) -> String {
    let mut hasher = blake3::Hasher::new();
    match hasher.update_mmap(path) {
        Ok(_) => hasher.finalize().to_hex().to_string(),
        Err(err) => {
            debug!(path = %path.display(), error = %err, "cannot hash file");
            String::new()
        }
    }
}
