//! In-memory library model shared by the store backends.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use tunescan_core::{DirMTimeMap, SourceId, TrackRecord};

/// A track together with the source that owns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredTrack {
    pub source: SourceId,
    #[serde(flatten)]
    pub record: TrackRecord,
}

/// Tracks keyed by url plus the directory mtime baseline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Library {
    #[serde(default)]
    tracks: BTreeMap<String, StoredTrack>,
    #[serde(default)]
    dir_mtimes: DirMTimeMap,
}

/// Summary statistics about a library.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryStats {
    pub tracks: usize,
    pub directories: usize,
    pub total_bytes: u64,
    /// Sum of track durations in seconds.
    pub total_duration: u64,
}

impl Library {
    pub fn new() -> Self {
        Self::default()
    }

    /// Baseline entries at or below `root`.
    pub fn mtimes_under(&self, root: &Path) -> DirMTimeMap {
        self.dir_mtimes.under(root)
    }

    /// Insert or replace each record, keyed by url.
    pub fn upsert(&mut self, batch: &[TrackRecord], source: &SourceId) {
        for record in batch {
            self.tracks.insert(
                record.url.clone(),
                StoredTrack {
                    source: source.clone(),
                    record: record.clone(),
                },
            );
        }
    }

    /// Remove the tracks of `source` directly inside `dir`, returning how many.
    pub fn remove_dir(&mut self, dir: &Path, source: &SourceId) -> usize {
        let before = self.tracks.len();
        self.tracks.retain(|_, stored| {
            stored.source != *source || stored.record.dir().as_deref() != Some(dir)
        });
        before - self.tracks.len()
    }

    /// Replace the baseline below `roots` with `mtimes`.
    pub fn replace_baseline(&mut self, roots: &[PathBuf], mtimes: &DirMTimeMap) {
        self.dir_mtimes.remove_under(roots);
        self.dir_mtimes.merge(mtimes.clone());
    }

    /// Forget every saved directory mtime.
    pub fn clear_baseline(&mut self) {
        self.dir_mtimes = DirMTimeMap::new();
    }

    pub fn track(&self, url: &str) -> Option<&StoredTrack> {
        self.tracks.get(url)
    }

    pub fn dir_mtimes(&self) -> &DirMTimeMap {
        &self.dir_mtimes
    }

    pub fn stats(&self) -> LibraryStats {
        LibraryStats {
            tracks: self.tracks.len(),
            directories: self.dir_mtimes.len(),
            total_bytes: self.tracks.values().map(|t| t.record.size).sum(),
            total_duration: self
                .tracks
                .values()
                .map(|t| u64::from(t.record.duration))
                .sum(),
        }
    }
}
