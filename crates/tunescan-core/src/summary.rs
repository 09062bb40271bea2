//! Walk statistics and scan summaries.

use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

use crate::track::SkippedFile;

/// Counters collected by the directory walker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalkStats {
    /// Directories visited and recorded in the new snapshot.
    pub dirs_visited: u64,
    /// Directories whose files were enumerated.
    pub dirs_rescanned: u64,
    /// Directories skipped because their mtime was unchanged.
    pub dirs_unchanged: u64,
    /// Changed directories whose old records were invalidated.
    pub dirs_invalidated: u64,
    /// Directories that could not be listed.
    pub dirs_unreadable: u64,
    /// Directories reached again through a link and not descended.
    pub cycles_skipped: u64,
    /// Candidate files emitted.
    pub files_emitted: u64,
    /// Deepest directory level reached.
    pub max_depth: u32,
}

impl WalkStats {
    /// Create new empty stats.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a visited directory.
    pub fn record_dir(&mut self, depth: u32, rescanned: bool) {
        self.dirs_visited += 1;
        self.max_depth = self.max_depth.max(depth);
        if rescanned {
            self.dirs_rescanned += 1;
        } else {
            self.dirs_unchanged += 1;
        }
    }

    /// Record an emitted file.
    pub fn record_file(&mut self) {
        self.files_emitted += 1;
    }
}

/// Outcome of one completed scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanSummary {
    /// Root directories that were scanned.
    pub roots: Vec<PathBuf>,
    /// Valid track records produced.
    pub scanned: u64,
    /// Files rejected for any skip reason.
    pub skipped: u64,
    /// Skipped files other than unsupported extensions.
    pub skipped_files: Vec<SkippedFile>,
    /// Batches acknowledged by the store.
    pub batches_committed: u64,
    /// Records acknowledged by the store.
    pub records_committed: u64,
    /// Total size of the produced records in bytes.
    pub bytes_scanned: u64,
    /// Directories found in the baseline but not on disk.
    pub stale_dirs: Vec<PathBuf>,
    /// Directories handed to the watcher.
    pub watched_dirs: usize,
    /// Store submissions that failed after all retries.
    pub failed_submissions: u64,
    /// Whether the new mtime baseline was acknowledged by the store.
    pub baseline_saved: bool,
    /// Walker statistics.
    pub walk: WalkStats,
    /// When the scan started.
    pub started_at: SystemTime,
    /// Duration of the scan.
    pub duration: Duration,
}

impl ScanSummary {
    /// Create an empty summary for a scan starting now.
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self {
            roots,
            scanned: 0,
            skipped: 0,
            skipped_files: Vec::new(),
            batches_committed: 0,
            records_committed: 0,
            bytes_scanned: 0,
            stale_dirs: Vec::new(),
            watched_dirs: 0,
            failed_submissions: 0,
            baseline_saved: false,
            walk: WalkStats::new(),
            started_at: SystemTime::now(),
            duration: Duration::ZERO,
        }
    }

    /// Check whether every store submission was acknowledged.
    pub fn fully_persisted(&self) -> bool {
        self.failed_submissions == 0 && self.baseline_saved
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_walk_stats_record_dir() {
        let mut stats = WalkStats::new();
        stats.record_dir(0, true);
        stats.record_dir(2, false);
        stats.record_file();

        assert_eq!(stats.dirs_visited, 2);
        assert_eq!(stats.dirs_rescanned, 1);
        assert_eq!(stats.dirs_unchanged, 1);
        assert_eq!(stats.files_emitted, 1);
        assert_eq!(stats.max_depth, 2);
    }

    #[test]
    fn test_fully_persisted() {
        let mut summary = ScanSummary::new(vec![PathBuf::from("/music")]);
        assert!(!summary.fully_persisted());

        summary.baseline_saved = true;
        assert!(summary.fully_persisted());

        summary.failed_submissions = 1;
        assert!(!summary.fully_persisted());
    }
}
