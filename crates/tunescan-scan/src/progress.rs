//! Scan progress and notifications.

use std::path::PathBuf;
use std::time::Duration;

use tunescan_core::ScanSummary;

/// Progress information during a scan.
#[derive(Debug, Clone)]
pub struct ScanProgress {
    /// Valid records produced so far.
    pub scanned: u64,
    /// Files skipped so far.
    pub skipped: u64,
    /// Batches acknowledged by the store so far.
    pub batches_committed: u64,
    /// File that produced the latest record.
    pub current_path: PathBuf,
    /// Time elapsed since the scan started.
    pub elapsed: Duration,
}

impl ScanProgress {
    /// Create initial progress state.
    pub fn new() -> Self {
        Self {
            scanned: 0,
            skipped: 0,
            batches_committed: 0,
            current_path: PathBuf::new(),
            elapsed: Duration::ZERO,
        }
    }

    /// Calculate scan rate in tracks per second.
    pub fn tracks_per_second(&self) -> f64 {
        if self.elapsed.as_secs_f64() > 0.0 {
            self.scanned as f64 / self.elapsed.as_secs_f64()
        } else {
            0.0
        }
    }
}

impl Default for ScanProgress {
    fn default() -> Self {
        Self::new()
    }
}

/// Notifications published by the coordinator.
#[derive(Debug, Clone)]
pub enum ScanEvent {
    /// Sampled progress.
    Progress(ScanProgress),
    /// These directories are now part of the library.
    AddWatchedDirs(Vec<PathBuf>),
    /// This directory vanished and should no longer be watched.
    RemoveWatchedDir(PathBuf),
    /// The scan finished and the walker has been shut down.
    Finished(ScanSummary),
}

/// Decides which scanned tracks produce a progress event.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ProgressSampler {
    interval: u64,
}

impl ProgressSampler {
    pub fn new(interval: u64) -> Self {
        Self {
            interval: interval.max(1),
        }
    }

    /// Check whether the `scanned`-th track should be reported.
    pub fn should_report(&self, scanned: u64) -> bool {
        scanned > 0 && scanned % self.interval == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracks_per_second() {
        let progress = ScanProgress {
            scanned: 50,
            elapsed: Duration::from_secs(10),
            ..ScanProgress::new()
        };
        assert_eq!(progress.tracks_per_second(), 5.0);
        assert_eq!(ScanProgress::new().tracks_per_second(), 0.0);
    }

    #[test]
    fn test_sampler_every_nth() {
        let sampler = ProgressSampler::new(3);
        let reported: Vec<u64> = (0..10).filter(|n| sampler.should_report(*n)).collect();
        assert_eq!(reported, vec![3, 6, 9]);
    }

    #[test]
    fn test_sampler_zero_interval_reports_all() {
        let sampler = ProgressSampler::new(0);
        assert!(sampler.should_report(1));
        assert!(sampler.should_report(2));
    }
}
