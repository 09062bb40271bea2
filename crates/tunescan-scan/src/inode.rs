//! Inode tracking for directory cycle detection.

use std::collections::HashSet;
use std::fs::Metadata;

#[cfg(unix)]
use std::os::unix::fs::MetadataExt;

/// Identity of a directory on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DirIdentity {
    /// Inode number.
    pub inode: u64,
    /// Device ID.
    pub device: u64,
}

impl DirIdentity {
    /// Create a new identity.
    pub fn new(inode: u64, device: u64) -> Self {
        Self { inode, device }
    }

    /// Identity of the directory described by `metadata`.
    ///
    /// Returns `None` on platforms without inode numbers.
    #[cfg(unix)]
    pub fn of(metadata: &Metadata) -> Option<Self> {
        Some(Self::new(metadata.ino(), metadata.dev()))
    }

    #[cfg(not(unix))]
    pub fn of(_metadata: &Metadata) -> Option<Self> {
        None
    }
}

/// Tracks visited directories so a linked cycle is walked only once.
///
/// Directories are followed through symbolic links, so the same directory
/// can be reached under several paths. Only the first path is walked.
#[derive(Debug, Default)]
pub struct VisitedDirs {
    seen: HashSet<DirIdentity>,
}

impl VisitedDirs {
    /// Create a new tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a directory. Returns `true` if this is the first time seeing it.
    pub fn track(&mut self, identity: DirIdentity) -> bool {
        self.seen.insert(identity)
    }

    /// Get the number of unique directories tracked.
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Check if no directories have been tracked.
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_new_dir() {
        let mut visited = VisitedDirs::new();
        let id = DirIdentity::new(12345, 1);

        assert!(visited.track(id));
        assert!(!visited.track(id));
        assert_eq!(visited.len(), 1);
    }

    #[test]
    fn test_different_devices() {
        let mut visited = VisitedDirs::new();

        assert!(visited.track(DirIdentity::new(12345, 1)));
        assert!(visited.track(DirIdentity::new(12345, 2)));
    }
}
