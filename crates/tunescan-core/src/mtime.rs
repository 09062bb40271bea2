//! Directory modification-time snapshots.

use std::collections::BTreeMap;
use std::collections::btree_map;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Convert a filesystem timestamp to whole seconds since the Unix epoch, UTC.
pub fn mtime_secs(time: SystemTime) -> i64 {
    DateTime::<Utc>::from(time).timestamp()
}

/// How a directory's children are descended into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScanMode {
    /// Children are always descended into as `Recursive`.
    Recursive,
    /// Root mode for a non-recursive scan.
    NonRecursive,
    /// Only the directory's own mtime is checked; content is re-read only
    /// when that mtime changed.
    MTimeOnly,
}

impl ScanMode {
    /// Mode for a directory's children.
    ///
    /// A changed or newly discovered directory is always treated as
    /// `Recursive` for its children, as is every child not present in the
    /// previous snapshot.
    pub fn for_child(self, parent_changed: bool, child_known: bool) -> ScanMode {
        if self == ScanMode::Recursive || parent_changed || !child_known {
            ScanMode::Recursive
        } else {
            ScanMode::MTimeOnly
        }
    }
}

/// Mapping from absolute directory path to its last observed mtime.
///
/// Keys are kept ordered so that iteration, serialization and the stale
/// directory set are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DirMTimeMap {
    entries: BTreeMap<PathBuf, i64>,
}

impl DirMTimeMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the mtime for a directory, returning the previous value.
    pub fn insert(&mut self, dir: impl Into<PathBuf>, mtime: i64) -> Option<i64> {
        self.entries.insert(dir.into(), mtime)
    }

    /// Get the recorded mtime for a directory.
    pub fn get(&self, dir: &Path) -> Option<i64> {
        self.entries.get(dir).copied()
    }

    /// Check whether a directory is known.
    pub fn contains(&self, dir: &Path) -> bool {
        self.entries.contains_key(dir)
    }

    /// Check whether `dir` is known with exactly `mtime`.
    pub fn is_unchanged(&self, dir: &Path, mtime: i64) -> bool {
        self.get(dir) == Some(mtime)
    }

    /// Number of recorded directories.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if no directories are recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over recorded directories in path order.
    pub fn keys(&self) -> impl Iterator<Item = &PathBuf> {
        self.entries.keys()
    }

    /// Iterate over `(directory, mtime)` pairs in path order.
    pub fn iter(&self) -> btree_map::Iter<'_, PathBuf, i64> {
        self.entries.iter()
    }

    /// Directories known here but absent from `current`.
    ///
    /// This is the stale directory set of a scan when called on the
    /// previous snapshot with the new one.
    pub fn stale_dirs(&self, current: &DirMTimeMap) -> Vec<PathBuf> {
        self.entries
            .keys()
            .filter(|dir| !current.contains(dir))
            .cloned()
            .collect()
    }

    /// Copy every entry of `other` into this map.
    pub fn merge(&mut self, other: DirMTimeMap) {
        self.entries.extend(other.entries);
    }

    /// Entries at or below `root`.
    pub fn under(&self, root: &Path) -> DirMTimeMap {
        self.entries
            .iter()
            .filter(|(dir, _)| dir.starts_with(root))
            .map(|(dir, mtime)| (dir.clone(), *mtime))
            .collect()
    }

    /// Drop every entry at or below any of `roots`.
    pub fn remove_under(&mut self, roots: &[PathBuf]) {
        self.entries
            .retain(|dir, _| !roots.iter().any(|root| dir.starts_with(root)));
    }
}

impl FromIterator<(PathBuf, i64)> for DirMTimeMap {
    fn from_iter<T: IntoIterator<Item = (PathBuf, i64)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for DirMTimeMap {
    type Item = (PathBuf, i64);
    type IntoIter = btree_map::IntoIter<PathBuf, i64>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, UNIX_EPOCH};

    fn map(entries: &[(&str, i64)]) -> DirMTimeMap {
        entries
            .iter()
            .map(|(dir, mtime)| (PathBuf::from(dir), *mtime))
            .collect()
    }

    #[test]
    fn test_mtime_secs() {
        let time = UNIX_EPOCH + Duration::from_millis(1_700_000_000_999);
        assert_eq!(mtime_secs(time), 1_700_000_000);
    }

    #[test]
    fn test_stale_dirs_is_key_difference() {
        let previous = map(&[("/music", 1), ("/music/old", 2), ("/music/rock", 3)]);
        let current = map(&[("/music", 5), ("/music/rock", 3), ("/music/new", 9)]);

        assert_eq!(previous.stale_dirs(&current), vec![PathBuf::from("/music/old")]);
        assert!(current.stale_dirs(&current).is_empty());
    }

    #[test]
    fn test_is_unchanged() {
        let previous = map(&[("/music", 10)]);
        assert!(previous.is_unchanged(Path::new("/music"), 10));
        assert!(!previous.is_unchanged(Path::new("/music"), 11));
        assert!(!previous.is_unchanged(Path::new("/other"), 10));
    }

    #[test]
    fn test_under_respects_components() {
        let all = map(&[("/music", 1), ("/music/a", 2), ("/musicals", 3)]);
        let under = all.under(Path::new("/music"));

        assert_eq!(under.len(), 2);
        assert!(!under.contains(Path::new("/musicals")));
    }

    #[test]
    fn test_remove_under() {
        let mut all = map(&[("/music", 1), ("/music/a", 2), ("/podcasts", 3)]);
        all.remove_under(&[PathBuf::from("/music")]);

        assert_eq!(all.len(), 1);
        assert!(all.contains(Path::new("/podcasts")));
    }

    #[test]
    fn test_child_mode() {
        assert_eq!(ScanMode::Recursive.for_child(false, true), ScanMode::Recursive);
        assert_eq!(ScanMode::NonRecursive.for_child(false, true), ScanMode::MTimeOnly);
        assert_eq!(ScanMode::NonRecursive.for_child(false, false), ScanMode::Recursive);
        assert_eq!(ScanMode::MTimeOnly.for_child(true, true), ScanMode::Recursive);
        assert_eq!(ScanMode::MTimeOnly.for_child(false, false), ScanMode::Recursive);
    }
}
