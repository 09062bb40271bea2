//! Library store interface consumed by the scanner.

use std::future::Future;
use std::path::{Path, PathBuf};

use crate::error::StoreError;
use crate::mtime::DirMTimeMap;
use crate::track::{SourceId, TrackRecord};

/// Persistence command queue for scan results.
///
/// Every command is asynchronous and completes with an acknowledgment.
/// Delivery is at-least-once: the scanner may replay a command after a
/// failed acknowledgment, so implementations must treat `add_files` as an
/// upsert keyed by url.
pub trait LibraryStore: Send + Sync + 'static {
    /// Fetch the saved mtimes for directories at or below `root`.
    fn fetch_dir_mtimes(
        &self,
        root: &Path,
    ) -> impl Future<Output = Result<DirMTimeMap, StoreError>> + Send;

    /// Insert or replace a batch of tracks for `source`.
    fn add_files(
        &self,
        batch: &[TrackRecord],
        source: &SourceId,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Delete the tracks of `source` that live directly in `dir`.
    fn delete_files(
        &self,
        dir: &Path,
        source: &SourceId,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Replace the baseline for everything at or below `roots` with `mtimes`.
    fn save_dir_mtimes(
        &self,
        roots: &[PathBuf],
        mtimes: &DirMTimeMap,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}
