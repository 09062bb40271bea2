//! In-memory store with a command log and fault injection.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{Mutex, Notify};
use tracing::trace;

use tunescan_core::{DirMTimeMap, LibraryStore, SourceId, StoreError, TrackRecord};

use crate::library::Library;

/// A command received by a [`MemoryStore`], failed attempts included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    FetchDirMTimes(PathBuf),
    /// Urls of the batch, in order.
    AddFiles(Vec<String>),
    DeleteFiles(PathBuf),
    SaveDirMTimes(Vec<PathBuf>),
}

#[derive(Debug, Default)]
struct Faults {
    fetches: u32,
    adds: u32,
    deletes: u32,
    saves: u32,
}

#[derive(Debug, Default)]
struct Inner {
    library: Library,
    calls: Vec<StoreCall>,
    faults: Faults,
    fetch_gate: Option<Arc<Notify>>,
}

/// Library store kept entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the saved baseline.
    pub async fn seed_baseline(&self, mtimes: DirMTimeMap) {
        let mut inner = self.inner.lock().await;
        inner.library.clear_baseline();
        inner.library.replace_baseline(&[], &mtimes);
    }

    /// Insert tracks without logging a command.
    pub async fn seed_tracks(&self, tracks: &[TrackRecord], source: &SourceId) {
        self.inner.lock().await.library.upsert(tracks, source);
    }

    /// Fail the next `n` `fetch_dir_mtimes` commands.
    pub async fn fail_next_fetches(&self, n: u32) {
        self.inner.lock().await.faults.fetches = n;
    }

    /// Fail the next `n` `add_files` commands.
    pub async fn fail_next_adds(&self, n: u32) {
        self.inner.lock().await.faults.adds = n;
    }

    /// Fail the next `n` `delete_files` commands.
    pub async fn fail_next_deletes(&self, n: u32) {
        self.inner.lock().await.faults.deletes = n;
    }

    /// Fail the next `n` `save_dir_mtimes` commands.
    pub async fn fail_next_saves(&self, n: u32) {
        self.inner.lock().await.faults.saves = n;
    }

    /// Make each `fetch_dir_mtimes` wait for a permit from `gate`.
    pub async fn hold_fetches(&self, gate: Arc<Notify>) {
        self.inner.lock().await.fetch_gate = Some(gate);
    }

    /// Commands received so far.
    pub async fn calls(&self) -> Vec<StoreCall> {
        self.inner.lock().await.calls.clone()
    }

    pub async fn clear_calls(&self) {
        self.inner.lock().await.calls.clear();
    }

    /// Snapshot of the stored library.
    pub async fn library(&self) -> Library {
        self.inner.lock().await.library.clone()
    }
}

fn take_fault(remaining: &mut u32, command: &str) -> Result<(), StoreError> {
    if *remaining > 0 {
        *remaining -= 1;
        Err(StoreError::unavailable(format!("injected {command} failure")))
    } else {
        Ok(())
    }
}

impl LibraryStore for MemoryStore {
    async fn fetch_dir_mtimes(&self, root: &Path) -> Result<DirMTimeMap, StoreError> {
        let gate = {
            let mut inner = self.inner.lock().await;
            inner.calls.push(StoreCall::FetchDirMTimes(root.to_path_buf()));
            take_fault(&mut inner.faults.fetches, "fetch_dir_mtimes")?;
            inner.fetch_gate.clone()
        };

        if let Some(gate) = gate {
            gate.notified().await;
        }

        let mtimes = self.inner.lock().await.library.mtimes_under(root);
        trace!(root = %root.display(), dirs = mtimes.len(), "fetched mtimes");
        Ok(mtimes)
    }

    async fn add_files(&self, batch: &[TrackRecord], source: &SourceId) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        inner
            .calls
            .push(StoreCall::AddFiles(batch.iter().map(|r| r.url.clone()).collect()));
        take_fault(&mut inner.faults.adds, "add_files")?;
        inner.library.upsert(batch, source);
        Ok(())
    }

    async fn delete_files(&self, dir: &Path, source: &SourceId) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        inner.calls.push(StoreCall::DeleteFiles(dir.to_path_buf()));
        take_fault(&mut inner.faults.deletes, "delete_files")?;
        let removed = inner.library.remove_dir(dir, source);
        trace!(dir = %dir.display(), removed, "deleted tracks");
        Ok(())
    }

    async fn save_dir_mtimes(
        &self,
        roots: &[PathBuf],
        mtimes: &DirMTimeMap,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        inner.calls.push(StoreCall::SaveDirMTimes(roots.to_vec()));
        take_fault(&mut inner.faults.saves, "save_dir_mtimes")?;
        inner.library.replace_baseline(roots, mtimes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_logs_failed_attempts() {
        let store = MemoryStore::new();
        store.fail_next_deletes(1).await;

        let source = SourceId::local();
        assert!(store.delete_files(Path::new("/music"), &source).await.is_err());
        assert!(store.delete_files(Path::new("/music"), &source).await.is_ok());

        assert_eq!(
            store.calls().await,
            vec![
                StoreCall::DeleteFiles(PathBuf::from("/music")),
                StoreCall::DeleteFiles(PathBuf::from("/music")),
            ]
        );
    }

    #[tokio::test]
    async fn test_seed_baseline_is_fetchable() {
        let store = MemoryStore::new();
        let baseline: DirMTimeMap = [
            (PathBuf::from("/music"), 5),
            (PathBuf::from("/elsewhere"), 7),
        ]
        .into_iter()
        .collect();
        store.seed_baseline(baseline).await;

        let fetched = store.fetch_dir_mtimes(Path::new("/music")).await.unwrap();
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched.get(Path::new("/music")), Some(5));
    }

    #[tokio::test]
    async fn test_hold_fetches_waits_for_permit() {
        let store = Arc::new(MemoryStore::new());
        let gate = Arc::new(Notify::new());
        store.hold_fetches(Arc::clone(&gate)).await;

        let fetch = tokio::spawn({
            let store = Arc::clone(&store);
            async move { store.fetch_dir_mtimes(Path::new("/music")).await }
        });
        tokio::task::yield_now().await;
        assert!(!fetch.is_finished());

        gate.notify_one();
        assert!(fetch.await.unwrap().unwrap().is_empty());
    }
}
