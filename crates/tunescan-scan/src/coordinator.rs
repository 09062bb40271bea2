//! Scan coordinator.
//!
//! The coordinator drives one scan at a time through
//! `Idle → LoadingPreviousMTimes → Walking → Finalizing → PersistingTail →
//! Shutdown → Idle`. It owns the walker thread and the in-flight batch, and
//! talks to the library store only through asynchronous commands.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use globset::GlobSet;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use tunescan_core::{
    DirMTimeMap, LibraryStore, ScanConfig, ScanError, ScanState, ScanSummary, SkipReason,
    SkippedFile, SourceId, StoreError, TrackRecord, WalkStats,
};

use crate::batch::Batch;
use crate::extractor::{LoftyTagReader, MetadataExtractor, TagReader};
use crate::progress::{ProgressSampler, ScanEvent, ScanProgress};
use crate::walker::{DirectoryWalker, WalkEvent, WalkStatus, WalkerHandle, ignore_matcher};

/// Runs incremental scans against a library store.
#[derive(Debug)]
pub struct ScanCoordinator<S, R = LoftyTagReader> {
    config: ScanConfig,
    store: Arc<S>,
    source: SourceId,
    extractor: MetadataExtractor<R>,
    ignore: GlobSet,
    events_tx: broadcast::Sender<ScanEvent>,
    state_tx: watch::Sender<ScanState>,
}

impl<S: LibraryStore> ScanCoordinator<S> {
    /// Create a coordinator that reads tags with `lofty`.
    pub fn new(config: ScanConfig, store: Arc<S>, source: SourceId) -> Result<Self, ScanError> {
        let extractor = MetadataExtractor::new(&config);
        Self::with_extractor(config, store, source, extractor)
    }
}

impl<S: LibraryStore, R: TagReader> ScanCoordinator<S, R> {
    /// Create a coordinator with a custom tag reader.
    pub fn with_reader(
        config: ScanConfig,
        store: Arc<S>,
        source: SourceId,
        reader: R,
    ) -> Result<Self, ScanError> {
        let extractor = MetadataExtractor::with_reader(&config, reader);
        Self::with_extractor(config, store, source, extractor)
    }

    fn with_extractor(
        config: ScanConfig,
        store: Arc<S>,
        source: SourceId,
        extractor: MetadataExtractor<R>,
    ) -> Result<Self, ScanError> {
        if config.roots.is_empty() {
            return Err(ScanError::InvalidConfig {
                message: "at least one root directory is required".to_string(),
            });
        }
        let ignore = ignore_matcher(&config.ignore_patterns)?;
        let (events_tx, _) = broadcast::channel(config.event_capacity.max(1));
        let (state_tx, _) = watch::channel(ScanState::Idle);

        Ok(Self {
            config,
            store,
            source,
            extractor,
            ignore,
            events_tx,
            state_tx,
        })
    }

    /// Subscribe to progress, watch-set and completion events.
    ///
    /// Subscribers that fall more than `event_capacity` events behind miss
    /// the oldest ones.
    pub fn subscribe(&self) -> broadcast::Receiver<ScanEvent> {
        self.events_tx.subscribe()
    }

    /// Observe state machine transitions.
    pub fn watch_state(&self) -> watch::Receiver<ScanState> {
        self.state_tx.subscribe()
    }

    /// Current state.
    pub fn state(&self) -> ScanState {
        *self.state_tx.borrow()
    }

    /// Configuration used for every scan.
    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Run one scan to completion.
    pub async fn scan(&self) -> Result<ScanSummary, ScanError> {
        self.scan_until_cancelled(CancellationToken::new()).await
    }

    /// Run one scan, aborting cleanly if `cancel` fires.
    ///
    /// A cancelled scan discards its unflushed batch and never saves a new
    /// mtime baseline, so the next scan revisits everything it missed.
    pub async fn scan_until_cancelled(
        &self,
        cancel: CancellationToken,
    ) -> Result<ScanSummary, ScanError> {
        let _state = self.begin()?;
        let roots = absolute_roots(&self.config.roots);
        let mut run = ScanRun::new(&self.config, roots.clone());

        info!(roots = ?roots, "loading mtimes");
        let previous = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ScanError::Cancelled),
            result = self.load_previous_mtimes(&roots) => result?,
        };
        info!(saved = previous.len(), "scanning with saved mtimes from last scan");
        let previous = Arc::new(previous);

        self.set_state(ScanState::Walking);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let walker = DirectoryWalker::new(roots.clone(), Arc::clone(&previous), self.config.recursive)
            .with_ignore(self.ignore.clone())
            .with_hidden(self.config.include_hidden);
        let handle = walker.spawn(tx)?;

        let (mtimes, stats) = match self.process_events(&mut rx, &mut run, &cancel).await {
            WalkOutcome::Finished { mtimes, stats } => (mtimes, stats),
            WalkOutcome::Cancelled => {
                let dropped = run.batch.discard();
                warn!(dropped, "scan cancelled, discarding partial batch");
                drop(rx);
                self.set_state(ScanState::Shutdown);
                self.shutdown(handle).await?;
                return Err(ScanError::Cancelled);
            }
            WalkOutcome::Disconnected => {
                drop(rx);
                self.set_state(ScanState::Shutdown);
                self.shutdown(handle).await?;
                return Err(ScanError::WalkerDisconnected);
            }
        };

        self.set_state(ScanState::Finalizing);
        run.summary.walk = stats;
        self.finalize(&previous, &mtimes, &mut run).await;

        self.set_state(ScanState::PersistingTail);
        self.persist_baseline(&roots, &mtimes, &mut run).await;

        self.set_state(ScanState::Shutdown);
        drop(rx);
        self.shutdown(handle).await?;

        let mut summary = run.summary;
        summary.duration = run.started.elapsed();
        info!(
            scanned = summary.scanned,
            skipped = summary.skipped,
            duration = ?summary.duration,
            "scan finished"
        );
        let _ = self.events_tx.send(ScanEvent::Finished(summary.clone()));
        Ok(summary)
    }

    /// Claim the state machine, rejecting the scan if one is in progress.
    fn begin(&self) -> Result<StateGuard<'_>, ScanError> {
        let mut busy = None;
        self.state_tx.send_if_modified(|state| {
            if state.is_busy() {
                busy = Some(*state);
                false
            } else {
                *state = ScanState::LoadingPreviousMTimes;
                true
            }
        });

        match busy {
            Some(state) => Err(ScanError::AlreadyRunning { state }),
            None => Ok(StateGuard {
                state_tx: &self.state_tx,
            }),
        }
    }

    fn set_state(&self, state: ScanState) {
        debug!(%state, "scan state");
        self.state_tx.send_replace(state);
    }

    async fn load_previous_mtimes(&self, roots: &[PathBuf]) -> Result<DirMTimeMap, ScanError> {
        let mut previous = DirMTimeMap::new();
        for root in roots {
            let mtimes = self
                .submit("fetch_dir_mtimes", || self.store.fetch_dir_mtimes(root))
                .await?;
            previous.merge(mtimes);
        }
        Ok(previous)
    }

    /// Consume walker events in emission order until the walk ends.
    async fn process_events(
        &self,
        rx: &mut mpsc::UnboundedReceiver<WalkEvent>,
        run: &mut ScanRun,
        cancel: &CancellationToken,
    ) -> WalkOutcome {
        loop {
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => return WalkOutcome::Cancelled,
                event = rx.recv() => event,
            };

            match event {
                Some(WalkEvent::Invalidate(dir)) => self.invalidate_dir(&dir, run).await,
                Some(WalkEvent::File(path)) => self.scan_file(&path, run).await,
                Some(WalkEvent::Finished { mtimes, stats }) => {
                    return WalkOutcome::Finished { mtimes, stats };
                }
                None => return WalkOutcome::Disconnected,
            }
        }
    }

    /// Delete the old records of a changed directory before its files are batched.
    async fn invalidate_dir(&self, dir: &Path, run: &mut ScanRun) {
        debug!(path = %dir.display(), "directory changed, deleting its records");
        if self
            .submit("delete_files", || self.store.delete_files(dir, &self.source))
            .await
            .is_err()
        {
            run.summary.failed_submissions += 1;
        }
    }

    async fn scan_file(&self, path: &Path, run: &mut ScanRun) {
        let record = match self.extractor.extract(path) {
            Ok(record) => record,
            Err(reason) => {
                run.summary.skipped += 1;
                if reason != SkipReason::UnsupportedExtension {
                    run.summary.skipped_files.push(SkippedFile::new(path, reason));
                }
                return;
            }
        };

        run.summary.scanned += 1;
        run.summary.bytes_scanned += record.size;

        let scanned = run.summary.scanned;
        if scanned % 100 == 0 {
            debug!(scanned, path = %path.display(), "scan progress");
        }
        if run.sampler.should_report(scanned) {
            let _ = self.events_tx.send(ScanEvent::Progress(run.progress(path)));
        }

        if let Some(batch) = run.batch.push(record) {
            debug!(size = batch.len(), "batch ready");
            self.commit(batch, run).await;
        }
    }

    async fn commit(&self, batch: Vec<TrackRecord>, run: &mut ScanRun) {
        match self
            .submit("add_files", || self.store.add_files(&batch, &self.source))
            .await
        {
            Ok(()) => {
                run.summary.batches_committed += 1;
                run.summary.records_committed += batch.len() as u64;
            }
            Err(_) => run.summary.failed_submissions += 1,
        }
    }

    /// Flush the tail batch and reconcile directories that vanished.
    async fn finalize(&self, previous: &DirMTimeMap, mtimes: &DirMTimeMap, run: &mut ScanRun) {
        if let Some(batch) = run.batch.take() {
            self.commit(batch, run).await;
        }

        let stale = previous.stale_dirs(mtimes);
        for dir in &stale {
            info!(path = %dir.display(), "removing stale directory");
            if self
                .submit("delete_files", || self.store.delete_files(dir, &self.source))
                .await
                .is_err()
            {
                run.summary.failed_submissions += 1;
            }
            let _ = self.events_tx.send(ScanEvent::RemoveWatchedDir(dir.clone()));
        }
        run.summary.stale_dirs = stale;

        let watched: Vec<PathBuf> = mtimes.keys().cloned().collect();
        run.summary.watched_dirs = watched.len();
        let _ = self.events_tx.send(ScanEvent::AddWatchedDirs(watched));

        info!(
            scanned = run.summary.scanned,
            skipped = run.summary.skipped,
            "scanning complete, saving to library"
        );
        if !run.summary.skipped_files.is_empty() {
            debug!("skipped the following files (no tags / no valid audio):");
            for skipped in &run.summary.skipped_files {
                debug!(path = %skipped.path.display(), reason = %skipped.reason);
            }
        }
    }

    /// Save the new baseline, unless some records never reached the store.
    async fn persist_baseline(&self, roots: &[PathBuf], mtimes: &DirMTimeMap, run: &mut ScanRun) {
        if run.summary.failed_submissions > 0 {
            warn!(
                failed = run.summary.failed_submissions,
                "keeping the previous mtime baseline, some commands were not persisted"
            );
            return;
        }

        match self
            .submit("save_dir_mtimes", || self.store.save_dir_mtimes(roots, mtimes))
            .await
        {
            Ok(()) => run.summary.baseline_saved = true,
            Err(_) => warn!("mtime baseline not saved, the next scan repeats this work"),
        }
    }

    /// Issue a store command, retrying per the configured policy.
    async fn submit<T, F, Fut>(&self, command: &'static str, mut op: F) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let policy = self.config.retry;
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if attempt < policy.max_attempts => {
                    let delay = policy.delay_after(attempt);
                    warn!(command, attempt, error = %err, ?delay, "store command failed, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    error!(command, attempts = attempt, error = %err, "store command failed");
                    return Err(err);
                }
            }
        }
    }

    /// Stop the walker and wait, with a bound, for its thread to exit.
    async fn shutdown(&self, handle: WalkerHandle) -> Result<WalkStatus, ScanError> {
        handle.request_stop();

        let poll = self.config.shutdown_poll_interval();
        let timeout = self.config.shutdown_timeout();
        let started = Instant::now();
        while !handle.is_finished() {
            let waited = started.elapsed();
            if waited >= timeout {
                error!(?waited, "walker thread did not terminate, detaching it");
                return Err(ScanError::ShutdownTimeout { waited });
            }
            debug!("waiting for walker thread to terminate");
            tokio::time::sleep(poll).await;
        }

        let status = handle.join()?;
        debug!(?status, "walker thread terminated");
        Ok(status)
    }
}

/// Per-scan mutable state, owned by the coordinator's task.
struct ScanRun {
    summary: ScanSummary,
    batch: Batch,
    sampler: ProgressSampler,
    started: Instant,
}

impl ScanRun {
    fn new(config: &ScanConfig, roots: Vec<PathBuf>) -> Self {
        Self {
            summary: ScanSummary::new(roots),
            batch: Batch::new(config.batch_size),
            sampler: ProgressSampler::new(config.progress_interval),
            started: Instant::now(),
        }
    }

    fn progress(&self, path: &Path) -> ScanProgress {
        ScanProgress {
            scanned: self.summary.scanned,
            skipped: self.summary.skipped,
            batches_committed: self.summary.batches_committed,
            current_path: path.to_path_buf(),
            elapsed: self.started.elapsed(),
        }
    }
}

enum WalkOutcome {
    Finished { mtimes: DirMTimeMap, stats: WalkStats },
    Cancelled,
    Disconnected,
}

/// Returns the state machine to `Idle` however the scan ends.
struct StateGuard<'a> {
    state_tx: &'a watch::Sender<ScanState>,
}

impl Drop for StateGuard<'_> {
    fn drop(&mut self) {
        self.state_tx.send_replace(ScanState::Idle);
    }
}

fn absolute_roots(roots: &[PathBuf]) -> Vec<PathBuf> {
    roots
        .iter()
        .map(|root| std::path::absolute(root).unwrap_or_else(|_| root.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use tunescan_store::MemoryStore;

    use super::*;

    fn coordinator() -> ScanCoordinator<MemoryStore> {
        let mut config = ScanConfig::new(["/music"]);
        config.shutdown_timeout_ms = 50;
        config.shutdown_poll_ms = 5;
        ScanCoordinator::new(config, Arc::new(MemoryStore::new()), SourceId::local()).unwrap()
    }

    #[tokio::test]
    async fn test_shutdown_detaches_stuck_walker() {
        let stop = Arc::new(AtomicBool::new(false));
        let thread = std::thread::spawn(|| {
            std::thread::sleep(Duration::from_millis(500));
            WalkStatus::Completed
        });

        let result = coordinator()
            .shutdown(WalkerHandle::new(thread, stop.clone()))
            .await;

        match result {
            Err(ScanError::ShutdownTimeout { waited }) => {
                assert!(waited >= Duration::from_millis(50));
            }
            other => panic!("expected a shutdown timeout, got {other:?}"),
        }
        assert!(stop.load(Ordering::Acquire));
    }

    #[tokio::test]
    async fn test_shutdown_joins_walker_that_honours_stop() {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = stop.clone();
        let thread = std::thread::spawn(move || {
            while !flag.load(Ordering::Acquire) {
                std::thread::sleep(Duration::from_millis(1));
            }
            WalkStatus::Stopped
        });

        let status = coordinator()
            .shutdown(WalkerHandle::new(thread, stop))
            .await
            .unwrap();

        assert_eq!(status, WalkStatus::Stopped);
    }
}
