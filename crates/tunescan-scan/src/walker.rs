//! Incremental directory walker.
//!
//! The walker compares each directory's mtime with the previous snapshot
//! and only enumerates the files of directories that are new or changed.
//! Every visited directory is recorded in the new snapshot, unchanged ones
//! included, so that vanished directories can be detected afterwards.

use std::fs;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use globset::{Glob, GlobSet, GlobSetBuilder};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, trace, warn};

use tunescan_core::{DirMTimeMap, ScanError, ScanMode, WalkStats, mtime_secs};

use crate::inode::{DirIdentity, VisitedDirs};

/// Events emitted by the walker, in traversal order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalkEvent {
    /// A previously known directory changed; its old records are stale.
    ///
    /// Always emitted before the directory's files.
    Invalidate(PathBuf),
    /// A candidate file to extract.
    File(PathBuf),
    /// Terminal event carrying the new snapshot.
    Finished {
        mtimes: DirMTimeMap,
        stats: WalkStats,
    },
}

/// How a walk ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkStatus {
    /// All roots were walked and the snapshot was delivered.
    Completed,
    /// The walk was stopped or the receiver hung up.
    Stopped,
}

/// Walks root directories against a previous mtime snapshot.
#[derive(Debug)]
pub struct DirectoryWalker {
    roots: Vec<PathBuf>,
    previous: Arc<DirMTimeMap>,
    recursive: bool,
    include_hidden: bool,
    ignore: GlobSet,
    stop: Arc<AtomicBool>,
}

impl DirectoryWalker {
    /// Create a walker over `roots`.
    pub fn new(roots: Vec<PathBuf>, previous: Arc<DirMTimeMap>, recursive: bool) -> Self {
        Self {
            roots,
            previous,
            recursive,
            include_hidden: false,
            ignore: GlobSet::empty(),
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Exclude entries whose name matches `ignore`.
    pub fn with_ignore(mut self, ignore: GlobSet) -> Self {
        self.ignore = ignore;
        self
    }

    /// Include hidden entries.
    pub fn with_hidden(mut self, include_hidden: bool) -> Self {
        self.include_hidden = include_hidden;
        self
    }

    /// Flag that asks the walk to stop at the next directory or file.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Walk every root on the current thread, sending events to `tx`.
    pub fn walk(&self, tx: &UnboundedSender<WalkEvent>) -> WalkStatus {
        let root_mode = if self.recursive {
            ScanMode::Recursive
        } else {
            ScanMode::NonRecursive
        };

        let mut walk = Walk::new(self, tx);
        for root in &self.roots {
            let root = std::path::absolute(root).unwrap_or_else(|_| root.clone());
            if walk.visit(&root, 0, root_mode).is_break() {
                info!("directory walk stopped early");
                return WalkStatus::Stopped;
            }
        }

        let Walk { mtimes, stats, .. } = walk;
        debug!(
            dirs = stats.dirs_visited,
            rescanned = stats.dirs_rescanned,
            files = stats.files_emitted,
            "directory walk finished"
        );
        match tx.send(WalkEvent::Finished { mtimes, stats }) {
            Ok(()) => WalkStatus::Completed,
            Err(_) => WalkStatus::Stopped,
        }
    }

    /// Run the walk on a dedicated thread.
    pub fn spawn(self, tx: UnboundedSender<WalkEvent>) -> Result<WalkerHandle, ScanError> {
        let stop = self.stop_flag();
        let thread = thread::Builder::new()
            .name("tunescan-walker".to_string())
            .spawn(move || self.walk(&tx))
            .map_err(|source| ScanError::WalkerSpawn { source })?;

        Ok(WalkerHandle::new(thread, stop))
    }

    fn should_stop(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    fn skips(&self, name: &str) -> bool {
        (!self.include_hidden && name.starts_with('.')) || self.ignore.is_match(name)
    }
}

/// Handle to a walker running on its own thread.
#[derive(Debug)]
pub struct WalkerHandle {
    thread: JoinHandle<WalkStatus>,
    stop: Arc<AtomicBool>,
}

impl WalkerHandle {
    pub(crate) fn new(thread: JoinHandle<WalkStatus>, stop: Arc<AtomicBool>) -> Self {
        Self { thread, stop }
    }

    /// Ask the walker to stop cooperatively.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    /// Check whether the walker thread has exited.
    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Join the walker thread.
    ///
    /// Blocks until the thread exits; call once `is_finished` is true.
    pub fn join(self) -> Result<WalkStatus, ScanError> {
        self.thread.join().map_err(|_| ScanError::WalkerPanicked)
    }
}

/// Build the ignore matcher for a set of glob patterns.
pub fn ignore_matcher(patterns: &[String]) -> Result<GlobSet, ScanError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| ScanError::InvalidConfig {
            message: format!("invalid ignore pattern {pattern:?}: {e}"),
        })?;
        builder.add(glob);
    }
    builder.build().map_err(|e| ScanError::InvalidConfig {
        message: e.to_string(),
    })
}

/// State of one walk.
struct Walk<'a> {
    walker: &'a DirectoryWalker,
    tx: &'a UnboundedSender<WalkEvent>,
    mtimes: DirMTimeMap,
    stats: WalkStats,
    visited: VisitedDirs,
}

impl<'a> Walk<'a> {
    fn new(walker: &'a DirectoryWalker, tx: &'a UnboundedSender<WalkEvent>) -> Self {
        Self {
            walker,
            tx,
            mtimes: DirMTimeMap::new(),
            stats: WalkStats::new(),
            visited: VisitedDirs::new(),
        }
    }

    /// Visit `dir` and its subtree, depth-first, pre-order.
    ///
    /// `mode` is only reported in traces; whether a directory's files are
    /// enumerated depends on the mtime comparison alone, and every readable
    /// subdirectory is visited.
    fn visit(&mut self, dir: &Path, depth: u32, mode: ScanMode) -> ControlFlow<()> {
        if self.walker.should_stop() {
            return ControlFlow::Break(());
        }

        let metadata = match fs::metadata(dir) {
            Ok(metadata) if metadata.is_dir() => metadata,
            Ok(_) => {
                debug!(path = %dir.display(), "not a directory, skipping");
                return ControlFlow::Continue(());
            }
            Err(err) => {
                debug!(path = %dir.display(), error = %err, "directory not accessible");
                return ControlFlow::Continue(());
            }
        };

        if let Some(identity) = DirIdentity::of(&metadata) {
            if !self.visited.track(identity) {
                self.stats.cycles_skipped += 1;
                debug!(path = %dir.display(), "directory already visited, skipping");
                return ControlFlow::Continue(());
            }
        }

        let mtime = metadata.modified().map(mtime_secs).unwrap_or(0);
        let previously_known = self.walker.previous.contains(dir);
        let changed = !self.walker.previous.is_unchanged(dir, mtime);

        // Unlistable directories stay out of the snapshot.
        let Some((files, subdirs)) = self.list(dir, changed) else {
            return ControlFlow::Continue(());
        };
        self.mtimes.insert(dir, mtime);
        self.stats.record_dir(depth, changed);
        trace!(path = %dir.display(), ?mode, changed, "visiting directory");

        if changed {
            if previously_known {
                self.stats.dirs_invalidated += 1;
                if self.send(WalkEvent::Invalidate(dir.to_path_buf())).is_break() {
                    return ControlFlow::Break(());
                }
            }
            for file in files {
                if self.walker.should_stop() {
                    return ControlFlow::Break(());
                }
                self.stats.record_file();
                if self.send(WalkEvent::File(file)).is_break() {
                    return ControlFlow::Break(());
                }
            }
        }

        for subdir in subdirs {
            let child_mode = mode.for_child(changed, self.walker.previous.contains(&subdir));
            if self.visit(&subdir, depth + 1, child_mode).is_break() {
                return ControlFlow::Break(());
            }
        }

        ControlFlow::Continue(())
    }

    /// List the files and subdirectories of `dir`, each sorted by name.
    ///
    /// Files are only collected when `with_files` is set. Returns `None`
    /// when the directory cannot be read.
    fn list(&mut self, dir: &Path, with_files: bool) -> Option<(Vec<PathBuf>, Vec<PathBuf>)> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) => {
                self.stats.dirs_unreadable += 1;
                warn!(path = %dir.display(), error = %err, "cannot list directory, skipping");
                return None;
            }
        };

        let mut files = Vec::new();
        let mut subdirs = Vec::new();

        for entry in entries.flatten() {
            let name = entry.file_name();
            if self.walker.skips(&name.to_string_lossy()) {
                continue;
            }

            let path = entry.path();
            // Follows links; broken links are dropped here.
            let Ok(metadata) = fs::metadata(&path) else {
                continue;
            };

            if metadata.is_dir() {
                subdirs.push(path);
            } else if with_files && metadata.is_file() && fs::File::open(&path).is_ok() {
                files.push(path);
            }
        }

        files.sort();
        subdirs.sort();
        Some((files, subdirs))
    }

    fn send(&self, event: WalkEvent) -> ControlFlow<()> {
        match self.tx.send(event) {
            Ok(()) => ControlFlow::Continue(()),
            Err(_) => ControlFlow::Break(()),
        }
    }
}
