//! Incremental music library scanning for tunescan.
//!
//! # Overview
//!
//! `tunescan-scan` walks library roots, compares each directory's mtime
//! against the baseline saved by the previous scan, and only extracts
//! metadata from directories that changed. Key pieces:
//!
//! - **Walker** on a dedicated thread, streaming ordered events
//! - **Extractor** turning audio files into [`TrackRecord`]s via `lofty`
//! - **Coordinator** batching records, reconciling stale directories and
//!   saving the new baseline
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tunescan_scan::{ScanConfig, ScanCoordinator, SourceId};
//! use tunescan_store::MemoryStore;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ScanConfig::new(["/music"]);
//! let store = Arc::new(MemoryStore::new());
//! let scanner = ScanCoordinator::new(config, store, SourceId::local())?;
//!
//! let summary = scanner.scan().await?;
//! println!("Scanned {} tracks, skipped {}", summary.scanned, summary.skipped);
//! # Ok(())
//! # }
//! ```
//!
//! # Progress Monitoring
//!
//! ```rust,no_run
//! # use std::sync::Arc;
//! # use tunescan_scan::{ScanConfig, ScanCoordinator, ScanEvent, SourceId};
//! # use tunescan_store::MemoryStore;
//! # fn run(scanner: &ScanCoordinator<MemoryStore>) {
//! let mut events = scanner.subscribe();
//!
//! tokio::spawn(async move {
//!     while let Ok(event) = events.recv().await {
//!         if let ScanEvent::Progress(progress) = event {
//!             println!("Scanned {} tracks", progress.scanned);
//!         }
//!     }
//! });
//! # }
//! ```

mod batch;
mod coordinator;
mod extractor;
mod inode;
mod progress;
mod walker;

pub use batch::Batch;
pub use coordinator::ScanCoordinator;
pub use extractor::{LoftyTagReader, MetadataExtractor, RawTags, TagReadError, TagReader};
pub use inode::{DirIdentity, VisitedDirs};
pub use progress::{ScanEvent, ScanProgress};
pub use walker::{DirectoryWalker, WalkEvent, WalkStatus, WalkerHandle, ignore_matcher};

// Re-export core types for convenience
pub use tunescan_core::{
    DirMTimeMap, LibraryStore, ScanConfig, ScanError, ScanMode, ScanState, ScanSummary,
    SkipReason, SkippedFile, SourceId, StoreError, TrackRecord, WalkStats,
};
