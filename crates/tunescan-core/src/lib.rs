//! Core types and traits for tunescan.
//!
//! This crate provides the fundamental data structures shared by the
//! scanner and the persistence backends: directory mtime snapshots, track
//! records, scan configuration, and the library store interface.

mod config;
mod error;
mod mtime;
mod state;
mod store;
mod summary;
mod track;

pub use config::{RetryPolicy, ScanConfig, ScanConfigBuilder, default_extensions, mime_for_extension};
pub use error::{ScanError, StoreError};
pub use mtime::{DirMTimeMap, ScanMode, mtime_secs};
pub use state::ScanState;
pub use store::LibraryStore;
pub use summary::{ScanSummary, WalkStats};
pub use track::{SkipReason, SkippedFile, SourceId, TrackRecord};
