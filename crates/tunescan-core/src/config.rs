//! Scan configuration types.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

/// Configuration for scanning operations.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct ScanConfig {
    /// Root directories to scan.
    pub roots: Vec<PathBuf>,

    /// Treat every directory below the roots as recursive.
    #[builder(default = "false")]
    #[serde(default)]
    pub recursive: bool,

    /// Records per committed batch (0 = one batch at the end of the scan).
    #[builder(default = "0")]
    #[serde(default)]
    pub batch_size: usize,

    /// Supported file extensions, lowercase, without the leading dot.
    #[builder(default = "default_extensions()")]
    #[serde(default = "default_extensions")]
    pub extensions: BTreeSet<String>,

    /// Glob patterns matched against entry names to exclude.
    #[builder(default)]
    #[serde(default)]
    pub ignore_patterns: Vec<String>,

    /// Include hidden files and directories (starting with .).
    #[builder(default = "false")]
    #[serde(default)]
    pub include_hidden: bool,

    /// Compute content hashes for extracted tracks.
    #[builder(default = "false")]
    #[serde(default)]
    pub compute_hashes: bool,

    /// Minimum file size to hash (skip tiny files).
    #[builder(default = "4096")]
    #[serde(default = "default_min_hash_size")]
    pub min_hash_size: u64,

    /// Emit a progress event every N scanned tracks.
    #[builder(default = "3")]
    #[serde(default = "default_progress_interval")]
    pub progress_interval: u64,

    /// Sleep between walker termination checks, in milliseconds.
    #[builder(default = "100")]
    #[serde(default = "default_shutdown_poll_ms")]
    pub shutdown_poll_ms: u64,

    /// Give up waiting for the walker thread after this many milliseconds.
    #[builder(default = "10_000")]
    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,

    /// Retry policy for store submissions.
    #[builder(default)]
    #[serde(default)]
    pub retry: RetryPolicy,

    /// Capacity of the scan event broadcast channel.
    #[builder(default = "1024")]
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

/// Bounded retry for store submissions.
///
/// Store writes are idempotent upserts keyed by url, so replaying a
/// submission after a failed acknowledgment is safe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts per submission, including the first one.
    pub max_attempts: u32,
    /// Delay before the first retry, doubled for each subsequent retry.
    pub backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_ms: 200,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            backoff_ms: 0,
        }
    }

    /// Delay to wait after `attempt` (1-based) failed.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(16);
        Duration::from_millis(self.backoff_ms.saturating_mul(factor))
    }
}

/// The extensions scanned by default.
///
/// `mp3` is always present; `ogg` and `flac` depend on the crate features
/// of the same name.
pub fn default_extensions() -> BTreeSet<String> {
    #[allow(unused_mut)]
    let mut extensions = BTreeSet::from(["mp3".to_string()]);
    #[cfg(feature = "ogg")]
    extensions.insert("ogg".to_string());
    #[cfg(feature = "flac")]
    extensions.insert("flac".to_string());
    extensions
}

/// MIME type for a supported audio extension.
pub fn mime_for_extension(extension: &str) -> Option<&'static str> {
    match extension.to_ascii_lowercase().as_str() {
        "mp3" => Some("audio/mpeg"),
        "ogg" | "oga" => Some("application/ogg"),
        "flac" => Some("audio/flac"),
        "m4a" | "mp4" | "aac" => Some("audio/mp4"),
        "opus" => Some("audio/opus"),
        "wav" => Some("audio/wav"),
        "aiff" | "aif" => Some("audio/aiff"),
        "wv" => Some("audio/wavpack"),
        "mpc" => Some("audio/x-musepack"),
        _ => None,
    }
}

fn default_min_hash_size() -> u64 {
    4096
}

fn default_progress_interval() -> u64 {
    3
}

fn default_shutdown_poll_ms() -> u64 {
    100
}

fn default_shutdown_timeout_ms() -> u64 {
    10_000
}

fn default_event_capacity() -> usize {
    1024
}

impl ScanConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        match self.roots {
            Some(ref roots) if roots.is_empty() => {
                return Err("At least one root directory is required".to_string());
            }
            Some(ref roots) if roots.iter().any(|r| r.as_os_str().is_empty()) => {
                return Err("Root path cannot be empty".to_string());
            }
            Some(_) => {}
            None => return Err("Root directories are required".to_string()),
        }

        if let Some(ref extensions) = self.extensions {
            if extensions.is_empty() {
                return Err("At least one supported extension is required".to_string());
            }
            if let Some(unknown) = extensions.iter().find(|e| mime_for_extension(e).is_none()) {
                return Err(format!("No MIME type known for extension: {unknown}"));
            }
        }

        if self.progress_interval == Some(0) {
            return Err("Progress interval must be at least 1".to_string());
        }
        if self.event_capacity == Some(0) {
            return Err("Event capacity must be at least 1".to_string());
        }
        if matches!(self.retry, Some(RetryPolicy { max_attempts: 0, .. })) {
            return Err("Retry policy needs at least one attempt".to_string());
        }
        Ok(())
    }
}

impl ScanConfig {
    /// Create a new scan config builder.
    pub fn builder() -> ScanConfigBuilder {
        ScanConfigBuilder::default()
    }

    /// Create a simple config for scanning a set of roots.
    pub fn new<I, P>(roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            roots: roots.into_iter().map(Into::into).collect(),
            recursive: false,
            batch_size: 0,
            extensions: default_extensions(),
            ignore_patterns: Vec::new(),
            include_hidden: false,
            compute_hashes: false,
            min_hash_size: default_min_hash_size(),
            progress_interval: default_progress_interval(),
            shutdown_poll_ms: default_shutdown_poll_ms(),
            shutdown_timeout_ms: default_shutdown_timeout_ms(),
            retry: RetryPolicy::default(),
            event_capacity: default_event_capacity(),
        }
    }

    /// Interval between walker termination checks.
    pub fn shutdown_poll_interval(&self) -> Duration {
        Duration::from_millis(self.shutdown_poll_ms.max(1))
    }

    /// Maximum time to wait for the walker thread to terminate.
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}
