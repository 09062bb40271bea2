//! Scan lifecycle states.

use serde::{Deserialize, Serialize};
use strum::{Display, IntoStaticStr};

/// Phase of the scan state machine.
///
/// A scan moves through the phases in declaration order and returns to
/// `Idle` when it completes, fails or is cancelled.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, IntoStaticStr,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum ScanState {
    /// No scan in progress.
    #[default]
    Idle,
    /// Fetching the previous mtime baseline from the store.
    #[strum(serialize = "loading-previous-mtimes")]
    #[serde(rename = "loading-previous-mtimes")]
    LoadingPreviousMTimes,
    /// The walker thread is running and file events are being processed.
    Walking,
    /// Flushing the last batch and reconciling stale directories.
    Finalizing,
    /// Saving the new mtime baseline.
    PersistingTail,
    /// Joining the walker thread.
    Shutdown,
}

impl ScanState {
    /// Check whether a scan is in progress.
    pub fn is_busy(&self) -> bool {
        !matches!(self, Self::Idle)
    }
}
