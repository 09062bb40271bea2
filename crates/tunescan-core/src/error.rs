//! Error types for scanning and persistence.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::state::ScanState;

/// Errors that abort a scan.
///
/// Per-file and per-directory problems never surface here; they are
/// recorded as skips and walk statistics instead.
#[derive(Debug, Error)]
pub enum ScanError {
    /// A scan was requested while another one is in progress.
    #[error("A scan is already in progress ({state})")]
    AlreadyRunning { state: ScanState },

    /// Invalid configuration.
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// The persistence layer failed after all retries.
    #[error("Library store error: {0}")]
    Store(#[from] StoreError),

    /// The walker thread could not be started.
    #[error("Failed to spawn walker thread: {source}")]
    WalkerSpawn {
        #[source]
        source: std::io::Error,
    },

    /// The walker thread panicked.
    #[error("Walker thread panicked")]
    WalkerPanicked,

    /// The walker hung up before reporting its results.
    #[error("Walker stopped before finishing the walk")]
    WalkerDisconnected,

    /// The walker thread did not terminate in time and was detached.
    #[error("Walker thread did not terminate within {waited:?}")]
    ShutdownTimeout { waited: Duration },

    /// The scan was cancelled by the caller.
    #[error("Scan cancelled")]
    Cancelled,
}

/// Errors reported by a library store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Permission denied for the backing file.
    #[error("Permission denied: {path}")]
    PermissionDenied { path: PathBuf },

    /// Generic I/O error.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The backing data could not be decoded or encoded.
    #[error("Corrupt library data at {path}: {message}")]
    Corrupt { path: PathBuf, message: String },

    /// The store refused or dropped the command.
    #[error("Store unavailable: {message}")]
    Unavailable { message: String },
}

impl StoreError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            _ => Self::Io { path, source },
        }
    }

    /// Create an unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_io() {
        let err = StoreError::io(
            "/library.json",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(matches!(err, StoreError::PermissionDenied { .. }));

        let err = StoreError::io(
            "/library.json",
            std::io::Error::new(std::io::ErrorKind::Other, "disk on fire"),
        );
        assert!(matches!(err, StoreError::Io { .. }));
    }

    #[test]
    fn test_scan_error_from_store() {
        let err: ScanError = StoreError::unavailable("queue closed").into();
        assert!(matches!(err, ScanError::Store(_)));
        assert!(err.to_string().contains("queue closed"));
    }

    #[test]
    fn test_already_running_names_state() {
        let err = ScanError::AlreadyRunning {
            state: ScanState::Walking,
        };
        assert!(err.to_string().contains("walking"));
    }
}
