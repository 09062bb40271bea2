//! Library store persisted as a JSON file.

use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info};

use tunescan_core::{DirMTimeMap, LibraryStore, SourceId, StoreError, TrackRecord};

use crate::library::{Library, LibraryStats};

/// Library store backed by a single JSON document.
///
/// Every acknowledged command has been written to disk. Writes go to a
/// sibling temporary file which is then renamed over the library, so a
/// crash never leaves a half-written document behind. The document is
/// rewritten in full on every command.
#[derive(Debug)]
pub struct JsonLibraryStore {
    path: PathBuf,
    library: Mutex<Library>,
}

impl JsonLibraryStore {
    /// Open the library at `path`, starting empty if it does not exist.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let library = match fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| StoreError::Corrupt {
                path: path.clone(),
                message: e.to_string(),
            })?,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(path = %path.display(), "creating new library");
                Library::new()
            }
            Err(err) => return Err(StoreError::io(&path, err)),
        };

        Ok(Self {
            path,
            library: Mutex::new(library),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn stats(&self) -> LibraryStats {
        self.library.lock().await.stats()
    }

    /// Forget the mtime baseline so the next scan rereads every directory.
    pub async fn clear_baseline(&self) -> Result<(), StoreError> {
        self.update(Library::clear_baseline).await
    }

    /// Apply `change` and persist it; memory is only updated once the write lands.
    ///
    /// Each command clones the whole library and rewrites the whole document,
    /// so a scan costs one full serialization per committed batch. Raise
    /// `batch_size` for large libraries.
    async fn update(&self, change: impl FnOnce(&mut Library)) -> Result<(), StoreError> {
        let mut library = self.library.lock().await;
        let mut next = library.clone();
        change(&mut next);
        self.persist(&next).await?;
        *library = next;
        Ok(())
    }

    async fn persist(&self, library: &Library) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(library).map_err(|e| StoreError::Corrupt {
            path: self.path.clone(),
            message: e.to_string(),
        })?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .await
                    .map_err(|e| StoreError::io(parent, e))?;
            }
        }

        let temp = temp_path(&self.path);
        fs::write(&temp, &bytes)
            .await
            .map_err(|e| StoreError::io(&temp, e))?;
        fs::rename(&temp, &self.path)
            .await
            .map_err(|e| StoreError::io(&self.path, e))?;

        debug!(path = %self.path.display(), bytes = bytes.len(), "library saved");
        Ok(())
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| OsString::from("library"));
    name.push(".tmp");
    path.with_file_name(name)
}

impl LibraryStore for JsonLibraryStore {
    async fn fetch_dir_mtimes(&self, root: &Path) -> Result<DirMTimeMap, StoreError> {
        Ok(self.library.lock().await.mtimes_under(root))
    }

    async fn add_files(&self, batch: &[TrackRecord], source: &SourceId) -> Result<(), StoreError> {
        self.update(|library| library.upsert(batch, source)).await
    }

    async fn delete_files(&self, dir: &Path, source: &SourceId) -> Result<(), StoreError> {
        self.update(|library| {
            library.remove_dir(dir, source);
        })
        .await
    }

    async fn save_dir_mtimes(
        &self,
        roots: &[PathBuf],
        mtimes: &DirMTimeMap,
    ) -> Result<(), StoreError> {
        self.update(|library| library.replace_baseline(roots, mtimes))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_temp_path_is_sibling() {
        assert_eq!(
            temp_path(Path::new("/data/library.json")),
            PathBuf::from("/data/library.json.tmp")
        );
    }

    #[tokio::test]
    async fn test_open_missing_starts_empty() {
        let temp = TempDir::new().unwrap();
        let store = JsonLibraryStore::open(temp.path().join("library.json"))
            .await
            .unwrap();

        assert_eq!(store.stats().await, LibraryStats::default());
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn test_open_corrupt_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("library.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = JsonLibraryStore::open(&path).await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }
}
