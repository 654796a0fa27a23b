//! File-backed store implementation
//!
//! Each key lives in its own file under the storage directory. Writes go to
//! a temporary file that is then renamed over the target, so a reader sees
//! either the old value or the new one, never a torn write.

use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use agora_core::{PersistentStore, StorageError};
use async_trait::async_trait;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, trace};

/// Extension of committed value files
const VALUE_EXT: &str = "val";

/// Persistent implementation of [`PersistentStore`]
#[derive(Debug, Clone)]
pub struct FileStore {
    /// Path to the storage directory
    storage_path: PathBuf,
    /// Whether to fsync before renaming (durability vs performance)
    sync_writes: bool,
}

impl FileStore {
    /// Open (creating if needed) a store rooted at `storage_path`
    pub async fn open(storage_path: impl AsRef<Path>) -> Result<Self, StorageError> {
        Self::with_options(storage_path, true).await
    }

    /// Open with explicit durability settings
    pub async fn with_options(
        storage_path: impl AsRef<Path>,
        sync_writes: bool,
    ) -> Result<Self, StorageError> {
        let storage_path = storage_path.as_ref().to_path_buf();
        fs::create_dir_all(&storage_path).await?;
        info!(path = ?storage_path, "Opened file store");

        let store = Self {
            storage_path,
            sync_writes,
        };
        store.remove_stale_temp_files().await?;
        Ok(store)
    }

    /// Directory holding the value files
    pub fn path(&self) -> &Path {
        &self.storage_path
    }

    /// File path for a key; the key is hex-encoded so any string is a safe name
    fn value_path(&self, key: &str) -> PathBuf {
        self.storage_path
            .join(format!("{}.{}", hex::encode(key.as_bytes()), VALUE_EXT))
    }

    async fn write_temp(&self, temp: &Path, bytes: &[u8]) -> io::Result<()> {
        let mut file = File::create(temp).await?;
        file.write_all(bytes).await?;
        if self.sync_writes {
            file.sync_all().await?;
        }
        Ok(())
    }

    /// Temp files left behind by a crash mid-write are never valid values
    async fn remove_stale_temp_files(&self) -> Result<(), StorageError> {
        let mut entries = fs::read_dir(&self.storage_path).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "tmp") {
                debug!(path = ?path, "Removing stale temp file");
                fs::remove_file(&path).await?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl PersistentStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.value_path(key)).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StorageError> {
        let target = self.value_path(key);
        let temp = target.with_extension(format!("{}.tmp", uuid::Uuid::new_v4().simple()));

        trace!(key, len = value.len(), "Writing value");
        let result = match self.write_temp(&temp, value.as_bytes()).await {
            Ok(()) => fs::rename(&temp, &target).await,
            Err(e) => Err(e),
        };

        if let Err(e) = result {
            if let Err(cleanup) = fs::remove_file(&temp).await {
                debug!(path = ?temp, error = %cleanup, "Temp file left for next open");
            }
            return Err(e.into());
        }
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.value_path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
