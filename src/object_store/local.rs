use async_trait::async_trait;
use bytes::Bytes;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

use super::{validate_key, ObjectStore, ObjectStoreError};

/// Local filesystem blob store. One file per key, flat under `base_path`.
///
/// Writes land in a hidden `.part` file first and are renamed into place, so
/// a reader never observes a half-written blob.
pub struct LocalStore {
    base_path: PathBuf,
}

impl LocalStore {
    const STAGING_SUFFIX: &'static str = ".part";

    /// Open the store, creating `base_path` if needed. Staging files left by
    /// a write that never finished are removed.
    pub fn new<P: AsRef<Path>>(base_path: P) -> Result<Self, std::io::Error> {
        let base_path = base_path.as_ref().to_path_buf();
        std::fs::create_dir_all(&base_path)?;
        let store = Self { base_path };
        store.remove_stale_staging()?;
        Ok(store)
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn remove_stale_staging(&self) -> Result<(), std::io::Error> {
        for entry in std::fs::read_dir(&self.base_path)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if name.starts_with('.') && name.ends_with(Self::STAGING_SUFFIX) {
                tracing::warn!(file = %name, "Removing stale blob staging file");
                std::fs::remove_file(entry.path())?;
            }
        }
        Ok(())
    }

    // Key-independent so a key near the file name limit still stages
    fn staging_path(&self) -> PathBuf {
        self.base_path
            .join(format!(".{}{}", uuid::Uuid::new_v4(), Self::STAGING_SUFFIX))
    }

    fn object_path(&self, key: &str) -> Result<PathBuf, ObjectStoreError> {
        validate_key(key)?;
        Ok(self.base_path.join(key))
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    async fn put(&self, key: &str, data: Bytes) -> Result<(), ObjectStoreError> {
        let path = self.object_path(key)?;
        let staging = self.staging_path();

        let written = async {
            let mut file = tokio::fs::File::create(&staging).await?;
            file.write_all(&data).await?;
            file.sync_all().await?;
            tokio::fs::rename(&staging, &path).await
        }
        .await;

        if let Err(e) = written {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes, ObjectStoreError> {
        let path = self.object_path(key)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(ObjectStoreError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError> {
        let path = self.object_path(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(ObjectStoreError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool, ObjectStoreError> {
        let path = self.object_path(key)?;
        Ok(tokio::fs::try_exists(&path).await?)
    }

    async fn list_keys(&self) -> Result<Vec<String>, ObjectStoreError> {
        let mut keys = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.base_path).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            // Staging files and anything else hidden are not blobs
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if name.starts_with('.') {
                continue;
            }
            keys.push(name);
        }
        Ok(keys)
    }
}
