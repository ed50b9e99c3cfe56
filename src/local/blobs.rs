// SPDX-License-Identifier: GPL-3.0-only
use anyhow::Context;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::debug;

use crate::local::traits::BlobStore;
use crate::utils::blob_path;

/// One file per blob under a base directory.
pub struct FileBlobStore {
    base_dir: PathBuf,
}

impl FileBlobStore {
    pub async fn new(base_dir: PathBuf) -> anyhow::Result<Self> {
        tokio::fs::create_dir_all(&base_dir)
            .await
            .with_context(|| format!("Failed to create blob directory {}", base_dir.display()))?;
        Ok(Self { base_dir })
    }
}

#[async_trait]
impl BlobStore for FileBlobStore {
    async fn read(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        let path = blob_path(&self.base_dir, key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
        }
    }

    async fn write(&self, key: &str, bytes: &[u8]) -> anyhow::Result<()> {
        let path = blob_path(&self.base_dir, key)?;
        // Write then rename so readers never see a partial file.
        let mut partial = path.clone().into_os_string();
        partial.push(".partial");
        let partial = PathBuf::from(partial);
        tokio::fs::write(&partial, bytes)
            .await
            .with_context(|| format!("Failed to write {}", partial.display()))?;
        tokio::fs::rename(&partial, &path)
            .await
            .with_context(|| format!("Failed to move blob into {}", path.display()))?;

        debug!(key, size = bytes.len(), "Stored blob");
        Ok(())
    }

    async fn remove(&self, key: &str) -> anyhow::Result<()> {
        let path = blob_path(&self.base_dir, key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to remove {}", path.display())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_read_remove() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileBlobStore::new(temp_dir.path().join("blobs")).await.unwrap();

        assert!(store.read("photo_u1").await.unwrap().is_none());
        store.write("photo_u1", &[1, 2, 3]).await.unwrap();
        assert_eq!(store.read("photo_u1").await.unwrap(), Some(vec![1, 2, 3]));

        store.remove("photo_u1").await.unwrap();
        store.remove("photo_u1").await.unwrap();
        assert!(store.read("photo_u1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_key_cannot_escape_base() {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path().join("blobs");
        let store = FileBlobStore::new(base.clone()).await.unwrap();

        store.write("a/../../escape", b"x").await.unwrap();
        assert!(!temp_dir.path().join("escape").exists());
        assert!(base.join("a_.._.._escape").exists());
    }
}
