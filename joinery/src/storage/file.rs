use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use super::{validate_key, BlobStore};
use crate::error::{JoineryError, Result};

/// Blob store keeping each blob in a file under a root directory.
///
/// Writes go to a uniquely named temporary sibling file that is then renamed
/// into place, so a reader never sees a partially written blob and
/// concurrent writers of one key never share a staging file.
#[derive(Debug, Clone)]
pub struct FileBlobStore {
    root: PathBuf,
}

impl FileBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        validate_key(self.backend(), key)?;
        Ok(self.root.join(key))
    }

    fn io_error(&self, action: &str, path: &Path, err: std::io::Error) -> JoineryError {
        JoineryError::storage_with_source(
            self.backend(),
            format!("failed to {action} {}", path.display()),
            err,
        )
    }
}

#[async_trait]
impl BlobStore for FileBlobStore {
    fn backend(&self) -> &'static str {
        "filesystem"
    }

    async fn load_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(self.io_error("read", &path, e)),
        }
    }

    async fn store_bytes(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error("create directory", parent, e))?;
        }

        let mut staging = path.clone().into_os_string();
        staging.push(format!(".{}.tmp", Uuid::new_v4().simple()));
        let staging = PathBuf::from(staging);

        if let Err(e) = tokio::fs::write(&staging, &bytes).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(self.io_error("write", &staging, e));
        }
        tokio::fs::rename(&staging, &path)
            .await
            .map_err(|e| self.io_error("rename", &path, e))?;

        debug!(key, bytes = bytes.len(), "Stored blob");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_error("delete", &path, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_file_store_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = FileBlobStore::new(dir.path());

        assert_eq!(store.load_bytes("datasets/x.arrow").await.unwrap(), None);
        store
            .store_bytes("datasets/x.arrow", b"payload".to_vec())
            .await
            .unwrap();
        assert!(dir.path().join("datasets/x.arrow").exists());
        let leftovers = std::fs::read_dir(dir.path().join("datasets")).unwrap().count();
        assert_eq!(leftovers, 1);
        assert_eq!(
            store.load_bytes("datasets/x.arrow").await.unwrap().as_deref(),
            Some(&b"payload"[..])
        );

        store.delete("datasets/x.arrow").await.unwrap();
        store.delete("datasets/x.arrow").await.unwrap();
        assert_eq!(store.load_bytes("datasets/x.arrow").await.unwrap(), None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writes_to_one_key() {
        let dir = TempDir::new().unwrap();
        let store = std::sync::Arc::new(FileBlobStore::new(dir.path()));

        let writers: Vec<_> = (0u8..16)
            .map(|i| {
                let store = std::sync::Arc::clone(&store);
                tokio::spawn(async move {
                    store
                        .store_bytes("datasets/shared.arrow", vec![i; 64 * 1024])
                        .await
                })
            })
            .collect();
        for writer in writers {
            writer.await.unwrap().unwrap();
        }

        // one writer's payload wins whole
        let bytes = store.load_bytes("datasets/shared.arrow").await.unwrap().unwrap();
        assert_eq!(bytes.len(), 64 * 1024);
        assert!(bytes.iter().all(|b| *b == bytes[0]));

        let entries = std::fs::read_dir(dir.path().join("datasets")).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[tokio::test]
    async fn test_file_store_rejects_escaping_keys() {
        let dir = TempDir::new().unwrap();
        let store = FileBlobStore::new(dir.path());
        let err = store.load_bytes("../outside").await.unwrap_err();
        assert!(matches!(err, JoineryError::Storage { .. }));
    }
}
