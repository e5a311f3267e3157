//! Blob storage for dataset bytes.
//!
//! Datasets are kept as opaque Arrow IPC byte blobs addressed by a key
//! derived from the table identifier (see [`storage_key`]). The engine never
//! reads storage itself: the materialization coordinator loads the bytes and
//! hands them to the engine.
//!
//! Three backends are provided:
//!
//! - [`InMemoryBlobStore`]: a process-local map, for tests and ephemeral sessions
//! - [`FileBlobStore`]: files under a root directory
//! - `ObjectStoreBlobStore`: any `object_store` URL (requires the `cloud-storage` feature)

mod file;
mod memory;
#[cfg(feature = "cloud-storage")]
mod object;

pub use file::FileBlobStore;
pub use memory::InMemoryBlobStore;
#[cfg(feature = "cloud-storage")]
pub use object::ObjectStoreBlobStore;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{JoineryError, Result};

/// Storage key holding the bytes of a table.
///
/// ```rust
/// assert_eq!(joinery::storage::storage_key("ds_orders"), "datasets/ds_orders.arrow");
/// ```
pub fn storage_key(table_id: &str) -> String {
    format!("datasets/{table_id}.arrow")
}

/// A byte-addressable blob store.
#[async_trait]
pub trait BlobStore: Send + Sync + fmt::Debug {
    /// Backend name used in errors and logs.
    fn backend(&self) -> &'static str;

    /// Loads the bytes under `key`, or `None` when nothing is stored there.
    async fn load_bytes(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Stores `bytes` under `key`, replacing any previous value.
    async fn store_bytes(&self, key: &str, bytes: Vec<u8>) -> Result<()>;

    /// Deletes the bytes under `key`. Deleting a missing key succeeds.
    async fn delete(&self, key: &str) -> Result<()>;
}

/// Storage backend selection.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageBackend {
    /// Process-local memory
    #[default]
    Memory,
    /// Files under a root directory
    Filesystem { root: PathBuf },
    /// An object store URL such as `s3://bucket/prefix` or `file:///data`
    #[serde(rename = "object_store")]
    ObjectStore { url: String },
}

impl StorageBackend {
    /// Creates the configured blob store.
    ///
    /// # Errors
    ///
    /// [`JoineryError::UnsupportedOperation`] for `ObjectStore` when the crate
    /// was built without the `cloud-storage` feature.
    pub fn build(&self) -> Result<Arc<dyn BlobStore>> {
        match self {
            StorageBackend::Memory => Ok(Arc::new(InMemoryBlobStore::new())),
            StorageBackend::Filesystem { root } => Ok(Arc::new(FileBlobStore::new(root.clone()))),
            StorageBackend::ObjectStore { url } => build_object_store(url),
        }
    }
}

#[cfg(feature = "cloud-storage")]
fn build_object_store(url: &str) -> Result<Arc<dyn BlobStore>> {
    Ok(Arc::new(ObjectStoreBlobStore::from_url(url)?))
}

#[cfg(not(feature = "cloud-storage"))]
fn build_object_store(url: &str) -> Result<Arc<dyn BlobStore>> {
    Err(JoineryError::UnsupportedOperation(format!(
        "object store backend for '{url}' requires the 'cloud-storage' feature"
    )))
}

/// Rejects keys that could escape the store's namespace.
pub(crate) fn validate_key(backend: &str, key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(JoineryError::storage(backend, "storage key cannot be empty"));
    }
    if key.starts_with('/') || key.split(['/', '\\']).any(|part| part == "..") {
        return Err(JoineryError::storage(
            backend,
            format!("storage key '{key}' must be a relative path without '..'"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_key() {
        assert_eq!(storage_key("ds_users"), "datasets/ds_users.arrow");
    }

    #[test]
    fn test_backend_config_shape() {
        let backend: StorageBackend =
            serde_json::from_str(r#"{"type": "filesystem", "root": "/tmp/joinery"}"#).unwrap();
        assert_eq!(
            backend,
            StorageBackend::Filesystem {
                root: PathBuf::from("/tmp/joinery")
            }
        );

        let backend: StorageBackend =
            serde_json::from_str(r#"{"type": "object_store", "url": "s3://bucket"}"#).unwrap();
        assert!(matches!(backend, StorageBackend::ObjectStore { .. }));
    }

    #[cfg(not(feature = "cloud-storage"))]
    #[test]
    fn test_object_store_requires_feature() {
        let err = StorageBackend::ObjectStore {
            url: "s3://bucket".to_string(),
        }
        .build()
        .unwrap_err();
        assert!(matches!(err, JoineryError::UnsupportedOperation(_)));
    }

    #[test]
    fn test_validate_key() {
        assert!(validate_key("memory", "datasets/a.arrow").is_ok());
        assert!(validate_key("memory", "").is_err());
        assert!(validate_key("memory", "/etc/passwd").is_err());
        assert!(validate_key("memory", "datasets/../../x").is_err());
    }
}
