use std::sync::Arc;

use async_trait::async_trait;
use object_store::path::Path;
use object_store::{ObjectStore, PutPayload};
use url::Url;

use super::{validate_key, BlobStore};
use crate::error::{JoineryError, Result};

/// Blob store over any [`ObjectStore`], addressed by URL.
///
/// Keys are placed below the path component of the URL, so
/// `s3://bucket/views` stores `datasets/ds_a.arrow` at
/// `views/datasets/ds_a.arrow`.
#[derive(Debug, Clone)]
pub struct ObjectStoreBlobStore {
    store: Arc<dyn ObjectStore>,
    prefix: Path,
}

impl ObjectStoreBlobStore {
    /// Creates a store from an object store URL (`s3://`, `gs://`, `file://`, `memory://`...).
    pub fn from_url(url: &str) -> Result<Self> {
        let parsed = Url::parse(url).map_err(|e| {
            JoineryError::Configuration(format!("invalid object store URL '{url}': {e}"))
        })?;
        let (store, prefix) = object_store::parse_url(&parsed).map_err(|e| {
            JoineryError::storage_with_source("object_store", format!("cannot open '{url}'"), e)
        })?;
        Ok(Self {
            store: Arc::from(store),
            prefix,
        })
    }

    /// Wraps an existing store, placing keys below `prefix`.
    pub fn new(store: Arc<dyn ObjectStore>, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: Path::from(prefix.into()),
        }
    }

    fn path_for(&self, key: &str) -> Result<Path> {
        validate_key(self.backend(), key)?;
        if self.prefix.as_ref().is_empty() {
            Ok(Path::from(key))
        } else {
            Ok(Path::from(format!("{}/{key}", self.prefix)))
        }
    }
}

#[async_trait]
impl BlobStore for ObjectStoreBlobStore {
    fn backend(&self) -> &'static str {
        "object_store"
    }

    async fn load_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(key)?;
        match self.store.get(&path).await {
            Ok(result) => {
                let bytes = result.bytes().await.map_err(|e| {
                    JoineryError::storage_with_source(self.backend(), format!("read {path}"), e)
                })?;
                Ok(Some(bytes.to_vec()))
            }
            Err(object_store::Error::NotFound { .. }) => Ok(None),
            Err(e) => Err(JoineryError::storage_with_source(
                self.backend(),
                format!("get {path}"),
                e,
            )),
        }
    }

    async fn store_bytes(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
        let path = self.path_for(key)?;
        self.store
            .put(&path, PutPayload::from(bytes))
            .await
            .map_err(|e| JoineryError::storage_with_source(self.backend(), format!("put {path}"), e))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match self.store.delete(&path).await {
            Ok(()) | Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(JoineryError::storage_with_source(
                self.backend(),
                format!("delete {path}"),
                e,
            )),
        }
    }
}
