//! A mutable key/value store on top of any `object_store` backend, used
//! as the persistent side of a caching overlay.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::TryStreamExt;
use hypothetic_store::{Result, Store, StoreError};
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path;
use object_store::ObjectStore;
use tracing::{debug, instrument};

use crate::error::{StorageError, StorageResult};

/// Store keys mapped to objects under a common prefix.
pub struct ObjectStoreMap {
    store: Arc<dyn ObjectStore>,
    prefix: Option<Path>,
}

impl ObjectStoreMap {
    pub fn new(store: Arc<dyn ObjectStore>, prefix: Option<&str>) -> Self {
        Self {
            store,
            prefix: prefix.filter(|p| !p.is_empty()).map(Path::from),
        }
    }

    /// Persist keys as files below `dir`, creating it if needed.
    pub fn local(dir: impl AsRef<std::path::Path>) -> StorageResult<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)
            .map_err(|e| StorageError::backend(format!("failed to create {}: {}", dir.display(), e)))?;
        let store = LocalFileSystem::new_with_prefix(dir)?;
        Ok(Self::new(Arc::new(store), None))
    }

    pub fn memory() -> Self {
        Self::new(Arc::new(InMemory::new()), None)
    }

    fn path(&self, key: &str) -> Path {
        match &self.prefix {
            Some(prefix) => Path::from(format!("{}/{}", prefix, key)),
            None => Path::from(key),
        }
    }

    /// Every key currently stored, sorted.
    pub async fn keys(&self) -> Result<Vec<String>> {
        let objects: Vec<_> = self
            .store
            .list(self.prefix.as_ref())
            .try_collect()
            .await
            .map_err(backing_error)?;

        let mut keys: Vec<String> = objects
            .into_iter()
            .map(|meta| {
                let location = meta.location.to_string();
                match &self.prefix {
                    Some(prefix) => location
                        .strip_prefix(&format!("{}/", prefix))
                        .map(str::to_string)
                        .unwrap_or(location),
                    None => location,
                }
            })
            .collect();
        keys.sort();
        Ok(keys)
    }
}

fn backing_error(err: object_store::Error) -> StoreError {
    StoreError::backing(err.to_string())
}

#[async_trait]
impl Store for ObjectStoreMap {
    #[instrument(skip(self), fields(key = %key))]
    async fn get(&self, key: &str) -> Result<Bytes> {
        match self.store.get(&self.path(key)).await {
            Ok(result) => result.bytes().await.map_err(backing_error),
            Err(object_store::Error::NotFound { .. }) => Err(StoreError::key_not_found(key)),
            Err(e) => Err(backing_error(e)),
        }
    }

    #[instrument(skip(self, value), fields(key = %key))]
    async fn set(&self, key: &str, value: Bytes) -> Result<()> {
        debug!(size = value.len(), "Writing object");
        self.store
            .put(&self.path(key), value.into())
            .await
            .map_err(backing_error)?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.path(key);
        match self.store.head(&path).await {
            Ok(_) => self.store.delete(&path).await.map_err(backing_error),
            Err(object_store::Error::NotFound { .. }) => Err(StoreError::key_not_found(key)),
            Err(e) => Err(backing_error(e)),
        }
    }

    async fn clear(&self) -> Result<()> {
        let objects: Vec<_> = self
            .store
            .list(self.prefix.as_ref())
            .try_collect()
            .await
            .map_err(backing_error)?;
        for meta in objects {
            self.store
                .delete(&meta.location)
                .await
                .map_err(backing_error)?;
        }
        Ok(())
    }

    async fn contains(&self, key: &str) -> Result<bool> {
        match self.store.head(&self.path(key)).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(backing_error(e)),
        }
    }
}
