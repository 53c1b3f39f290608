//! Read-through cache in front of a virtual store.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{Result, StoreError};
use crate::store::{Store, VirtualChunkStore};

/// Serves keys from `backing` when present, otherwise computes them with
/// the wrapped store and writes them into `backing`.
///
/// Concurrent misses on the same key may compute it more than once; the
/// last write wins.
pub struct CachingOverlay<B> {
    inner: Arc<VirtualChunkStore>,
    backing: B,
}

impl<B: Store> CachingOverlay<B> {
    pub fn new(inner: Arc<VirtualChunkStore>, backing: B) -> Self {
        Self { inner, backing }
    }

    pub fn inner(&self) -> &Arc<VirtualChunkStore> {
        &self.inner
    }

    pub fn backing(&self) -> &B {
        &self.backing
    }
}

#[async_trait]
impl<B: Store> Store for CachingOverlay<B> {
    async fn get(&self, key: &str) -> Result<Bytes> {
        match self.backing.get(key).await {
            Ok(value) => {
                debug!(key = %key, "Cache hit");
                return Ok(value);
            }
            Err(StoreError::KeyNotFound(_)) => {}
            Err(e) => return Err(e),
        }

        debug!(key = %key, "Cache miss");
        let value = self.inner.get(key).await?;
        self.backing.set(key, value.clone()).await?;
        Ok(value)
    }

    async fn set(&self, _key: &str, _value: Bytes) -> Result<()> {
        Err(StoreError::UnsupportedOperation("set"))
    }

    async fn delete(&self, _key: &str) -> Result<()> {
        Err(StoreError::UnsupportedOperation("delete"))
    }

    async fn clear(&self) -> Result<()> {
        Err(StoreError::UnsupportedOperation("clear"))
    }

    async fn contains(&self, key: &str) -> Result<bool> {
        if self.backing.contains(key).await? {
            return Ok(true);
        }
        self.inner.contains(key).await
    }
}

/// Mutable in-process store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Bytes>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Snapshot of the stored keys, sorted.
    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, key: &str) -> Result<Bytes> {
        self.entries
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::key_not_found(key))
    }

    async fn set(&self, key: &str, value: Bytes) -> Result<()> {
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries
            .write()
            .await
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| StoreError::key_not_found(key))
    }

    async fn clear(&self) -> Result<()> {
        self.entries.write().await.clear();
        Ok(())
    }

    async fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.entries.read().await.contains_key(key))
    }
}
