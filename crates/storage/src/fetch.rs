//! Remote fetch: turn an address into the bytes of the object behind it.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use lru::LruCache;
use object_store::aws::{AmazonS3Builder, AmazonS3ConfigKey};
use object_store::azure::MicrosoftAzureBuilder;
use object_store::http::HttpBuilder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path;
use object_store::ObjectStore;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, instrument};

use crate::error::{StorageError, StorageResult};
use crate::options::{transport_protocol, StorageOptions};

/// Default number of objects kept by a cached fetcher.
pub const DEFAULT_CACHE_CAPACITY: usize = 32;

/// Fetches whole objects by address.
#[async_trait]
pub trait RemoteFetcher: Send + Sync {
    /// # Returns
    /// * `Some(bytes)` - the object contents
    /// * `None` - no object exists at `address`
    async fn fetch(&self, address: &str) -> StorageResult<Option<Bytes>>;
}

#[async_trait]
impl<T: RemoteFetcher + ?Sized> RemoteFetcher for Arc<T> {
    async fn fetch(&self, address: &str) -> StorageResult<Option<Bytes>> {
        (**self).fetch(address).await
    }
}

/// Fetcher over `object_store` backends, one client per bucket/container.
///
/// Supported protocols: `file` (absolute paths), `memory`, `s3`,
/// `abfs`/`abfss`/`az` and `http`/`https`. Chained protocols such as
/// `simplecache::abfs` are served by their last component.
pub struct ObjectStoreFetcher {
    options: StorageOptions,
    registered: HashMap<String, Arc<dyn ObjectStore>>,
    stores: RwLock<HashMap<String, Arc<dyn ObjectStore>>>,
}

impl ObjectStoreFetcher {
    pub fn new(options: StorageOptions) -> Self {
        Self {
            options,
            registered: HashMap::new(),
            stores: RwLock::new(HashMap::new()),
        }
    }

    /// Serve every address of `protocol` from `store`, treating everything
    /// after `://` as the object path.
    pub fn with_store(mut self, protocol: impl Into<String>, store: Arc<dyn ObjectStore>) -> Self {
        self.registered.insert(protocol.into(), store);
        self
    }

    async fn resolve(&self, address: &str) -> StorageResult<(Arc<dyn ObjectStore>, Path)> {
        let (protocol, rest) = address
            .split_once("://")
            .ok_or_else(|| StorageError::InvalidAddress(address.to_string()))?;
        let protocol = transport_protocol(protocol);

        if let Some(store) = self.registered.get(protocol) {
            return Ok((store.clone(), Path::from(rest)));
        }

        let (root, path) = match protocol {
            "file" | "memory" => ("", rest),
            _ => rest
                .split_once('/')
                .ok_or_else(|| StorageError::InvalidAddress(address.to_string()))?,
        };

        let cache_key = format!("{}://{}", protocol, root);
        if let Some(store) = self.stores.read().await.get(&cache_key) {
            return Ok((store.clone(), Path::from(path)));
        }

        let store = self.build_store(protocol, root)?;
        debug!(store = %cache_key, "Created object store client");
        self.stores
            .write()
            .await
            .entry(cache_key)
            .or_insert_with(|| store.clone());
        Ok((store, Path::from(path)))
    }

    fn build_store(&self, protocol: &str, root: &str) -> StorageResult<Arc<dyn ObjectStore>> {
        match protocol {
            "file" => Ok(Arc::new(LocalFileSystem::new())),
            "memory" => Ok(Arc::new(InMemory::new())),
            "s3" | "s3a" => {
                let mut builder = AmazonS3Builder::new().with_bucket_name(root);
                for (key, value) in self.options.backend_options() {
                    if let (Ok(key), Some(value)) = (key.parse::<AmazonS3ConfigKey>(), value.as_str()) {
                        builder = builder.with_config(key, value);
                    }
                }
                Ok(Arc::new(builder.build()?))
            }
            "abfs" | "abfss" | "az" => {
                let credentials = self.options.abfs_credentials()?;
                match credentials.credential {
                    Some(key) => Ok(Arc::new(
                        MicrosoftAzureBuilder::new()
                            .with_account(&credentials.account_name)
                            .with_container_name(root)
                            .with_access_key(key)
                            .build()?,
                    )),
                    // Public containers are plain HTTP
                    None => Ok(Arc::new(
                        HttpBuilder::new()
                            .with_url(format!(
                                "https://{}.blob.core.windows.net/{}",
                                credentials.account_name, root
                            ))
                            .build()?,
                    )),
                }
            }
            "http" | "https" => Ok(Arc::new(
                HttpBuilder::new()
                    .with_url(format!("{}://{}", protocol, root))
                    .build()?,
            )),
            other => Err(StorageError::UnsupportedProtocol(other.to_string())),
        }
    }
}

#[async_trait]
impl RemoteFetcher for ObjectStoreFetcher {
    #[instrument(skip(self), fields(address = %address))]
    async fn fetch(&self, address: &str) -> StorageResult<Option<Bytes>> {
        let (store, path) = self.resolve(address).await?;
        info!("Request");

        let result = match store.get(&path).await {
            Ok(result) => result,
            Err(object_store::Error::NotFound { .. }) => {
                info!("NOT FOUND");
                return Ok(None);
            }
            Err(e) => return Err(StorageError::backend(format!("failed to read {}: {}", address, e))),
        };

        let bytes = result
            .bytes()
            .await
            .map_err(|e| StorageError::backend(format!("failed to read bytes of {}: {}", address, e)))?;
        debug!(size = bytes.len(), "Read object");
        Ok(Some(bytes))
    }
}

/// Keeps the most recently fetched objects in memory.
pub struct CachedFetcher<F> {
    inner: F,
    cache: Mutex<LruCache<String, Bytes>>,
}

impl<F: RemoteFetcher> CachedFetcher<F> {
    pub fn new(inner: F, capacity: NonZeroUsize) -> Self {
        Self {
            inner,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub async fn len(&self) -> usize {
        self.cache.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.cache.lock().await.is_empty()
    }
}

#[async_trait]
impl<F: RemoteFetcher> RemoteFetcher for CachedFetcher<F> {
    async fn fetch(&self, address: &str) -> StorageResult<Option<Bytes>> {
        if let Some(bytes) = self.cache.lock().await.get(address).cloned() {
            debug!(address = %address, "Fetch cache hit");
            return Ok(Some(bytes));
        }

        let fetched = self.inner.fetch(address).await?;
        if let Some(bytes) = &fetched {
            self.cache.lock().await.put(address.to_string(), bytes.clone());
        }
        Ok(fetched)
    }
}

/// Build the fetcher described by `options`, with an in-memory cache when
/// the protocol chain includes a caching layer.
pub fn open_fetcher(options: &StorageOptions) -> StorageResult<Arc<dyn RemoteFetcher>> {
    options.validate()?;
    let fetcher = ObjectStoreFetcher::new(options.clone());
    if !options.is_cached() {
        return Ok(Arc::new(fetcher));
    }

    let capacity = match options.options.get("cache_capacity") {
        None => DEFAULT_CACHE_CAPACITY,
        Some(value) => value
            .as_u64()
            .map(|v| v as usize)
            .ok_or_else(|| StorageError::invalid_options("cache_capacity must be a positive integer"))?,
    };
    let capacity = NonZeroUsize::new(capacity)
        .ok_or_else(|| StorageError::invalid_options("cache_capacity must be a positive integer"))?;
    Ok(Arc::new(CachedFetcher::new(fetcher, capacity)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn memory_options() -> StorageOptions {
        StorageOptions::new("memory", "bucket", Map::new()).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_hit_and_miss() {
        let store = Arc::new(InMemory::new());
        store
            .put(&Path::from("bucket/a.nc"), Bytes::from_static(b"netcdf").into())
            .await
            .unwrap();
        let fetcher = ObjectStoreFetcher::new(memory_options()).with_store("memory", store);

        let hit = fetcher.fetch("memory://bucket/a.nc").await.unwrap();
        assert_eq!(hit, Some(Bytes::from_static(b"netcdf")));

        let miss = fetcher.fetch("memory://bucket/b.nc").await.unwrap();
        assert!(miss.is_none());
    }

    #[tokio::test]
    async fn test_local_files() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("x.nc");
        std::fs::write(&file, b"abc").unwrap();

        let options = StorageOptions::new("file", dir.path().to_string_lossy(), Map::new()).unwrap();
        let fetcher = ObjectStoreFetcher::new(options.clone());
        let address = options.location().render("x.nc");
        assert_eq!(fetcher.fetch(&address).await.unwrap(), Some(Bytes::from_static(b"abc")));
        assert!(fetcher
            .fetch(&options.location().render("y.nc"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_bad_addresses() {
        let fetcher = ObjectStoreFetcher::new(memory_options());
        assert!(matches!(
            fetcher.fetch("no-scheme").await,
            Err(StorageError::InvalidAddress(_))
        ));
        assert!(matches!(
            fetcher.fetch("gopher://host/x").await,
            Err(StorageError::UnsupportedProtocol(_))
        ));
    }

    struct CountingFetcher(AtomicUsize);

    #[async_trait]
    impl RemoteFetcher for CountingFetcher {
        async fn fetch(&self, address: &str) -> StorageResult<Option<Bytes>> {
            self.0.fetch_add(1, Ordering::SeqCst);
            if address.ends_with("missing") {
                return Ok(None);
            }
            Ok(Some(Bytes::from(address.to_string())))
        }
    }

    #[tokio::test]
    async fn test_cached_fetcher() {
        let inner = Arc::new(CountingFetcher(AtomicUsize::new(0)));
        let cached = CachedFetcher::new(inner.clone(), NonZeroUsize::new(1).unwrap());

        cached.fetch("a").await.unwrap();
        cached.fetch("a").await.unwrap();
        assert_eq!(inner.0.load(Ordering::SeqCst), 1);

        // Misses are not cached
        cached.fetch("missing").await.unwrap();
        cached.fetch("missing").await.unwrap();
        assert_eq!(inner.0.load(Ordering::SeqCst), 3);

        // Capacity 1 evicts "a"
        cached.fetch("b").await.unwrap();
        cached.fetch("a").await.unwrap();
        assert_eq!(inner.0.load(Ordering::SeqCst), 5);
        assert_eq!(cached.len().await, 1);
    }

    #[test]
    fn test_open_fetcher_validates_capacity() {
        let mut options = Map::new();
        options.insert("cache_capacity".to_string(), serde_json::json!(0));
        let options = StorageOptions::new("simplecache::file", "/tmp", options).unwrap();
        assert!(open_fetcher(&options).is_err());
    }
}
