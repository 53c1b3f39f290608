//! Remote storage access for the forecast store.
//!
//! Provides:
//! - Storage options and their validation
//! - Remote fetch over `object_store` backends (local files, memory, S3,
//!   Azure blob, HTTP) with an optional in-memory object cache
//! - An object-store-backed mapping to persist chunks behind a caching
//!   overlay

pub mod error;
pub mod fetch;
pub mod map;
pub mod options;

pub use error::{StorageError, StorageResult};
pub use fetch::{open_fetcher, CachedFetcher, ObjectStoreFetcher, RemoteFetcher};
pub use map::ObjectStoreMap;
pub use options::{AbfsCredentials, StorageOptions};
