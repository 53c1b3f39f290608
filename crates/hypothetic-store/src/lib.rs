//! Virtual Zarr v2 store over remote forecast files.
//!
//! A [`VirtualChunkStore`] presents a multi-dimensional dataset as the
//! string-keyed byte mapping an array engine expects, without holding any
//! data. Metadata is synthesized at construction; each data chunk is
//! produced on request by a [`ChunkLoader`], typically by fetching and
//! decoding one remote file.
//!
//! # Architecture
//!
//! ```text
//! store.get("air_temperature/3.7.0.0.0")
//!      │
//!      ├─► metadata key? serve from the in-memory document
//!      │
//!      ├─► coordinate? serve the whole coordinate array
//!      │
//!      └─► data chunk
//!               │
//!               ├─► chunk index × chunk size → ChunkOrigin
//!               │
//!               ├─► ChunkLoader::load(origin, variable)
//!               │         │
//!               │         ├─► Some(array): check dtype and size
//!               │         │
//!               │         └─► None: fill with missing values
//!               │
//!               └─► bytes in declared memory order
//! ```
//!
//! # Example
//!
//! ```ignore
//! use hypothetic_store::{FnLoader, Store, VirtualChunkStore};
//!
//! let store = VirtualChunkStore::builder(dims, coords, vec!["temp".into()])
//!     .chunk("y", 3)
//!     .chunk("x", 3)
//!     .build(Arc::new(FnLoader::new(|_origin, _var| Ok(None))))?;
//!
//! let bytes = store.get("temp/0.0.0").await?;
//! ```

pub mod address;
pub mod coords;
pub mod error;
pub mod extract;
pub mod loader;
pub mod metadata;
pub mod overlay;
pub mod store;
pub mod types;

// Re-export commonly used types at crate root
pub use address::{CycleAddressing, ForecastTimes, Location, PlainTimeAddressing};
pub use coords::{CoordinateData, CoordinateModel, GridContract, LinearSpacing, StaticCoordSpec};
pub use error::{Result, StoreError};
pub use extract::VariableExtractor;
pub use loader::{ChunkLoader, FnLoader};
pub use metadata::{ArrayMetadata, MetadataDocument};
pub use overlay::{CachingOverlay, MemoryStore};
pub use store::{Store, VariableKind, VirtualChunkStore, VirtualChunkStoreBuilder};
pub use types::{
    ArrayValues, Attributes, ChunkArray, ChunkOrigin, CoordValue, CoordinateVariable, DType,
    DataVariableDescriptor, MemoryOrder,
};
