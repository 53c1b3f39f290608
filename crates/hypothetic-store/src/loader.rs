//! The seam through which the store pulls chunk data from elsewhere.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{ChunkArray, ChunkOrigin};

/// Produces the data of one chunk of a data variable.
#[async_trait]
pub trait ChunkLoader: Send + Sync {
    /// Load the chunk whose first element sits at `origin`.
    ///
    /// # Returns
    /// * `Some(array)` - row-major data for the chunk
    /// * `None` - no data exists; the store substitutes missing values
    async fn load(&self, origin: &ChunkOrigin, variable: &str) -> Result<Option<ChunkArray>>;
}

/// Adapts a synchronous function into a [`ChunkLoader`].
pub struct FnLoader<F> {
    f: F,
}

impl<F> FnLoader<F>
where
    F: Fn(&ChunkOrigin, &str) -> Result<Option<ChunkArray>> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F> ChunkLoader for FnLoader<F>
where
    F: Fn(&ChunkOrigin, &str) -> Result<Option<ChunkArray>> + Send + Sync,
{
    async fn load(&self, origin: &ChunkOrigin, variable: &str) -> Result<Option<ChunkArray>> {
        (self.f)(origin, variable)
    }
}
