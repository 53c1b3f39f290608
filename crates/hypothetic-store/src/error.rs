//! Error types for the virtual chunk store.

use thiserror::Error;

/// Errors that can occur while building or reading a virtual store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Missing dimensions/coordinates, bad chunk grid or bad storage options.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Forecast times could not be turned into an object address.
    #[error("addressing error: {0}")]
    Addressing(String),

    /// A decoded file did not contain exactly one data variable.
    #[error("decoding error: {0}")]
    Decoding(String),

    /// A loader returned an array that does not fit the declared chunk.
    #[error("type contract violated: {0}")]
    TypeContract(String),

    /// The store is read-only.
    #[error("unsupported operation: {0} on a read-only store")]
    UnsupportedOperation(&'static str),

    /// Malformed or unknown key.
    #[error("key not found: {0}")]
    KeyNotFound(String),

    /// The remote object behind a chunk does not exist.
    ///
    /// Loaders may return this instead of `Ok(None)`; the store treats both
    /// the same way and never surfaces it to readers.
    #[error("remote object not found: {0}")]
    NotFound(String),

    /// A collaborator (fetch, decode) failed for a reason other than absence.
    #[error("loader failed: {0}")]
    Loader(String),

    /// A persistent store behind a caching overlay failed.
    #[error("backing store error: {0}")]
    Backing(String),

    /// Metadata could not be encoded.
    #[error("metadata error: {0}")]
    Metadata(String),
}

impl StoreError {
    /// Create a Configuration error.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create an Addressing error.
    pub fn addressing(msg: impl Into<String>) -> Self {
        Self::Addressing(msg.into())
    }

    /// Create a Decoding error.
    pub fn decoding(msg: impl Into<String>) -> Self {
        Self::Decoding(msg.into())
    }

    /// Create a TypeContract error.
    pub fn type_contract(msg: impl Into<String>) -> Self {
        Self::TypeContract(msg.into())
    }

    /// Create a KeyNotFound error.
    pub fn key_not_found(key: impl Into<String>) -> Self {
        Self::KeyNotFound(key.into())
    }

    /// Create a Loader error.
    pub fn loader(msg: impl Into<String>) -> Self {
        Self::Loader(msg.into())
    }

    /// Create a Backing error.
    pub fn backing(msg: impl Into<String>) -> Self {
        Self::Backing(msg.into())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Metadata(err.to_string())
    }
}

impl From<forecast_common::TimeError> for StoreError {
    fn from(err: forecast_common::TimeError) -> Self {
        Self::Addressing(err.to_string())
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
