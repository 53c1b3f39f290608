//! Error types for remote storage access.

use hypothetic_store::StoreError;
use thiserror::Error;

/// Errors raised while validating storage options or talking to a backend.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Storage options are missing required keys or hold bad values.
    #[error("invalid storage options: {0}")]
    InvalidOptions(String),

    /// An address could not be split into protocol, container and path.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// No backend is known for the protocol.
    #[error("unsupported protocol: {0}")]
    UnsupportedProtocol(String),

    /// The backend failed for a reason other than a missing object.
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StorageError {
    pub fn invalid_options(msg: impl Into<String>) -> Self {
        Self::InvalidOptions(msg.into())
    }

    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }
}

impl From<object_store::Error> for StorageError {
    fn from(err: object_store::Error) -> Self {
        Self::Backend(err.to_string())
    }
}

impl From<StorageError> for StoreError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::InvalidOptions(_)
            | StorageError::InvalidAddress(_)
            | StorageError::UnsupportedProtocol(_) => StoreError::Configuration(err.to_string()),
            StorageError::Backend(msg) => StoreError::Loader(msg),
        }
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
