//! Error types for dataset declarations and opening.

use forecast_common::TimeError;
use hypothetic_store::StoreError;
use storage::StorageError;
use thiserror::Error;

/// Errors that can occur while loading a catalog or opening a dataset.
#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("Failed to read catalog: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse catalog: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid dataset declaration: {0}")]
    InvalidConfig(String),

    #[error("Unknown dataset: {0}")]
    UnknownSource(String),

    #[error(
        "Please acknowledge your acceptance of the '{0}' license by opening the dataset with license_accepted set"
    )]
    LicenseNotAccepted(String),

    #[error(transparent)]
    Time(#[from] TimeError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl DatasetError {
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}

/// Result type for dataset operations.
pub type Result<T> = std::result::Result<T, DatasetError>;
