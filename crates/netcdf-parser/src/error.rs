//! Decoder errors.

use thiserror::Error;

pub type NetCdfResult<T> = Result<T, NetCdfError>;

#[derive(Error, Debug)]
pub enum NetCdfError {
    /// Staging the bytes on disk failed.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// A variable lacks the values or attributes a caller asked for.
    #[error("Missing data: {0}")]
    MissingData(String),

    /// The bytes are not a readable gridded-data file.
    #[error("Invalid file: {0}")]
    InvalidFormat(String),
}
