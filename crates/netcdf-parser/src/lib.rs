//! Decoding of gridded-data files into named variables.
//!
//! The [`DatasetDecoder`] trait turns the raw bytes of one remote file into
//! a [`DecodedDataset`]. With the `native` feature, [`NetCdfDecoder`] reads
//! NetCDF-3/4 files through libnetcdf.
//!
//! # Example
//!
//! ```ignore
//! use netcdf_parser::{DatasetDecoder, NetCdfDecoder};
//!
//! let dataset = NetCdfDecoder::new().decode(&bytes)?;
//! for name in dataset.variable_names() {
//!     println!("{}", name);
//! }
//! ```

pub mod dataset;
pub mod error;

#[cfg(feature = "native")]
pub mod native;

pub use dataset::{DatasetDecoder, DecodedDataset, DecodedVariable};
pub use error::{NetCdfError, NetCdfResult};

#[cfg(feature = "native")]
pub use native::{silence_hdf5_errors, NetCdfDecoder};
