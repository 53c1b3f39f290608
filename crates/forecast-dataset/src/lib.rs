//! Met Office forecast datasets exposed as virtual Zarr stores.
//!
//! A [`Catalog`] declares named datasets in YAML. Opening one resolves its
//! time axes, checks its coordinates against the grid contract of its
//! driver and builds a [`VirtualChunkStore`](hypothetic_store::VirtualChunkStore)
//! whose chunks are read from remote NetCDF files by a [`ForecastLoader`].
//!
//! | Driver | Files | Chunk |
//! |---|---|---|
//! | `met_office` | one per cycle and lead time | one cycle, one lead, whole grid |
//! | `met_office_aq` | one per day | one day of `time` |
//! | `met_office_ukv_timeseries` | one per day | one day of `time` |
//!
//! # Example
//!
//! ```ignore
//! use forecast_dataset::{load_catalog, OpenOptions};
//! use netcdf_parser::NetCdfDecoder;
//!
//! let catalog = load_catalog("catalogs/mogreps_uk.yaml")?;
//! let options = OpenOptions::new(Arc::new(NetCdfDecoder::new())).license_accepted(true);
//! let dataset = catalog.open("mogreps_uk", &options)?;
//! let chunk = dataset.store().get("temperature_at_screen_level/0.0.0.0.0").await?;
//! ```

pub mod config;
pub mod dataset;
pub mod error;
pub mod forecast;
pub mod loader;
pub mod single_time;

pub use config::{
    load_catalog, Catalog, Declaration, Driver, ForecastDeclaration, SingleTimeDeclaration,
    SourceEntry,
};
pub use dataset::{Dataset, OpenOptions, Schema};
pub use error::{DatasetError, Result};
pub use forecast::{ForecastDataset, DATA_DELAY_HOURS, ENSEMBLE_MODEL};
pub use loader::{FileAddressing, ForecastLoader, CYCLE_DIM, LEAD_DIM, TIME_DIM};
pub use single_time::{time_chunk, SingleTimeDataset, SingleTimeLayout, SINGLE_TIME_DELAY_HOURS};
