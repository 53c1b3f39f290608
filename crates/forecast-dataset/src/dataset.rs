//! Opening catalog entries as virtual stores.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use hypothetic_store::{Attributes, VirtualChunkStore};
use netcdf_parser::DatasetDecoder;
use serde::Serialize;
use storage::{open_fetcher, RemoteFetcher};
use tracing::info;

use crate::config::{Catalog, Declaration};
use crate::error::Result;
use crate::forecast::ForecastDataset;
use crate::single_time::SingleTimeDataset;

/// How to open a dataset.
#[derive(Clone)]
pub struct OpenOptions {
    decoder: Arc<dyn DatasetDecoder>,
    fetcher: Option<Arc<dyn RemoteFetcher>>,
    license_accepted: bool,
    now: Option<DateTime<Utc>>,
}

impl OpenOptions {
    /// Decode files with `decoder` and fetch them as the storage options
    /// of the declaration describe.
    pub fn new(decoder: Arc<dyn DatasetDecoder>) -> Self {
        Self {
            decoder,
            fetcher: None,
            license_accepted: false,
            now: None,
        }
    }

    /// Fetch through `fetcher` instead of one built from storage options.
    pub fn fetcher(mut self, fetcher: Arc<dyn RemoteFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn license_accepted(mut self, accepted: bool) -> Self {
        self.license_accepted = accepted;
        self
    }

    /// Anchor for `latest` end times; the wall clock otherwise.
    pub fn now(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }
}

/// Summary of an opened dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Schema {
    pub dims: BTreeMap<String, usize>,
    pub data_vars: Vec<String>,
    pub coords: Vec<String>,
    #[serde(flatten)]
    pub metadata: Attributes,
}

/// A catalog entry opened as a virtual store.
pub struct Dataset {
    name: String,
    description: Option<String>,
    metadata: Attributes,
    store: Arc<VirtualChunkStore>,
}

impl Dataset {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn store(&self) -> &Arc<VirtualChunkStore> {
        &self.store
    }

    /// Dimension sizes, data variables and coordinates, plus the entry's
    /// metadata and the dataset attributes.
    pub fn schema(&self) -> Schema {
        let mut metadata = self.metadata.clone();
        metadata.extend(self.store.attrs().clone());
        Schema {
            dims: self.store.dim_sizes().into_iter().collect(),
            data_vars: self.store.data_variables().map(|v| v.name.clone()).collect(),
            coords: self.store.coordinates().map(|c| c.name.clone()).collect(),
            metadata,
        }
    }
}

impl Catalog {
    /// Open the entry `name` as a virtual store.
    pub fn open(&self, name: &str, options: &OpenOptions) -> Result<Dataset> {
        let entry = self.entry(name)?;
        let declaration = entry.declaration()?;
        declaration.check_license(options.license_accepted)?;

        let now = options.now.unwrap_or_else(Utc::now);
        let fetcher = match &options.fetcher {
            Some(fetcher) => fetcher.clone(),
            None => open_fetcher(declaration.storage_options())?,
        };
        let decoder = options.decoder.clone();

        let store = match &declaration {
            Declaration::Forecast(decl) => {
                ForecastDataset::new(decl, now)?.build_store(fetcher, decoder)?
            }
            Declaration::AirQuality(decl) => {
                SingleTimeDataset::air_quality(decl, now)?.build_store(fetcher, decoder)?
            }
            Declaration::Timeseries(decl) => {
                SingleTimeDataset::timeseries(decl, now)?.build_store(fetcher, decoder)?
            }
        };

        info!(
            dataset = %name,
            driver = ?entry.driver,
            keys = store.len(),
            "Opened dataset"
        );

        Ok(Dataset {
            name: name.to_string(),
            description: entry.description.clone(),
            metadata: entry.metadata.clone(),
            store: Arc::new(store),
        })
    }
}
