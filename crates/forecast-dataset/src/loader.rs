//! The loader behind forecast stores: chunk origin → remote file → values.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use hypothetic_store::{
    ArrayValues, ChunkArray, ChunkLoader, ChunkOrigin, CycleAddressing, DType, PlainTimeAddressing,
    Result as StoreResult, StoreError, VariableExtractor,
};
use netcdf_parser::DatasetDecoder;
use storage::RemoteFetcher;
use tracing::{debug, info};

/// Dimension holding cycle (reference) times.
pub const CYCLE_DIM: &str = "forecast_reference_time";
/// Dimension holding lead times.
pub const LEAD_DIM: &str = "forecast_period";
/// Dimension of single-time datasets.
pub const TIME_DIM: &str = "time";

/// How a chunk origin maps to a file address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileAddressing {
    /// One file per cycle and lead time.
    Cycle(CycleAddressing),
    /// One file per day.
    PlainTime(PlainTimeAddressing),
}

impl FileAddressing {
    pub fn address(&self, origin: &ChunkOrigin, variable: &str) -> StoreResult<String> {
        match self {
            FileAddressing::Cycle(addressing) => {
                let cycle = origin
                    .get(CYCLE_DIM)
                    .and_then(|v| v.as_datetime())
                    .ok_or_else(|| missing_origin(CYCLE_DIM, origin))?;
                let lead = origin
                    .get(LEAD_DIM)
                    .and_then(|v| v.as_duration())
                    .ok_or_else(|| missing_origin(LEAD_DIM, origin))?;
                addressing.resolve_with(variable, Some(cycle), None, Some(lead))
            }
            FileAddressing::PlainTime(addressing) => {
                let time = origin
                    .get(TIME_DIM)
                    .and_then(|v| v.as_datetime())
                    .ok_or_else(|| missing_origin(TIME_DIM, origin))?;
                Ok(addressing.resolve(variable, &time))
            }
        }
    }
}

fn missing_origin(dim: &str, origin: &ChunkOrigin) -> StoreError {
    StoreError::addressing(format!("chunk origin {} has no time value for {}", origin, dim))
}

/// Fetches the file behind a chunk, decodes it and returns its single data
/// variable cast to the declared element type.
pub struct ForecastLoader {
    addressing: FileAddressing,
    extractor: VariableExtractor,
    fetcher: Arc<dyn RemoteFetcher>,
    decoder: Arc<dyn DatasetDecoder>,
    dtypes: HashMap<String, DType>,
}

impl ForecastLoader {
    pub fn new(
        addressing: FileAddressing,
        extractor: VariableExtractor,
        fetcher: Arc<dyn RemoteFetcher>,
        decoder: Arc<dyn DatasetDecoder>,
    ) -> Self {
        Self {
            addressing,
            extractor,
            fetcher,
            decoder,
            dtypes: HashMap::new(),
        }
    }

    /// Element types of data variables; unlisted ones are float32.
    pub fn with_dtypes<I, S>(mut self, dtypes: I) -> Self
    where
        I: IntoIterator<Item = (S, DType)>,
        S: Into<String>,
    {
        self.dtypes
            .extend(dtypes.into_iter().map(|(name, dtype)| (name.into(), dtype)));
        self
    }

    pub fn addressing(&self) -> &FileAddressing {
        &self.addressing
    }
}

#[async_trait]
impl ChunkLoader for ForecastLoader {
    async fn load(&self, origin: &ChunkOrigin, variable: &str) -> StoreResult<Option<ChunkArray>> {
        let address = self.addressing.address(origin, variable)?;
        debug!(variable = %variable, origin = %origin, address = %address, "Resolved chunk address");

        let bytes = match self.fetcher.fetch(&address).await? {
            Some(bytes) => bytes,
            None => {
                info!(address = %address, "NOT FOUND");
                return Ok(None);
            }
        };

        let decoder = self.decoder.clone();
        let extractor = self.extractor.clone();
        let dtype = self.dtypes.get(variable).copied().unwrap_or_default();
        let array = tokio::task::spawn_blocking(move || decode_chunk(&*decoder, &extractor, bytes, dtype))
            .await
            .map_err(|e| StoreError::loader(format!("decode task failed: {}", e)))??;
        Ok(Some(array))
    }
}

fn decode_chunk(
    decoder: &dyn DatasetDecoder,
    extractor: &VariableExtractor,
    bytes: Bytes,
    dtype: DType,
) -> StoreResult<ChunkArray> {
    let dataset = decoder
        .decode(&bytes)
        .map_err(|e| StoreError::loader(format!("failed to decode file: {}", e)))?;
    let name = extractor.extract(dataset.variable_names())?;
    let variable = dataset
        .variable(name)
        .ok_or_else(|| StoreError::decoding(format!("variable {} vanished from file", name)))?;
    let values = variable
        .unpacked_values()
        .map_err(|e| StoreError::decoding(e.to_string()))?;
    Ok(ChunkArray::new(
        variable.shape.clone(),
        ArrayValues::from_f64(&values, dtype),
    ))
}
