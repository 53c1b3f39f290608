//! Datasets of daily files indexed by a single `time` axis: air quality
//! (`met_office_aq`) and UKV timeseries (`met_office_ukv_timeseries`).

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use forecast_common::{is_latest, parse_timestamp, resolve_latest, Frequency};
use hypothetic_store::{
    Attributes, CoordinateModel, DType, GridContract, PlainTimeAddressing, VariableExtractor,
    VirtualChunkStore,
};
use netcdf_parser::DatasetDecoder;
use storage::{RemoteFetcher, StorageOptions};
use tracing::debug;

use crate::config::SingleTimeDeclaration;
use crate::error::{DatasetError, Result};
use crate::loader::{FileAddressing, ForecastLoader, TIME_DIM};

/// Hours between a day's data being produced and being published.
pub const SINGLE_TIME_DELAY_HOURS: i64 = 48;

/// File layout of a single-time dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SingleTimeLayout {
    AirQuality { aggregation: Option<String> },
    Timeseries,
}

/// A single-time dataset resolved from its declaration.
#[derive(Debug, Clone)]
pub struct SingleTimeDataset {
    layout: SingleTimeLayout,
    model: String,
    timestep: Frequency,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    coords: CoordinateModel,
    diagnostics: Vec<String>,
    storage_options: StorageOptions,
    dtypes: BTreeMap<String, DType>,
    attrs: Attributes,
}

impl SingleTimeDataset {
    pub fn air_quality(decl: &SingleTimeDeclaration, now: DateTime<Utc>) -> Result<Self> {
        let layout = SingleTimeLayout::AirQuality {
            aggregation: decl.aggregation.clone(),
        };
        Self::new(layout, decl, now)
    }

    pub fn timeseries(decl: &SingleTimeDeclaration, now: DateTime<Utc>) -> Result<Self> {
        Self::new(SingleTimeLayout::Timeseries, decl, now)
    }

    pub fn new(layout: SingleTimeLayout, decl: &SingleTimeDeclaration, now: DateTime<Utc>) -> Result<Self> {
        time_chunk(&decl.timestep)?;
        let start = parse_timestamp(&decl.start_datetime)?;
        let end = resolve_end(&decl.end_datetime, &decl.timestep, now)?;

        let coords = CoordinateModel::new(decl.dimensions.clone(), decl.static_coords.clone())
            .with_times(TIME_DIM, start, end, decl.timestep.clone());
        coords.validate(GridContract::SingleTime)?;

        debug!(
            model = %decl.model,
            start = %start,
            end = %end,
            timestep = %decl.timestep,
            "Resolved single-time dataset"
        );

        Ok(Self {
            layout,
            model: decl.model.clone(),
            timestep: decl.timestep.clone(),
            start,
            end,
            coords,
            diagnostics: decl.diagnostics.clone(),
            storage_options: decl.storage_options.clone(),
            dtypes: decl.dtypes.clone(),
            attrs: decl.attrs.clone(),
        })
    }

    pub fn layout(&self) -> &SingleTimeLayout {
        &self.layout
    }

    pub fn time_range(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        (self.start, self.end)
    }

    /// Static coordinates are one chunk each; a time chunk covers one file.
    pub fn chunks(&self) -> Result<BTreeMap<String, usize>> {
        let mut chunks = self.coords.static_lengths();
        chunks.insert(TIME_DIM.to_string(), time_chunk(&self.timestep)?);
        Ok(chunks)
    }

    pub fn addressing(&self) -> Result<PlainTimeAddressing> {
        let location = self.storage_options.location();
        let addressing = match &self.layout {
            SingleTimeLayout::AirQuality { aggregation } => {
                PlainTimeAddressing::air_quality(location, &self.model, aggregation.clone())
            }
            SingleTimeLayout::Timeseries => {
                PlainTimeAddressing::timeseries(location, &self.model, &self.timestep)?
            }
        };
        Ok(addressing)
    }

    pub fn storage_options(&self) -> &StorageOptions {
        &self.storage_options
    }

    pub fn build_store(
        &self,
        fetcher: Arc<dyn RemoteFetcher>,
        decoder: Arc<dyn DatasetDecoder>,
    ) -> Result<VirtualChunkStore> {
        let loader = ForecastLoader::new(
            FileAddressing::PlainTime(self.addressing()?),
            VariableExtractor::single_time(),
            fetcher,
            decoder,
        )
        .with_dtypes(self.dtypes.clone());

        let store = VirtualChunkStore::builder(
            self.coords.dims().to_vec(),
            self.coords.build()?,
            self.diagnostics.clone(),
        )
        .chunks(self.chunks()?)
        .dtypes(self.dtypes.clone())
        .attrs(self.attrs.clone())
        .build(Arc::new(loader))?;
        Ok(store)
    }
}

/// Time steps per daily file.
pub fn time_chunk(timestep: &Frequency) -> Result<usize> {
    if timestep.is_hourly() {
        Ok(24)
    } else if timestep.is_daily() {
        Ok(1)
    } else {
        Err(DatasetError::invalid_config(format!(
            "don't know how to chunk timestep {}, expected 1H or 1D",
            timestep
        )))
    }
}

/// Resolve the end of the time axis. An hourly `latest` is pulled back to
/// the last hour of the last complete day, keeping whole daily chunks.
fn resolve_end(value: &str, timestep: &Frequency, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let end = resolve_latest(value, now, Duration::hours(SINGLE_TIME_DELAY_HOURS))?;
    if !is_latest(value) || !timestep.is_hourly() {
        return Ok(end);
    }
    let day_start = end
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|midnight| Utc.from_utc_datetime(&midnight))
        .ok_or_else(|| DatasetError::invalid_config(format!("cannot floor {} to a day", end)))?;
    Ok(day_start - Duration::hours(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hypothetic_store::StoreError;
    use test_utils::{dims, linear_coord, projected_static_coords};

    fn declaration(timestep: &str) -> SingleTimeDeclaration {
        SingleTimeDeclaration {
            start_datetime: "20201001T0000Z".to_string(),
            end_datetime: "20201002T2300Z".to_string(),
            timestep: timestep.parse().unwrap(),
            model: "aqum_hourly".to_string(),
            dimensions: dims(&["time", "projection_y_coordinate", "projection_x_coordinate"]),
            diagnostics: vec!["o3".to_string(), "no2".to_string()],
            static_coords: projected_static_coords(2, 2),
            storage_options: serde_yaml::from_str(
                "{data_protocol: abfs, url_prefix: covid19-response, account_name: metdatasa, credential: null}",
            )
            .unwrap(),
            aggregation: None,
            license: None,
            dtypes: BTreeMap::new(),
            attrs: Attributes::new(),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 10, 5, 9, 30, 0).unwrap()
    }

    #[test]
    fn test_time_chunk() {
        assert_eq!(time_chunk(&Frequency::hourly()).unwrap(), 24);
        assert_eq!(time_chunk(&Frequency::daily()).unwrap(), 1);
        assert!(time_chunk(&"3H".parse().unwrap()).is_err());
    }

    #[test]
    fn test_unsupported_timestep() {
        let err = SingleTimeDataset::air_quality(&declaration("6H"), now()).unwrap_err();
        assert!(matches!(err, DatasetError::InvalidConfig(_)));
    }

    #[test]
    fn test_chunks() {
        let dataset = SingleTimeDataset::air_quality(&declaration("1H"), now()).unwrap();
        let chunks = dataset.chunks().unwrap();
        assert_eq!(chunks["time"], 24);
        assert_eq!(chunks["projection_x_coordinate"], 2);
    }

    #[test]
    fn test_hourly_latest_floors_to_complete_day() {
        let mut decl = declaration("1H");
        decl.end_datetime = "latest".to_string();
        let dataset = SingleTimeDataset::air_quality(&decl, now()).unwrap();
        // now - 48h = 2020-10-03T09:30, the last complete day is the 2nd
        assert_eq!(
            dataset.time_range().1,
            Utc.with_ymd_and_hms(2020, 10, 2, 23, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_daily_latest() {
        let mut decl = declaration("1D");
        decl.end_datetime = "latest".to_string();
        let dataset = SingleTimeDataset::timeseries(&decl, now()).unwrap();
        assert_eq!(
            dataset.time_range().1,
            Utc.with_ymd_and_hms(2020, 10, 3, 9, 30, 0).unwrap()
        );
    }

    #[test]
    fn test_rotated_grid_contract() {
        let mut decl = declaration("1D");
        decl.dimensions = dims(&["time", "grid_latitude", "grid_longitude"]);
        let err = SingleTimeDataset::timeseries(&decl, now()).unwrap_err();
        assert!(matches!(err, DatasetError::Store(StoreError::Configuration(_))));

        decl.static_coords = BTreeMap::new();
        decl.static_coords
            .insert("grid_latitude".to_string(), linear_coord(-1.0, 1.0, 3, "y", "degrees"));
        decl.static_coords
            .insert("grid_longitude".to_string(), linear_coord(358.0, 359.0, 2, "x", "degrees"));
        assert!(SingleTimeDataset::timeseries(&decl, now()).is_ok());
    }

    #[test]
    fn test_addressing_layouts() {
        let time = Utc.with_ymd_and_hms(2020, 10, 1, 0, 0, 0).unwrap();

        let mut decl = declaration("1H");
        decl.aggregation = Some("daily_mean".to_string());
        let aq = SingleTimeDataset::air_quality(&decl, now()).unwrap();
        assert_eq!(
            aq.addressing().unwrap().resolve("o3", &time),
            "abfs://covid19-response/metoffice_aqum_hourly/o3/aqum_hourly_o3_daily_mean_20201001.nc"
        );

        let mut decl = declaration("1D");
        decl.model = "ukv".to_string();
        let ts = SingleTimeDataset::timeseries(&decl, now()).unwrap();
        assert_eq!(
            ts.addressing().unwrap().resolve("o3", &time),
            "abfs://covid19-response/metoffice_ukv_daily/o3/ukv_daily_o3_20201001.nc"
        );
    }

    #[test]
    fn test_uneven_hourly_range_is_rejected_at_build() {
        let mut decl = declaration("1H");
        decl.end_datetime = "20201002T0000Z".to_string();
        let dataset = SingleTimeDataset::air_quality(&decl, now()).unwrap();
        let decoder: Arc<dyn DatasetDecoder> = Arc::new(test_utils::FixtureDecoder::new());
        let fetcher = storage::open_fetcher(dataset.storage_options()).unwrap();
        let err = dataset.build_store(fetcher, decoder).unwrap_err();
        assert!(matches!(err, DatasetError::Store(StoreError::Configuration(_))));
    }
}
