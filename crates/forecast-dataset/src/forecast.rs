//! Cycle/lead indexed forecast datasets (`met_office` driver).

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use forecast_common::{parse_duration, parse_timestamp, resolve_latest, Frequency};
use hypothetic_store::{
    Attributes, CoordinateModel, CycleAddressing, DType, GridContract, VariableExtractor,
    VirtualChunkStore,
};
use netcdf_parser::DatasetDecoder;
use storage::{RemoteFetcher, StorageOptions};
use tracing::debug;

use crate::config::ForecastDeclaration;
use crate::error::Result;
use crate::loader::{FileAddressing, ForecastLoader, CYCLE_DIM, LEAD_DIM};

/// Hours between a cycle's reference time and its files being available.
pub const DATA_DELAY_HOURS: i64 = 24 + 6;

/// The ensemble model; its grids carry a `realization` axis.
pub const ENSEMBLE_MODEL: &str = "mo-atmospheric-mogreps-uk";

const PROJECTED_X: &str = "projection_x_coordinate";

/// A forecast dataset resolved from its declaration.
#[derive(Debug, Clone)]
pub struct ForecastDataset {
    model: String,
    start_cycle: DateTime<Utc>,
    end_cycle: DateTime<Utc>,
    forecast_extent: Duration,
    coords: CoordinateModel,
    diagnostics: Vec<String>,
    storage_options: StorageOptions,
    dtypes: BTreeMap<String, DType>,
    attrs: Attributes,
}

impl ForecastDataset {
    /// Resolve `decl` against the current time `now`, which anchors a
    /// `latest` end cycle.
    pub fn new(decl: &ForecastDeclaration, now: DateTime<Utc>) -> Result<Self> {
        let start_cycle = parse_timestamp(&decl.start_cycle)?;
        let end_cycle = resolve_latest(&decl.end_cycle, now, Duration::hours(DATA_DELAY_HOURS))?;
        let forecast_extent = parse_duration(&decl.forecast_extent)?;

        let coords = CoordinateModel::new(decl.dimensions.clone(), decl.static_coords.clone())
            .with_times(CYCLE_DIM, start_cycle, end_cycle, decl.cycle_frequency.clone())
            .with_durations(LEAD_DIM, Duration::zero(), forecast_extent, Frequency::hourly());
        coords.validate(GridContract::ForecastCycle {
            ensemble: decl.model == ENSEMBLE_MODEL,
        })?;

        debug!(
            model = %decl.model,
            start_cycle = %start_cycle,
            end_cycle = %end_cycle,
            "Resolved forecast dataset"
        );

        Ok(Self {
            model: decl.model.clone(),
            start_cycle,
            end_cycle,
            forecast_extent,
            coords,
            diagnostics: decl.diagnostics.clone(),
            storage_options: decl.storage_options.clone(),
            dtypes: decl.dtypes.clone(),
            attrs: decl.attrs.clone(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn is_ensemble(&self) -> bool {
        self.model == ENSEMBLE_MODEL
    }

    pub fn cycle_range(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        (self.start_cycle, self.end_cycle)
    }

    pub fn forecast_extent(&self) -> Duration {
        self.forecast_extent
    }

    /// Every static coordinate is one chunk; cycle and lead use one
    /// element per chunk so each chunk is one file.
    pub fn chunks(&self) -> BTreeMap<String, usize> {
        let mut chunks = self.coords.static_lengths();
        chunks.insert(CYCLE_DIM.to_string(), 1);
        chunks.insert(LEAD_DIM.to_string(), 1);
        chunks
    }

    pub fn addressing(&self) -> CycleAddressing {
        CycleAddressing::new(self.storage_options.location(), self.model.clone())
    }

    pub fn extractor(&self) -> VariableExtractor {
        VariableExtractor::for_forecast_grid(self.coords.has_static(PROJECTED_X))
    }

    pub fn storage_options(&self) -> &StorageOptions {
        &self.storage_options
    }

    /// Build the virtual store, loading chunks through `fetcher` and `decoder`.
    pub fn build_store(
        &self,
        fetcher: Arc<dyn RemoteFetcher>,
        decoder: Arc<dyn DatasetDecoder>,
    ) -> Result<VirtualChunkStore> {
        let loader = ForecastLoader::new(
            FileAddressing::Cycle(self.addressing()),
            self.extractor(),
            fetcher,
            decoder,
        )
        .with_dtypes(self.dtypes.clone());

        let store = VirtualChunkStore::builder(
            self.coords.dims().to_vec(),
            self.coords.build()?,
            self.diagnostics.clone(),
        )
        .chunks(self.chunks())
        .dtypes(self.dtypes.clone())
        .attrs(self.attrs.clone())
        .build(Arc::new(loader))?;
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DatasetError;
    use chrono::TimeZone;
    use hypothetic_store::StoreError;
    use test_utils::{dims, integer_coord, projected_static_coords};

    fn declaration() -> ForecastDeclaration {
        let mut static_coords = projected_static_coords(2, 3);
        static_coords.insert("realization".to_string(), integer_coord(&[0, 1]));
        ForecastDeclaration {
            start_cycle: "20201018T0000Z".to_string(),
            end_cycle: "20201018T0100Z".to_string(),
            cycle_frequency: Frequency::hourly(),
            forecast_extent: "2H".to_string(),
            model: ENSEMBLE_MODEL.to_string(),
            dimensions: dims(&[
                "forecast_reference_time",
                "forecast_period",
                "realization",
                "projection_y_coordinate",
                "projection_x_coordinate",
            ]),
            diagnostics: vec!["temperature_at_screen_level".to_string()],
            static_coords,
            storage_options: serde_yaml::from_str("{data_protocol: file, url_prefix: /tmp/forecasts}")
                .unwrap(),
            license: None,
            dtypes: BTreeMap::new(),
            attrs: Attributes::new(),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 10, 20, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_chunks() {
        let dataset = ForecastDataset::new(&declaration(), now()).unwrap();
        let chunks = dataset.chunks();
        assert_eq!(chunks["forecast_reference_time"], 1);
        assert_eq!(chunks["forecast_period"], 1);
        assert_eq!(chunks["realization"], 2);
        assert_eq!(chunks["projection_y_coordinate"], 2);
        assert_eq!(chunks["projection_x_coordinate"], 3);
        assert!(dataset.is_ensemble());
    }

    #[test]
    fn test_trailing_z_and_extent() {
        let dataset = ForecastDataset::new(&declaration(), now()).unwrap();
        let (start, end) = dataset.cycle_range();
        assert_eq!(start, Utc.with_ymd_and_hms(2020, 10, 18, 0, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2020, 10, 18, 1, 0, 0).unwrap());
        assert_eq!(dataset.forecast_extent(), Duration::hours(2));
    }

    #[test]
    fn test_latest_end_cycle() {
        let mut decl = declaration();
        decl.end_cycle = "latest".to_string();
        let dataset = ForecastDataset::new(&decl, now()).unwrap();
        assert_eq!(
            dataset.cycle_range().1,
            Utc.with_ymd_and_hms(2020, 10, 19, 6, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_ensemble_requires_realization() {
        let mut decl = declaration();
        decl.static_coords.remove("realization");
        decl.dimensions.retain(|d| d != "realization");
        let err = ForecastDataset::new(&decl, now()).unwrap_err();
        assert!(matches!(err, DatasetError::Store(StoreError::Configuration(_))));

        decl.model = "mo-atmospheric-ukv".to_string();
        assert!(ForecastDataset::new(&decl, now()).is_ok());
    }

    #[test]
    fn test_geographic_grid_contract() {
        let mut decl = declaration();
        decl.model = "mo-atmospheric-global".to_string();
        decl.static_coords = BTreeMap::new();
        decl.static_coords.insert(
            "latitude".to_string(),
            test_utils::linear_coord(-90.0, 90.0, 3, "y", "degrees_north"),
        );
        decl.static_coords.insert(
            "longitude".to_string(),
            test_utils::linear_coord(0.0, 180.0, 3, "x", "degrees_east"),
        );
        decl.dimensions = dims(&[
            "forecast_reference_time",
            "forecast_period",
            "latitude",
            "longitude",
        ]);
        let dataset = ForecastDataset::new(&decl, now()).unwrap();
        assert!(dataset.extractor().is_data("air_temperature"));
        assert!(!dataset.extractor().is_data("latitude_longitude"));
    }

    #[test]
    fn test_addressing_uses_storage_location() {
        let dataset = ForecastDataset::new(&declaration(), now()).unwrap();
        let address = dataset
            .addressing()
            .resolve_with(
                "temperature_at_screen_level",
                Some(Utc.with_ymd_and_hms(2020, 10, 18, 0, 0, 0).unwrap()),
                None,
                Some(Duration::hours(2)),
            )
            .unwrap();
        assert_eq!(
            address,
            "file:///tmp/forecasts/mo-atmospheric-mogreps-uk/20201018T0000Z/20201018T0200Z-PT0002H00M-temperature_at_screen_level.nc"
        );
    }
}
