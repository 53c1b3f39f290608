//! Common test fixtures: sample catalogs and an in-memory decoder.

use std::collections::HashMap;
use std::sync::Mutex;

use netcdf_parser::{DatasetDecoder, DecodedDataset, NetCdfError, NetCdfResult};

/// A MOGREPS-UK ensemble forecast over a 2 × 3 projected grid with two
/// members, two cycles and leads 0H to 2H, read from `/tmp/forecasts`.
pub const FORECAST_CATALOG: &str = r#"
metadata:
  version: 1
sources:
  mogreps_uk:
    driver: met_office
    description: MOGREPS-UK ensemble forecast
    metadata:
      provider: Met Office
    args:
      start_cycle: 20201018T0000Z
      end_cycle: 20201018T0100Z
      cycle_frequency: 1H
      forecast_extent: 2H
      model: mo-atmospheric-mogreps-uk
      dimensions:
        - forecast_reference_time
        - forecast_period
        - realization
        - projection_y_coordinate
        - projection_x_coordinate
      diagnostics:
        - temperature_at_screen_level
      static_coords:
        realization:
          data: [0, 1]
        projection_y_coordinate:
          data: {start: 0, stop: 2000, num: 2}
          attrs:
            axis: y
            units: m
            standard_name: projection_y_coordinate
        projection_x_coordinate:
          data: {start: 0, stop: 4000, num: 3}
          attrs:
            axis: x
            units: m
            standard_name: projection_x_coordinate
      storage_options:
        data_protocol: file
        url_prefix: /tmp/forecasts
"#;

/// Hourly air quality over a 2 × 2 projected grid for two days, on a
/// public Azure container, under a license.
pub const AQ_CATALOG: &str = r#"
sources:
  air_quality_hourly:
    driver: met_office_aq
    description: Hourly AQUM air quality
    args:
      start_datetime: 20201001T0000Z
      end_datetime: 20201002T2300Z
      timestep: 1H
      model: aqum_hourly
      dimensions: [time, projection_y_coordinate, projection_x_coordinate]
      diagnostics: [o3, no2, pm10, pm2p5, so2]
      static_coords:
        projection_y_coordinate:
          data: {start: -184000, stop: -182000, num: 2}
          attrs: {axis: y, units: m, standard_name: projection_y_coordinate}
        projection_x_coordinate:
          data: {start: -238000, stop: -236000, num: 2}
          attrs: {axis: x, units: m, standard_name: projection_x_coordinate}
      storage_options:
        data_protocol: abfs
        url_prefix: covid19-response
        account_name: metdatasa
        credential: null
      license: Open Government License
"#;

/// Daily UKV timeseries on a rotated-pole grid.
pub const TIMESERIES_CATALOG: &str = r#"
sources:
  ukv_daily:
    driver: met_office_ukv_timeseries
    args:
      start_datetime: 20201001T0000Z
      end_datetime: 20201003T0000Z
      timestep: 1D
      model: ukv
      dimensions: [time, grid_latitude, grid_longitude]
      diagnostics: [air_temperature_max]
      static_coords:
        grid_latitude:
          data: [-1.0, 0.0, 1.0]
        grid_longitude:
          data: [358.0, 359.0]
      storage_options:
        data_protocol: memory
        url_prefix: timeseries
"#;

/// Decoder serving prepared datasets by exact file contents.
///
/// Tests store short tags such as `b"cycle-0"` as remote objects and
/// register the dataset each tag decodes to. Unknown contents fail like a
/// corrupt file.
#[derive(Default)]
pub struct FixtureDecoder {
    files: HashMap<Vec<u8>, DecodedDataset>,
    decoded: Mutex<Vec<Vec<u8>>>,
}

impl FixtureDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, contents: impl Into<Vec<u8>>, dataset: DecodedDataset) -> Self {
        self.files.insert(contents.into(), dataset);
        self
    }

    /// Contents decoded so far, in call order.
    pub fn decoded(&self) -> Vec<Vec<u8>> {
        self.decoded
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }
}

impl DatasetDecoder for FixtureDecoder {
    fn decode(&self, bytes: &[u8]) -> NetCdfResult<DecodedDataset> {
        if let Ok(mut calls) = self.decoded.lock() {
            calls.push(bytes.to_vec());
        }
        self.files
            .get(bytes)
            .cloned()
            .ok_or_else(|| NetCdfError::InvalidFormat("unknown fixture contents".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generators::create_forecast_file;

    #[test]
    fn test_fixture_decoder() {
        let decoder = FixtureDecoder::new()
            .with_file(b"a".to_vec(), create_forecast_file("t", 0, 1, 1, vec![1.0]));
        assert!(decoder.decode(b"a").is_ok());
        assert!(matches!(decoder.decode(b"b"), Err(NetCdfError::InvalidFormat(_))));
        assert_eq!(decoder.decoded(), vec![b"a".to_vec(), b"b".to_vec()]);
    }
}
