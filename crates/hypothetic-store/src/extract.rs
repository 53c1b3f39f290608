//! Picks the single data variable out of a decoded file by removing every
//! known coordinate, bounds and grid-mapping name.

use std::collections::BTreeSet;

use crate::error::{Result, StoreError};

const VERTICAL_COORDS: &[&str] = &["height", "depth", "pressure"];

/// Set of variable names that are never data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableExtractor {
    non_data: BTreeSet<String>,
}

impl VariableExtractor {
    pub fn new<I, S>(non_data: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            non_data: non_data.into_iter().map(Into::into).collect(),
        }
    }

    /// Cycle-indexed forecast files on a projected (Lambert) grid.
    pub fn forecast_projected() -> Self {
        Self::forecast_grid(
            "projection_x_coordinate",
            "projection_y_coordinate",
            &["lambert_azimuthal_equal_area"],
        )
    }

    /// Cycle-indexed forecast files on a latitude/longitude grid.
    pub fn forecast_geographic() -> Self {
        Self::forecast_grid(
            "longitude",
            "latitude",
            &["latitude_longitude", "lambert_azimuthal_equal_area"],
        )
    }

    /// Pick the forecast preset matching the grid's x coordinate name.
    pub fn for_forecast_grid(projected: bool) -> Self {
        if projected {
            Self::forecast_projected()
        } else {
            Self::forecast_geographic()
        }
    }

    fn forecast_grid(x: &str, y: &str, grid_mappings: &[&str]) -> Self {
        let mut names: Vec<String> = [
            "time",
            "forecast_reference_time",
            "realization",
            "forecast_period",
            "time_bnds",
            "forecast_period_bnds",
            "depth_bnds",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        names.extend([x.to_string(), y.to_string()]);
        names.extend([format!("{}_bnds", x), format!("{}_bnds", y)]);
        names.extend(grid_mappings.iter().map(|s| s.to_string()));
        names.extend(VERTICAL_COORDS.iter().map(|s| s.to_string()));
        Self::new(names)
    }

    /// Daily files indexed by a single time axis (air quality, timeseries).
    pub fn single_time() -> Self {
        let names = [
            "time",
            "projection_y_coordinate",
            "projection_x_coordinate",
            "forecast_reference_time",
            "forecast_day",
            "grid_longitude",
            "grid_latitude",
            "forecast_period",
            "lambert_azimuthal_equal_area",
            "projection_y_coordinate_bnds",
            "projection_x_coordinate_bnds",
            "transverse_mercator",
            "experiment_number",
            "rotated_latitude_longitude",
            "time_bnds",
            "forecast_period_bnds",
            "forecast_reference_time_bnds",
            "depth_bnds",
        ];
        Self::new(names.iter().chain(VERTICAL_COORDS).copied())
    }

    pub fn is_data(&self, name: &str) -> bool {
        !self.non_data.contains(name)
    }

    /// Return the only name not in the non-data set.
    pub fn extract<'a, I>(&self, names: I) -> Result<&'a str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let candidates: BTreeSet<&str> = names.into_iter().filter(|n| self.is_data(n)).collect();
        let mut iter = candidates.iter();
        match (iter.next(), iter.next()) {
            (Some(name), None) => Ok(*name),
            (None, _) => Err(StoreError::decoding("found no data variable")),
            (Some(_), Some(_)) => Err(StoreError::decoding(format!(
                "expected to find only 1 data variable but got: {:?}",
                candidates
            ))),
        }
    }
}
