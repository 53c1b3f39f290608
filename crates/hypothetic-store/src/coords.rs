//! Coordinate models: static grid axes from configuration plus dynamic
//! time axes, checked against per-model dimension contracts.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use forecast_common::{date_range, duration_range, Frequency};
use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};
use crate::types::{ArrayValues, Attributes, CoordinateVariable};

/// Evenly spaced samples over a closed interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearSpacing {
    pub start: f64,
    pub stop: f64,
    pub num: usize,
}

impl LinearSpacing {
    pub fn values(&self) -> Vec<f64> {
        match self.num {
            0 => Vec::new(),
            1 => vec![self.start],
            n => {
                let step = (self.stop - self.start) / (n - 1) as f64;
                let mut values: Vec<f64> = (0..n).map(|i| self.start + i as f64 * step).collect();
                values[n - 1] = self.stop;
                values
            }
        }
    }
}

/// Coordinate data as written in dataset configuration: either an
/// explicit list or a linear spacing.
// Lists come first: a derived struct also deserializes from a sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CoordinateData {
    Integers(Vec<i64>),
    Floats(Vec<f64>),
    Linear(LinearSpacing),
}

impl CoordinateData {
    pub fn materialize(&self) -> ArrayValues {
        match self {
            CoordinateData::Linear(spacing) => ArrayValues::Float64(spacing.values()),
            CoordinateData::Integers(values) => ArrayValues::Int64(values.clone()),
            CoordinateData::Floats(values) => ArrayValues::Float64(values.clone()),
        }
    }
}

/// A static coordinate definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticCoordSpec {
    pub data: CoordinateData,
    #[serde(default)]
    pub attrs: Attributes,
}

#[derive(Debug, Clone, PartialEq)]
enum DynamicAxis {
    Times {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        freq: Frequency,
    },
    Durations {
        start: Duration,
        end: Duration,
        freq: Frequency,
    },
}

/// Dimension contract a dataset's coordinates must satisfy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridContract {
    /// Cycle/lead indexed forecasts, optionally with ensemble members.
    ForecastCycle { ensemble: bool },
    /// Datasets indexed by a single time axis.
    SingleTime,
}

impl GridContract {
    /// Coordinates the static definition has to provide.
    pub fn expected_coords(&self, dims: &[String], static_names: &[&str]) -> Vec<&'static str> {
        match self {
            GridContract::ForecastCycle { ensemble } => {
                let mut coords = if static_names.contains(&"projection_x_coordinate") {
                    vec!["projection_x_coordinate", "projection_y_coordinate"]
                } else {
                    vec!["longitude", "latitude"]
                };
                if *ensemble {
                    coords.push("realization");
                }
                coords
            }
            GridContract::SingleTime => {
                if dims.iter().any(|d| d == "grid_latitude") {
                    vec!["grid_longitude", "grid_latitude"]
                } else {
                    vec!["projection_x_coordinate", "projection_y_coordinate"]
                }
            }
        }
    }

    /// Dimensions the dataset has to declare.
    pub fn expected_dims(&self, dims: &[String], static_names: &[&str]) -> Vec<&'static str> {
        let leading: &[&'static str] = match self {
            GridContract::ForecastCycle { .. } => &["forecast_reference_time", "forecast_period"],
            GridContract::SingleTime => &["time"],
        };
        let mut expected = leading.to_vec();
        expected.extend(self.expected_coords(dims, static_names));
        expected
    }

    pub fn check(&self, dims: &[String], static_names: &[&str]) -> Result<()> {
        let coords = self.expected_coords(dims, static_names);
        if let Some(missing) = coords.iter().find(|c| !static_names.contains(c)) {
            return Err(StoreError::configuration(format!(
                "expected to find all of {:?} in static_coords, missing {}",
                coords, missing
            )));
        }

        let expected = self.expected_dims(dims, static_names);
        if let Some(missing) = expected.iter().find(|e| !dims.iter().any(|d| d == *e)) {
            return Err(StoreError::configuration(format!(
                "expected to find all of {:?} in dims, missing {}",
                expected, missing
            )));
        }
        Ok(())
    }
}

/// Builds the coordinate variables of a dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinateModel {
    dims: Vec<String>,
    static_coords: BTreeMap<String, StaticCoordSpec>,
    dynamic: Vec<(String, DynamicAxis)>,
}

impl CoordinateModel {
    pub fn new(dims: Vec<String>, static_coords: BTreeMap<String, StaticCoordSpec>) -> Self {
        Self {
            dims,
            static_coords,
            dynamic: Vec::new(),
        }
    }

    /// Add an inclusive datetime axis.
    pub fn with_times(
        mut self,
        name: impl Into<String>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        freq: Frequency,
    ) -> Self {
        self.dynamic
            .push((name.into(), DynamicAxis::Times { start, end, freq }));
        self
    }

    /// Add an inclusive duration axis.
    pub fn with_durations(
        mut self,
        name: impl Into<String>,
        start: Duration,
        end: Duration,
        freq: Frequency,
    ) -> Self {
        self.dynamic
            .push((name.into(), DynamicAxis::Durations { start, end, freq }));
        self
    }

    pub fn dims(&self) -> &[String] {
        &self.dims
    }

    pub fn static_names(&self) -> Vec<&str> {
        self.static_coords.keys().map(String::as_str).collect()
    }

    pub fn has_static(&self, name: &str) -> bool {
        self.static_coords.contains_key(name)
    }

    /// Length of each static coordinate, used as its chunk size.
    pub fn static_lengths(&self) -> BTreeMap<String, usize> {
        self.static_coords
            .iter()
            .map(|(name, spec)| (name.clone(), spec.data.materialize().len()))
            .collect()
    }

    pub fn validate(&self, contract: GridContract) -> Result<()> {
        contract.check(&self.dims, &self.static_names())
    }

    /// Materialize every coordinate: static ones first, then dynamic axes
    /// in the order they were added.
    pub fn build(&self) -> Result<Vec<CoordinateVariable>> {
        let mut coords = Vec::with_capacity(self.static_coords.len() + self.dynamic.len());

        for (name, spec) in &self.static_coords {
            coords.push(
                CoordinateVariable::new(name.clone(), spec.data.materialize())
                    .with_attrs(spec.attrs.clone()),
            );
        }

        for (name, axis) in &self.dynamic {
            let values = match axis {
                DynamicAxis::Times { start, end, freq } => {
                    ArrayValues::from_times(&date_range(*start, *end, freq))?
                }
                DynamicAxis::Durations { start, end, freq } => {
                    ArrayValues::from_durations(&duration_range(*start, *end, freq))?
                }
            };
            coords.push(CoordinateVariable::new(name.clone(), values));
        }

        if let Some(empty) = coords.iter().find(|c| c.is_empty()) {
            return Err(StoreError::configuration(format!(
                "coordinate {} has no values",
                empty.name
            )));
        }
        Ok(coords)
    }
}
