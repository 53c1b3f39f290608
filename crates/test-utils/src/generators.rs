//! Test data generators for synthetic forecast fields and coordinates.
//!
//! Generated values are predictable so tests can check that a chunk was
//! read from the right file and kept its element order.

use std::collections::BTreeMap;

use hypothetic_store::{Attributes, CoordinateData, LinearSpacing, StaticCoordSpec};
use netcdf_parser::{DecodedDataset, DecodedVariable};
use serde_json::json;

/// Creates a field whose values are their own row-major index.
///
/// # Example
///
/// ```
/// use test_utils::create_index_field;
///
/// let field = create_index_field(&[2, 3]);
/// assert_eq!(field, vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
/// ```
pub fn create_index_field(shape: &[usize]) -> Vec<f64> {
    let len: usize = shape.iter().product();
    (0..len).map(|i| i as f64).collect()
}

/// Creates a field filled with one value.
pub fn create_constant_field(shape: &[usize], value: f64) -> Vec<f64> {
    vec![value; shape.iter().product()]
}

/// Creates a temperature-like field in Kelvin.
///
/// Values run from 250K in the first cell towards 310K in the last,
/// graded along both horizontal axes.
pub fn create_temperature_field(width: usize, height: usize) -> Vec<f64> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            let x_factor = col as f64 / width.max(1) as f64;
            let y_factor = row as f64 / height.max(1) as f64;
            data.push(250.0 + x_factor * 30.0 + y_factor * 30.0);
        }
    }
    data
}

/// A static coordinate with `num` evenly spaced values.
pub fn linear_coord(start: f64, stop: f64, num: usize, axis: &str, units: &str) -> StaticCoordSpec {
    let mut attrs = Attributes::new();
    attrs.insert("axis".to_string(), json!(axis));
    attrs.insert("units".to_string(), json!(units));
    StaticCoordSpec {
        data: CoordinateData::Linear(LinearSpacing { start, stop, num }),
        attrs,
    }
}

/// A static coordinate listing integer values, such as ensemble members.
pub fn integer_coord(values: &[i64]) -> StaticCoordSpec {
    StaticCoordSpec {
        data: CoordinateData::Integers(values.to_vec()),
        attrs: Attributes::new(),
    }
}

/// Projected `y`/`x` coordinates of an `ny` × `nx` grid at 2 km spacing.
pub fn projected_static_coords(ny: usize, nx: usize) -> BTreeMap<String, StaticCoordSpec> {
    let mut coords = BTreeMap::new();
    coords.insert(
        "projection_y_coordinate".to_string(),
        linear_coord(0.0, 2000.0 * (ny.max(1) - 1) as f64, ny, "y", "m"),
    );
    coords.insert(
        "projection_x_coordinate".to_string(),
        linear_coord(0.0, 2000.0 * (nx.max(1) - 1) as f64, nx, "x", "m"),
    );
    coords
}

/// Owned dimension names.
pub fn dims(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

/// A decoded forecast file on a projected grid holding one data variable,
/// shaped like a MOGREPS-UK field: `[realization, y, x]` when
/// `realizations > 0`, `[y, x]` otherwise.
pub fn create_forecast_file(
    variable: &str,
    realizations: usize,
    ny: usize,
    nx: usize,
    values: Vec<f64>,
) -> DecodedDataset {
    let (field_dims, field_shape) = if realizations > 0 {
        (
            dims(&["realization", "projection_y_coordinate", "projection_x_coordinate"]),
            vec![realizations, ny, nx],
        )
    } else {
        (
            dims(&["projection_y_coordinate", "projection_x_coordinate"]),
            vec![ny, nx],
        )
    };

    let mut variables = vec![
        DecodedVariable::new(
            "projection_y_coordinate",
            dims(&["projection_y_coordinate"]),
            vec![ny],
            (0..ny).map(|i| i as f64 * 2000.0).collect(),
        ),
        DecodedVariable::new(
            "projection_x_coordinate",
            dims(&["projection_x_coordinate"]),
            vec![nx],
            (0..nx).map(|i| i as f64 * 2000.0).collect(),
        ),
        DecodedVariable::new("forecast_period", Vec::new(), Vec::new(), vec![0.0]),
        DecodedVariable::new("forecast_reference_time", Vec::new(), Vec::new(), vec![0.0]),
        DecodedVariable::new("time", Vec::new(), Vec::new(), vec![0.0]),
        DecodedVariable::scalar_marker("lambert_azimuthal_equal_area"),
        DecodedVariable::new(variable, field_dims, field_shape, values),
    ];
    if realizations > 0 {
        variables.insert(
            0,
            DecodedVariable::new(
                "realization",
                dims(&["realization"]),
                vec![realizations],
                (0..realizations).map(|i| i as f64).collect(),
            ),
        );
    }
    DecodedDataset::new(variables)
}

/// A decoded daily file indexed by `time`, shaped `[times, y, x]`.
pub fn create_single_time_file(
    variable: &str,
    times: usize,
    ny: usize,
    nx: usize,
    values: Vec<f64>,
) -> DecodedDataset {
    DecodedDataset::new(vec![
        DecodedVariable::new("time", dims(&["time"]), vec![times], create_index_field(&[times])),
        DecodedVariable::new(
            "projection_y_coordinate",
            dims(&["projection_y_coordinate"]),
            vec![ny],
            create_index_field(&[ny]),
        ),
        DecodedVariable::new(
            "projection_x_coordinate",
            dims(&["projection_x_coordinate"]),
            vec![nx],
            create_index_field(&[nx]),
        ),
        DecodedVariable::new(
            "time_bnds",
            dims(&["time", "bnds"]),
            vec![times, 2],
            create_index_field(&[times, 2]),
        ),
        DecodedVariable::scalar_marker("transverse_mercator"),
        DecodedVariable::new(
            variable,
            dims(&["time", "projection_y_coordinate", "projection_x_coordinate"]),
            vec![times, ny, nx],
            values,
        ),
    ])
}
