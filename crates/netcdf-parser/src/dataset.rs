//! In-memory view of a decoded gridded-data file.

use std::collections::BTreeMap;

use crate::error::{NetCdfError, NetCdfResult};

/// CF attribute marking missing values.
pub const FILL_VALUE_ATTR: &str = "_FillValue";
/// Alternative CF attribute marking missing values.
pub const MISSING_VALUE_ATTR: &str = "missing_value";
pub const SCALE_FACTOR_ATTR: &str = "scale_factor";
pub const ADD_OFFSET_ATTR: &str = "add_offset";

/// One variable of a decoded file.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedVariable {
    pub name: String,
    pub dims: Vec<String>,
    pub shape: Vec<usize>,
    /// Unpacked values in row-major order, `None` for non-numeric variables.
    pub values: Option<Vec<f64>>,
    /// Numeric attributes.
    pub attrs: BTreeMap<String, f64>,
}

impl DecodedVariable {
    pub fn new(name: impl Into<String>, dims: Vec<String>, shape: Vec<usize>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            dims,
            shape,
            values: Some(values),
            attrs: BTreeMap::new(),
        }
    }

    /// A variable that carries only metadata, such as a grid mapping.
    pub fn scalar_marker(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dims: Vec::new(),
            shape: Vec::new(),
            values: None,
            attrs: BTreeMap::new(),
        }
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: f64) -> Self {
        self.attrs.insert(name.into(), value);
        self
    }

    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Values with CF packing removed: fill values become NaN, then
    /// `scale_factor` and `add_offset` are applied.
    pub fn unpacked_values(&self) -> NetCdfResult<Vec<f64>> {
        let raw = self
            .values
            .as_ref()
            .ok_or_else(|| NetCdfError::MissingData(format!("numeric values of {}", self.name)))?;
        if raw.len() != self.len() {
            return Err(NetCdfError::InvalidFormat(format!(
                "{} has {} values for shape {:?}",
                self.name,
                raw.len(),
                self.shape
            )));
        }

        let fill = self.attrs.get(FILL_VALUE_ATTR).copied();
        let missing = self.attrs.get(MISSING_VALUE_ATTR).copied();
        let scale = self.attrs.get(SCALE_FACTOR_ATTR).copied().unwrap_or(1.0);
        let offset = self.attrs.get(ADD_OFFSET_ATTR).copied().unwrap_or(0.0);

        Ok(raw
            .iter()
            .map(|&v| {
                if Some(v) == fill || Some(v) == missing {
                    f64::NAN
                } else {
                    v * scale + offset
                }
            })
            .collect())
    }
}

/// A decoded file: its variables in file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedDataset {
    pub variables: Vec<DecodedVariable>,
}

impl DecodedDataset {
    pub fn new(variables: Vec<DecodedVariable>) -> Self {
        Self { variables }
    }

    pub fn variable_names(&self) -> impl Iterator<Item = &str> {
        self.variables.iter().map(|v| v.name.as_str())
    }

    pub fn variable(&self, name: &str) -> Option<&DecodedVariable> {
        self.variables.iter().find(|v| v.name == name)
    }

    /// Dimension names and sizes, in order of first appearance.
    pub fn dimensions(&self) -> Vec<(String, usize)> {
        let mut dims: Vec<(String, usize)> = Vec::new();
        for variable in &self.variables {
            for (name, &len) in variable.dims.iter().zip(&variable.shape) {
                if !dims.iter().any(|(d, _)| d == name) {
                    dims.push((name.clone(), len));
                }
            }
        }
        dims
    }
}

/// Turns the raw bytes of a file into a [`DecodedDataset`].
pub trait DatasetDecoder: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> NetCdfResult<DecodedDataset>;
}

impl<T: DatasetDecoder + ?Sized> DatasetDecoder for std::sync::Arc<T> {
    fn decode(&self, bytes: &[u8]) -> NetCdfResult<DecodedDataset> {
        (**self).decode(bytes)
    }
}
