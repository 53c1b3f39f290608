//! Core types for the virtual chunk store.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};

/// Free-form attribute mapping attached to the dataset or a variable.
pub type Attributes = serde_json::Map<String, serde_json::Value>;

/// NetCDF default fill for 32-bit integers.
pub const INT32_MISSING: i32 = -2_147_483_647;

/// NetCDF default fill for 64-bit integers.
pub const INT64_MISSING: i64 = -9_223_372_036_854_775_806;

/// Not-a-time marker for datetime and timedelta arrays.
pub const NAT: i64 = i64::MIN;

const ENDIAN: char = if cfg!(target_endian = "little") { '<' } else { '>' };

/// Element type of an array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DType {
    #[default]
    Float32,
    Float64,
    Int32,
    Int64,
    /// Nanoseconds since the Unix epoch.
    DateTime64Ns,
    /// Signed nanosecond durations.
    TimeDelta64Ns,
}

impl DType {
    /// Zarr v2 type string in native byte order, e.g. `<f4`.
    pub fn zarr_str(&self) -> String {
        let code = match self {
            DType::Float32 => "f4",
            DType::Float64 => "f8",
            DType::Int32 => "i4",
            DType::Int64 => "i8",
            DType::DateTime64Ns => "M8[ns]",
            DType::TimeDelta64Ns => "m8[ns]",
        };
        format!("{}{}", ENDIAN, code)
    }

    /// Size of a single element in bytes.
    pub fn item_size(&self) -> usize {
        match self {
            DType::Float32 | DType::Int32 => 4,
            _ => 8,
        }
    }

    pub fn is_float(&self) -> bool {
        matches!(self, DType::Float32 | DType::Float64)
    }

    fn name(&self) -> &'static str {
        match self {
            DType::Float32 => "float32",
            DType::Float64 => "float64",
            DType::Int32 => "int32",
            DType::Int64 => "int64",
            DType::DateTime64Ns => "datetime64[ns]",
            DType::TimeDelta64Ns => "timedelta64[ns]",
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DType {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        let code = s.trim_start_matches(['<', '>', '|', '=']);
        match code {
            "float32" | "f4" => Ok(DType::Float32),
            "float64" | "f8" => Ok(DType::Float64),
            "int32" | "i4" => Ok(DType::Int32),
            "int64" | "i8" => Ok(DType::Int64),
            "datetime64[ns]" | "M8[ns]" => Ok(DType::DateTime64Ns),
            "timedelta64[ns]" | "m8[ns]" => Ok(DType::TimeDelta64Ns),
            _ => Err(StoreError::configuration(format!("unsupported dtype: {}", s))),
        }
    }
}

impl TryFrom<String> for DType {
    type Error = StoreError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<DType> for String {
    fn from(dtype: DType) -> Self {
        dtype.name().to_string()
    }
}

/// Memory layout of chunk bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MemoryOrder {
    /// Row-major.
    #[default]
    C,
    /// Column-major.
    F,
}

/// A flat, typed buffer of array elements.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayValues {
    Float32(Vec<f32>),
    Float64(Vec<f64>),
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    DateTime64Ns(Vec<i64>),
    TimeDelta64Ns(Vec<i64>),
}

impl ArrayValues {
    /// A buffer of `len` missing-value markers for `dtype`.
    pub fn missing(dtype: DType, len: usize) -> Self {
        match dtype {
            DType::Float32 => ArrayValues::Float32(vec![f32::NAN; len]),
            DType::Float64 => ArrayValues::Float64(vec![f64::NAN; len]),
            DType::Int32 => ArrayValues::Int32(vec![INT32_MISSING; len]),
            DType::Int64 => ArrayValues::Int64(vec![INT64_MISSING; len]),
            DType::DateTime64Ns => ArrayValues::DateTime64Ns(vec![NAT; len]),
            DType::TimeDelta64Ns => ArrayValues::TimeDelta64Ns(vec![NAT; len]),
        }
    }

    /// Cast `f64` samples to `dtype`, mapping NaN to the missing marker
    /// for non-float types.
    pub fn from_f64(values: &[f64], dtype: DType) -> Self {
        fn cast<T>(values: &[f64], missing: T, f: impl Fn(f64) -> T) -> Vec<T>
        where
            T: Copy,
        {
            values
                .iter()
                .map(|&v| if v.is_nan() { missing } else { f(v) })
                .collect()
        }

        match dtype {
            DType::Float32 => ArrayValues::Float32(values.iter().map(|&v| v as f32).collect()),
            DType::Float64 => ArrayValues::Float64(values.to_vec()),
            DType::Int32 => ArrayValues::Int32(cast(values, INT32_MISSING, |v| v as i32)),
            DType::Int64 => ArrayValues::Int64(cast(values, INT64_MISSING, |v| v as i64)),
            DType::DateTime64Ns => ArrayValues::DateTime64Ns(cast(values, NAT, |v| v as i64)),
            DType::TimeDelta64Ns => ArrayValues::TimeDelta64Ns(cast(values, NAT, |v| v as i64)),
        }
    }

    /// Encode a sequence of instants as nanoseconds since the epoch.
    pub fn from_times(times: &[DateTime<Utc>]) -> Result<Self> {
        times
            .iter()
            .map(|t| {
                t.timestamp_nanos_opt()
                    .ok_or_else(|| StoreError::configuration(format!("time out of range: {}", t)))
            })
            .collect::<Result<Vec<_>>>()
            .map(ArrayValues::DateTime64Ns)
    }

    /// Encode a sequence of durations as nanoseconds.
    pub fn from_durations(durations: &[Duration]) -> Result<Self> {
        durations
            .iter()
            .map(|d| {
                d.num_nanoseconds()
                    .ok_or_else(|| StoreError::configuration(format!("duration out of range: {}", d)))
            })
            .collect::<Result<Vec<_>>>()
            .map(ArrayValues::TimeDelta64Ns)
    }

    pub fn dtype(&self) -> DType {
        match self {
            ArrayValues::Float32(_) => DType::Float32,
            ArrayValues::Float64(_) => DType::Float64,
            ArrayValues::Int32(_) => DType::Int32,
            ArrayValues::Int64(_) => DType::Int64,
            ArrayValues::DateTime64Ns(_) => DType::DateTime64Ns,
            ArrayValues::TimeDelta64Ns(_) => DType::TimeDelta64Ns,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ArrayValues::Float32(v) => v.len(),
            ArrayValues::Float64(v) => v.len(),
            ArrayValues::Int32(v) => v.len(),
            ArrayValues::Int64(v) => v.len(),
            ArrayValues::DateTime64Ns(v) | ArrayValues::TimeDelta64Ns(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element at `index` as a coordinate value.
    pub fn value_at(&self, index: usize) -> Option<CoordValue> {
        match self {
            ArrayValues::Float32(v) => v.get(index).map(|&x| CoordValue::Float(x as f64)),
            ArrayValues::Float64(v) => v.get(index).map(|&x| CoordValue::Float(x)),
            ArrayValues::Int32(v) => v.get(index).map(|&x| CoordValue::Int(x as i64)),
            ArrayValues::Int64(v) => v.get(index).map(|&x| CoordValue::Int(x)),
            ArrayValues::DateTime64Ns(v) => {
                v.get(index).map(|&ns| CoordValue::Time(Utc.timestamp_nanos(ns)))
            }
            ArrayValues::TimeDelta64Ns(v) => {
                v.get(index).map(|&ns| CoordValue::Duration(Duration::nanoseconds(ns)))
            }
        }
    }

    /// Raw bytes in native byte order, row-major.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            ArrayValues::Float32(v) => bytemuck::cast_slice(v).to_vec(),
            ArrayValues::Float64(v) => bytemuck::cast_slice(v).to_vec(),
            ArrayValues::Int32(v) => bytemuck::cast_slice(v).to_vec(),
            ArrayValues::Int64(v) => bytemuck::cast_slice(v).to_vec(),
            ArrayValues::DateTime64Ns(v) | ArrayValues::TimeDelta64Ns(v) => {
                bytemuck::cast_slice(v).to_vec()
            }
        }
    }

    /// Reinterpret native-order bytes as elements of `dtype`.
    pub fn from_bytes(bytes: &[u8], dtype: DType) -> Result<Self> {
        if bytes.len() % dtype.item_size() != 0 {
            return Err(StoreError::type_contract(format!(
                "{} bytes is not a whole number of {} elements",
                bytes.len(),
                dtype
            )));
        }
        // pod_collect_to_vec copies, so unaligned input is fine
        Ok(match dtype {
            DType::Float32 => ArrayValues::Float32(bytemuck::pod_collect_to_vec(bytes)),
            DType::Float64 => ArrayValues::Float64(bytemuck::pod_collect_to_vec(bytes)),
            DType::Int32 => ArrayValues::Int32(bytemuck::pod_collect_to_vec(bytes)),
            DType::Int64 => ArrayValues::Int64(bytemuck::pod_collect_to_vec(bytes)),
            DType::DateTime64Ns => ArrayValues::DateTime64Ns(bytemuck::pod_collect_to_vec(bytes)),
            DType::TimeDelta64Ns => ArrayValues::TimeDelta64Ns(bytemuck::pod_collect_to_vec(bytes)),
        })
    }

    /// Rearrange row-major elements of an array with `shape` into `order`.
    pub fn into_order(self, shape: &[usize], order: MemoryOrder) -> Self {
        if order == MemoryOrder::C || shape.len() < 2 {
            return self;
        }
        match self {
            ArrayValues::Float32(v) => ArrayValues::Float32(c_to_f(&v, shape)),
            ArrayValues::Float64(v) => ArrayValues::Float64(c_to_f(&v, shape)),
            ArrayValues::Int32(v) => ArrayValues::Int32(c_to_f(&v, shape)),
            ArrayValues::Int64(v) => ArrayValues::Int64(c_to_f(&v, shape)),
            ArrayValues::DateTime64Ns(v) => ArrayValues::DateTime64Ns(c_to_f(&v, shape)),
            ArrayValues::TimeDelta64Ns(v) => ArrayValues::TimeDelta64Ns(c_to_f(&v, shape)),
        }
    }
}

/// Transpose a row-major buffer into column-major layout.
fn c_to_f<T: Copy>(data: &[T], shape: &[usize]) -> Vec<T> {
    let mut f_strides = vec![1usize; shape.len()];
    for axis in 1..shape.len() {
        f_strides[axis] = f_strides[axis - 1] * shape[axis - 1];
    }

    let mut out = data.to_vec();
    let mut index = vec![0usize; shape.len()];
    for &value in data {
        let target: usize = index.iter().zip(&f_strides).map(|(i, s)| i * s).sum();
        out[target] = value;

        // Advance the row-major multi-index
        for axis in (0..shape.len()).rev() {
            index[axis] += 1;
            if index[axis] < shape[axis] {
                break;
            }
            index[axis] = 0;
        }
    }
    out
}

/// A single coordinate value, used to describe chunk origins.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CoordValue {
    Float(f64),
    Int(i64),
    Time(DateTime<Utc>),
    Duration(Duration),
}

impl CoordValue {
    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            CoordValue::Time(t) => Some(*t),
            _ => None,
        }
    }

    pub fn as_duration(&self) -> Option<Duration> {
        match self {
            CoordValue::Duration(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CoordValue::Float(v) => Some(*v),
            CoordValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }
}

impl fmt::Display for CoordValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoordValue::Float(v) => write!(f, "{}", v),
            CoordValue::Int(v) => write!(f, "{}", v),
            CoordValue::Time(t) => write!(f, "{}", t.to_rfc3339()),
            CoordValue::Duration(d) => write!(f, "{}", d),
        }
    }
}

/// A chunk of data produced by a loader, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkArray {
    pub shape: Vec<usize>,
    pub values: ArrayValues,
}

impl ChunkArray {
    pub fn new(shape: Vec<usize>, values: ArrayValues) -> Self {
        Self { shape, values }
    }

    /// A float32 chunk filled with a single value.
    pub fn filled_f32(shape: Vec<usize>, value: f32) -> Self {
        let len = shape.iter().product();
        Self::new(shape, ArrayValues::Float32(vec![value; len]))
    }

    pub fn dtype(&self) -> DType {
        self.values.dtype()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A materialized one-dimensional coordinate. Its dimension is its name.
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinateVariable {
    pub name: String,
    pub values: ArrayValues,
    pub attrs: Attributes,
}

impl CoordinateVariable {
    pub fn new(name: impl Into<String>, values: ArrayValues) -> Self {
        Self {
            name: name.into(),
            values,
            attrs: Attributes::new(),
        }
    }

    pub fn with_attrs(mut self, attrs: Attributes) -> Self {
        self.attrs = attrs;
        self
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn dtype(&self) -> DType {
        self.values.dtype()
    }
}

/// Everything needed to describe a lazily materialized data variable.
#[derive(Debug, Clone, PartialEq)]
pub struct DataVariableDescriptor {
    pub name: String,
    pub dims: Vec<String>,
    pub dtype: DType,
    pub shape: Vec<usize>,
    pub chunks: Vec<usize>,
    pub order: MemoryOrder,
    pub attrs: Attributes,
}

impl DataVariableDescriptor {
    /// Number of chunks along each dimension.
    pub fn chunk_counts(&self) -> Vec<usize> {
        self.shape
            .iter()
            .zip(&self.chunks)
            .map(|(len, chunk)| len / chunk)
            .collect()
    }

    /// Number of elements in a single chunk.
    pub fn chunk_len(&self) -> usize {
        self.chunks.iter().product()
    }
}

/// Coordinate value at the first element of a chunk, per dimension.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChunkOrigin {
    entries: Vec<(String, CoordValue)>,
}

impl ChunkOrigin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, dim: impl Into<String>, value: CoordValue) {
        self.entries.push((dim.into(), value));
    }

    pub fn with(mut self, dim: impl Into<String>, value: CoordValue) -> Self {
        self.insert(dim, value);
        self
    }

    pub fn get(&self, dim: &str) -> Option<&CoordValue> {
        self.entries.iter().find(|(d, _)| d == dim).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CoordValue)> {
        self.entries.iter().map(|(d, v)| (d.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for ChunkOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.iter().map(|(d, v)| format!("{}={}", d, v)).collect();
        write!(f, "{{{}}}", parts.join(", "))
    }
}
