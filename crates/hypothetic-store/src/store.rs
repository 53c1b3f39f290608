//! Read-only virtual Zarr v2 store whose data chunks are produced on
//! demand by a [`ChunkLoader`].

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::error::{Result, StoreError};
use crate::loader::ChunkLoader;
use crate::metadata::{variable_attrs, ArrayMetadata, MetadataDocument, ROOT_KEYS, VARIABLE_KEYS};
use crate::types::{
    ArrayValues, Attributes, ChunkArray, ChunkOrigin, CoordinateVariable, DType, DataVariableDescriptor,
    MemoryOrder,
};

/// String-keyed, byte-valued mapping in the Zarr v2 key layout.
#[async_trait]
pub trait Store: Send + Sync {
    async fn get(&self, key: &str) -> Result<Bytes>;

    async fn set(&self, key: &str, value: Bytes) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;

    async fn clear(&self) -> Result<()>;

    /// Whether `key` exists. The default implementation reads the value.
    async fn contains(&self, key: &str) -> Result<bool> {
        match self.get(key).await {
            Ok(_) => Ok(true),
            Err(StoreError::KeyNotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl<T: Store + ?Sized> Store for Arc<T> {
    async fn get(&self, key: &str) -> Result<Bytes> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: Bytes) -> Result<()> {
        (**self).set(key, value).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        (**self).delete(key).await
    }

    async fn clear(&self) -> Result<()> {
        (**self).clear().await
    }

    async fn contains(&self, key: &str) -> Result<bool> {
        (**self).contains(key).await
    }
}

/// A variable of the store, resolved once at construction.
#[derive(Debug, Clone, PartialEq)]
pub enum VariableKind {
    /// Held in memory, always a single chunk.
    Coordinate(CoordinateVariable),
    /// Materialized chunk by chunk through the loader.
    Data(DataVariableDescriptor),
}

impl VariableKind {
    pub fn name(&self) -> &str {
        match self {
            VariableKind::Coordinate(c) => &c.name,
            VariableKind::Data(d) => &d.name,
        }
    }

    /// Number of chunks along each of the variable's dimensions.
    pub fn chunk_counts(&self) -> Vec<usize> {
        match self {
            VariableKind::Coordinate(_) => vec![1],
            VariableKind::Data(d) => d.chunk_counts(),
        }
    }
}

/// Collects the inputs of a [`VirtualChunkStore`].
#[derive(Debug, Clone)]
pub struct VirtualChunkStoreBuilder {
    dims: Vec<String>,
    coords: Vec<CoordinateVariable>,
    data_vars: Vec<String>,
    chunks: HashMap<String, usize>,
    dtypes: HashMap<String, DType>,
    variable_attrs: HashMap<String, Attributes>,
    attrs: Attributes,
    order: MemoryOrder,
}

impl VirtualChunkStoreBuilder {
    /// Chunk size along `dim`. Unset dimensions use 1.
    pub fn chunk(mut self, dim: impl Into<String>, size: usize) -> Self {
        self.chunks.insert(dim.into(), size);
        self
    }

    pub fn chunks<I, S>(mut self, chunks: I) -> Self
    where
        I: IntoIterator<Item = (S, usize)>,
        S: Into<String>,
    {
        self.chunks
            .extend(chunks.into_iter().map(|(dim, size)| (dim.into(), size)));
        self
    }

    /// Element type of a data variable. Unset variables use float32.
    pub fn dtype(mut self, variable: impl Into<String>, dtype: DType) -> Self {
        self.dtypes.insert(variable.into(), dtype);
        self
    }

    pub fn dtypes<I, S>(mut self, dtypes: I) -> Self
    where
        I: IntoIterator<Item = (S, DType)>,
        S: Into<String>,
    {
        self.dtypes
            .extend(dtypes.into_iter().map(|(name, dtype)| (name.into(), dtype)));
        self
    }

    /// Attributes of a data variable.
    pub fn variable_attrs(mut self, variable: impl Into<String>, attrs: Attributes) -> Self {
        self.variable_attrs.insert(variable.into(), attrs);
        self
    }

    /// Global dataset attributes.
    pub fn attrs(mut self, attrs: Attributes) -> Self {
        self.attrs = attrs;
        self
    }

    /// Memory order of every data variable's chunks.
    pub fn order(mut self, order: MemoryOrder) -> Self {
        self.order = order;
        self
    }

    pub fn build(self, loader: Arc<dyn ChunkLoader>) -> Result<VirtualChunkStore> {
        if self.dims.is_empty() {
            return Err(StoreError::configuration("a store needs at least one dimension"));
        }

        let mut variables = Vec::with_capacity(self.coords.len() + self.data_vars.len());
        let mut index = HashMap::new();

        for coord in self.coords {
            if coord.is_empty() {
                return Err(StoreError::configuration(format!(
                    "coordinate {} has no values",
                    coord.name
                )));
            }
            if index.insert(coord.name.clone(), variables.len()).is_some() {
                return Err(StoreError::configuration(format!(
                    "coordinate {} declared twice",
                    coord.name
                )));
            }
            variables.push(VariableKind::Coordinate(coord));
        }

        let mut shape = Vec::with_capacity(self.dims.len());
        let mut chunks = Vec::with_capacity(self.dims.len());
        for dim in &self.dims {
            let len = match index.get(dim).map(|&i| &variables[i]) {
                Some(VariableKind::Coordinate(coord)) => coord.len(),
                _ => {
                    return Err(StoreError::configuration(format!(
                        "dimension {} has no coordinate",
                        dim
                    )))
                }
            };
            let chunk = self.chunks.get(dim).copied().unwrap_or(1);
            if chunk == 0 || len % chunk != 0 {
                return Err(StoreError::configuration(format!(
                    "chunk size {} does not evenly divide dimension {} of size {}",
                    chunk, dim, len
                )));
            }
            shape.push(len);
            chunks.push(chunk);
        }

        for name in self.data_vars {
            if index.contains_key(&name) {
                return Err(StoreError::configuration(format!(
                    "data variable {} clashes with an existing variable",
                    name
                )));
            }
            let descriptor = DataVariableDescriptor {
                dtype: self.dtypes.get(&name).copied().unwrap_or_default(),
                attrs: self.variable_attrs.get(&name).cloned().unwrap_or_default(),
                name: name.clone(),
                dims: self.dims.clone(),
                shape: shape.clone(),
                chunks: chunks.clone(),
                order: self.order,
            };
            index.insert(name, variables.len());
            variables.push(VariableKind::Data(descriptor));
        }

        for name in self.dtypes.keys() {
            if !matches!(index.get(name).map(|&i| &variables[i]), Some(VariableKind::Data(_))) {
                warn!(variable = %name, "dtype override for unknown data variable ignored");
            }
        }

        let metadata = build_metadata(&variables, &self.attrs)?;

        info!(
            dims = ?self.dims,
            variables = variables.len(),
            "Created virtual chunk store"
        );

        Ok(VirtualChunkStore {
            dims: self.dims,
            variables,
            index,
            loader,
            metadata,
            attrs: self.attrs,
        })
    }
}

fn build_metadata(variables: &[VariableKind], attrs: &Attributes) -> Result<MetadataDocument> {
    let mut doc = MetadataDocument::new(attrs);
    for variable in variables {
        match variable {
            VariableKind::Coordinate(coord) => {
                let array = ArrayMetadata::uncompressed(
                    vec![coord.len()],
                    vec![coord.len()],
                    coord.dtype().zarr_str(),
                    MemoryOrder::C,
                );
                doc.add_variable(&coord.name, &array, variable_attrs(&[coord.name.clone()], &coord.attrs))?;
            }
            VariableKind::Data(data) => {
                let array = ArrayMetadata::uncompressed(
                    data.shape.clone(),
                    data.chunks.clone(),
                    data.dtype.zarr_str(),
                    data.order,
                );
                doc.add_variable(&data.name, &array, variable_attrs(&data.dims, &data.attrs))?;
            }
        }
    }
    doc.seal()
}

/// Read-only store exposing coordinates from memory and data chunks
/// through a loader.
///
/// Every data chunk read is a pure function of the variable and chunk
/// index; nothing is cached here. Wrap in a
/// [`CachingOverlay`](crate::overlay::CachingOverlay) to persist chunks.
pub struct VirtualChunkStore {
    dims: Vec<String>,
    variables: Vec<VariableKind>,
    index: HashMap<String, usize>,
    loader: Arc<dyn ChunkLoader>,
    metadata: MetadataDocument,
    attrs: Attributes,
}

impl VirtualChunkStore {
    /// Start building a store over `dims`, whose coordinates must all be in
    /// `coords`, with one lazily loaded variable per entry of `data_vars`.
    pub fn builder(
        dims: Vec<String>,
        coords: Vec<CoordinateVariable>,
        data_vars: Vec<String>,
    ) -> VirtualChunkStoreBuilder {
        VirtualChunkStoreBuilder {
            dims,
            coords,
            data_vars,
            chunks: HashMap::new(),
            dtypes: HashMap::new(),
            variable_attrs: HashMap::new(),
            attrs: Attributes::new(),
            order: MemoryOrder::C,
        }
    }

    pub fn dims(&self) -> &[String] {
        &self.dims
    }

    pub fn attrs(&self) -> &Attributes {
        &self.attrs
    }

    pub fn metadata(&self) -> &MetadataDocument {
        &self.metadata
    }

    pub fn variable(&self, name: &str) -> Option<&VariableKind> {
        self.index.get(name).map(|&i| &self.variables[i])
    }

    pub fn variables(&self) -> &[VariableKind] {
        &self.variables
    }

    pub fn coordinates(&self) -> impl Iterator<Item = &CoordinateVariable> {
        self.variables.iter().filter_map(|v| match v {
            VariableKind::Coordinate(c) => Some(c),
            VariableKind::Data(_) => None,
        })
    }

    pub fn data_variables(&self) -> impl Iterator<Item = &DataVariableDescriptor> {
        self.variables.iter().filter_map(|v| match v {
            VariableKind::Data(d) => Some(d),
            VariableKind::Coordinate(_) => None,
        })
    }

    /// Size of each dimension, in declared order.
    pub fn dim_sizes(&self) -> Vec<(String, usize)> {
        self.dims
            .iter()
            .map(|dim| {
                let len = match self.variable(dim) {
                    Some(VariableKind::Coordinate(c)) => c.len(),
                    _ => 0,
                };
                (dim.clone(), len)
            })
            .collect()
    }

    /// Every key of the store: root metadata, then per variable its
    /// metadata followed by all chunk keys.
    ///
    /// Cost is proportional to the total number of chunks.
    pub fn keys(&self) -> impl Iterator<Item = String> + '_ {
        let root = ROOT_KEYS.iter().map(|k| k.to_string());
        let variables = self.variables.iter().flat_map(|variable| {
            let name = variable.name();
            let meta = VARIABLE_KEYS.iter().map(move |k| format!("{}/{}", name, k));
            let chunks = ChunkIndices::new(variable.chunk_counts())
                .map(move |index| format!("{}/{}", name, join_indices(&index)));
            meta.chain(chunks)
        });
        root.chain(variables)
    }

    /// Number of keys, computed without enumerating them.
    pub fn len(&self) -> usize {
        ROOT_KEYS.len()
            + self
                .variables
                .iter()
                .map(|v| VARIABLE_KEYS.len() + v.chunk_counts().iter().product::<usize>())
                .sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Coordinate value at the first element of a data chunk, or `None`
    /// when the index tuple does not address a chunk.
    pub fn chunk_origin(&self, descriptor: &DataVariableDescriptor, indices: &[usize]) -> Option<ChunkOrigin> {
        if indices.len() != descriptor.dims.len() {
            return None;
        }
        let mut origin = ChunkOrigin::new();
        for ((dim, &index), &chunk) in descriptor.dims.iter().zip(indices).zip(&descriptor.chunks) {
            let coord = match self.variable(dim)? {
                VariableKind::Coordinate(c) => c,
                VariableKind::Data(_) => return None,
            };
            let value = coord.values.value_at(index.checked_mul(chunk)?)?;
            origin.insert(dim.clone(), value);
        }
        Some(origin)
    }

    fn resolve_chunk_key<'a>(&'a self, key: &str) -> Result<(&'a VariableKind, Vec<usize>)> {
        let (name, tail) = key
            .split_once('/')
            .ok_or_else(|| StoreError::key_not_found(key))?;
        let variable = self
            .variable(name)
            .ok_or_else(|| StoreError::key_not_found(key))?;
        let indices = parse_indices(tail).ok_or_else(|| StoreError::key_not_found(key))?;
        let addressable = match variable {
            VariableKind::Coordinate(_) => indices == [0],
            VariableKind::Data(descriptor) => indices.len() == descriptor.dims.len(),
        };
        if !addressable {
            return Err(StoreError::key_not_found(key));
        }
        Ok((variable, indices))
    }

    async fn read_chunk(&self, key: &str, descriptor: &DataVariableDescriptor, indices: &[usize]) -> Result<Bytes> {
        let origin = self
            .chunk_origin(descriptor, indices)
            .ok_or_else(|| StoreError::key_not_found(key))?;

        debug!(key = %key, origin = %origin, "Loading chunk");

        let loaded = match self.loader.load(&origin, &descriptor.name).await {
            Ok(loaded) => loaded,
            Err(StoreError::NotFound(address)) => {
                info!(key = %key, address = %address, "Chunk source not found");
                None
            }
            Err(e) => return Err(e),
        };

        let values = match loaded {
            Some(array) => {
                check_contract(descriptor, &array)?;
                array.values
            }
            None => {
                debug!(key = %key, "Filling chunk with missing values");
                ArrayValues::missing(descriptor.dtype, descriptor.chunk_len())
            }
        };

        Ok(Bytes::from(
            values.into_order(&descriptor.chunks, descriptor.order).to_bytes(),
        ))
    }
}

fn check_contract(descriptor: &DataVariableDescriptor, array: &ChunkArray) -> Result<()> {
    if array.dtype() != descriptor.dtype {
        return Err(StoreError::type_contract(format!(
            "loader returned {} for {} declared as {}",
            array.dtype(),
            descriptor.name,
            descriptor.dtype
        )));
    }
    if array.shape.iter().product::<usize>() != array.len() {
        return Err(StoreError::type_contract(format!(
            "loader returned shape {:?} with {} values",
            array.shape,
            array.len()
        )));
    }
    if array.len() != descriptor.chunk_len() {
        return Err(StoreError::type_contract(format!(
            "loader returned shape {:?} for {} chunks of shape {:?}",
            array.shape, descriptor.name, descriptor.chunks
        )));
    }
    Ok(())
}

#[async_trait]
impl Store for VirtualChunkStore {
    async fn get(&self, key: &str) -> Result<Bytes> {
        if let Some(doc) = self.metadata.get(key) {
            debug!(key = %key, "Serving metadata");
            return Ok(doc);
        }

        match self.resolve_chunk_key(key)? {
            (VariableKind::Coordinate(coord), _) => Ok(Bytes::from(coord.values.to_bytes())),
            (VariableKind::Data(descriptor), indices) => self.read_chunk(key, descriptor, &indices).await,
        }
    }

    async fn set(&self, _key: &str, _value: Bytes) -> Result<()> {
        Err(StoreError::UnsupportedOperation("set"))
    }

    async fn delete(&self, _key: &str) -> Result<()> {
        Err(StoreError::UnsupportedOperation("delete"))
    }

    async fn clear(&self) -> Result<()> {
        Err(StoreError::UnsupportedOperation("clear"))
    }

    /// Answers from the key layout without invoking the loader.
    async fn contains(&self, key: &str) -> Result<bool> {
        if self.metadata.get(key).is_some() {
            return Ok(true);
        }
        Ok(match self.resolve_chunk_key(key) {
            Ok((VariableKind::Coordinate(_), _)) => true,
            Ok((VariableKind::Data(descriptor), indices)) => self.chunk_origin(descriptor, &indices).is_some(),
            Err(_) => false,
        })
    }
}

impl PartialEq for VirtualChunkStore {
    /// Compares dims, data variable descriptors and coordinates. Loaders
    /// and chunk contents are not compared.
    fn eq(&self, other: &Self) -> bool {
        fn by_name(store: &VirtualChunkStore) -> BTreeMap<&str, &VariableKind> {
            store.variables.iter().map(|v| (v.name(), v)).collect()
        }
        self.dims == other.dims && by_name(self) == by_name(other)
    }
}

impl fmt::Debug for VirtualChunkStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VirtualChunkStore")
            .field("dims", &self.dims)
            .field("variables", &self.variables.iter().map(|v| v.name()).collect::<Vec<_>>())
            .field("attrs", &self.attrs)
            .finish_non_exhaustive()
    }
}

/// Dot-separated chunk indices in the form `keys()` writes them: ASCII
/// digits only, no sign, no leading zeros.
fn parse_indices(s: &str) -> Option<Vec<usize>> {
    s.split('.')
        .map(|part| {
            let canonical = !part.is_empty()
                && part.bytes().all(|b| b.is_ascii_digit())
                && (part == "0" || !part.starts_with('0'));
            if canonical {
                part.parse().ok()
            } else {
                None
            }
        })
        .collect()
}

fn join_indices(indices: &[usize]) -> String {
    indices
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(".")
}

/// Row-major walk over every chunk index tuple of a grid.
struct ChunkIndices {
    counts: Vec<usize>,
    next: Option<Vec<usize>>,
}

impl ChunkIndices {
    fn new(counts: Vec<usize>) -> Self {
        let next = if counts.iter().any(|&c| c == 0) {
            None
        } else {
            Some(vec![0; counts.len()])
        };
        Self { counts, next }
    }
}

impl Iterator for ChunkIndices {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next.take()?;
        let mut successor = current.clone();
        for axis in (0..self.counts.len()).rev() {
            successor[axis] += 1;
            if successor[axis] < self.counts[axis] {
                self.next = Some(successor);
                break;
            }
            successor[axis] = 0;
        }
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_indices_row_major() {
        let indices: Vec<Vec<usize>> = ChunkIndices::new(vec![2, 1, 3]).collect();
        assert_eq!(
            indices,
            vec![
                vec![0, 0, 0],
                vec![0, 0, 1],
                vec![0, 0, 2],
                vec![1, 0, 0],
                vec![1, 0, 1],
                vec![1, 0, 2]
            ]
        );
        assert_eq!(ChunkIndices::new(vec![0, 4]).count(), 0);
    }

    #[test]
    fn test_parse_indices() {
        assert_eq!(parse_indices("0.12.3"), Some(vec![0, 12, 3]));
        assert_eq!(parse_indices("0"), Some(vec![0]));
        assert_eq!(parse_indices("0..1"), None);
        assert_eq!(parse_indices("a.0"), None);
        assert_eq!(parse_indices("-1"), None);
        assert_eq!(parse_indices("+1"), None);
        assert_eq!(parse_indices("01.0"), None);
        assert_eq!(parse_indices("0.00"), None);
        assert_eq!(parse_indices(""), None);
        assert_eq!(parse_indices("10.0"), Some(vec![10, 0]));
        assert_eq!(join_indices(&[4, 0, 2]), "4.0.2");
    }
}
