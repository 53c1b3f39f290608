//! Zarr v2 metadata documents, built once per store.

use std::collections::HashMap;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::Result;
use crate::types::{Attributes, MemoryOrder};

pub const GROUP_KEY: &str = ".zgroup";
pub const ATTRS_KEY: &str = ".zattrs";
pub const ARRAY_KEY: &str = ".zarray";
pub const CONSOLIDATED_KEY: &str = ".zmetadata";

/// Keys at the top of every store, in enumeration order.
pub const ROOT_KEYS: [&str; 3] = [GROUP_KEY, ATTRS_KEY, CONSOLIDATED_KEY];

/// Per-variable metadata keys, in enumeration order.
pub const VARIABLE_KEYS: [&str; 2] = [ARRAY_KEY, ATTRS_KEY];

/// Attribute naming a variable's dimensions.
pub const ARRAY_DIMENSIONS: &str = "_ARRAY_DIMENSIONS";

const ZARR_FORMAT: u8 = 2;

/// Contents of a `.zarray` document. Fields are declared in key order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayMetadata {
    pub chunks: Vec<usize>,
    pub compressor: Option<Value>,
    pub dtype: String,
    pub fill_value: Option<Value>,
    pub filters: Option<Vec<Value>>,
    pub order: MemoryOrder,
    pub shape: Vec<usize>,
    pub zarr_format: u8,
}

impl ArrayMetadata {
    /// Uncompressed, unfiltered array without a fill value.
    pub fn uncompressed(shape: Vec<usize>, chunks: Vec<usize>, dtype: String, order: MemoryOrder) -> Self {
        Self {
            chunks,
            compressor: None,
            dtype,
            fill_value: None,
            filters: None,
            order,
            shape,
            zarr_format: ZARR_FORMAT,
        }
    }
}

/// Variable attributes with the dimension list in front.
pub fn variable_attrs(dims: &[String], attrs: &Attributes) -> Value {
    let mut doc = Map::new();
    doc.insert(ARRAY_DIMENSIONS.to_string(), json!(dims));
    for (k, v) in attrs {
        doc.insert(k.clone(), v.clone());
    }
    Value::Object(doc)
}

/// Consolidated metadata plus every individual document, pre-encoded.
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataDocument {
    entries: Map<String, Value>,
    encoded: HashMap<String, Bytes>,
}

impl MetadataDocument {
    pub fn new(attrs: &Attributes) -> Self {
        let mut doc = Self {
            entries: Map::new(),
            encoded: HashMap::new(),
        };
        doc.entries.insert(GROUP_KEY.to_string(), json!({ "zarr_format": ZARR_FORMAT }));
        doc.entries.insert(ATTRS_KEY.to_string(), Value::Object(attrs.clone()));
        doc
    }

    /// Register the `.zarray` and `.zattrs` documents of a variable.
    pub fn add_variable(&mut self, name: &str, array: &ArrayMetadata, attrs: Value) -> Result<()> {
        self.entries
            .insert(format!("{}/{}", name, ARRAY_KEY), serde_json::to_value(array)?);
        self.entries.insert(format!("{}/{}", name, ATTRS_KEY), attrs);
        Ok(())
    }

    /// Encode every document, including the consolidated one.
    pub fn seal(mut self) -> Result<Self> {
        let mut encoded = HashMap::with_capacity(self.entries.len() + 1);
        for (key, value) in &self.entries {
            encoded.insert(key.clone(), Bytes::from(serde_json::to_vec(value)?));
        }
        let consolidated = json!({
            "metadata": self.entries,
            "zarr_consolidated_format": 1,
        });
        encoded.insert(CONSOLIDATED_KEY.to_string(), Bytes::from(serde_json::to_vec(&consolidated)?));
        self.encoded = encoded;
        Ok(self)
    }

    /// Encoded document for a metadata key.
    pub fn get(&self, key: &str) -> Option<Bytes> {
        self.encoded.get(key).cloned()
    }

    /// Parsed document for a metadata key other than `.zmetadata`.
    pub fn entry(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// All documents except `.zmetadata`, keyed by store key.
    pub fn entries(&self) -> &Map<String, Value> {
        &self.entries
    }
}
