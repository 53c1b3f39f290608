//! [`DatasetDecoder`] over libnetcdf. Bytes are staged in a scratch file,
//! in memory-backed `/dev/shm` where available.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Once;

use tracing::debug;

use crate::dataset::{DatasetDecoder, DecodedDataset, DecodedVariable};
use crate::error::{NetCdfError, NetCdfResult};

/// Turn off HDF5's automatic error stack printing, which fires even for
/// errors the decoder handles. Runs once per process.
pub fn silence_hdf5_errors() {
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        // SAFETY: a null handler and client data disable automatic printing.
        unsafe {
            hdf5_metno_sys::h5e::H5Eset_auto2(
                hdf5_metno_sys::h5e::H5E_DEFAULT,
                None,
                std::ptr::null_mut(),
            );
        }
    });
}

/// Decoder backed by libnetcdf.
#[derive(Debug, Clone, Copy, Default)]
pub struct NetCdfDecoder;

impl NetCdfDecoder {
    pub fn new() -> Self {
        silence_hdf5_errors();
        Self
    }
}

impl DatasetDecoder for NetCdfDecoder {
    fn decode(&self, bytes: &[u8]) -> NetCdfResult<DecodedDataset> {
        let temp = TempFile::create(bytes)?;

        let file = netcdf::open(&temp.path)
            .map_err(|e| NetCdfError::InvalidFormat(format!("Failed to open NetCDF: {}", e)))?;

        let mut variables = Vec::new();
        for var in file.variables() {
            let name = var.name();
            let dims: Vec<String> = var.dimensions().iter().map(|d| d.name()).collect();
            let shape: Vec<usize> = var.dimensions().iter().map(|d| d.len()).collect();

            // strings and compound types keep their name only
            let values = var.get_values::<f64, _>(..).ok();

            variables.push(DecodedVariable {
                name,
                dims,
                shape,
                values,
                attrs: numeric_attrs(&var),
            });
        }

        debug!(
            variables = variables.len(),
            size = bytes.len(),
            "Decoded NetCDF file"
        );
        Ok(DecodedDataset::new(variables))
    }
}

/// Copy of the fetched bytes on disk, since libnetcdf only opens paths.
/// Removed on drop.
struct TempFile {
    path: PathBuf,
}

impl TempFile {
    fn create(bytes: &[u8]) -> NetCdfResult<Self> {
        let path = scratch_dir().join(scratch_name());
        let mut file = std::fs::File::create(&path)?;
        let temp = Self { path };
        file.write_all(bytes)?;
        Ok(temp)
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// `/dev/shm` when it is writable, the system temp dir otherwise.
fn scratch_dir() -> PathBuf {
    let shm = PathBuf::from("/dev/shm");
    if cfg!(target_os = "linux") && shm.is_dir() {
        let probe = shm.join(format!(".forecast_probe_{}", std::process::id()));
        if std::fs::write(&probe, b"").is_ok() {
            let _ = std::fs::remove_file(&probe);
            return shm;
        }
    }
    std::env::temp_dir()
}

/// Unique per process and per call, so concurrent decodes never collide.
fn scratch_name() -> String {
    static SEQ: AtomicU64 = AtomicU64::new(0);
    format!(
        "forecast_chunk_{}_{}.nc",
        std::process::id(),
        SEQ.fetch_add(1, Ordering::Relaxed)
    )
}

/// Attributes of `var` with a numeric value: fill values, packing factors
/// and the like.
fn numeric_attrs(var: &netcdf::Variable) -> BTreeMap<String, f64> {
    var.attributes()
        .filter_map(|attr| {
            let value = attr.value().ok()?;
            let value = f64::try_from(value).ok()?;
            Some((attr.name().to_string(), value))
        })
        .collect()
}
