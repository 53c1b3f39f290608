//! Locating optional sample files and scratch directories for tests.

use std::path::PathBuf;

/// Workspace root, two levels above this crate's manifest.
pub fn workspace_root() -> PathBuf {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    PathBuf::from(manifest_dir)
        .ancestors()
        .nth(2)
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from(manifest_dir))
}

/// Sample NetCDF files are looked up in `$TEST_DATA_DIR`, then
/// `crates/netcdf-parser/testdata/`, then `testdata/` at the workspace root.
pub fn find_test_file(name: &str) -> Option<PathBuf> {
    let root = workspace_root();
    let env_dir = std::env::var("TEST_DATA_DIR").ok().map(PathBuf::from);
    env_dir
        .into_iter()
        .chain([root.join("crates/netcdf-parser/testdata"), root.join("testdata")])
        .map(|dir| dir.join(name))
        .find(|path| path.exists())
}

/// Scratch directory, removed when dropped. Used for on-disk chunk caches.
pub fn temp_cache_dir() -> tempfile::TempDir {
    tempfile::Builder::new()
        .prefix("chunk_cache_")
        .tempdir()
        .expect("Failed to create temporary cache directory")
}
