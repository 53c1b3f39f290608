//! Subcommand implementations, written against any `Write` so they can be
//! exercised without a terminal.

use std::collections::HashSet;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use forecast_dataset::Dataset;
use futures::stream::{self, StreamExt};
use hypothetic_store::{CachingOverlay, Store};
use storage::ObjectStoreMap;
use tracing::{debug, warn};

pub fn list_keys(dataset: &Dataset, limit: Option<usize>, out: &mut impl Write) -> Result<()> {
    let keys = dataset.store().keys();
    let keys: Box<dyn Iterator<Item = String>> = match limit {
        Some(n) => Box::new(keys.take(n)),
        None => Box::new(keys),
    };
    for key in keys {
        writeln!(out, "{}", key)?;
    }
    Ok(())
}

pub fn print_metadata(dataset: &Dataset, out: &mut impl Write) -> Result<()> {
    let encoded = dataset
        .store()
        .metadata()
        .get(".zmetadata")
        .context("store has no consolidated metadata")?;
    let document: serde_json::Value = serde_json::from_slice(&encoded)?;
    serde_json::to_writer_pretty(&mut *out, &document)?;
    writeln!(out)?;
    Ok(())
}

pub fn print_schema(dataset: &Dataset, out: &mut impl Write) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, &dataset.schema())?;
    writeln!(out)?;
    Ok(())
}

pub async fn get_to_writer(dataset: &Dataset, key: &str, out: &mut impl Write) -> Result<()> {
    let value = dataset
        .store()
        .get(key)
        .await
        .with_context(|| format!("Failed to read {}", key))?;
    out.write_all(&value)?;
    Ok(())
}

pub async fn get_to_file(dataset: &Dataset, key: &str, path: &Path) -> Result<()> {
    let value = dataset
        .store()
        .get(key)
        .await
        .with_context(|| format!("Failed to read {}", key))?;
    tokio::fs::write(path, &value)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Every chunk key of the dataset's data variables.
pub fn data_chunk_keys(dataset: &Dataset) -> Vec<String> {
    let data: HashSet<&str> = dataset
        .store()
        .data_variables()
        .map(|v| v.name.as_str())
        .collect();
    dataset
        .store()
        .keys()
        .filter(|key| match key.split_once('/') {
            Some((name, tail)) => data.contains(name) && !tail.starts_with('.'),
            None => false,
        })
        .collect()
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WarmReport {
    pub warmed: usize,
    pub failed: usize,
    pub bytes: usize,
}

impl WarmReport {
    pub fn total(&self) -> usize {
        self.warmed + self.failed
    }
}

/// Read `keys` through a caching overlay persisted under `cache_dir`.
/// All data chunks are warmed when `keys` is empty. Failed keys are
/// logged and counted; they do not stop the run.
pub async fn warm(
    dataset: &Dataset,
    cache_dir: &Path,
    concurrency: usize,
    keys: Vec<String>,
) -> Result<WarmReport> {
    tokio::fs::create_dir_all(cache_dir)
        .await
        .with_context(|| format!("Failed to create {}", cache_dir.display()))?;
    let backing = ObjectStoreMap::local(cache_dir)?;
    let overlay = CachingOverlay::new(dataset.store().clone(), backing);

    let keys = if keys.is_empty() {
        data_chunk_keys(dataset)
    } else {
        keys
    };

    let overlay = &overlay;
    let results: Vec<_> = stream::iter(keys)
        .map(|key| async move {
            let result = overlay.get(&key).await;
            (key, result)
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    let mut report = WarmReport::default();
    for (key, result) in results {
        match result {
            Ok(value) => {
                debug!(key = %key, bytes = value.len(), "Warmed");
                report.warmed += 1;
                report.bytes += value.len();
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to warm");
                report.failed += 1;
            }
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use forecast_dataset::{Catalog, OpenOptions};
    use netcdf_parser::DatasetDecoder;
    use object_store::memory::InMemory;
    use object_store::path::Path as ObjectPath;
    use object_store::ObjectStore;
    use storage::{ObjectStoreFetcher, StorageOptions};
    use test_utils::{
        create_constant_field, create_single_time_file, FixtureDecoder, TIMESERIES_CATALOG,
    };

    const PATH: &str = "timeseries/metoffice_ukv_daily/air_temperature_max/ukv_daily_air_temperature_max_20201001.nc";

    async fn dataset(decoder: Arc<dyn DatasetDecoder>) -> Dataset {
        let remote = Arc::new(InMemory::new());
        remote
            .put(&ObjectPath::from(PATH), bytes::Bytes::from_static(b"day-1").into())
            .await
            .unwrap();
        let options = StorageOptions::new("memory", "unused", serde_json::Map::new()).unwrap();
        let fetcher = Arc::new(ObjectStoreFetcher::new(options).with_store("memory", remote));
        Catalog::from_yaml(TIMESERIES_CATALOG)
            .unwrap()
            .open("ukv_daily", &OpenOptions::new(decoder).fetcher(fetcher))
            .unwrap()
    }

    fn decoder() -> Arc<FixtureDecoder> {
        Arc::new(FixtureDecoder::new().with_file(
            b"day-1".to_vec(),
            create_single_time_file("air_temperature_max", 1, 3, 2, create_constant_field(&[1, 3, 2], 288.0)),
        ))
    }

    #[tokio::test]
    async fn test_list_keys_with_limit() {
        let dataset = dataset(decoder()).await;
        let mut out = Vec::new();
        list_keys(&dataset, Some(3), &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), ".zgroup\n.zattrs\n.zmetadata\n");
    }

    #[tokio::test]
    async fn test_metadata_is_pretty_json() {
        let dataset = dataset(decoder()).await;
        let mut out = Vec::new();
        print_metadata(&dataset, &mut out).unwrap();
        let document: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(document["zarr_consolidated_format"], 1);
        assert!(document["metadata"]["air_temperature_max/.zarray"].is_object());
    }

    #[tokio::test]
    async fn test_data_chunk_keys() {
        let dataset = dataset(decoder()).await;
        let keys = data_chunk_keys(&dataset);
        assert_eq!(
            keys,
            vec![
                "air_temperature_max/0.0.0".to_string(),
                "air_temperature_max/1.0.0".to_string(),
                "air_temperature_max/2.0.0".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_warm_persists_chunks() {
        let decoder = decoder();
        let dataset = dataset(decoder.clone()).await;
        let dir = test_utils::temp_cache_dir();

        let report = warm(&dataset, dir.path(), 2, Vec::new()).await.unwrap();
        assert_eq!(report.warmed, 3);
        assert_eq!(report.failed, 0);
        assert_eq!(report.bytes, 3 * 6 * 4);
        assert_eq!(decoder.decoded().len(), 1);

        // a second run is served from the cache directory
        let again = warm(&dataset, dir.path(), 2, Vec::new()).await.unwrap();
        assert_eq!(again.warmed, 3);
        assert_eq!(decoder.decoded().len(), 1);
    }

    #[tokio::test]
    async fn test_warm_counts_bad_keys() {
        let dataset = dataset(decoder()).await;
        let dir = test_utils::temp_cache_dir();
        let report = warm(
            &dataset,
            dir.path(),
            1,
            vec!["air_temperature_max/9.0.0".to_string()],
        )
        .await
        .unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(report.total(), 1);
    }
}
