//! Integration tests: catalogs opened as stores over an in-memory remote.

use std::sync::Arc;

use bytes::Bytes;
use chrono::{TimeZone, Utc};
use forecast_dataset::{Catalog, DatasetError, OpenOptions};
use hypothetic_store::{CachingOverlay, MemoryStore, Store, StoreError};
use netcdf_parser::DatasetDecoder;
use object_store::memory::InMemory;
use object_store::path::Path;
use object_store::ObjectStore;
use serde_json::{json, Map};
use storage::{ObjectStoreFetcher, RemoteFetcher, StorageOptions};
use test_utils::{
    assert_approx_eq, create_constant_field, create_forecast_file, create_index_field,
    create_single_time_file, FixtureDecoder, AQ_CATALOG, FORECAST_CATALOG, TIMESERIES_CATALOG,
};

const DIAG: &str = "temperature_at_screen_level";

fn forecast_catalog() -> Catalog {
    let yaml = FORECAST_CATALOG
        .replace("data_protocol: file", "data_protocol: memory")
        .replace("url_prefix: /tmp/forecasts", "url_prefix: forecasts");
    Catalog::from_yaml(&yaml).unwrap()
}

async fn memory_fetcher(objects: &[(&str, &'static [u8])]) -> Arc<dyn RemoteFetcher> {
    let store = Arc::new(InMemory::new());
    for (path, contents) in objects {
        store
            .put(&Path::from(*path), Bytes::from_static(*contents).into())
            .await
            .unwrap();
    }
    let options = StorageOptions::new("memory", "unused", Map::new()).unwrap();
    Arc::new(ObjectStoreFetcher::new(options).with_store("memory", store))
}

fn f32_values(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|b| f32::from_ne_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

#[tokio::test]
async fn test_forecast_chunk_read_and_missing_fill() {
    let path = "forecasts/mo-atmospheric-mogreps-uk/20201018T0000Z/20201018T0100Z-PT0001H00M-temperature_at_screen_level.nc";
    let decoder = Arc::new(FixtureDecoder::new().with_file(
        b"cycle-0-lead-1".to_vec(),
        create_forecast_file(DIAG, 2, 2, 3, create_index_field(&[2, 2, 3])),
    ));
    let options = OpenOptions::new(decoder.clone())
        .fetcher(memory_fetcher(&[(path, &b"cycle-0-lead-1"[..])]).await);
    let dataset = forecast_catalog().open("mogreps_uk", &options).unwrap();
    let store = dataset.store();

    // 2 cycles x 3 leads, the grid in one chunk
    assert_eq!(store.len(), 3 + 5 * 2 + 2 + 6);

    let present = store.get(&format!("{}/0.1.0.0.0", DIAG)).await.unwrap();
    let values = f32_values(&present);
    assert_eq!(values.len(), 12);
    assert_approx_eq!(values[0], 0.0, 1e-6);
    assert_approx_eq!(values[11], 11.0, 1e-6);

    let missing = store.get(&format!("{}/1.2.0.0.0", DIAG)).await.unwrap();
    let values = f32_values(&missing);
    assert_eq!(values.len(), 12);
    assert!(values.iter().all(|v| v.is_nan()));

    assert_eq!(decoder.decoded(), vec![b"cycle-0-lead-1".to_vec()]);
}

#[tokio::test]
async fn test_forecast_schema() {
    let decoder: Arc<dyn DatasetDecoder> = Arc::new(FixtureDecoder::new());
    let options = OpenOptions::new(decoder).fetcher(memory_fetcher(&[]).await);
    let dataset = forecast_catalog().open("mogreps_uk", &options).unwrap();

    assert_eq!(dataset.name(), "mogreps_uk");
    assert_eq!(dataset.description(), Some("MOGREPS-UK ensemble forecast"));

    let schema = dataset.schema();
    assert_eq!(schema.dims["forecast_reference_time"], 2);
    assert_eq!(schema.dims["forecast_period"], 3);
    assert_eq!(schema.dims["realization"], 2);
    assert_eq!(schema.dims["projection_y_coordinate"], 2);
    assert_eq!(schema.dims["projection_x_coordinate"], 3);
    assert_eq!(schema.data_vars, vec![DIAG.to_string()]);
    assert_eq!(schema.coords.len(), 5);
    assert_eq!(schema.metadata.get("provider"), Some(&json!("Met Office")));
}

#[tokio::test]
async fn test_forecast_metadata_documents() {
    let decoder: Arc<dyn DatasetDecoder> = Arc::new(FixtureDecoder::new());
    let options = OpenOptions::new(decoder).fetcher(memory_fetcher(&[]).await);
    let dataset = forecast_catalog().open("mogreps_uk", &options).unwrap();

    let zarray: serde_json::Value =
        serde_json::from_slice(&dataset.store().get(&format!("{}/.zarray", DIAG)).await.unwrap())
            .unwrap();
    assert_eq!(zarray["shape"], json!([2, 3, 2, 2, 3]));
    assert_eq!(zarray["chunks"], json!([1, 1, 2, 2, 3]));
    assert_eq!(zarray["compressor"], serde_json::Value::Null);
}

#[tokio::test]
async fn test_license_must_be_accepted() {
    let catalog = Catalog::from_yaml(AQ_CATALOG).unwrap();
    let decoder: Arc<dyn DatasetDecoder> = Arc::new(FixtureDecoder::new());

    let refused = catalog.open("air_quality_hourly", &OpenOptions::new(decoder.clone()));
    assert!(matches!(refused, Err(DatasetError::LicenseNotAccepted(_))));

    let accepted = catalog
        .open(
            "air_quality_hourly",
            &OpenOptions::new(decoder).license_accepted(true),
        )
        .unwrap();
    // two days of hourly data per diagnostic
    assert_eq!(accepted.store().len(), 3 + 3 * 2 + 5 * (2 + 2));
    assert_eq!(accepted.schema().dims["time"], 48);
}

#[tokio::test]
async fn test_timeseries_daily_chunk() {
    let path = "timeseries/metoffice_ukv_daily/air_temperature_max/ukv_daily_air_temperature_max_20201002.nc";
    let decoder = Arc::new(FixtureDecoder::new().with_file(
        b"day-2".to_vec(),
        create_single_time_file("air_temperature_max", 1, 3, 2, create_constant_field(&[1, 3, 2], 290.5)),
    ));
    let options = OpenOptions::new(decoder).fetcher(memory_fetcher(&[(path, &b"day-2"[..])]).await);
    let catalog = Catalog::from_yaml(TIMESERIES_CATALOG).unwrap();
    let dataset = catalog.open("ukv_daily", &options).unwrap();

    let values = f32_values(&dataset.store().get("air_temperature_max/1.0.0").await.unwrap());
    assert_eq!(values, vec![290.5; 6]);

    let values = f32_values(&dataset.store().get("air_temperature_max/0.0.0").await.unwrap());
    assert!(values.iter().all(|v| v.is_nan()));

    assert!(matches!(
        dataset.store().get("air_temperature_max/3.0.0").await,
        Err(StoreError::KeyNotFound(_))
    ));
}

#[tokio::test]
async fn test_latest_uses_open_time() {
    let yaml = TIMESERIES_CATALOG.replace("end_datetime: 20201003T0000Z", "end_datetime: latest");
    let catalog = Catalog::from_yaml(&yaml).unwrap();
    let decoder: Arc<dyn DatasetDecoder> = Arc::new(FixtureDecoder::new());
    let options = OpenOptions::new(decoder)
        .fetcher(memory_fetcher(&[]).await)
        .now(Utc.with_ymd_and_hms(2020, 10, 7, 0, 0, 0).unwrap());
    let dataset = catalog.open("ukv_daily", &options).unwrap();
    // 2020-10-01 to 2020-10-05 inclusive
    assert_eq!(dataset.schema().dims["time"], 5);
}

#[tokio::test]
async fn test_overlay_reads_each_file_once() {
    let path = "forecasts/mo-atmospheric-mogreps-uk/20201018T0100Z/20201018T0100Z-PT0000H00M-temperature_at_screen_level.nc";
    let decoder = Arc::new(FixtureDecoder::new().with_file(
        b"cycle-1-lead-0".to_vec(),
        create_forecast_file(DIAG, 2, 2, 3, create_constant_field(&[2, 2, 3], 280.0)),
    ));
    let options = OpenOptions::new(decoder.clone())
        .fetcher(memory_fetcher(&[(path, &b"cycle-1-lead-0"[..])]).await);
    let dataset = forecast_catalog().open("mogreps_uk", &options).unwrap();
    let overlay = CachingOverlay::new(dataset.store().clone(), MemoryStore::new());

    let key = format!("{}/1.0.0.0.0", DIAG);
    let first = overlay.get(&key).await.unwrap();
    let second = overlay.get(&key).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(decoder.decoded().len(), 1);
    assert!(overlay.backing().contains(&key).await.unwrap());
}
