//! Integration test: a caching overlay backed by a local directory keeps
//! chunks across store instances.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use hypothetic_store::{
    ArrayValues, CachingOverlay, ChunkArray, ChunkOrigin, CoordinateVariable, FnLoader, Store,
    VirtualChunkStore,
};
use storage::ObjectStoreMap;

fn build_store(calls: Arc<AtomicUsize>) -> Arc<VirtualChunkStore> {
    let coords = vec![
        CoordinateVariable::new("t", ArrayValues::Int64(vec![0, 1])),
        CoordinateVariable::new("x", ArrayValues::Float64(vec![0.0, 0.5])),
    ];
    let loader = FnLoader::new(move |_origin: &ChunkOrigin, _var: &str| {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(Some(ChunkArray::filled_f32(vec![1, 2], 7.0)))
    });
    Arc::new(
        VirtualChunkStore::builder(
            vec!["t".to_string(), "x".to_string()],
            coords,
            vec!["rain".to_string()],
        )
        .chunk("x", 2)
        .build(Arc::new(loader))
        .unwrap(),
    )
}

#[tokio::test]
async fn test_chunks_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));

    let first = CachingOverlay::new(build_store(calls.clone()), ObjectStoreMap::local(dir.path()).unwrap());
    let bytes = first.get("rain/1.0").await.unwrap();
    first.get(".zmetadata").await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    drop(first);

    let second = CachingOverlay::new(build_store(calls.clone()), ObjectStoreMap::local(dir.path()).unwrap());
    assert_eq!(second.get("rain/1.0").await.unwrap(), bytes);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let keys = second.backing().keys().await.unwrap();
    assert!(keys.contains(&"rain/1.0".to_string()));
}
