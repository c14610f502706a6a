//! Shared utilities for integration tests.

use std::sync::Arc;
use std::time::Duration;

use vellum::schema::{CollectionSchema, FieldSchema};
use vellum::test_utils::CatalogFixture;
use vellum::{CatalogStore, Holders, MemoryCatalogStore};

/// Poll `cond` until it holds, failing the test after five seconds.
pub async fn wait_until(mut cond: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

/// One field with two elements: `RAW` and `IVFFLAT`.
pub fn vector_schema(name: &str) -> CollectionSchema {
    CollectionSchema::new(name).with_field(FieldSchema::new("vector", 101).with_element("IVFFLAT", 2))
}

/// Fixture plus entity caches over the same store.
pub async fn fixture_with_holders(name: &str) -> (CatalogFixture, Arc<Holders>) {
    let store = Arc::new(MemoryCatalogStore::new());
    let fixture = CatalogFixture::with_schema(store, &vector_schema(name))
        .await
        .expect("create collection");
    let dyn_store: Arc<dyn CatalogStore> = fixture.store.clone();
    (fixture, Arc::new(Holders::new(dyn_store)))
}
