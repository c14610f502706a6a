use super::*;
use crate::schema::DEFAULT_PARTITION_NAME;
use crate::storage::MemoryCatalogStore;
use crate::test_utils::CatalogFixture;

fn lazy() -> CatalogConfig {
    CatalogConfig::for_test().with_preload(false)
}

#[tokio::test]
async fn test_preload_replays_active_collections() {
    let a = CatalogFixture::new("a").await.unwrap();
    let b = CatalogFixture::with_store(a.store.clone(), "b").await.unwrap();
    b.add_segment(DEFAULT_PARTITION_NAME).await.unwrap();

    let snapshots = Snapshots::new(a.store.clone(), CatalogConfig::for_test())
        .await
        .unwrap();

    assert_eq!(
        snapshots.get_collection_ids(),
        vec![a.collection_id(), b.collection_id()]
    );
    let latest = b.latest_commit().await.unwrap();
    let ss = snapshots
        .get_snapshot(b.collection_id(), 0, true)
        .await
        .unwrap();
    assert_eq!(ss.get().unwrap().id(), latest.id());
}

#[tokio::test]
async fn test_lazy_load_on_first_access() {
    let fixture = CatalogFixture::new("products").await.unwrap();
    let snapshots = Snapshots::new(fixture.store.clone(), lazy()).await.unwrap();
    assert!(snapshots.get_collection_ids().is_empty());

    let holder = snapshots.get_holder(fixture.collection_id()).await.unwrap();
    let again = snapshots.get_holder(fixture.collection_id()).await.unwrap();

    assert!(Arc::ptr_eq(&holder, &again));
    assert_eq!(snapshots.get_collection_ids(), vec![fixture.collection_id()]);
}

#[tokio::test]
async fn test_lookup_by_name() {
    let fixture = CatalogFixture::new("products").await.unwrap();
    let snapshots = Snapshots::new(fixture.store.clone(), lazy()).await.unwrap();

    let ss = snapshots
        .get_snapshot_by_name("products", 0, true)
        .await
        .unwrap();
    let by_id = snapshots.get_holder(fixture.collection_id()).await.unwrap();

    assert_eq!(ss.get().unwrap().name(), "products");
    assert!(Arc::ptr_eq(
        &snapshots.get_holder_by_name("products").await.unwrap(),
        &by_id
    ));
}

#[tokio::test]
async fn test_unknown_collections_are_not_found() {
    let store = Arc::new(MemoryCatalogStore::new());
    let snapshots = Snapshots::new(store, lazy()).await.unwrap();

    let err = snapshots.get_holder(42).await.unwrap_err();
    assert!(matches!(
        err,
        CatalogError::NotFound {
            kind: ResourceKind::Collection,
            id: 42
        }
    ));
    let err = snapshots.get_holder_by_name("ghost").await.unwrap_err();
    assert!(matches!(err, CatalogError::CollectionNotFound(name) if name == "ghost"));
}

#[tokio::test]
async fn test_collection_without_commits_is_not_found() {
    let store = Arc::new(MemoryCatalogStore::new());
    let bare = store.create_resource(Collection::new("bare")).await.unwrap();
    let snapshots = Snapshots::new(store, lazy()).await.unwrap();

    let err = snapshots.get_holder(bare.id()).await.unwrap_err();

    assert!(err.is_not_found());
    assert!(snapshots.get_collection_ids().is_empty());
}

#[tokio::test]
async fn test_preload_skips_collection_without_commits() {
    let good = CatalogFixture::new("good").await.unwrap();
    let mut bare = Collection::new("bare");
    bare.activate();
    let bare = good.store.create_resource(bare).await.unwrap();

    let snapshots = Snapshots::new(good.store.clone(), CatalogConfig::for_test())
        .await
        .unwrap();

    assert_eq!(snapshots.get_collection_ids(), vec![good.collection_id()]);
    assert!(snapshots.get_holder(bare.id()).await.unwrap_err().is_not_found());
    let ss = snapshots.get_snapshot_by_name("good", 0, true).await.unwrap();
    assert_eq!(ss.get().unwrap().name(), "good");
}

#[tokio::test]
async fn test_preload_propagates_store_failure() {
    let fixture = CatalogFixture::new("products").await.unwrap();
    fixture.store.set_fail_on_get(true);

    let err = Snapshots::new(fixture.store.clone(), CatalogConfig::for_test())
        .await
        .unwrap_err();

    assert!(matches!(err, CatalogError::Store(_)));
}

#[tokio::test]
async fn test_replay_keeps_most_recent_versions() {
    let fixture = CatalogFixture::new("products").await.unwrap();
    fixture.add_segment(DEFAULT_PARTITION_NAME).await.unwrap();
    fixture.add_segment(DEFAULT_PARTITION_NAME).await.unwrap();
    let commits = fixture.commit_ids().await.unwrap();
    let config = lazy().with_num_versions(2);
    let snapshots = Snapshots::new(fixture.store.clone(), config).await.unwrap();

    let holder = snapshots.get_holder(fixture.collection_id()).await.unwrap();

    assert_eq!(holder.ids(), commits[1..].to_vec());
    let cid = fixture.collection_id();
    assert!(snapshots.get_snapshot(cid, commits[0], true).await.unwrap().is_none());
    assert!(snapshots.get_snapshot(cid, commits[1], true).await.unwrap().is_some());
}

#[tokio::test]
async fn test_close_keeps_outstanding_handles_valid() {
    let fixture = CatalogFixture::new("products").await.unwrap();
    let snapshots = Snapshots::new(fixture.store.clone(), CatalogConfig::for_test())
        .await
        .unwrap();
    let cid = fixture.collection_id();
    let first_holder = snapshots.get_holder(cid).await.unwrap();
    let reader = snapshots.get_snapshot(cid, 0, true).await.unwrap();

    assert!(snapshots.close(cid));
    assert!(!snapshots.close(cid));
    assert!(snapshots.get_collection_ids().is_empty());
    assert!(first_holder.is_done());

    let snapshot = reader.get().unwrap();
    assert_eq!(snapshot.name(), "products");
    assert!(!snapshot.is_released());

    // Next access loads a fresh holder
    let reloaded = snapshots.get_holder(cid).await.unwrap();
    assert!(!Arc::ptr_eq(&first_holder, &reloaded));
}

#[tokio::test]
async fn test_drop_collection_by_name() {
    let fixture = CatalogFixture::new("products").await.unwrap();
    let snapshots = Snapshots::new(fixture.store.clone(), CatalogConfig::for_test())
        .await
        .unwrap();

    assert!(!snapshots.drop_collection("ghost"));
    assert!(snapshots.drop_collection("products"));
    assert!(snapshots.get_collection_ids().is_empty());
    assert!(!snapshots.drop_collection("products"));
}

#[tokio::test]
async fn test_shutdown_releases_every_pin() {
    let a = CatalogFixture::new("a").await.unwrap();
    let b = CatalogFixture::with_store(a.store.clone(), "b").await.unwrap();
    a.add_segment(DEFAULT_PARTITION_NAME).await.unwrap();
    b.add_partition("p1").await.unwrap();
    let snapshots = Snapshots::new(a.store.clone(), CatalogConfig::for_test().with_num_versions(2))
        .await
        .unwrap();
    assert!(snapshots.holders().total_cached() > 0);

    snapshots.shutdown().await;

    assert!(snapshots.get_collection_ids().is_empty());
    assert_eq!(snapshots.holders().total_cached(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_loads_converge_on_one_holder() {
    let fixture = CatalogFixture::new("products").await.unwrap();
    let snapshots = Arc::new(Snapshots::new(fixture.store.clone(), lazy()).await.unwrap());
    let cid = fixture.collection_id();

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let snapshots = Arc::clone(&snapshots);
            tokio::spawn(async move { snapshots.get_holder(cid).await.unwrap() })
        })
        .collect();
    let loaded: Vec<_> = futures::future::join_all(tasks)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();

    assert!(loaded.iter().all(|h| Arc::ptr_eq(h, &loaded[0])));
    assert_eq!(snapshots.get_collection_ids(), vec![cid]);
    drop(loaded);
    snapshots.shutdown().await;
    assert_eq!(snapshots.holders().total_cached(), 0);
}
