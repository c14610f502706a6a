use super::*;
use crate::storage::MemoryCatalogStore;

async fn store_with_fields(n: usize) -> Arc<MemoryCatalogStore> {
    let store = Arc::new(MemoryCatalogStore::new());
    for i in 0..n {
        store
            .create_resource(Field::new(format!("f{i}"), i as u32))
            .await
            .unwrap();
    }
    store
}

#[tokio::test]
async fn test_missing_id_is_not_found() {
    let store = store_with_fields(0).await;
    let holder: Holder<Field> = Holder::new(store);

    let err = holder.get_resource(7, true).await.unwrap_err();

    assert!(matches!(
        err,
        CatalogError::NotFound {
            kind: crate::resources::ResourceKind::Field,
            id: 7
        }
    ));
    assert!(holder.is_empty());
}

#[tokio::test]
async fn test_lookups_share_one_instance() {
    let store = store_with_fields(1).await;
    let holder: Holder<Field> = Holder::new(store.clone());

    let a = holder.get_resource(1, true).await.unwrap();
    let b = holder.get_resource(1, true).await.unwrap();

    assert!(a.ptr_eq(&b));
    assert_eq!(a.get().unwrap().ref_count(), 2);
    assert_eq!(a.get().unwrap().name(), "f0");
    // Second lookup was served from the cache
    assert_eq!(store.load_count(), 1);
}

#[tokio::test]
async fn test_entry_evicted_when_last_pin_released() {
    let store = store_with_fields(1).await;
    let holder: Holder<Field> = Holder::new(store.clone());

    let a = holder.get_resource(1, true).await.unwrap();
    let b = a.clone();
    drop(a);
    assert!(holder.contains(1));
    drop(b);
    assert!(!holder.contains(1));

    // A later lookup reloads from the store
    let c = holder.get_resource(1, true).await.unwrap();
    assert_eq!(c.get().unwrap().ref_count(), 1);
    assert_eq!(store.load_count(), 2);
}

#[tokio::test]
async fn test_unscoped_lookup_does_not_pin() {
    let store = store_with_fields(1).await;
    let holder: Holder<Field> = Holder::new(store);

    let handle = holder.get_resource(1, false).await.unwrap();

    assert_eq!(handle.get().unwrap().ref_count(), 0);
    assert_eq!(handle.get().unwrap().name(), "f0");
    assert!(!holder.contains(1));
    drop(handle);
    assert!(holder.is_empty());
}

#[tokio::test]
async fn test_unscoped_lookup_shares_pinned_entry() {
    let store = store_with_fields(1).await;
    let holder: Holder<Field> = Holder::new(store.clone());

    let pinned = holder.get_resource(1, true).await.unwrap();
    let unscoped = holder.get_resource(1, false).await.unwrap();

    assert!(unscoped.ptr_eq(&pinned));
    assert_eq!(pinned.get().unwrap().ref_count(), 1);
    assert_eq!(store.load_count(), 1);
    drop(unscoped);
    drop(pinned);
    assert!(!holder.contains(1));
}

#[tokio::test]
async fn test_repin_before_eviction_keeps_entry() {
    let store = store_with_fields(1).await;
    let holder: Holder<Field> = Holder::new(store);

    let first = holder.get_resource(1, true).await.unwrap();
    let entry = Arc::clone(first.arc().unwrap());
    let again = holder.cached(1, true);
    drop(first);

    assert!(holder.contains(1));
    assert_eq!(entry.ref_count(), 1);
    drop(again);
    assert!(!holder.contains(1));
}

#[tokio::test]
async fn test_cached_miss_is_empty() {
    let store = store_with_fields(1).await;
    let holder: Holder<Field> = Holder::new(store);

    assert!(holder.cached(1, true).is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_lookups_converge_on_one_instance() {
    let store = store_with_fields(1).await;
    let holder: Arc<Holder<Field>> = Arc::new(Holder::new(store));

    let tasks: Vec<_> = (0..16)
        .map(|_| {
            let holder = Arc::clone(&holder);
            tokio::spawn(async move { holder.get_resource(1, true).await.unwrap() })
        })
        .collect();
    let handles: Vec<_> = futures::future::join_all(tasks)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();

    assert!(handles.iter().all(|h| h.ptr_eq(&handles[0])));
    assert_eq!(handles[0].get().unwrap().ref_count(), 16);
    drop(handles);
    assert!(holder.is_empty());
}

#[tokio::test]
async fn test_holders_bundle_counts_all_kinds() {
    let store = store_with_fields(2).await;
    let holders = Holders::new(store);

    let _a = holders.fields.get_resource(1, true).await.unwrap();
    let _b = holders.fields.get_resource(2, true).await.unwrap();

    assert_eq!(holders.total_cached(), 2);
}
