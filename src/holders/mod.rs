//! Per-kind resource caches.
//!
//! A [`Holder`] maps ids to one live [`Cached`] instance per record, reading
//! through to the backing store on a miss. Every lookup of the same id
//! returns the same instance, so snapshots built from overlapping commits
//! share entities and pin them jointly. An entry leaves the cache when its
//! pin count drops to zero.

use std::collections::HashMap;
use std::ops::Deref;
use std::sync::{Arc, PoisonError, RwLock, Weak};

use tracing::{debug, trace};

use crate::error::{CatalogError, Result};
use crate::interfaces::{CatalogStore, CatalogStoreExt};
use crate::resources::{
    Collection, CollectionCommit, Field, FieldCommit, FieldElement, Id, Partition,
    PartitionCommit, RefCounted, ReferenceProxy, Resource, SchemaCommit, ScopedResource, Segment,
    SegmentCommit, SegmentFile,
};

/// A cached record together with its pin count.
pub struct Cached<T: Resource> {
    data: T,
    proxy: ReferenceProxy,
}

impl<T: Resource> Cached<T> {
    fn new(data: T) -> Self {
        Self {
            data,
            proxy: ReferenceProxy::new(),
        }
    }

    pub fn data(&self) -> &T {
        &self.data
    }
}

impl<T: Resource> Deref for Cached<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.data
    }
}

impl<T: Resource> RefCounted for Cached<T> {
    fn proxy(&self) -> &ReferenceProxy {
        &self.proxy
    }

    fn ref_name(&self) -> &'static str {
        T::KIND.as_str()
    }

    fn ref_id(&self) -> Id {
        self.data.id()
    }
}

impl<T: Resource> std::fmt::Debug for Cached<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cached")
            .field("data", &self.data)
            .field("refs", &self.proxy.ref_count())
            .finish()
    }
}

/// Handle to a cached record.
pub type ScopedCached<T> = ScopedResource<Cached<T>>;

pub type CollectionScoped = ScopedCached<Collection>;
pub type CollectionCommitScoped = ScopedCached<CollectionCommit>;
pub type SchemaCommitScoped = ScopedCached<SchemaCommit>;
pub type FieldScoped = ScopedCached<Field>;
pub type FieldCommitScoped = ScopedCached<FieldCommit>;
pub type FieldElementScoped = ScopedCached<FieldElement>;
pub type PartitionScoped = ScopedCached<Partition>;
pub type PartitionCommitScoped = ScopedCached<PartitionCommit>;
pub type SegmentScoped = ScopedCached<Segment>;
pub type SegmentCommitScoped = ScopedCached<SegmentCommit>;
pub type SegmentFileScoped = ScopedCached<SegmentFile>;

type CacheMap<T> = RwLock<HashMap<Id, Arc<Cached<T>>>>;

/// Read-through cache of one record kind.
pub struct Holder<T: Resource> {
    store: Arc<dyn CatalogStore>,
    cache: Arc<CacheMap<T>>,
}

impl<T: Resource> Holder<T> {
    pub fn new(store: Arc<dyn CatalogStore>) -> Self {
        Self {
            store,
            cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Resolve `id`, loading it from the store on first access.
    ///
    /// A scoped handle is pinned before the cache lock is released, so an
    /// entry found here cannot be evicted underneath the caller. An unscoped
    /// miss is not cached.
    pub async fn get_resource(&self, id: Id, scoped: bool) -> Result<ScopedCached<T>> {
        let cached = self.cached(id, scoped);
        if cached.is_some() {
            return Ok(cached);
        }

        let data = self
            .store
            .get_resource::<T>(id)
            .await?
            .ok_or(CatalogError::NotFound { kind: T::KIND, id })?;

        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = cache.get(&id) {
            // Lost a load race; keep the instance already published.
            return Ok(ScopedResource::new(Arc::clone(existing), scoped));
        }
        if !scoped {
            // Unpinned entries would never see a zero transition, so a miss
            // hands back a detached copy instead of caching it.
            return Ok(ScopedResource::new(Arc::new(Cached::new(data)), false));
        }
        let entry = Arc::new(Cached::new(data));
        self.register_eviction(&entry);
        cache.insert(id, Arc::clone(&entry));
        trace!(kind = %T::KIND, id, "Cached resource");
        Ok(ScopedResource::new(entry, scoped))
    }

    /// Cache-only lookup. Returns an empty handle on a miss.
    pub fn cached(&self, id: Id, scoped: bool) -> ScopedCached<T> {
        let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
        match cache.get(&id) {
            Some(entry) => ScopedResource::new(Arc::clone(entry), scoped),
            None => ScopedResource::empty(),
        }
    }

    pub fn contains(&self, id: Id) -> bool {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.cache.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Evict the entry once its pin count reaches zero, unless it was
    /// re-pinned or replaced before the eviction got the lock.
    fn register_eviction(&self, entry: &Arc<Cached<T>>) {
        let cache: Weak<CacheMap<T>> = Arc::downgrade(&self.cache);
        let this: Weak<Cached<T>> = Arc::downgrade(entry);
        let id = entry.data.id();
        entry.proxy.register_on_no_ref_cb(move || {
            let Some(cache) = cache.upgrade() else {
                return;
            };
            let mut cache = cache.write().unwrap_or_else(PoisonError::into_inner);
            let evict = cache
                .get(&id)
                .is_some_and(|e| std::ptr::eq(Arc::as_ptr(e), this.as_ptr()) && e.ref_count() == 0);
            if evict {
                cache.remove(&id);
                debug!(kind = %T::KIND, id, "Evicted resource");
            }
        });
    }
}

/// One holder per record kind, sharing a backing store.
pub struct Holders {
    store: Arc<dyn CatalogStore>,
    pub collections: Holder<Collection>,
    pub collection_commits: Holder<CollectionCommit>,
    pub schema_commits: Holder<SchemaCommit>,
    pub fields: Holder<Field>,
    pub field_commits: Holder<FieldCommit>,
    pub field_elements: Holder<FieldElement>,
    pub partitions: Holder<Partition>,
    pub partition_commits: Holder<PartitionCommit>,
    pub segments: Holder<Segment>,
    pub segment_commits: Holder<SegmentCommit>,
    pub segment_files: Holder<SegmentFile>,
}

impl Holders {
    pub fn new(store: Arc<dyn CatalogStore>) -> Self {
        Self {
            collections: Holder::new(Arc::clone(&store)),
            collection_commits: Holder::new(Arc::clone(&store)),
            schema_commits: Holder::new(Arc::clone(&store)),
            fields: Holder::new(Arc::clone(&store)),
            field_commits: Holder::new(Arc::clone(&store)),
            field_elements: Holder::new(Arc::clone(&store)),
            partitions: Holder::new(Arc::clone(&store)),
            partition_commits: Holder::new(Arc::clone(&store)),
            segments: Holder::new(Arc::clone(&store)),
            segment_commits: Holder::new(Arc::clone(&store)),
            segment_files: Holder::new(Arc::clone(&store)),
            store,
        }
    }

    pub fn store(&self) -> &Arc<dyn CatalogStore> {
        &self.store
    }

    /// Entries cached across all kinds.
    pub fn total_cached(&self) -> usize {
        self.collections.len()
            + self.collection_commits.len()
            + self.schema_commits.len()
            + self.fields.len()
            + self.field_commits.len()
            + self.field_elements.len()
            + self.partitions.len()
            + self.partition_commits.len()
            + self.segments.len()
            + self.segment_commits.len()
            + self.segment_files.len()
    }
}

#[cfg(test)]
mod tests;
