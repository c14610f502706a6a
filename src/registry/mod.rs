//! Collection-addressable access to snapshot windows.
//!
//! [`Snapshots`] maps collection ids and names to their [`SnapshotsHolder`],
//! loading a holder on first access by replaying the collection's active
//! commits in ascending order. One registry is created per process and
//! passed to whoever needs it; [`Snapshots::shutdown`] tears it down.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info, warn};

use crate::config::CatalogConfig;
use crate::error::{CatalogError, Result};
use crate::holders::Holders;
use crate::interfaces::{CatalogStore, CatalogStoreExt};
use crate::resources::{Collection, Id, Ids, Resource, ResourceKind};
use crate::snapshot::ScopedSnapshot;
use crate::snapshots_holder::SnapshotsHolder;

#[derive(Default)]
struct Registry {
    holders: BTreeMap<Id, Arc<SnapshotsHolder>>,
    names: HashMap<String, Id>,
}

/// Registry of per-collection snapshot windows.
pub struct Snapshots {
    store: Arc<dyn CatalogStore>,
    holders: Arc<Holders>,
    config: CatalogConfig,
    inner: RwLock<Registry>,
}

impl Snapshots {
    /// Create a registry, replaying every active collection if
    /// `config.preload` is set.
    pub async fn new(store: Arc<dyn CatalogStore>, config: CatalogConfig) -> Result<Self> {
        let snapshots = Self {
            holders: Arc::new(Holders::new(Arc::clone(&store))),
            store,
            config,
            inner: RwLock::new(Registry::default()),
        };
        if snapshots.config.preload {
            snapshots.init().await?;
        }
        Ok(snapshots)
    }

    /// Load a holder for every active collection in the store.
    ///
    /// A collection that cannot be resolved, such as one without an active
    /// commit, is skipped. Store failures still abort.
    pub async fn init(&self) -> Result<()> {
        let collection_ids = self.store.all_active_collection_ids(false).await?;
        let mut loaded = 0;
        for &collection_id in &collection_ids {
            match self.get_holder(collection_id).await {
                Ok(_) => loaded += 1,
                Err(e) if e.is_not_found() => {
                    warn!(collection_id, error = %e, "Skipping collection");
                }
                Err(e) => return Err(e),
            }
        }
        info!(
            collections = loaded,
            skipped = collection_ids.len() - loaded,
            "Snapshot registry initialized"
        );
        Ok(())
    }

    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    /// Entity caches shared by every holder in this registry.
    pub fn holders(&self) -> &Arc<Holders> {
        &self.holders
    }

    /// Holder for `collection_id`, loading it on first access.
    pub async fn get_holder(&self, collection_id: Id) -> Result<Arc<SnapshotsHolder>> {
        let cached = self.read().holders.get(&collection_id).cloned();
        if let Some(holder) = cached {
            return Ok(holder);
        }
        let collection = self
            .store
            .get_resource::<Collection>(collection_id)
            .await?
            .ok_or(CatalogError::NotFound {
                kind: ResourceKind::Collection,
                id: collection_id,
            })?;
        self.load(collection).await
    }

    /// Holder for the collection named `name`, loading it on first access.
    pub async fn get_holder_by_name(&self, name: &str) -> Result<Arc<SnapshotsHolder>> {
        let cached = {
            let registry = self.read();
            registry
                .names
                .get(name)
                .and_then(|id| registry.holders.get(id))
                .cloned()
        };
        if let Some(holder) = cached {
            return Ok(holder);
        }
        let collection = self
            .store
            .get_collection(name)
            .await?
            .ok_or_else(|| CatalogError::CollectionNotFound(name.to_string()))?;
        self.load(collection).await
    }

    /// Check out version `id` (`0` for the newest) of a collection.
    ///
    /// Fails if the collection cannot be loaded; returns an empty handle if
    /// the version is not in its window.
    pub async fn get_snapshot(
        &self,
        collection_id: Id,
        id: Id,
        scoped: bool,
    ) -> Result<ScopedSnapshot> {
        Ok(self.get_holder(collection_id).await?.get_snapshot(id, scoped))
    }

    pub async fn get_snapshot_by_name(
        &self,
        name: &str,
        id: Id,
        scoped: bool,
    ) -> Result<ScopedSnapshot> {
        Ok(self.get_holder_by_name(name).await?.get_snapshot(id, scoped))
    }

    /// Ids of the collections with a loaded holder, ascending.
    pub fn get_collection_ids(&self) -> Ids {
        self.read().holders.keys().copied().collect()
    }

    /// Remove a collection's holder and retire its window.
    ///
    /// Outstanding handles stay valid until dropped. Returns false if no
    /// holder was loaded.
    pub fn close(&self, collection_id: Id) -> bool {
        let removed = {
            let mut registry = self.write();
            let removed = registry.holders.remove(&collection_id);
            if removed.is_some() {
                registry.names.retain(|_, id| *id != collection_id);
            }
            removed
        };
        match removed {
            Some(holder) => {
                holder.close();
                info!(collection_id, "Closed collection");
                true
            }
            None => false,
        }
    }

    /// Close the holder of the collection named `name`.
    pub fn drop_collection(&self, name: &str) -> bool {
        let collection_id = self.read().names.get(name).copied();
        match collection_id {
            Some(collection_id) => self.close(collection_id),
            None => false,
        }
    }

    /// Close every holder and wait for their reclamation workers to drain.
    pub async fn shutdown(&self) {
        let holders: Vec<_> = {
            let mut registry = self.write();
            registry.names.clear();
            std::mem::take(&mut registry.holders).into_values().collect()
        };
        let count = holders.len();
        for holder in holders {
            holder.shutdown().await;
        }
        info!(collections = count, "Snapshot registry shut down");
    }

    /// Build a holder for `collection` by replaying its active commits.
    ///
    /// If another task loaded the same collection meanwhile, that holder wins
    /// and this one is shut down.
    async fn load(&self, collection: Collection) -> Result<Arc<SnapshotsHolder>> {
        let collection_id = collection.id();
        let commit_ids = self
            .store
            .all_active_collection_commit_ids(collection_id, false)
            .await?;
        if commit_ids.is_empty() {
            return Err(CatalogError::NotFound {
                kind: ResourceKind::CollectionCommit,
                id: collection_id,
            });
        }

        let holder = Arc::new(SnapshotsHolder::new(
            collection_id,
            Arc::clone(&self.holders),
            self.config.num_versions,
        ));
        for &commit_id in &commit_ids {
            if let Err(e) = holder.add(commit_id).await {
                holder.shutdown().await;
                return Err(e);
            }
        }

        let existing = {
            let mut registry = self.write();
            match registry.holders.get(&collection_id) {
                Some(existing) => Some(Arc::clone(existing)),
                None => {
                    registry.holders.insert(collection_id, Arc::clone(&holder));
                    registry
                        .names
                        .insert(collection.name().to_string(), collection_id);
                    None
                }
            }
        };
        if let Some(existing) = existing {
            debug!(collection_id, "Collection loaded concurrently, keeping first holder");
            holder.shutdown().await;
            return Ok(existing);
        }

        info!(
            collection_id,
            collection = %collection.name(),
            commits = commit_ids.len(),
            max_id = holder.max_id(),
            "Loaded collection"
        );
        Ok(holder)
    }

    fn read(&self) -> RwLockReadGuard<'_, Registry> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Registry> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for Snapshots {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Snapshots")
            .field("collections", &self.get_collection_ids())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests;
