//! Backing store interface.

use async_trait::async_trait;

use crate::error::{CatalogError, Result};
use crate::resources::{Collection, Id, Ids, Record, Resource, ResourceKind};
use crate::schema::CollectionSchema;

/// Interface for durable catalog record storage.
///
/// The store hands out immutable copies; identity and reference counting
/// live in the per-kind [`Holder`](crate::holders::Holder) caches above it.
/// Ids are assigned by the store, increase monotonically per kind and are
/// never reused.
///
/// Implementations:
/// - `MemoryCatalogStore`: in-process storage
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Fetch one record. Returns `None` if no record of that kind has this id.
    async fn get_record(&self, kind: ResourceKind, id: Id) -> Result<Option<Record>>;

    /// Fetch a collection by name.
    async fn get_collection(&self, name: &str) -> Result<Option<Collection>>;

    /// Ids of all active collections, ascending unless `reversed`.
    async fn all_active_collection_ids(&self, reversed: bool) -> Result<Ids>;

    /// Ids of all active commits of one collection, ascending unless `reversed`.
    async fn all_active_collection_commit_ids(
        &self,
        collection_id: Id,
        reversed: bool,
    ) -> Result<Ids>;

    /// Store a new record, assigning its id.
    ///
    /// Every id the record references must already exist.
    async fn create_record(&self, record: Record) -> Result<Record>;

    /// Remove one record. Returns false if it did not exist.
    async fn remove_record(&self, kind: ResourceKind, id: Id) -> Result<bool>;

    /// Build the initial record graph for a brand-new collection.
    async fn create_collection(&self, schema: &CollectionSchema) -> Result<Collection>;

    /// Remove a collection record and its name.
    async fn remove_collection(&self, id: Id) -> Result<bool> {
        self.remove_record(ResourceKind::Collection, id).await
    }
}

/// Typed helpers over [`CatalogStore`].
#[async_trait]
pub trait CatalogStoreExt: CatalogStore {
    async fn get_resource<T: Resource>(&self, id: Id) -> Result<Option<T>> {
        Ok(self
            .get_record(T::KIND, id)
            .await?
            .and_then(T::from_record))
    }

    async fn create_resource<T: Resource>(&self, resource: T) -> Result<T> {
        let record = self.create_record(resource.into_record()).await?;
        T::from_record(record).ok_or_else(|| {
            CatalogError::Store(format!("store returned a record that is not a {}", T::KIND))
        })
    }

    async fn remove_resource<T: Resource>(&self, id: Id) -> Result<bool> {
        self.remove_record(T::KIND, id).await
    }
}

impl<S: CatalogStore + ?Sized> CatalogStoreExt for S {}
