//! Test utilities.
//!
//! [`CatalogFixture`] drives a [`MemoryCatalogStore`] through the commit
//! patterns a writer produces: new partitions, new segments, dropped
//! segments and schema evolution (added or dropped fields). Every mutation publishes a new active
//! collection commit and returns its id.

use std::sync::Arc;

use crate::error::{CatalogError, Result};
use crate::interfaces::{CatalogStore, CatalogStoreExt};
use crate::resources::{
    Collection, CollectionCommit, Field, FieldCommit, FieldElement, Id, Ids, Partition,
    PartitionCommit, Resource, SchemaCommit, Segment, SegmentCommit, SegmentFile,
};
use crate::schema::{CollectionSchema, FieldSchema, RAW_ELEMENT_NAME, RAW_ELEMENT_TYPE};
use crate::storage::MemoryCatalogStore;

/// Two-field schema: `vector` with an `IVFFLAT` index element and `price`.
pub fn test_schema(name: &str) -> CollectionSchema {
    CollectionSchema::new(name)
        .with_field(FieldSchema::new("vector", 101).with_element("IVFFLAT", 2))
        .with_field(FieldSchema::new("price", 5))
}

/// One collection in an in-memory store, with helpers to publish commits.
pub struct CatalogFixture {
    pub store: Arc<MemoryCatalogStore>,
    pub collection: Collection,
}

impl CatalogFixture {
    pub async fn new(name: &str) -> Result<Self> {
        Self::with_store(Arc::new(MemoryCatalogStore::new()), name).await
    }

    /// Create another collection in an existing store.
    pub async fn with_store(store: Arc<MemoryCatalogStore>, name: &str) -> Result<Self> {
        Self::with_schema(store, &test_schema(name)).await
    }

    pub async fn with_schema(
        store: Arc<MemoryCatalogStore>,
        schema: &CollectionSchema,
    ) -> Result<Self> {
        let collection = store.create_collection(schema).await?;
        Ok(Self { store, collection })
    }

    pub fn collection_id(&self) -> Id {
        self.collection.id()
    }

    /// Active commit ids, ascending.
    pub async fn commit_ids(&self) -> Result<Ids> {
        self.store
            .all_active_collection_commit_ids(self.collection.id(), false)
            .await
    }

    pub async fn latest_commit(&self) -> Result<CollectionCommit> {
        let id = self
            .commit_ids()
            .await?
            .last()
            .copied()
            .ok_or_else(|| CatalogError::CollectionNotFound(self.collection.name().into()))?;
        self.load(id).await
    }

    /// Publish a commit adding an empty partition.
    pub async fn add_partition(&self, name: &str) -> Result<Id> {
        let base = self.latest_commit().await?;
        let partition = self
            .store
            .create_resource(Partition::new(name, self.collection.id()))
            .await?;
        let pc = self
            .store
            .create_resource(PartitionCommit::new(self.collection.id(), partition.id(), []))
            .await?;

        let mut mappings: Ids = base.mappings().iter().copied().collect();
        mappings.push(pc.id());
        self.publish(base.schema_id(), mappings).await
    }

    /// Publish a commit adding one segment to `partition_name`, with a file
    /// for every field element of the current schema.
    ///
    /// Returns `(commit_id, segment_id)`.
    pub async fn add_segment(&self, partition_name: &str) -> Result<(Id, Id)> {
        let base = self.latest_commit().await?;
        let (old_pc, partition_id) = self.partition_commit_for(&base, partition_name).await?;

        let segment = self.store.create_resource(Segment::new(partition_id)).await?;
        let mut files = Vec::new();
        for element_id in self.schema_element_ids(base.schema_id()).await? {
            let file = self
                .store
                .create_resource(SegmentFile::new(partition_id, segment.id(), element_id))
                .await?;
            files.push(file.id());
        }
        let sc = self
            .store
            .create_resource(SegmentCommit::new(
                base.schema_id(),
                partition_id,
                segment.id(),
                files,
            ))
            .await?;

        let mut segment_commits: Ids = old_pc.mappings().iter().copied().collect();
        segment_commits.push(sc.id());
        let commit_id = self
            .replace_partition_commit(&base, &old_pc, segment_commits)
            .await?;
        Ok((commit_id, segment.id()))
    }

    /// Publish a commit without `segment_id` in `partition_name`.
    pub async fn drop_segment(&self, partition_name: &str, segment_id: Id) -> Result<Id> {
        let base = self.latest_commit().await?;
        let (old_pc, _) = self.partition_commit_for(&base, partition_name).await?;

        let mut kept = Vec::new();
        for &sc_id in old_pc.mappings() {
            let sc: SegmentCommit = self.load(sc_id).await?;
            if sc.segment_id() != segment_id {
                kept.push(sc_id);
            }
        }
        self.replace_partition_commit(&base, &old_pc, kept).await
    }

    /// Publish a commit whose schema adds `field_name` with the given elements.
    pub async fn add_field(&self, field_name: &str, elements: &[(&str, i32)]) -> Result<Id> {
        let base = self.latest_commit().await?;
        let schema: SchemaCommit = self.load(base.schema_id()).await?;
        let cid = self.collection.id();

        let field = self
            .store
            .create_resource(Field::new(field_name, schema.mappings().len() as u32))
            .await?;
        let raw = self
            .store
            .create_resource(FieldElement::new(
                cid,
                field.id(),
                RAW_ELEMENT_NAME,
                RAW_ELEMENT_TYPE,
            ))
            .await?;
        let mut element_ids = vec![raw.id()];
        for (name, element_type) in elements {
            let element = self
                .store
                .create_resource(FieldElement::new(cid, field.id(), *name, *element_type))
                .await?;
            element_ids.push(element.id());
        }
        let fc = self
            .store
            .create_resource(FieldCommit::new(cid, field.id(), element_ids))
            .await?;

        let mut field_commits: Ids = schema.mappings().iter().copied().collect();
        field_commits.push(fc.id());
        let schema = self
            .store
            .create_resource(SchemaCommit::new(cid, field_commits))
            .await?;
        self.publish(schema.id(), base.mappings().iter().copied().collect())
            .await
    }

    /// Publish a commit whose schema no longer carries `field_name`.
    pub async fn drop_field(&self, field_name: &str) -> Result<Id> {
        let base = self.latest_commit().await?;
        let schema: SchemaCommit = self.load(base.schema_id()).await?;

        let mut kept = Vec::new();
        for &fc_id in schema.mappings() {
            let fc: FieldCommit = self.load(fc_id).await?;
            let field: Field = self.load(fc.field_id()).await?;
            if field.name() != field_name {
                kept.push(fc_id);
            }
        }
        let schema = self
            .store
            .create_resource(SchemaCommit::new(self.collection.id(), kept))
            .await?;
        self.publish(schema.id(), base.mappings().iter().copied().collect())
            .await
    }

    /// Every field element id reachable from a schema commit.
    pub async fn schema_element_ids(&self, schema_id: Id) -> Result<Ids> {
        let schema: SchemaCommit = self.load(schema_id).await?;
        let mut ids = Vec::new();
        for &fc_id in schema.mappings() {
            let fc: FieldCommit = self.load(fc_id).await?;
            ids.extend(fc.mappings().iter().copied());
        }
        Ok(ids)
    }

    async fn partition_commit_for(
        &self,
        base: &CollectionCommit,
        partition_name: &str,
    ) -> Result<(PartitionCommit, Id)> {
        for &pc_id in base.mappings() {
            let pc: PartitionCommit = self.load(pc_id).await?;
            let partition: Partition = self.load(pc.partition_id()).await?;
            if partition.name() == partition_name {
                let partition_id = partition.id();
                return Ok((pc, partition_id));
            }
        }
        Err(CatalogError::Store(format!(
            "partition {partition_name} not in commit {}",
            base.id()
        )))
    }

    async fn replace_partition_commit(
        &self,
        base: &CollectionCommit,
        old_pc: &PartitionCommit,
        segment_commits: Ids,
    ) -> Result<Id> {
        let pc = self
            .store
            .create_resource(PartitionCommit::new(
                self.collection.id(),
                old_pc.partition_id(),
                segment_commits,
            ))
            .await?;
        let mappings = base
            .mappings()
            .iter()
            .map(|&id| if id == old_pc.id() { pc.id() } else { id })
            .collect();
        self.publish(base.schema_id(), mappings).await
    }

    async fn publish(&self, schema_id: Id, mappings: Ids) -> Result<Id> {
        let mut commit = CollectionCommit::new(self.collection.id(), schema_id, mappings);
        commit.activate();
        Ok(self.store.create_resource(commit).await?.id())
    }

    async fn load<T: Resource>(&self, id: Id) -> Result<T> {
        self.store
            .get_resource::<T>(id)
            .await?
            .ok_or(CatalogError::NotFound { kind: T::KIND, id })
    }
}
