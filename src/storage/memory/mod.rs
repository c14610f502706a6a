//! In-memory catalog store.
//!
//! Keeps every record kind in its own ordered table. Suitable for tests and
//! single-process deployments; nothing survives a restart.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{CatalogError, Result};
use crate::interfaces::CatalogStore;
use crate::resources::{
    Collection, CollectionCommit, Field, FieldCommit, FieldElement, Id, Ids, Partition,
    PartitionCommit, Record, Resource, ResourceKind, SchemaCommit,
};
use crate::schema::{
    CollectionSchema, DEFAULT_PARTITION_NAME, RAW_ELEMENT_NAME, RAW_ELEMENT_TYPE,
};

#[derive(Default)]
struct Tables {
    records: HashMap<ResourceKind, BTreeMap<Id, Record>>,
    last_ids: HashMap<ResourceKind, Id>,
    collection_names: HashMap<String, Id>,
}

impl Tables {
    fn table(&self, kind: ResourceKind) -> Option<&BTreeMap<Id, Record>> {
        self.records.get(&kind)
    }

    fn contains(&self, kind: ResourceKind, id: Id) -> bool {
        self.table(kind).is_some_and(|t| t.contains_key(&id))
    }

    /// Validate references, assign the next id and insert.
    fn insert(&mut self, mut record: Record) -> Result<Record> {
        let kind = record.kind();
        for (ref_kind, ref_id) in record.references() {
            if !self.contains(ref_kind, ref_id) {
                return Err(CatalogError::NotFound {
                    kind: ref_kind,
                    id: ref_id,
                });
            }
        }
        if let Record::Collection(c) = &record {
            if self.collection_names.contains_key(c.name()) {
                return Err(CatalogError::Store(format!(
                    "collection {} already exists",
                    c.name()
                )));
            }
        }

        let last = self.last_ids.entry(kind).or_insert(0);
        *last += 1;
        let id = *last;
        record.set_id(id);

        if let Record::Collection(c) = &record {
            self.collection_names.insert(c.name().to_string(), id);
        }
        self.records
            .entry(kind)
            .or_default()
            .insert(id, record.clone());
        debug!(kind = %kind, id, "Created record");
        Ok(record)
    }

    fn insert_typed<T: Resource>(&mut self, resource: T) -> Result<T> {
        let record = self.insert(resource.into_record())?;
        T::from_record(record)
            .ok_or_else(|| CatalogError::Store(format!("record kind mismatch for {}", T::KIND)))
    }
}

/// Catalog store holding all records in memory.
#[derive(Default)]
pub struct MemoryCatalogStore {
    tables: RwLock<Tables>,
    fail_on_get: AtomicBool,
    loads: AtomicUsize,
}

impl MemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `get_record` fail with a store error.
    pub fn set_fail_on_get(&self, fail: bool) {
        self.fail_on_get.store(fail, Ordering::SeqCst);
    }

    /// Number of successful record loads served so far.
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    /// Number of stored records of one kind.
    pub async fn record_count(&self, kind: ResourceKind) -> usize {
        self.tables
            .read()
            .await
            .table(kind)
            .map(BTreeMap::len)
            .unwrap_or(0)
    }

    /// Mark a collection inactive so it no longer appears in active listings.
    pub async fn deactivate_collection(&self, id: Id) -> Result<()> {
        let mut tables = self.tables.write().await;
        match tables
            .records
            .get_mut(&ResourceKind::Collection)
            .and_then(|t| t.get_mut(&id))
        {
            Some(Record::Collection(c)) => {
                c.deactivate();
                Ok(())
            }
            _ => Err(CatalogError::NotFound {
                kind: ResourceKind::Collection,
                id,
            }),
        }
    }
}

fn ordered(mut ids: Ids, reversed: bool) -> Ids {
    ids.sort_unstable();
    if reversed {
        ids.reverse();
    }
    ids
}

#[async_trait]
impl CatalogStore for MemoryCatalogStore {
    async fn get_record(&self, kind: ResourceKind, id: Id) -> Result<Option<Record>> {
        if self.fail_on_get.load(Ordering::SeqCst) {
            return Err(CatalogError::Store(format!(
                "injected failure loading {kind} {id}"
            )));
        }
        let tables = self.tables.read().await;
        let record = tables.table(kind).and_then(|t| t.get(&id)).cloned();
        if record.is_some() {
            self.loads.fetch_add(1, Ordering::SeqCst);
            debug!(kind = %kind, id, "Loaded record");
        }
        Ok(record)
    }

    async fn get_collection(&self, name: &str) -> Result<Option<Collection>> {
        let tables = self.tables.read().await;
        let Some(id) = tables.collection_names.get(name) else {
            return Ok(None);
        };
        Ok(tables
            .table(ResourceKind::Collection)
            .and_then(|t| t.get(id))
            .cloned()
            .and_then(Collection::from_record))
    }

    async fn all_active_collection_ids(&self, reversed: bool) -> Result<Ids> {
        let tables = self.tables.read().await;
        let ids = tables
            .table(ResourceKind::Collection)
            .into_iter()
            .flat_map(|t| t.values())
            .filter_map(|r| match r {
                Record::Collection(c) if c.is_active() => Some(c.id()),
                _ => None,
            })
            .collect();
        Ok(ordered(ids, reversed))
    }

    async fn all_active_collection_commit_ids(
        &self,
        collection_id: Id,
        reversed: bool,
    ) -> Result<Ids> {
        let tables = self.tables.read().await;
        let ids = tables
            .table(ResourceKind::CollectionCommit)
            .into_iter()
            .flat_map(|t| t.values())
            .filter_map(|r| match r {
                Record::CollectionCommit(cc)
                    if cc.is_active() && cc.collection_id() == collection_id =>
                {
                    Some(cc.id())
                }
                _ => None,
            })
            .collect();
        Ok(ordered(ids, reversed))
    }

    async fn create_record(&self, record: Record) -> Result<Record> {
        self.tables.write().await.insert(record)
    }

    async fn remove_record(&self, kind: ResourceKind, id: Id) -> Result<bool> {
        let mut tables = self.tables.write().await;
        let removed = tables
            .records
            .get_mut(&kind)
            .and_then(|t| t.remove(&id));
        match removed {
            Some(Record::Collection(c)) => {
                tables.collection_names.remove(c.name());
            }
            Some(_) => {}
            None => return Ok(false),
        }
        debug!(kind = %kind, id, "Removed record");
        Ok(true)
    }

    async fn create_collection(&self, schema: &CollectionSchema) -> Result<Collection> {
        schema.validate()?;
        let mut tables = self.tables.write().await;

        let mut collection = Collection::new(schema.name.clone());
        collection.activate();
        let collection = tables.insert_typed(collection)?;
        let cid = collection.id();

        let mut field_commit_ids = Vec::with_capacity(schema.fields.len());
        for (num, field_schema) in schema.fields.iter().enumerate() {
            let field = tables.insert_typed(Field::new(field_schema.name.clone(), num as u32))?;
            let raw = tables.insert_typed(FieldElement::new(
                cid,
                field.id(),
                RAW_ELEMENT_NAME,
                RAW_ELEMENT_TYPE,
            ))?;
            let mut element_ids = vec![raw.id()];
            for element in &field_schema.elements {
                let element = tables.insert_typed(FieldElement::new(
                    cid,
                    field.id(),
                    element.name.clone(),
                    element.element_type,
                ))?;
                element_ids.push(element.id());
            }
            let field_commit = tables.insert_typed(FieldCommit::new(cid, field.id(), element_ids))?;
            field_commit_ids.push(field_commit.id());
        }
        let schema_commit = tables.insert_typed(SchemaCommit::new(cid, field_commit_ids))?;

        let partition = tables.insert_typed(Partition::new(DEFAULT_PARTITION_NAME, cid))?;
        let partition_commit =
            tables.insert_typed(PartitionCommit::new(cid, partition.id(), []))?;

        let mut commit = CollectionCommit::new(cid, schema_commit.id(), [partition_commit.id()]);
        commit.activate();
        let commit = tables.insert_typed(commit)?;

        debug!(
            collection = %collection.name(),
            collection_id = cid,
            commit_id = commit.id(),
            "Created collection"
        );
        Ok(collection)
    }
}
