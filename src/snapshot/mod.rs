//! Point-in-time views of one collection commit.
//!
//! A [`Snapshot`] materializes the transitive closure of a collection commit:
//! the collection, every schema version its segments were written against
//! (with their field lineage), and every partition, segment and segment file
//! reachable through the commit's mappings. Every entity is pinned for the
//! lifetime of the snapshot and released exactly once when the snapshot's
//! own pin count reaches zero.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::error::{CatalogError, Result};
use crate::holders::{Cached, Holders, ScopedCached};
use crate::resources::{
    Collection, CollectionCommit, Field, FieldCommit, FieldElement, Id, Ids, Partition,
    PartitionCommit, RefCounted, ReferenceProxy, Resource, SchemaCommit, ScopedResource, Segment,
    SegmentCommit, SegmentFile,
};

/// Handle to a snapshot; scoped handles keep the whole closure pinned.
pub type ScopedSnapshot = ScopedResource<Snapshot>;

type Pinned<T> = BTreeMap<Id, Arc<Cached<T>>>;

/// Immutable, fully pinned view of one collection commit.
pub struct Snapshot {
    proxy: ReferenceProxy,
    released: AtomicBool,

    collection: Arc<Cached<Collection>>,
    collection_commit: Arc<Cached<CollectionCommit>>,
    current_schema_id: Id,
    latest_schema_commit_id: Id,

    schema_commits: Pinned<SchemaCommit>,
    fields: Pinned<Field>,
    field_commits: Pinned<FieldCommit>,
    field_elements: Pinned<FieldElement>,
    /// Keyed by partition id.
    partitions: Pinned<Partition>,
    partition_commits: Pinned<PartitionCommit>,
    segments: Pinned<Segment>,
    segment_commits: Pinned<SegmentCommit>,
    segment_files: Pinned<SegmentFile>,

    field_names: BTreeMap<String, Id>,
    field_element_names: BTreeMap<String, BTreeMap<String, Id>>,
    /// field element id -> segment id -> segment file id
    element_segment_files: HashMap<Id, HashMap<Id, Id>>,
    segment_to_commit: HashMap<Id, Id>,
    partition_to_commit: HashMap<Id, Id>,
}

/// Collects the closure under temporary pins while loads are in flight.
///
/// Loads pin as they go so that nothing reached so far can be evicted from
/// its holder before the snapshot takes its own pins. Dropping the builder,
/// on success or on error, releases the temporary pins.
#[derive(Default)]
struct Builder {
    schema_commits: BTreeMap<Id, ScopedCached<SchemaCommit>>,
    fields: BTreeMap<Id, ScopedCached<Field>>,
    field_commits: BTreeMap<Id, ScopedCached<FieldCommit>>,
    field_elements: BTreeMap<Id, ScopedCached<FieldElement>>,
    partitions: BTreeMap<Id, ScopedCached<Partition>>,
    partition_commits: BTreeMap<Id, ScopedCached<PartitionCommit>>,
    segments: BTreeMap<Id, ScopedCached<Segment>>,
    segment_commits: BTreeMap<Id, ScopedCached<SegmentCommit>>,
    segment_files: BTreeMap<Id, ScopedCached<SegmentFile>>,

    field_names: BTreeMap<String, Id>,
    field_element_names: BTreeMap<String, BTreeMap<String, Id>>,
    element_segment_files: HashMap<Id, HashMap<Id, Id>>,
    segment_to_commit: HashMap<Id, Id>,
    partition_to_commit: HashMap<Id, Id>,
}

fn arc_of<T: Resource>(handle: &ScopedCached<T>, id: Id) -> Result<Arc<Cached<T>>> {
    handle
        .arc()
        .cloned()
        .ok_or(CatalogError::NotFound { kind: T::KIND, id })
}

fn arcs_of<T: Resource>(handles: &BTreeMap<Id, ScopedCached<T>>) -> Pinned<T> {
    handles
        .iter()
        .filter_map(|(id, h)| h.arc().map(|a| (*id, Arc::clone(a))))
        .collect()
}

fn pin_all<T: Resource>(entities: &Pinned<T>) {
    for entity in entities.values() {
        entity.add_ref();
    }
}

fn unpin_all<T: Resource>(entities: &Pinned<T>) {
    for entity in entities.values() {
        entity.unref();
    }
}

impl Snapshot {
    /// Assemble and pin the closure of collection commit `id`.
    ///
    /// Fails with `NotFound` if the commit or any record reachable from its
    /// mappings is missing; nothing stays pinned on failure.
    pub async fn build(holders: &Holders, id: Id) -> Result<Snapshot> {
        let collection_commit = holders.collection_commits.get_resource(id, true).await?;
        let cc = arc_of(&collection_commit, id)?;
        let current_schema_id = cc.schema_id();

        let mut b = Builder::default();
        b.load_schema_commit(holders, current_schema_id).await?;
        let collection = holders
            .collections
            .get_resource(cc.collection_id(), true)
            .await?;

        for &pc_id in cc.mappings() {
            b.load_partition_commit(holders, pc_id).await?;
        }

        let schema_ids: Ids = b.schema_commits.keys().copied().collect();
        for schema_id in schema_ids {
            b.load_field_lineage(holders, schema_id).await?;
        }

        let snapshot = Snapshot {
            proxy: ReferenceProxy::new(),
            released: AtomicBool::new(false),
            collection: arc_of(&collection, cc.collection_id())?,
            collection_commit: cc,
            current_schema_id,
            latest_schema_commit_id: b.schema_commits.keys().next_back().copied().unwrap_or(0),
            schema_commits: arcs_of(&b.schema_commits),
            fields: arcs_of(&b.fields),
            field_commits: arcs_of(&b.field_commits),
            field_elements: arcs_of(&b.field_elements),
            partitions: arcs_of(&b.partitions),
            partition_commits: arcs_of(&b.partition_commits),
            segments: arcs_of(&b.segments),
            segment_commits: arcs_of(&b.segment_commits),
            segment_files: arcs_of(&b.segment_files),
            field_names: std::mem::take(&mut b.field_names),
            field_element_names: std::mem::take(&mut b.field_element_names),
            element_segment_files: std::mem::take(&mut b.element_segment_files),
            segment_to_commit: std::mem::take(&mut b.segment_to_commit),
            partition_to_commit: std::mem::take(&mut b.partition_to_commit),
        };
        snapshot.ref_all();
        debug!(
            collection_id = snapshot.collection_id(),
            commit_id = id,
            partitions = snapshot.partitions.len(),
            segments = snapshot.segments.len(),
            segment_files = snapshot.segment_files.len(),
            schema_versions = snapshot.schema_commits.len(),
            "Built snapshot"
        );
        Ok(snapshot)
    }

    /// Collection commit id of this version.
    pub fn id(&self) -> Id {
        self.collection_commit.id()
    }

    pub fn collection_id(&self) -> Id {
        self.collection.id()
    }

    pub fn name(&self) -> &str {
        self.collection.name()
    }

    pub fn collection(&self) -> &Collection {
        self.collection.data()
    }

    pub fn collection_commit(&self) -> &CollectionCommit {
        self.collection_commit.data()
    }

    /// Schema commit named by the collection commit.
    pub fn current_schema_id(&self) -> Id {
        self.current_schema_id
    }

    /// Highest schema commit id pinned, including versions reached through segments.
    pub fn latest_schema_commit_id(&self) -> Id {
        self.latest_schema_commit_id
    }

    pub fn schema_commit_ids(&self) -> Ids {
        self.schema_commits.keys().copied().collect()
    }

    pub fn partition_ids(&self) -> Ids {
        self.partitions.keys().copied().collect()
    }

    pub fn partition_names(&self) -> Vec<String> {
        self.partitions
            .values()
            .map(|p| p.name().to_string())
            .collect()
    }

    pub fn partition(&self, partition_id: Id) -> Option<&Partition> {
        self.partitions.get(&partition_id).map(|p| p.data())
    }

    /// The partition commit this version maps for `partition_id`.
    pub fn partition_commit(&self, partition_id: Id) -> Option<&PartitionCommit> {
        let pc_id = self.partition_to_commit.get(&partition_id)?;
        self.partition_commits.get(pc_id).map(|pc| pc.data())
    }

    pub fn segment(&self, segment_id: Id) -> Option<&Segment> {
        self.segments.get(&segment_id).map(|s| s.data())
    }

    /// The segment commit this version maps for `segment_id`.
    pub fn segment_commit(&self, segment_id: Id) -> Option<&SegmentCommit> {
        let sc_id = self.segment_to_commit.get(&segment_id)?;
        self.segment_commits.get(sc_id).map(|sc| sc.data())
    }

    pub fn segment_ids(&self) -> Ids {
        self.segments.keys().copied().collect()
    }

    pub fn segment_file_ids(&self) -> Ids {
        self.segment_files.keys().copied().collect()
    }

    pub fn field_names(&self) -> Vec<String> {
        self.field_names.keys().cloned().collect()
    }

    /// Resolve a field name across every pinned schema version.
    ///
    /// A field dropped by the current schema still resolves while a segment
    /// written under an older schema that carries it is part of this
    /// version; the newest schema wins when versions disagree on a name.
    pub fn field_id(&self, field_name: &str) -> Option<Id> {
        self.field_names.get(field_name).copied()
    }

    pub fn has_field(&self, field_name: &str) -> bool {
        self.field_names.contains_key(field_name)
    }

    /// Names of every pinned field element, in element id order.
    pub fn field_element_names(&self) -> Vec<String> {
        self.field_elements
            .values()
            .map(|e| e.name().to_string())
            .collect()
    }

    /// Same resolution rules as [`Snapshot::field_id`].
    pub fn field_element_id(&self, field_name: &str, element_name: &str) -> Option<Id> {
        self.field_element_names
            .get(field_name)?
            .get(element_name)
            .copied()
    }

    pub fn has_field_element(&self, field_name: &str, element_name: &str) -> bool {
        self.field_element_id(field_name, element_name).is_some()
    }

    pub fn segment_file_id(
        &self,
        field_name: &str,
        element_name: &str,
        segment_id: Id,
    ) -> Option<Id> {
        let element_id = self.field_element_id(field_name, element_name)?;
        self.element_segment_files
            .get(&element_id)?
            .get(&segment_id)
            .copied()
    }

    pub fn has_segment_file(&self, field_name: &str, element_name: &str, segment_id: Id) -> bool {
        self.segment_file_id(field_name, element_name, segment_id)
            .is_some()
    }

    pub fn segment_file(&self, segment_file_id: Id) -> Option<&SegmentFile> {
        self.segment_files.get(&segment_file_id).map(|f| f.data())
    }

    /// Whether the entity pins have been dropped.
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    fn ref_all(&self) {
        self.collection_commit.add_ref();
        pin_all(&self.schema_commits);
        pin_all(&self.field_elements);
        pin_all(&self.fields);
        pin_all(&self.field_commits);
        self.collection.add_ref();
        pin_all(&self.partitions);
        pin_all(&self.partition_commits);
        pin_all(&self.segments);
        pin_all(&self.segment_commits);
        pin_all(&self.segment_files);
    }

    /// Release every entity pin taken by [`Snapshot::build`]. Idempotent.
    pub(crate) fn unref_all(&self) {
        if self.released.swap(true, Ordering::AcqRel) {
            return;
        }
        self.collection_commit.unref();
        unpin_all(&self.schema_commits);
        unpin_all(&self.field_elements);
        unpin_all(&self.fields);
        unpin_all(&self.field_commits);
        self.collection.unref();
        unpin_all(&self.partitions);
        unpin_all(&self.partition_commits);
        unpin_all(&self.segments);
        unpin_all(&self.segment_commits);
        unpin_all(&self.segment_files);
        debug!(
            collection_id = self.collection_id(),
            commit_id = self.id(),
            "Released snapshot pins"
        );
    }
}

impl Builder {
    async fn load_schema_commit(&mut self, holders: &Holders, id: Id) -> Result<()> {
        if !self.schema_commits.contains_key(&id) {
            let schema = holders.schema_commits.get_resource(id, true).await?;
            self.schema_commits.insert(id, schema);
        }
        Ok(())
    }

    async fn load_partition_commit(&mut self, holders: &Holders, pc_id: Id) -> Result<()> {
        let handle = holders.partition_commits.get_resource(pc_id, true).await?;
        let pc = arc_of(&handle, pc_id)?;
        let partition_id = pc.partition_id();
        let partition = holders.partitions.get_resource(partition_id, true).await?;

        self.partition_to_commit.insert(partition_id, pc_id);
        self.partition_commits.insert(pc_id, handle);
        self.partitions.insert(partition_id, partition);

        for &sc_id in pc.mappings() {
            self.load_segment_commit(holders, sc_id).await?;
        }
        Ok(())
    }

    async fn load_segment_commit(&mut self, holders: &Holders, sc_id: Id) -> Result<()> {
        let handle = holders.segment_commits.get_resource(sc_id, true).await?;
        let sc = arc_of(&handle, sc_id)?;
        let segment = holders.segments.get_resource(sc.segment_id(), true).await?;
        self.load_schema_commit(holders, sc.schema_id()).await?;

        self.segment_to_commit.insert(sc.segment_id(), sc_id);
        self.segment_commits.insert(sc_id, handle);
        self.segments.insert(sc.segment_id(), segment);

        for &sf_id in sc.mappings() {
            let file = holders.segment_files.get_resource(sf_id, true).await?;
            let sf = arc_of(&file, sf_id)?;
            let element_id = sf.field_element_id();
            if !self.field_elements.contains_key(&element_id) {
                let element = holders.field_elements.get_resource(element_id, true).await?;
                self.field_elements.insert(element_id, element);
            }
            self.element_segment_files
                .entry(element_id)
                .or_default()
                .insert(sf.segment_id(), sf_id);
            self.segment_files.insert(sf_id, file);
        }
        Ok(())
    }

    /// Resolve one schema version's own fields and elements.
    ///
    /// Called in ascending schema id order, so the newest version wins a name.
    async fn load_field_lineage(&mut self, holders: &Holders, schema_id: Id) -> Result<()> {
        let schema = match self.schema_commits.get(&schema_id) {
            Some(handle) => arc_of(handle, schema_id)?,
            None => return Ok(()),
        };
        for &fc_id in schema.mappings() {
            let handle = holders.field_commits.get_resource(fc_id, true).await?;
            let fc = arc_of(&handle, fc_id)?;
            self.field_commits.insert(fc_id, handle);

            let field_handle = holders.fields.get_resource(fc.field_id(), true).await?;
            let field = arc_of(&field_handle, fc.field_id())?;
            self.fields.insert(field.id(), field_handle);
            self.field_names.insert(field.name().to_string(), field.id());

            for &element_id in fc.mappings() {
                let element_handle = holders.field_elements.get_resource(element_id, true).await?;
                let element = arc_of(&element_handle, element_id)?;
                self.field_elements.insert(element_id, element_handle);
                self.field_element_names
                    .entry(field.name().to_string())
                    .or_default()
                    .insert(element.name().to_string(), element_id);
            }
        }
        Ok(())
    }
}

impl RefCounted for Snapshot {
    fn proxy(&self) -> &ReferenceProxy {
        &self.proxy
    }

    fn ref_name(&self) -> &'static str {
        "Snapshot"
    }

    fn ref_id(&self) -> Id {
        self.id()
    }
}

impl std::fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Snapshot")
            .field("id", &self.id())
            .field("collection", &self.name())
            .field("refs", &self.proxy.ref_count())
            .field("partitions", &self.partitions.len())
            .field("segments", &self.segments.len())
            .field("released", &self.is_released())
            .finish()
    }
}
