//! Immutable catalog records.
//!
//! Every record carries a store-assigned id (0 until created) and, for the
//! commit kinds, a mapping set naming the records of the next level down.

use super::{Id, Mappings};

/// A named logical table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collection {
    pub(crate) id: Id,
    name: String,
    active: bool,
}

impl Collection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: 0,
            name: name.into(),
            active: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn activate(&mut self) {
        self.active = true;
    }

    pub fn deactivate(&mut self) {
        self.active = false;
    }
}

/// One version of a collection's structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionCommit {
    pub(crate) id: Id,
    collection_id: Id,
    schema_id: Id,
    mappings: Mappings,
    active: bool,
}

impl CollectionCommit {
    pub fn new(collection_id: Id, schema_id: Id, mappings: impl IntoIterator<Item = Id>) -> Self {
        Self {
            id: 0,
            collection_id,
            schema_id,
            mappings: mappings.into_iter().collect(),
            active: false,
        }
    }

    pub fn collection_id(&self) -> Id {
        self.collection_id
    }

    /// Id of the schema commit current at this version.
    pub fn schema_id(&self) -> Id {
        self.schema_id
    }

    /// Partition commit ids.
    pub fn mappings(&self) -> &Mappings {
        &self.mappings
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn activate(&mut self) {
        self.active = true;
    }
}

/// One version of the field schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaCommit {
    pub(crate) id: Id,
    collection_id: Id,
    mappings: Mappings,
}

impl SchemaCommit {
    pub fn new(collection_id: Id, mappings: impl IntoIterator<Item = Id>) -> Self {
        Self {
            id: 0,
            collection_id,
            mappings: mappings.into_iter().collect(),
        }
    }

    pub fn collection_id(&self) -> Id {
        self.collection_id
    }

    /// Field commit ids.
    pub fn mappings(&self) -> &Mappings {
        &self.mappings
    }
}

/// A named column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub(crate) id: Id,
    name: String,
    num: u32,
}

impl Field {
    pub fn new(name: impl Into<String>, num: u32) -> Self {
        Self {
            id: 0,
            name: name.into(),
            num,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sequence index of the field within its schema.
    pub fn num(&self) -> u32 {
        self.num
    }
}

/// One version of a field's element set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldCommit {
    pub(crate) id: Id,
    collection_id: Id,
    field_id: Id,
    mappings: Mappings,
}

impl FieldCommit {
    pub fn new(collection_id: Id, field_id: Id, mappings: impl IntoIterator<Item = Id>) -> Self {
        Self {
            id: 0,
            collection_id,
            field_id,
            mappings: mappings.into_iter().collect(),
        }
    }

    pub fn collection_id(&self) -> Id {
        self.collection_id
    }

    pub fn field_id(&self) -> Id {
        self.field_id
    }

    /// Field element ids.
    pub fn mappings(&self) -> &Mappings {
        &self.mappings
    }
}

/// A physical sub-artifact of a field, such as raw values or an index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldElement {
    pub(crate) id: Id,
    collection_id: Id,
    field_id: Id,
    name: String,
    element_type: i32,
}

impl FieldElement {
    pub fn new(collection_id: Id, field_id: Id, name: impl Into<String>, element_type: i32) -> Self {
        Self {
            id: 0,
            collection_id,
            field_id,
            name: name.into(),
            element_type,
        }
    }

    pub fn collection_id(&self) -> Id {
        self.collection_id
    }

    pub fn field_id(&self) -> Id {
        self.field_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn element_type(&self) -> i32 {
        self.element_type
    }
}

/// A named shard of a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    pub(crate) id: Id,
    name: String,
    collection_id: Id,
}

impl Partition {
    pub fn new(name: impl Into<String>, collection_id: Id) -> Self {
        Self {
            id: 0,
            name: name.into(),
            collection_id,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn collection_id(&self) -> Id {
        self.collection_id
    }
}

/// One version of a partition's segment set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionCommit {
    pub(crate) id: Id,
    collection_id: Id,
    partition_id: Id,
    mappings: Mappings,
}

impl PartitionCommit {
    pub fn new(collection_id: Id, partition_id: Id, mappings: impl IntoIterator<Item = Id>) -> Self {
        Self {
            id: 0,
            collection_id,
            partition_id,
            mappings: mappings.into_iter().collect(),
        }
    }

    pub fn collection_id(&self) -> Id {
        self.collection_id
    }

    pub fn partition_id(&self) -> Id {
        self.partition_id
    }

    /// Segment commit ids.
    pub fn mappings(&self) -> &Mappings {
        &self.mappings
    }
}

/// A physical data segment within a partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub(crate) id: Id,
    partition_id: Id,
}

impl Segment {
    pub fn new(partition_id: Id) -> Self {
        Self { id: 0, partition_id }
    }

    pub fn partition_id(&self) -> Id {
        self.partition_id
    }
}

/// One version of a segment's file set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentCommit {
    pub(crate) id: Id,
    schema_id: Id,
    partition_id: Id,
    segment_id: Id,
    mappings: Mappings,
}

impl SegmentCommit {
    pub fn new(
        schema_id: Id,
        partition_id: Id,
        segment_id: Id,
        mappings: impl IntoIterator<Item = Id>,
    ) -> Self {
        Self {
            id: 0,
            schema_id,
            partition_id,
            segment_id,
            mappings: mappings.into_iter().collect(),
        }
    }

    /// Schema commit the segment was written against.
    pub fn schema_id(&self) -> Id {
        self.schema_id
    }

    pub fn partition_id(&self) -> Id {
        self.partition_id
    }

    pub fn segment_id(&self) -> Id {
        self.segment_id
    }

    /// Segment file ids.
    pub fn mappings(&self) -> &Mappings {
        &self.mappings
    }
}

/// One stored artifact of one field element within one segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentFile {
    pub(crate) id: Id,
    partition_id: Id,
    segment_id: Id,
    field_element_id: Id,
}

impl SegmentFile {
    pub fn new(partition_id: Id, segment_id: Id, field_element_id: Id) -> Self {
        Self {
            id: 0,
            partition_id,
            segment_id,
            field_element_id,
        }
    }

    pub fn partition_id(&self) -> Id {
        self.partition_id
    }

    pub fn segment_id(&self) -> Id {
        self.segment_id
    }

    pub fn field_element_id(&self) -> Id {
        self.field_element_id
    }
}
