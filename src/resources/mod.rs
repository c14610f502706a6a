//! Catalog resources.
//!
//! Records are immutable once created; a new version of anything is a new
//! commit record. The backing store moves records around as [`Record`], the
//! typed API works with the concrete structs through the [`Resource`] trait.

use std::collections::BTreeSet;
use std::fmt;

mod entities;
pub mod proxy;
pub mod scoped;

pub use entities::{
    Collection, CollectionCommit, Field, FieldCommit, FieldElement, Partition, PartitionCommit,
    SchemaCommit, Segment, SegmentCommit, SegmentFile,
};
pub use proxy::{RefCounted, ReferenceProxy};
pub use scoped::ScopedResource;

/// Record identifier. Monotonically increasing per kind, never reused; 0 means unassigned.
pub type Id = u64;

/// Ordered list of ids.
pub type Ids = Vec<Id>;

/// Ids of the records one level down from a commit.
pub type Mappings = BTreeSet<Id>;

/// Discriminates the eleven record kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    Collection,
    CollectionCommit,
    SchemaCommit,
    Field,
    FieldCommit,
    FieldElement,
    Partition,
    PartitionCommit,
    Segment,
    SegmentCommit,
    SegmentFile,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 11] = [
        ResourceKind::Collection,
        ResourceKind::CollectionCommit,
        ResourceKind::SchemaCommit,
        ResourceKind::Field,
        ResourceKind::FieldCommit,
        ResourceKind::FieldElement,
        ResourceKind::Partition,
        ResourceKind::PartitionCommit,
        ResourceKind::Segment,
        ResourceKind::SegmentCommit,
        ResourceKind::SegmentFile,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Collection => "Collection",
            ResourceKind::CollectionCommit => "CollectionCommit",
            ResourceKind::SchemaCommit => "SchemaCommit",
            ResourceKind::Field => "Field",
            ResourceKind::FieldCommit => "FieldCommit",
            ResourceKind::FieldElement => "FieldElement",
            ResourceKind::Partition => "Partition",
            ResourceKind::PartitionCommit => "PartitionCommit",
            ResourceKind::Segment => "Segment",
            ResourceKind::SegmentCommit => "SegmentCommit",
            ResourceKind::SegmentFile => "SegmentFile",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Untyped record as exchanged with the backing store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    Collection(Collection),
    CollectionCommit(CollectionCommit),
    SchemaCommit(SchemaCommit),
    Field(Field),
    FieldCommit(FieldCommit),
    FieldElement(FieldElement),
    Partition(Partition),
    PartitionCommit(PartitionCommit),
    Segment(Segment),
    SegmentCommit(SegmentCommit),
    SegmentFile(SegmentFile),
}

/// Typed access to one record kind.
pub trait Resource: Clone + fmt::Debug + Send + Sync + 'static {
    const KIND: ResourceKind;

    fn id(&self) -> Id;

    /// Assigned by the store on creation.
    fn set_id(&mut self, id: Id);

    fn into_record(self) -> Record;

    /// `None` when the record is of another kind.
    fn from_record(record: Record) -> Option<Self>;
}

macro_rules! impl_resource {
    ($($ty:ident),* $(,)?) => {
        $(
            impl Resource for $ty {
                const KIND: ResourceKind = ResourceKind::$ty;

                fn id(&self) -> Id {
                    self.id
                }

                fn set_id(&mut self, id: Id) {
                    self.id = id;
                }

                fn into_record(self) -> Record {
                    Record::$ty(self)
                }

                fn from_record(record: Record) -> Option<Self> {
                    match record {
                        Record::$ty(r) => Some(r),
                        _ => None,
                    }
                }
            }
        )*

        impl Record {
            pub fn kind(&self) -> ResourceKind {
                match self {
                    $(Record::$ty(_) => ResourceKind::$ty,)*
                }
            }

            pub fn id(&self) -> Id {
                match self {
                    $(Record::$ty(r) => r.id,)*
                }
            }

            pub(crate) fn set_id(&mut self, id: Id) {
                match self {
                    $(Record::$ty(r) => r.id = id,)*
                }
            }
        }
    };
}

impl_resource!(
    Collection,
    CollectionCommit,
    SchemaCommit,
    Field,
    FieldCommit,
    FieldElement,
    Partition,
    PartitionCommit,
    Segment,
    SegmentCommit,
    SegmentFile,
);

impl Record {
    /// Every (kind, id) this record points at: parent ids plus its mapping set.
    pub fn references(&self) -> Vec<(ResourceKind, Id)> {
        use ResourceKind as K;

        fn with_mappings(
            mut refs: Vec<(ResourceKind, Id)>,
            kind: ResourceKind,
            mappings: &Mappings,
        ) -> Vec<(ResourceKind, Id)> {
            refs.extend(mappings.iter().map(|id| (kind, *id)));
            refs
        }

        match self {
            Record::Collection(_) | Record::Field(_) => Vec::new(),
            Record::CollectionCommit(r) => with_mappings(
                vec![
                    (K::Collection, r.collection_id()),
                    (K::SchemaCommit, r.schema_id()),
                ],
                K::PartitionCommit,
                r.mappings(),
            ),
            Record::SchemaCommit(r) => with_mappings(
                vec![(K::Collection, r.collection_id())],
                K::FieldCommit,
                r.mappings(),
            ),
            Record::FieldCommit(r) => with_mappings(
                vec![(K::Collection, r.collection_id()), (K::Field, r.field_id())],
                K::FieldElement,
                r.mappings(),
            ),
            Record::FieldElement(r) => {
                vec![(K::Collection, r.collection_id()), (K::Field, r.field_id())]
            }
            Record::Partition(r) => vec![(K::Collection, r.collection_id())],
            Record::PartitionCommit(r) => with_mappings(
                vec![
                    (K::Collection, r.collection_id()),
                    (K::Partition, r.partition_id()),
                ],
                K::SegmentCommit,
                r.mappings(),
            ),
            Record::Segment(r) => vec![(K::Partition, r.partition_id())],
            Record::SegmentCommit(r) => with_mappings(
                vec![
                    (K::SchemaCommit, r.schema_id()),
                    (K::Partition, r.partition_id()),
                    (K::Segment, r.segment_id()),
                ],
                K::SegmentFile,
                r.mappings(),
            ),
            Record::SegmentFile(r) => vec![
                (K::Partition, r.partition_id()),
                (K::Segment, r.segment_id()),
                (K::FieldElement, r.field_element_id()),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_references_include_parents_and_mappings() {
        let commit = SegmentCommit::new(4, 2, 3, [10, 11]).into_record();
        assert_eq!(
            commit.references(),
            vec![
                (ResourceKind::SchemaCommit, 4),
                (ResourceKind::Partition, 2),
                (ResourceKind::Segment, 3),
                (ResourceKind::SegmentFile, 10),
                (ResourceKind::SegmentFile, 11),
            ]
        );
        assert!(Collection::new("c").into_record().references().is_empty());
    }

    #[test]
    fn test_record_roundtrip_keeps_kind_and_id() {
        let mut field = Field::new("vector", 2);
        field.set_id(9);

        let record = field.clone().into_record();
        assert_eq!(record.kind(), ResourceKind::Field);
        assert_eq!(record.id(), 9);
        assert_eq!(Field::from_record(record), Some(field));
    }

    #[test]
    fn test_from_record_rejects_other_kind() {
        let record = Segment::new(3).into_record();
        assert!(Partition::from_record(record).is_none());
    }

    #[test]
    fn test_mappings_are_deduplicated_and_ordered() {
        let commit = PartitionCommit::new(1, 2, [7, 3, 7, 5]);
        let ids: Ids = commit.mappings().iter().copied().collect();
        assert_eq!(ids, vec![3, 5, 7]);
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(ResourceKind::SegmentFile.to_string(), "SegmentFile");
        assert_eq!(ResourceKind::ALL.len(), 11);
    }
}
