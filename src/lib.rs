//! Vellum - catalog metadata versioning core
//!
//! Materializes point-in-time, reference-counted snapshots of collection
//! metadata from an append-only log of commit records, keeps a bounded
//! window of versions per collection, and reclaims retired versions in the
//! background.

pub mod config;
pub mod error;
pub mod holders;
pub mod interfaces;
pub mod registry;
pub mod resources;
pub mod schema;
pub mod snapshot;
pub mod snapshots_holder;
pub mod storage;
pub mod utils;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::CatalogConfig;
pub use error::{CatalogError, Result};
pub use holders::{Cached, Holder, Holders};
pub use interfaces::{CatalogStore, CatalogStoreExt};
pub use registry::Snapshots;
pub use resources::{Id, Ids, RefCounted, Resource, ResourceKind, ScopedResource};
pub use snapshot::{ScopedSnapshot, Snapshot};
pub use snapshots_holder::SnapshotsHolder;
pub use storage::MemoryCatalogStore;
