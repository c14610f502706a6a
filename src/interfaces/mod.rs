//! Abstract interfaces for catalog components.
//!
//! These traits define the contracts for:
//! - Catalog record storage (the backing store snapshots read through)

pub mod catalog_store;

pub use catalog_store::{CatalogStore, CatalogStoreExt};
