//! Infrastructure layer: storage backends, configuration, catalog service.

pub mod catalog;
pub mod config;
pub mod store;

#[cfg(test)]
mod integration_tests;

pub use catalog::{CatalogError, CatalogResult, CatalogService, DynCatalogService, Pagination, SearchPage};
pub use config::{StartupError, StorageConfig};
pub use store::{connect_store, BackendKind, ProductStore, StoreError, StoreResult};
