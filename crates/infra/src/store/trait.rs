use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use catalog_core::{CompositeKey, DomainError, ProductId};
use catalog_products::{Product, ProductFilter};

/// Result type returned by every `ProductStore` operation.
pub type StoreResult<T> = Result<T, StoreError>;

/// Storage operation error.
///
/// These are **infrastructure errors** (connectivity, backend commands,
/// encoding) as opposed to domain errors (validation). A missing record is not
/// an error: lookups return `Ok(None)` and `delete` of an unknown id is `Ok`.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("store lock poisoned")]
    LockPoisoned,
}

impl From<DomainError> for StoreError {
    fn from(err: DomainError) -> Self {
        StoreError::InvalidKey(err.to_string())
    }
}

/// Which storage backend a store is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    InMemory,
    Table,
    Document,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::InMemory => "in-memory",
            BackendKind::Table => "table",
            BackendKind::Document => "document",
        }
    }
}

impl core::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Product persistence boundary.
///
/// One implementation per backend; the catalog service only ever talks to
/// this trait.
///
/// ## Storage order
///
/// `list_all`, `find_by_filter` and `get_by_name` follow the backend's storage
/// order. All three backends in this crate use insertion order, but ties in
/// `get_by_name` are not guaranteed to resolve the same way across backends.
///
/// ## Implementation Requirements
///
/// Implementations must:
/// - assign an id in `create` when the product has none
/// - never overwrite an existing record from `create` (`StoreError::AlreadyExists`)
/// - treat `update` as a full replace keyed by `id`, returning `Ok(None)` when absent
/// - make `delete` idempotent
#[async_trait]
pub trait ProductStore: Send + Sync {
    fn backend(&self) -> BackendKind;

    /// Persist a new product and return it with its identity assigned.
    async fn create(&self, product: Product) -> StoreResult<Product>;

    async fn get_by_id(&self, id: &ProductId) -> StoreResult<Option<Product>>;

    async fn get_by_composite_key(&self, key: &CompositeKey) -> StoreResult<Option<Product>>;

    /// Exact, case-sensitive name match; first hit in storage order.
    async fn get_by_name(&self, name: &str) -> StoreResult<Option<Product>>;

    async fn update(&self, product: Product) -> StoreResult<Option<Product>>;

    async fn delete(&self, id: &ProductId) -> StoreResult<()>;

    async fn list_all(&self) -> StoreResult<Vec<Product>>;

    async fn find_by_filter(&self, filter: &ProductFilter) -> StoreResult<Vec<Product>>;

    /// Release the backend handle. Default is a no-op.
    async fn close(&self) {}
}

#[async_trait]
impl<S> ProductStore for Arc<S>
where
    S: ProductStore + ?Sized,
{
    fn backend(&self) -> BackendKind {
        (**self).backend()
    }

    async fn create(&self, product: Product) -> StoreResult<Product> {
        (**self).create(product).await
    }

    async fn get_by_id(&self, id: &ProductId) -> StoreResult<Option<Product>> {
        (**self).get_by_id(id).await
    }

    async fn get_by_composite_key(&self, key: &CompositeKey) -> StoreResult<Option<Product>> {
        (**self).get_by_composite_key(key).await
    }

    async fn get_by_name(&self, name: &str) -> StoreResult<Option<Product>> {
        (**self).get_by_name(name).await
    }

    async fn update(&self, product: Product) -> StoreResult<Option<Product>> {
        (**self).update(product).await
    }

    async fn delete(&self, id: &ProductId) -> StoreResult<()> {
        (**self).delete(id).await
    }

    async fn list_all(&self) -> StoreResult<Vec<Product>> {
        (**self).list_all().await
    }

    async fn find_by_filter(&self, filter: &ProductFilter) -> StoreResult<Vec<Product>> {
        (**self).find_by_filter(filter).await
    }

    async fn close(&self) {
        (**self).close().await
    }
}
