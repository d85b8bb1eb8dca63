//! Catalog service: the façade callers talk to.
//!
//! ```text
//! DTO in
//!   ↓
//! 1. Validate input (no backend call on failure)
//!   ↓
//! 2. Map DTO -> entity, or merge an update into the stored entity
//!   ↓
//! 3. Persist / query through the one configured `ProductStore`
//!   ↓
//! 4. Map entity -> Response/Summary DTO
//! ```
//!
//! Absence is `Ok(None)`; an empty list is a normal result. Storage failures
//! carry the name of the operation that hit them.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use catalog_core::{CompositeKey, DomainError, ProductId};
use catalog_products::{
    mapper, Product, ProductCreateDto, ProductFilter, ProductResponseDto, ProductSummaryDto,
    ProductUpdateDto,
};

use crate::store::{BackendKind, ProductStore, StoreError};

/// Default page size for [`CatalogService::search`].
pub const DEFAULT_PAGE_SIZE: usize = 50;
/// Largest page size [`CatalogService::search`] will return.
pub const MAX_PAGE_SIZE: usize = 500;

#[derive(Debug, Error)]
pub enum CatalogError {
    /// Malformed input; the backend was not touched.
    #[error("validation failed for `{field}`: {reason}")]
    Validation { field: &'static str, reason: String },

    #[error("storage failure during {operation}: {source}")]
    Storage {
        operation: &'static str,
        #[source]
        source: StoreError,
    },
}

impl CatalogError {
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field,
            reason: reason.into(),
        }
    }
}

impl From<DomainError> for CatalogError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation { field, reason } => Self::Validation { field, reason },
            DomainError::InvalidId(reason) => Self::Validation { field: "id", reason },
        }
    }
}

pub type CatalogResult<T> = Result<T, CatalogError>;

fn storage(operation: &'static str) -> impl FnOnce(StoreError) -> CatalogError {
    move |source| CatalogError::Storage { operation, source }
}

/// Offset/limit paging for search results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub offset: usize,
    pub limit: usize,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Pagination {
    /// Limit is clamped to `1..=MAX_PAGE_SIZE`.
    pub fn new(offset: Option<usize>, limit: Option<usize>) -> Self {
        Self {
            offset: offset.unwrap_or(0),
            limit: limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        }
    }
}

/// One page of search results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPage {
    pub items: Vec<ProductSummaryDto>,
    /// Number of matches across all pages.
    pub total: usize,
    pub offset: usize,
    pub limit: usize,
    pub has_more: bool,
}

/// Product catalog over exactly one storage backend.
#[derive(Debug, Clone)]
pub struct CatalogService<S> {
    store: S,
}

/// Service over the backend chosen at startup by `connect_store`.
pub type DynCatalogService = CatalogService<Arc<dyn ProductStore>>;

impl<S> CatalogService<S>
where
    S: ProductStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn backend(&self) -> BackendKind {
        self.store.backend()
    }

    pub async fn create(&self, dto: ProductCreateDto) -> CatalogResult<ProductResponseDto> {
        let product = mapper::to_entity(dto)?;
        if let Some(sku) = &product.sku {
            self.ensure_sku_available(sku, None, "create").await?;
        }

        let created = self.store.create(product).await.map_err(storage("create"))?;
        info!(
            backend = %self.store.backend(),
            id = ?created.id,
            product_name = %created.name,
            "product created"
        );
        Ok(ProductResponseDto::from(&created))
    }

    pub async fn find_by_id(&self, id: &str) -> CatalogResult<Option<ProductResponseDto>> {
        let id = parse_id(id)?;
        let product = self.store.get_by_id(&id).await.map_err(storage("find_by_id"))?;
        debug!(id = %id, found = product.is_some(), "lookup by id");
        Ok(mapper::to_response(product.as_ref()))
    }

    pub async fn find_by_composite_key(
        &self,
        partition_key: &str,
        row_key: &str,
    ) -> CatalogResult<Option<ProductResponseDto>> {
        let key = CompositeKey::new(partition_key, row_key)?;
        let product = self
            .store
            .get_by_composite_key(&key)
            .await
            .map_err(storage("find_by_composite_key"))?;
        debug!(key = %key, found = product.is_some(), "lookup by composite key");
        Ok(mapper::to_response(product.as_ref()))
    }

    pub async fn find_by_name(&self, name: &str) -> CatalogResult<Option<ProductResponseDto>> {
        let product = self.store.get_by_name(name).await.map_err(storage("find_by_name"))?;
        debug!(product_name = name, found = product.is_some(), "lookup by name");
        Ok(mapper::to_response(product.as_ref()))
    }

    pub async fn find_by_sku(&self, sku: &str) -> CatalogResult<Option<ProductResponseDto>> {
        let matches = self
            .store
            .find_by_filter(&ProductFilter::new().sku(sku))
            .await
            .map_err(storage("find_by_sku"))?;
        debug!(sku, found = !matches.is_empty(), "lookup by sku");
        Ok(mapper::to_response(matches.first()))
    }

    /// Merge `dto` into the stored product. `Ok(None)` when `id` is unknown.
    pub async fn update(
        &self,
        id: &str,
        dto: ProductUpdateDto,
    ) -> CatalogResult<Option<ProductResponseDto>> {
        let id = parse_id(id)?;
        dto.validate()?;

        let Some(mut product) = self.store.get_by_id(&id).await.map_err(storage("update"))? else {
            debug!(id = %id, "update of unknown product");
            return Ok(None);
        };
        if let Some(sku) = &dto.sku {
            self.ensure_sku_available(sku, Some(&id), "update").await?;
        }

        mapper::merge_update(&mut product, &dto)?;
        let updated = self.store.update(product).await.map_err(storage("update"))?;
        if updated.is_some() {
            info!(backend = %self.store.backend(), id = %id, "product updated");
        }
        Ok(mapper::to_response(updated.as_ref()))
    }

    /// Idempotent: deleting an unknown id succeeds.
    pub async fn delete(&self, id: &str) -> CatalogResult<()> {
        let id = parse_id(id)?;
        self.store.delete(&id).await.map_err(storage("delete"))?;
        info!(backend = %self.store.backend(), id = %id, "delete requested");
        Ok(())
    }

    pub async fn find_all(&self) -> CatalogResult<Vec<ProductResponseDto>> {
        let products = self.store.list_all().await.map_err(storage("find_all"))?;
        Ok(products.iter().map(ProductResponseDto::from).collect())
    }

    pub async fn find_all_summary(&self) -> CatalogResult<Vec<ProductSummaryDto>> {
        let products = self.store.list_all().await.map_err(storage("find_all_summary"))?;
        Ok(products.iter().map(ProductSummaryDto::from).collect())
    }

    pub async fn find_by_category(&self, category: &str) -> CatalogResult<Vec<ProductResponseDto>> {
        self.find_responses("find_by_category", ProductFilter::new().category(category))
            .await
    }

    pub async fn find_by_brand(&self, brand: &str) -> CatalogResult<Vec<ProductResponseDto>> {
        self.find_responses("find_by_brand", ProductFilter::new().brand(brand))
            .await
    }

    pub async fn find_by_product_area(&self, area: &str) -> CatalogResult<Vec<ProductResponseDto>> {
        self.find_responses("find_by_product_area", ProductFilter::new().product_area(area))
            .await
    }

    pub async fn find_featured(&self) -> CatalogResult<Vec<ProductResponseDto>> {
        self.find_responses("find_featured", ProductFilter::new().featured(true))
            .await
    }

    pub async fn find_in_stock(&self) -> CatalogResult<Vec<ProductResponseDto>> {
        self.find_responses("find_in_stock", ProductFilter::new().in_stock(true))
            .await
    }

    pub async fn find_by_manufacturer(
        &self,
        manufacturer: &str,
    ) -> CatalogResult<Vec<ProductResponseDto>> {
        self.find_responses("find_by_manufacturer", ProductFilter::new().manufacturer(manufacturer))
            .await
    }

    pub async fn find_by_tag(&self, tag: &str) -> CatalogResult<Vec<ProductResponseDto>> {
        self.find_responses("find_by_tag", ProductFilter::new().tag(tag))
            .await
    }

    /// Number of products matching `filter`.
    pub async fn count(&self, filter: &ProductFilter) -> CatalogResult<usize> {
        let count = self
            .store
            .find_by_filter(filter)
            .await
            .map_err(storage("count"))?
            .len();
        debug!(count, "count");
        Ok(count)
    }

    /// Filter through the backend, then page the ordered result.
    pub async fn search(
        &self,
        filter: &ProductFilter,
        pagination: Pagination,
    ) -> CatalogResult<SearchPage> {
        let limit = pagination.limit.clamp(1, MAX_PAGE_SIZE);
        let offset = pagination.offset;

        let matches = self
            .store
            .find_by_filter(filter)
            .await
            .map_err(storage("search"))?;
        let total = matches.len();

        let items: Vec<ProductSummaryDto> = matches
            .iter()
            .skip(offset)
            .take(limit)
            .map(ProductSummaryDto::from)
            .collect();
        let has_more = offset.saturating_add(items.len()) < total;
        debug!(total, offset, limit, returned = items.len(), "search");

        Ok(SearchPage {
            items,
            total,
            offset,
            limit,
            has_more,
        })
    }

    /// Close the backend. The service should not be used afterwards.
    pub async fn shutdown(&self) {
        self.store.close().await;
        info!(backend = %self.store.backend(), "catalog storage closed");
    }

    async fn find_responses(
        &self,
        operation: &'static str,
        filter: ProductFilter,
    ) -> CatalogResult<Vec<ProductResponseDto>> {
        let products = self
            .store
            .find_by_filter(&filter)
            .await
            .map_err(storage(operation))?;
        debug!(operation, count = products.len(), "filtered lookup");
        Ok(products.iter().map(ProductResponseDto::from).collect())
    }

    async fn ensure_sku_available(
        &self,
        sku: &str,
        owner: Option<&ProductId>,
        operation: &'static str,
    ) -> CatalogResult<()> {
        let holders: Vec<Product> = self
            .store
            .find_by_filter(&ProductFilter::new().sku(sku))
            .await
            .map_err(storage(operation))?;

        let taken = holders.iter().any(|p| p.id.as_ref() != owner);
        if taken {
            return Err(CatalogError::validation("sku", "already assigned to another product"));
        }
        Ok(())
    }
}

fn parse_id(raw: &str) -> CatalogResult<ProductId> {
    Ok(raw.parse::<ProductId>()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_clamps_limit() {
        assert_eq!(Pagination::new(None, None), Pagination::default());
        assert_eq!(Pagination::new(Some(3), Some(0)).limit, 1);
        assert_eq!(Pagination::new(None, Some(10_000)).limit, MAX_PAGE_SIZE);
        assert_eq!(Pagination::new(Some(7), Some(20)).offset, 7);
    }

    #[test]
    fn domain_errors_become_validation_failures() {
        let err: CatalogError = DomainError::validation("price", "must not be negative").into();
        assert!(matches!(err, CatalogError::Validation { field: "price", .. }));

        let err = parse_id("  ").unwrap_err();
        assert!(matches!(err, CatalogError::Validation { field: "id", .. }));
    }
}
