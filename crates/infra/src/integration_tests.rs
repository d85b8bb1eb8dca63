//! Integration tests for the full catalog pipeline.
//!
//! Tests: DTO → CatalogService → ProductStore → Mapper → DTO
//!
//! Verifies:
//! - Create/read/update/delete behave the same through the service façade
//! - Malformed input never reaches the backend
//! - Backend failures surface as storage errors, never as absence

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use rust_decimal::Decimal;

    use catalog_core::{CompositeKey, ProductId};
    use catalog_products::{
        Product, ProductCreateDto, ProductFilter, ProductStatus, ProductUpdateDto, StockStatus,
    };

    use crate::catalog::{CatalogError, CatalogService, DynCatalogService, Pagination};
    use crate::config::{BackendConfig, StorageConfig};
    use crate::store::{
        connect_store, BackendKind, InMemoryProductStore, KeyMode, ProductStore, StoreError,
        StoreResult,
    };

    fn empty_catalog() -> CatalogService<InMemoryProductStore> {
        CatalogService::new(InMemoryProductStore::new(KeyMode::Id))
    }

    fn seeded_catalog() -> CatalogService<InMemoryProductStore> {
        CatalogService::new(InMemoryProductStore::with_sample_data(KeyMode::Id).unwrap())
    }

    fn create_dto(name: &str, price: Decimal) -> ProductCreateDto {
        ProductCreateDto {
            name: Some(name.to_string()),
            price: Some(price),
            ..Default::default()
        }
    }

    /// Delegates to an in-memory store and counts every backend call.
    struct RecordingStore {
        inner: InMemoryProductStore,
        calls: AtomicUsize,
    }

    impl RecordingStore {
        fn new() -> Self {
            Self {
                inner: InMemoryProductStore::new(KeyMode::Id),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn record(&self) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl ProductStore for RecordingStore {
        fn backend(&self) -> BackendKind {
            self.inner.backend()
        }

        async fn create(&self, product: Product) -> StoreResult<Product> {
            self.record();
            self.inner.create(product).await
        }

        async fn get_by_id(&self, id: &ProductId) -> StoreResult<Option<Product>> {
            self.record();
            self.inner.get_by_id(id).await
        }

        async fn get_by_composite_key(&self, key: &CompositeKey) -> StoreResult<Option<Product>> {
            self.record();
            self.inner.get_by_composite_key(key).await
        }

        async fn get_by_name(&self, name: &str) -> StoreResult<Option<Product>> {
            self.record();
            self.inner.get_by_name(name).await
        }

        async fn update(&self, product: Product) -> StoreResult<Option<Product>> {
            self.record();
            self.inner.update(product).await
        }

        async fn delete(&self, id: &ProductId) -> StoreResult<()> {
            self.record();
            self.inner.delete(id).await
        }

        async fn list_all(&self) -> StoreResult<Vec<Product>> {
            self.record();
            self.inner.list_all().await
        }

        async fn find_by_filter(&self, filter: &ProductFilter) -> StoreResult<Vec<Product>> {
            self.record();
            self.inner.find_by_filter(filter).await
        }
    }

    /// Every operation fails as an unreachable backend would.
    struct FailingStore;

    fn backend_down() -> StoreError {
        StoreError::Connection("backend unreachable".to_string())
    }

    #[async_trait]
    impl ProductStore for FailingStore {
        fn backend(&self) -> BackendKind {
            BackendKind::Table
        }

        async fn create(&self, _product: Product) -> StoreResult<Product> {
            Err(backend_down())
        }

        async fn get_by_id(&self, _id: &ProductId) -> StoreResult<Option<Product>> {
            Err(backend_down())
        }

        async fn get_by_composite_key(&self, _key: &CompositeKey) -> StoreResult<Option<Product>> {
            Err(backend_down())
        }

        async fn get_by_name(&self, _name: &str) -> StoreResult<Option<Product>> {
            Err(backend_down())
        }

        async fn update(&self, _product: Product) -> StoreResult<Option<Product>> {
            Err(backend_down())
        }

        async fn delete(&self, _id: &ProductId) -> StoreResult<()> {
            Err(backend_down())
        }

        async fn list_all(&self) -> StoreResult<Vec<Product>> {
            Err(backend_down())
        }

        async fn find_by_filter(&self, _filter: &ProductFilter) -> StoreResult<Vec<Product>> {
            Err(backend_down())
        }
    }

    #[tokio::test]
    async fn widget_lifecycle_end_to_end() -> anyhow::Result<()> {
        let catalog = empty_catalog();

        let created = catalog
            .create(ProductCreateDto {
                stock_quantity: Some(3),
                ..create_dto("Widget", Decimal::new(999, 2))
            })
            .await?;
        let id = created.id.clone().expect("created product has an id");
        assert_eq!(created.stock_status, StockStatus::LowStock);
        assert!(created.in_stock);
        assert_eq!(created.status, ProductStatus::Active);

        let updated = catalog
            .update(
                id.as_str(),
                ProductUpdateDto {
                    price: Some(Decimal::new(1250, 2)),
                    ..Default::default()
                },
            )
            .await?
            .expect("product exists");
        assert_eq!(updated.price.to_string(), "12.50");
        assert_eq!(updated.name, "Widget");
        assert_eq!(updated.stock_quantity, Some(3));
        assert_eq!(updated.created_at, created.created_at);
        assert!(updated.updated_at >= created.updated_at);

        let fetched = catalog.find_by_id(id.as_str()).await?.expect("still there");
        assert_eq!(fetched, updated);

        catalog.delete(id.as_str()).await?;
        assert!(catalog.find_by_id(id.as_str()).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn delete_of_missing_product_is_idempotent() -> anyhow::Result<()> {
        let catalog = seeded_catalog();
        catalog.delete("does-not-exist").await?;
        catalog.delete("does-not-exist").await?;
        assert_eq!(catalog.find_all().await?.len(), 10);
        Ok(())
    }

    #[tokio::test]
    async fn update_of_missing_product_is_none() -> anyhow::Result<()> {
        let catalog = seeded_catalog();
        let result = catalog
            .update("missing", ProductUpdateDto {
                name: Some("Anything".to_string()),
                ..Default::default()
            })
            .await?;
        assert!(result.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn invalid_input_never_reaches_the_backend() {
        let store = Arc::new(RecordingStore::new());
        let catalog = CatalogService::new(store.clone());

        let err = catalog.create(ProductCreateDto::default()).await.unwrap_err();
        assert!(matches!(err, CatalogError::Validation { field: "name", .. }));

        let err = catalog
            .create(create_dto("Widget", Decimal::new(-1, 0)))
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Validation { field: "price", .. }));

        let err = catalog
            .update("1", ProductUpdateDto {
                stock_quantity: Some(-4),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Validation { field: "stockQuantity", .. }));

        let err = catalog.find_by_composite_key("a/b", "row").await.unwrap_err();
        assert!(matches!(err, CatalogError::Validation { field: "partitionKey", .. }));

        let err = catalog.find_by_id("").await.unwrap_err();
        assert!(matches!(err, CatalogError::Validation { field: "id", .. }));

        assert_eq!(store.calls(), 0);
    }

    #[tokio::test]
    async fn storage_failures_propagate() {
        let catalog = CatalogService::new(FailingStore);

        let err = catalog.create(create_dto("Widget", Decimal::ONE)).await.unwrap_err();
        assert!(matches!(err, CatalogError::Storage { operation: "create", .. }));

        let err = catalog.find_by_id("1").await.unwrap_err();
        assert!(matches!(
            err,
            CatalogError::Storage {
                operation: "find_by_id",
                source: StoreError::Connection(_)
            }
        ));

        let err = catalog.find_all().await.unwrap_err();
        assert!(matches!(err, CatalogError::Storage { operation: "find_all", .. }));

        let err = catalog.find_by_brand("Acme").await.unwrap_err();
        assert!(matches!(err, CatalogError::Storage { operation: "find_by_brand", .. }));

        let err = catalog.delete("1").await.unwrap_err();
        assert!(matches!(err, CatalogError::Storage { operation: "delete", .. }));
    }

    #[tokio::test]
    async fn category_and_brand_filters_intersect() -> anyhow::Result<()> {
        let catalog = empty_catalog();
        for (name, category, brand) in [
            ("Laptop", "Electronics", "Acme"),
            ("Phone", "Electronics", "Globex"),
            ("Kettle", "Kitchen", "Acme"),
            ("Tablet", "Electronics", "Acme"),
        ] {
            catalog
                .create(ProductCreateDto {
                    category: Some(category.to_string()),
                    brand: Some(brand.to_string()),
                    ..create_dto(name, Decimal::TEN)
                })
                .await?;
        }

        let names = |page: &crate::catalog::SearchPage| {
            page.items.iter().map(|p| p.name.clone()).collect::<Vec<_>>()
        };

        let both = catalog
            .search(
                &ProductFilter::new().category("electronics").brand("acme"),
                Pagination::default(),
            )
            .await?;
        assert_eq!(names(&both), vec!["Laptop", "Tablet"]);

        let category_only = catalog.find_by_category("Electronics").await?;
        let brands: Vec<_> = category_only.iter().filter_map(|p| p.brand.clone()).collect();
        assert_eq!(brands, vec!["Acme", "Globex", "Acme"]);
        Ok(())
    }

    #[tokio::test]
    async fn search_pages_through_matches() -> anyhow::Result<()> {
        let catalog = seeded_catalog();

        let first = catalog
            .search(&ProductFilter::new(), Pagination::new(None, Some(3)))
            .await?;
        assert_eq!(first.total, 10);
        assert_eq!(first.items.len(), 3);
        assert!(first.has_more);
        assert_eq!(first.items[0].name, "Product1");

        let last = catalog
            .search(&ProductFilter::new(), Pagination::new(Some(8), Some(5)))
            .await?;
        assert_eq!(last.items.len(), 2);
        assert!(!last.has_more);
        assert_eq!(last.items[1].name, "Product10");

        let beyond = catalog
            .search(&ProductFilter::new(), Pagination::new(Some(50), None))
            .await?;
        assert!(beyond.items.is_empty());
        assert_eq!(beyond.total, 10);

        let text = catalog
            .search(&ProductFilter::new().search("product 1"), Pagination::default())
            .await?;
        let ids: Vec<_> = text.items.iter().filter_map(|p| p.id.clone()).collect();
        assert_eq!(ids, vec![ProductId::new("1"), ProductId::new("10")]);
        Ok(())
    }

    #[tokio::test]
    async fn sku_must_be_unique() -> anyhow::Result<()> {
        let catalog = empty_catalog();
        let first = catalog
            .create(ProductCreateDto {
                sku: Some("W-1".to_string()),
                ..create_dto("Widget", Decimal::ONE)
            })
            .await?;
        let second = catalog.create(create_dto("Gadget", Decimal::ONE)).await?;

        let err = catalog
            .create(ProductCreateDto {
                sku: Some("W-1".to_string()),
                ..create_dto("Clone", Decimal::ONE)
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Validation { field: "sku", .. }));

        let second_id = second.id.clone().expect("id");
        let err = catalog
            .update(second_id.as_str(), ProductUpdateDto {
                sku: Some("W-1".to_string()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Validation { field: "sku", .. }));

        let first_id = first.id.clone().expect("id");
        let same = catalog
            .update(first_id.as_str(), ProductUpdateDto {
                sku: Some("W-1".to_string()),
                featured: Some(true),
                ..Default::default()
            })
            .await?;
        assert!(same.is_some());

        let by_sku = catalog.find_by_sku("W-1").await?.expect("sku lookup");
        assert_eq!(by_sku.id, first.id);
        assert!(by_sku.featured);
        Ok(())
    }

    #[tokio::test]
    async fn lookups_over_seeded_products() -> anyhow::Result<()> {
        let catalog = seeded_catalog();

        let by_key = catalog
            .find_by_composite_key("partition3", "row3")
            .await?
            .expect("seeded row");
        assert_eq!(by_key.name, "Product3");

        let by_name = catalog.find_by_name("Product7").await?.expect("seeded name");
        assert_eq!(by_name.id, Some(ProductId::new("7")));
        assert!(catalog.find_by_name("product7").await?.is_none());

        assert!(catalog.find_featured().await?.is_empty());
        assert!(catalog.find_in_stock().await?.is_empty());
        assert_eq!(catalog.find_by_brand("brand2").await?.len(), 1);
        assert!(catalog.find_by_product_area("Retail").await?.is_empty());

        let summaries = catalog.find_all_summary().await?;
        assert_eq!(summaries.len(), 10);
        assert!(summaries.iter().all(|s| !s.in_stock));
        Ok(())
    }

    #[tokio::test]
    async fn factory_builds_the_configured_backend() -> anyhow::Result<()> {
        catalog_observability::init();

        let config = StorageConfig::from_lookup(|_| None)?;
        let store = connect_store(&config).await?;
        let catalog: DynCatalogService = CatalogService::new(store);

        assert_eq!(catalog.backend(), BackendKind::InMemory);
        assert_eq!(catalog.find_all().await?.len(), 10);

        let created = catalog.create(create_dto("Widget", Decimal::ONE)).await?;
        assert_eq!(catalog.find_all().await?.len(), 11);
        assert_eq!(catalog.find_all().await?.last().map(|p| p.id.clone()), Some(created.id));

        catalog.shutdown().await;
        Ok(())
    }

    #[tokio::test]
    async fn composite_mode_serves_the_same_contract() -> anyhow::Result<()> {
        let config = StorageConfig {
            backend: BackendConfig::InMemory {
                key_mode: KeyMode::Composite,
                seed: true,
            },
        };
        let catalog = CatalogService::new(connect_store(&config).await?);

        let created = catalog
            .create(ProductCreateDto {
                partition_key: Some("retail".to_string()),
                row_key: Some("pos-1".to_string()),
                ..create_dto("FlexiRetail Mobile POS", Decimal::new(39999, 2))
            })
            .await?;
        let id = created.id.clone().expect("id");

        let by_key = catalog.find_by_composite_key("retail", "pos-1").await?.expect("row");
        assert_eq!(by_key.id, created.id);

        let updated = catalog
            .update(id.as_str(), ProductUpdateDto {
                status: Some(ProductStatus::Discontinued),
                ..Default::default()
            })
            .await?
            .expect("updated");
        assert_eq!(updated.status, ProductStatus::Discontinued);
        assert_eq!(updated.partition_key.as_deref(), Some("retail"));

        catalog.delete(id.as_str()).await?;
        assert!(catalog.find_by_composite_key("retail", "pos-1").await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn single_field_update_leaves_the_rest_of_the_stored_product() -> anyhow::Result<()> {
        let store = Arc::new(InMemoryProductStore::with_sample_data(KeyMode::Id)?);
        let catalog = CatalogService::new(store.clone());
        let id = ProductId::new("4");
        let before = store.get_by_id(&id).await?.expect("seeded");

        catalog
            .update(id.as_str(), ProductUpdateDto {
                warranty: Some("3 years".to_string()),
                ..Default::default()
            })
            .await?
            .expect("updated");

        let after = store.get_by_id(&id).await?.expect("still stored");
        assert!(after.updated_at >= before.updated_at);
        let mut expected = before;
        expected.warranty = Some("3 years".to_string());
        expected.updated_at = after.updated_at;
        assert_eq!(after, expected);
        Ok(())
    }

    #[tokio::test]
    async fn rejected_update_leaves_the_stored_product_alone() -> anyhow::Result<()> {
        let store = Arc::new(InMemoryProductStore::with_sample_data(KeyMode::Id)?);
        let catalog = CatalogService::new(store.clone());
        let id = ProductId::new("2");
        let before = store.get_by_id(&id).await?.expect("seeded");

        let err = catalog
            .update(id.as_str(), ProductUpdateDto {
                price: Some(Decimal::new(-999, 2)),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Validation { field: "price", .. }));
        assert_eq!(store.get_by_id(&id).await?, Some(before));
        Ok(())
    }

    #[tokio::test]
    async fn manufacturer_tag_and_count_queries() -> anyhow::Result<()> {
        let catalog = empty_catalog();
        for (name, manufacturer, tags, category) in [
            ("Laptop", "Acme Industries", vec!["portable", "Office"], "Electronics"),
            ("Desk", "Initech", vec!["office"], "Furniture"),
            ("Phone", "acme industries", vec!["Portable"], "Electronics"),
        ] {
            catalog
                .create(ProductCreateDto {
                    manufacturer: Some(manufacturer.to_string()),
                    tags: Some(tags.into_iter().map(String::from).collect()),
                    category: Some(category.to_string()),
                    ..create_dto(name, Decimal::TEN)
                })
                .await?;
        }
        let names = |products: Vec<catalog_products::ProductResponseDto>| {
            products.into_iter().map(|p| p.name).collect::<Vec<_>>()
        };

        assert_eq!(
            names(catalog.find_by_manufacturer("ACME INDUSTRIES").await?),
            vec!["Laptop", "Phone"]
        );
        assert_eq!(names(catalog.find_by_tag("office").await?), vec!["Laptop", "Desk"]);
        assert!(catalog.find_by_tag("port").await?.is_empty());

        let electronics = ProductFilter::new().category("electronics").status(ProductStatus::Active);
        assert_eq!(catalog.count(&electronics).await?, 2);
        assert_eq!(catalog.count(&ProductFilter::new()).await?, 3);
        assert_eq!(
            catalog
                .count(&ProductFilter::new().manufacturer("initech").tag("office"))
                .await?,
            1
        );
        Ok(())
    }
}
