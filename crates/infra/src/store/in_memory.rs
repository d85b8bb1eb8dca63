use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;

use catalog_core::{CompositeKey, Entity, Price, ProductId};
use catalog_products::{Product, ProductFilter, ProductStatus};

use super::assign_identity;
use super::r#trait::{BackendKind, ProductStore, StoreError, StoreResult};

/// Which identity the in-memory map is keyed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyMode {
    /// Keyed by `id`; composite-key lookups scan.
    #[default]
    Id,
    /// Keyed by `partition/row`; id lookups scan.
    Composite,
}

impl core::str::FromStr for KeyMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "id" => Ok(KeyMode::Id),
            "composite" => Ok(KeyMode::Composite),
            other => Err(format!("unknown key mode '{other}'")),
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    next_seq: u64,
    /// key -> (insertion sequence, product)
    rows: HashMap<String, (u64, Product)>,
}

impl Inner {
    fn ordered(&self) -> Vec<&Product> {
        let mut rows: Vec<&(u64, Product)> = self.rows.values().collect();
        rows.sort_by_key(|(seq, _)| *seq);
        rows.into_iter().map(|(_, p)| p).collect()
    }

    fn key_of_id(&self, id: &ProductId) -> Option<String> {
        self.rows
            .iter()
            .find(|(_, (_, p))| p.id() == Some(id))
            .map(|(k, _)| k.clone())
    }
}

/// In-memory product store.
///
/// Intended for tests/dev. Lookups by the identity the store is not keyed by
/// are linear scans (O(n)). Storage order is insertion order.
#[derive(Debug, Default)]
pub struct InMemoryProductStore {
    mode: KeyMode,
    inner: RwLock<Inner>,
}

impl InMemoryProductStore {
    pub fn new(mode: KeyMode) -> Self {
        Self {
            mode,
            inner: RwLock::new(Inner::default()),
        }
    }

    /// A store pre-populated with [`sample_products`].
    pub fn with_sample_data(mode: KeyMode) -> StoreResult<Self> {
        let store = Self::new(mode);
        {
            let mut inner = store.inner.write().map_err(|_| StoreError::LockPoisoned)?;
            for product in sample_products() {
                let key = store.key_for(&product)?;
                inner.next_seq += 1;
                let seq = inner.next_seq;
                inner.rows.insert(key, (seq, product));
            }
        }
        Ok(store)
    }

    fn key_for(&self, product: &Product) -> StoreResult<String> {
        match self.mode {
            KeyMode::Id => product
                .id
                .as_ref()
                .map(|id| id.as_str().to_string())
                .ok_or_else(|| StoreError::InvalidKey("product has no id".to_string())),
            KeyMode::Composite => product
                .composite_key()?
                .map(|key| key.storage_key())
                .ok_or_else(|| StoreError::InvalidKey("product has no composite key".to_string())),
        }
    }

    fn locate(&self, inner: &Inner, id: &ProductId) -> Option<String> {
        match self.mode {
            KeyMode::Id => inner.rows.contains_key(id.as_str()).then(|| id.as_str().to_string()),
            KeyMode::Composite => inner.key_of_id(id),
        }
    }
}

#[async_trait]
impl ProductStore for InMemoryProductStore {
    fn backend(&self) -> BackendKind {
        BackendKind::InMemory
    }

    async fn create(&self, mut product: Product) -> StoreResult<Product> {
        assign_identity(&mut product)?;
        let key = self.key_for(&product)?;

        let mut inner = self.inner.write().map_err(|_| StoreError::LockPoisoned)?;
        if inner.rows.contains_key(&key) {
            return Err(StoreError::AlreadyExists(format!("product key '{key}'")));
        }
        if let Some(id) = &product.id {
            if self.mode == KeyMode::Composite && inner.key_of_id(id).is_some() {
                return Err(StoreError::AlreadyExists(format!("product id '{id}'")));
            }
        }

        inner.next_seq += 1;
        let seq = inner.next_seq;
        inner.rows.insert(key, (seq, product.clone()));
        Ok(product)
    }

    async fn get_by_id(&self, id: &ProductId) -> StoreResult<Option<Product>> {
        let inner = self.inner.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(self
            .locate(&inner, id)
            .and_then(|key| inner.rows.get(&key))
            .map(|(_, p)| p.clone()))
    }

    async fn get_by_composite_key(&self, key: &CompositeKey) -> StoreResult<Option<Product>> {
        let inner = self.inner.read().map_err(|_| StoreError::LockPoisoned)?;
        let found = match self.mode {
            KeyMode::Composite => inner.rows.get(&key.storage_key()).map(|(_, p)| p.clone()),
            KeyMode::Id => inner
                .ordered()
                .into_iter()
                .find(|p| {
                    p.partition_key.as_deref() == Some(key.partition_key())
                        && p.row_key.as_deref() == Some(key.row_key())
                })
                .cloned(),
        };
        Ok(found)
    }

    async fn get_by_name(&self, name: &str) -> StoreResult<Option<Product>> {
        let inner = self.inner.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(inner.ordered().into_iter().find(|p| p.name == name).cloned())
    }

    async fn update(&self, mut product: Product) -> StoreResult<Option<Product>> {
        let id = product
            .id
            .clone()
            .ok_or_else(|| StoreError::InvalidKey("update requires an id".to_string()))?;

        let mut inner = self.inner.write().map_err(|_| StoreError::LockPoisoned)?;
        let Some(key) = self.locate(&inner, &id) else {
            return Ok(None);
        };
        let Some((_, stored)) = inner.rows.get_mut(&key) else {
            return Ok(None);
        };

        // The map key is fixed for the life of the record.
        product.partition_key = stored.partition_key.clone();
        product.row_key = stored.row_key.clone();
        *stored = product.clone();
        Ok(Some(product))
    }

    async fn delete(&self, id: &ProductId) -> StoreResult<()> {
        let mut inner = self.inner.write().map_err(|_| StoreError::LockPoisoned)?;
        if let Some(key) = self.locate(&inner, id) {
            inner.rows.remove(&key);
        }
        Ok(())
    }

    async fn list_all(&self) -> StoreResult<Vec<Product>> {
        let inner = self.inner.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(inner.ordered().into_iter().cloned().collect())
    }

    async fn find_by_filter(&self, filter: &ProductFilter) -> StoreResult<Vec<Product>> {
        let inner = self.inner.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(inner
            .ordered()
            .into_iter()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect())
    }
}

/// Ten deterministic sample products (`id` "1".."10").
pub fn sample_products() -> Vec<Product> {
    let seeded_at = Utc.timestamp_opt(1_704_067_200, 0).single().unwrap_or_default();

    (1..=10)
        .map(|i: i64| {
            let price = Price::new(Decimal::new(i * 1000, 2)).unwrap_or_default();
            let mut product = Product::new(format!("Product{i}"), price, seeded_at);
            product.id = Some(ProductId::new(i.to_string()));
            product.partition_key = Some(format!("partition{i}"));
            product.row_key = Some(format!("row{i}"));
            product.image_url = Some(format!("ttp{i}.png"));
            product.category = Some(format!("Category{i}"));
            product.brand = Some(format!("Brand{i}"));
            product.description = Some(format!("Description for Product {i}"));
            product.status = ProductStatus::Active;
            product
        })
        .collect()
}
