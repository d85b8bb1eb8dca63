//! Product storage boundary and its three backends.
//!
//! The catalog service never names a concrete store; `connect_store` builds
//! the one selected by configuration and hands it back as a trait object.

pub mod document;
pub mod in_memory;
#[cfg(feature = "redis")]
pub mod table;
pub mod r#trait;

use std::sync::Arc;

use tracing::info;

use catalog_core::{CompositeKey, ProductId};
use catalog_products::Product;

use crate::config::{BackendConfig, StartupError, StorageConfig};

pub use document::DocumentProductStore;
pub use in_memory::{InMemoryProductStore, KeyMode};
#[cfg(feature = "redis")]
pub use table::TableProductStore;
pub use r#trait::{BackendKind, ProductStore, StoreError, StoreResult};

/// Partition assigned to products created without a composite key.
pub const DEFAULT_PARTITION_KEY: &str = "products";

/// Give a product about to be created an id and a composite key when it has
/// none. A product that only has half of a composite key is rejected.
pub(crate) fn assign_identity(product: &mut Product) -> StoreResult<(ProductId, CompositeKey)> {
    let id = product.id.get_or_insert_with(ProductId::generate).clone();

    let key = match product.composite_key()? {
        Some(key) => key,
        None if product.partition_key.is_none() && product.row_key.is_none() => {
            let key = CompositeKey::new(DEFAULT_PARTITION_KEY, id.as_str())?;
            product.set_composite_key(&key);
            key
        }
        None => {
            return Err(StoreError::InvalidKey(
                "partitionKey and rowKey must be set together".to_string(),
            ));
        }
    };
    Ok((id, key))
}

/// Build the backend selected by `config`.
///
/// Any failure here is fatal; the caller must not start serving.
pub async fn connect_store(config: &StorageConfig) -> Result<Arc<dyn ProductStore>, StartupError> {
    match &config.backend {
        BackendConfig::InMemory { key_mode, seed } => {
            let store = if *seed {
                InMemoryProductStore::with_sample_data(*key_mode).map_err(StartupError::Connect)?
            } else {
                InMemoryProductStore::new(*key_mode)
            };
            info!(key_mode = ?key_mode, seeded = *seed, "using in-memory product store");
            Ok(Arc::new(store))
        }
        #[cfg(feature = "redis")]
        BackendConfig::Table(table) => {
            let store = TableProductStore::connect(table).await.map_err(StartupError::Connect)?;
            info!(table = %table.table_name, "using table product store");
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "redis"))]
        BackendConfig::Table(_) => Err(StartupError::InvalidSetting {
            key: "CATALOG_BACKEND",
            value: "table (built without the `redis` feature)".to_string(),
        }),
        BackendConfig::Document(document) => {
            let store = DocumentProductStore::connect(document)
                .await
                .map_err(StartupError::Connect)?;
            info!(
                database = %document.database,
                collection = %document.collection,
                "using document product store"
            );
            Ok(Arc::new(store))
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use catalog_core::Price;

    use super::*;

    #[test]
    fn assign_identity_fills_missing_keys() {
        let mut product = Product::new("Widget", Price::ZERO, Utc::now());
        let (id, key) = assign_identity(&mut product).unwrap();
        assert_eq!(product.id.as_ref(), Some(&id));
        assert_eq!(key.partition_key(), DEFAULT_PARTITION_KEY);
        assert_eq!(key.row_key(), id.as_str());
    }

    #[test]
    fn assign_identity_keeps_supplied_keys() {
        let mut product = Product::new("Widget", Price::ZERO, Utc::now());
        product.id = Some(ProductId::new("w-1"));
        product.partition_key = Some("retail".to_string());
        product.row_key = Some("pos".to_string());

        let (id, key) = assign_identity(&mut product).unwrap();
        assert_eq!(id.as_str(), "w-1");
        assert_eq!(key.storage_key(), "retail/pos");
    }

    #[test]
    fn assign_identity_rejects_half_keys() {
        let mut product = Product::new("Widget", Price::ZERO, Utc::now());
        product.row_key = Some("pos".to_string());
        assert!(matches!(
            assign_identity(&mut product),
            Err(StoreError::InvalidKey(_))
        ));
    }

    #[tokio::test]
    async fn in_memory_backend_honours_seed_setting() {
        let config = StorageConfig {
            backend: BackendConfig::InMemory {
                key_mode: KeyMode::Id,
                seed: false,
            },
        };
        let store = connect_store(&config).await.unwrap();
        assert_eq!(store.backend(), BackendKind::InMemory);
        assert!(store.list_all().await.unwrap().is_empty());
    }
}
