use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use catalog_core::{CompositeKey, DomainError, DomainResult, Entity, Price, ProductId};

/// Products with fewer units than this (but at least one) are `LOW_STOCK`.
pub const LOW_STOCK_THRESHOLD: i32 = 5;

/// Product status.
///
/// Caller-set data: nothing in the catalog transitions it automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProductStatus {
    #[default]
    Active,
    Inactive,
    Discontinued,
}

impl ProductStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductStatus::Active => "ACTIVE",
            ProductStatus::Inactive => "INACTIVE",
            ProductStatus::Discontinued => "DISCONTINUED",
        }
    }
}

impl core::fmt::Display for ProductStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for ProductStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ACTIVE" => Ok(ProductStatus::Active),
            "INACTIVE" => Ok(ProductStatus::Inactive),
            "DISCONTINUED" => Ok(ProductStatus::Discontinued),
            other => Err(DomainError::validation(
                "status",
                format!("unknown status '{other}'"),
            )),
        }
    }
}

/// Stock level bucket derived from `stock_quantity` (never stored).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StockStatus {
    OutOfStock,
    LowStock,
    InStock,
}

impl StockStatus {
    pub fn from_quantity(quantity: Option<i32>) -> Self {
        match quantity {
            Some(q) if q >= LOW_STOCK_THRESHOLD => StockStatus::InStock,
            Some(q) if q > 0 => StockStatus::LowStock,
            _ => StockStatus::OutOfStock,
        }
    }
}

/// Canonical persisted product record.
///
/// `id` is assigned by the storage backend on first write. `partition_key` and
/// `row_key` form the natural key used by key/row oriented storage; which of
/// the two identity schemes is meaningful depends on the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Option<ProductId>,
    pub partition_key: Option<String>,
    pub row_key: Option<String>,

    pub name: String,
    pub brand: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub category: Option<String>,
    pub category_name: Option<String>,
    pub product_area: Option<String>,
    pub product_area_name: Option<String>,
    pub manufacturer: Option<String>,
    pub dimensions: Option<String>,
    pub warranty: Option<String>,

    #[serde(default)]
    pub price: Price,
    pub stock_quantity: Option<i32>,
    pub sku: Option<String>,
    #[serde(default)]
    pub status: ProductStatus,
    #[serde(default)]
    pub featured: bool,
    pub weight: Option<f64>,

    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub specifications: HashMap<String, String>,
    #[serde(default)]
    pub tags: Vec<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// A fresh, unsaved product with entity defaults applied.
    pub fn new(name: impl Into<String>, price: Price, now: DateTime<Utc>) -> Self {
        Self {
            id: None,
            partition_key: None,
            row_key: None,
            name: name.into(),
            brand: None,
            description: None,
            image_url: None,
            category: None,
            category_name: None,
            product_area: None,
            product_area_name: None,
            manufacturer: None,
            dimensions: None,
            warranty: None,
            price,
            stock_quantity: None,
            sku: None,
            status: ProductStatus::Active,
            featured: false,
            weight: None,
            features: Vec::new(),
            specifications: HashMap::new(),
            tags: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn in_stock(&self) -> bool {
        matches!(self.stock_quantity, Some(q) if q > 0)
    }

    pub fn stock_status(&self) -> StockStatus {
        StockStatus::from_quantity(self.stock_quantity)
    }

    /// Natural key, when both halves are present.
    pub fn composite_key(&self) -> DomainResult<Option<CompositeKey>> {
        match (&self.partition_key, &self.row_key) {
            (Some(p), Some(r)) => CompositeKey::new(p.clone(), r.clone()).map(Some),
            _ => Ok(None),
        }
    }

    pub fn set_composite_key(&mut self, key: &CompositeKey) {
        self.partition_key = Some(key.partition_key().to_string());
        self.row_key = Some(key.row_key().to_string());
    }

    /// Refresh `updated_at`.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> Option<&Self::Id> {
        self.id.as_ref()
    }
}
