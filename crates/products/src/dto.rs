//! Boundary DTOs: what callers send in and what they get back.
//!
//! Inputs (`ProductCreateDto`, `ProductUpdateDto`) are already deserialized
//! when they reach the catalog; `validate()` reports the first offending field
//! as a `DomainError::Validation`. Outputs (`ProductResponseDto`,
//! `ProductSummaryDto`) are built by [`crate::mapper`].

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use catalog_core::id::validate_key_part;
use catalog_core::{DomainError, DomainResult, Price, ProductId};

use crate::product::{ProductStatus, StockStatus};

/// Input for creating a product.
///
/// `id`, `status` and both timestamps are assigned by the catalog. The optional
/// `partition_key`/`row_key` pair selects the natural key for key/row storage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProductCreateDto {
    pub name: Option<String>,
    pub brand: Option<String>,
    pub price: Option<Decimal>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub category: Option<String>,
    pub category_name: Option<String>,
    pub product_area: Option<String>,
    pub product_area_name: Option<String>,
    pub stock_quantity: Option<i32>,
    pub sku: Option<String>,
    pub featured: Option<bool>,
    pub weight: Option<f64>,
    pub dimensions: Option<String>,
    pub warranty: Option<String>,
    pub manufacturer: Option<String>,
    pub features: Option<Vec<String>>,
    pub specifications: Option<HashMap<String, String>>,
    pub tags: Option<Vec<String>>,
    pub partition_key: Option<String>,
    pub row_key: Option<String>,
}

impl ProductCreateDto {
    pub fn validate(&self) -> DomainResult<()> {
        self.checked_name()?;
        self.checked_price()?;
        validate_stock_quantity(self.stock_quantity)?;
        validate_weight(self.weight)?;
        validate_sku(self.sku.as_deref())?;

        match (&self.partition_key, &self.row_key) {
            (Some(p), Some(r)) => {
                validate_key_part("partitionKey", p)?;
                validate_key_part("rowKey", r)?;
            }
            (None, None) => {}
            (Some(_), None) => {
                return Err(DomainError::validation("rowKey", "required when partitionKey is set"));
            }
            (None, Some(_)) => {
                return Err(DomainError::validation("partitionKey", "required when rowKey is set"));
            }
        }
        Ok(())
    }

    pub(crate) fn checked_name(&self) -> DomainResult<&str> {
        match self.name.as_deref() {
            Some(name) if !name.trim().is_empty() => Ok(name),
            Some(_) => Err(DomainError::validation("name", "must not be blank")),
            None => Err(DomainError::validation("name", "is required")),
        }
    }

    pub(crate) fn checked_price(&self) -> DomainResult<Price> {
        let amount = self
            .price
            .ok_or_else(|| DomainError::validation("price", "is required"))?;
        Price::new(amount)
    }
}

/// Partial update.
///
/// Every field is optional. A field that is absent, or explicitly `null` in
/// the payload, leaves the stored value unchanged; there is no way to clear a
/// field through an update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProductUpdateDto {
    pub name: Option<String>,
    pub brand: Option<String>,
    pub price: Option<Decimal>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub features: Option<Vec<String>>,
    pub specifications: Option<HashMap<String, String>>,
    pub category: Option<String>,
    pub category_name: Option<String>,
    pub product_area: Option<String>,
    pub product_area_name: Option<String>,
    pub stock_quantity: Option<i32>,
    pub sku: Option<String>,
    pub status: Option<ProductStatus>,
    pub featured: Option<bool>,
    pub weight: Option<f64>,
    pub dimensions: Option<String>,
    pub warranty: Option<String>,
    pub manufacturer: Option<String>,
    pub tags: Option<Vec<String>>,
}

impl ProductUpdateDto {
    pub fn validate(&self) -> DomainResult<()> {
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(DomainError::validation("name", "must not be blank"));
            }
        }
        if let Some(amount) = self.price {
            Price::new(amount)?;
        }
        validate_stock_quantity(self.stock_quantity)?;
        validate_weight(self.weight)?;
        validate_sku(self.sku.as_deref())
    }
}

fn validate_stock_quantity(quantity: Option<i32>) -> DomainResult<()> {
    match quantity {
        Some(q) if q < 0 => Err(DomainError::validation("stockQuantity", "must not be negative")),
        _ => Ok(()),
    }
}

fn validate_weight(weight: Option<f64>) -> DomainResult<()> {
    match weight {
        Some(w) if !w.is_finite() => Err(DomainError::validation("weight", "must be a finite number")),
        Some(w) if w < 0.0 => Err(DomainError::validation("weight", "must not be negative")),
        _ => Ok(()),
    }
}

fn validate_sku(sku: Option<&str>) -> DomainResult<()> {
    match sku {
        Some(s) if s.trim().is_empty() => Err(DomainError::validation("sku", "must not be blank")),
        _ => Ok(()),
    }
}

/// Full read projection of a product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductResponseDto {
    pub id: Option<ProductId>,
    pub name: String,
    pub brand: Option<String>,
    pub price: Price,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub category: Option<String>,
    pub category_name: Option<String>,
    pub product_area: Option<String>,
    pub product_area_name: Option<String>,
    pub stock_quantity: Option<i32>,
    pub sku: Option<String>,
    pub status: ProductStatus,
    pub featured: bool,
    pub weight: Option<f64>,
    pub dimensions: Option<String>,
    pub warranty: Option<String>,
    pub manufacturer: Option<String>,
    pub features: Vec<String>,
    pub specifications: HashMap<String, String>,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partition_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_key: Option<String>,
    /// ISO-8601 (RFC 3339, UTC).
    pub created_at: String,
    /// ISO-8601 (RFC 3339, UTC).
    pub updated_at: String,
    pub in_stock: bool,
    pub stock_status: StockStatus,
}

/// Lightweight projection for list rendering (no long-form fields).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSummaryDto {
    pub id: Option<ProductId>,
    pub name: String,
    pub brand: Option<String>,
    pub price: Price,
    pub image_url: Option<String>,
    pub category: Option<String>,
    pub category_name: Option<String>,
    pub stock_quantity: Option<i32>,
    pub featured: bool,
    pub status: ProductStatus,
    pub in_stock: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_create() -> ProductCreateDto {
        ProductCreateDto {
            name: Some("Widget".to_string()),
            price: Some(Decimal::new(999, 2)),
            ..Default::default()
        }
    }

    #[test]
    fn create_requires_name_and_price() {
        assert!(valid_create().validate().is_ok());

        let err = ProductCreateDto { name: None, ..valid_create() }.validate().unwrap_err();
        assert_eq!(err.field(), Some("name"));

        let err = ProductCreateDto { name: Some("  ".to_string()), ..valid_create() }
            .validate()
            .unwrap_err();
        assert_eq!(err.field(), Some("name"));

        let err = ProductCreateDto { price: None, ..valid_create() }.validate().unwrap_err();
        assert_eq!(err.field(), Some("price"));
    }

    #[test]
    fn create_rejects_negative_numbers() {
        let err = ProductCreateDto { price: Some(Decimal::new(-1, 2)), ..valid_create() }
            .validate()
            .unwrap_err();
        assert_eq!(err.field(), Some("price"));

        let err = ProductCreateDto { stock_quantity: Some(-1), ..valid_create() }
            .validate()
            .unwrap_err();
        assert_eq!(err.field(), Some("stockQuantity"));

        let err = ProductCreateDto { weight: Some(f64::NAN), ..valid_create() }
            .validate()
            .unwrap_err();
        assert_eq!(err.field(), Some("weight"));
    }

    #[test]
    fn create_requires_both_key_halves() {
        let err = ProductCreateDto { partition_key: Some("p".to_string()), ..valid_create() }
            .validate()
            .unwrap_err();
        assert_eq!(err.field(), Some("rowKey"));

        let ok = ProductCreateDto {
            partition_key: Some("p".to_string()),
            row_key: Some("r".to_string()),
            ..valid_create()
        };
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn update_validates_only_present_fields() {
        assert!(ProductUpdateDto::default().validate().is_ok());

        let err = ProductUpdateDto { sku: Some(String::new()), ..Default::default() }
            .validate()
            .unwrap_err();
        assert_eq!(err.field(), Some("sku"));

        let err = ProductUpdateDto { price: Some(Decimal::new(-5, 0)), ..Default::default() }
            .validate()
            .unwrap_err();
        assert_eq!(err.field(), Some("price"));
    }

    #[test]
    fn update_treats_null_and_absent_alike() {
        let absent: ProductUpdateDto = serde_json::from_str(r#"{"price": 12.5}"#).unwrap();
        let null: ProductUpdateDto =
            serde_json::from_str(r#"{"price": 12.5, "name": null, "tags": null}"#).unwrap();
        assert_eq!(absent, null);
        assert_eq!(absent.price, Some(Decimal::new(125, 1)));
        assert!(absent.name.is_none());
    }

    #[test]
    fn create_dto_reads_camel_case_payload() {
        let dto: ProductCreateDto = serde_json::from_str(
            r#"{"name":"FlexiRetail Mobile POS","price":399.99,"imageUrl":"ttp4.png",
                "productAreaName":"Retail POS Systems","stockQuantity":50}"#,
        )
        .unwrap();
        assert_eq!(dto.image_url.as_deref(), Some("ttp4.png"));
        assert_eq!(dto.product_area_name.as_deref(), Some("Retail POS Systems"));
        assert_eq!(dto.stock_quantity, Some(50));
        assert!(dto.validate().is_ok());
    }
}
