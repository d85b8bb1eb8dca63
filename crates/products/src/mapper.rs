//! Pure conversions between `Product` and its DTOs.
//!
//! `to_response`/`to_summary` accept `Option` so an absent lookup maps to an
//! absent projection without the caller branching.

use chrono::{DateTime, SecondsFormat, Utc};

use catalog_core::{DomainResult, Price};

use crate::dto::{ProductCreateDto, ProductResponseDto, ProductSummaryDto, ProductUpdateDto};
use crate::product::{Product, ProductStatus};

pub fn to_response(product: Option<&Product>) -> Option<ProductResponseDto> {
    product.map(ProductResponseDto::from)
}

pub fn to_summary(product: Option<&Product>) -> Option<ProductSummaryDto> {
    product.map(ProductSummaryDto::from)
}

/// Build a new, unsaved product from a create request.
///
/// The request is validated first; status starts `ACTIVE`, `featured` defaults
/// to `false`, and both timestamps are set to the current instant.
pub fn to_entity(dto: ProductCreateDto) -> DomainResult<Product> {
    to_entity_at(dto, Utc::now())
}

pub fn to_entity_at(dto: ProductCreateDto, now: DateTime<Utc>) -> DomainResult<Product> {
    dto.validate()?;
    let price = dto.checked_price()?;
    let name = dto.checked_name()?.to_string();

    let mut product = Product::new(name, price, now);
    product.brand = dto.brand;
    product.description = dto.description;
    product.image_url = dto.image_url;
    product.category = dto.category;
    product.category_name = dto.category_name;
    product.product_area = dto.product_area;
    product.product_area_name = dto.product_area_name;
    product.stock_quantity = dto.stock_quantity;
    product.sku = dto.sku;
    product.featured = dto.featured.unwrap_or(false);
    product.weight = dto.weight;
    product.dimensions = dto.dimensions;
    product.warranty = dto.warranty;
    product.manufacturer = dto.manufacturer;
    product.features = dto.features.unwrap_or_default();
    product.specifications = dto.specifications.unwrap_or_default();
    product.tags = dto.tags.unwrap_or_default();
    product.partition_key = dto.partition_key;
    product.row_key = dto.row_key;
    product.status = ProductStatus::Active;
    Ok(product)
}

/// Apply a partial update in place and refresh `updated_at`.
///
/// Fields the update leaves unset are untouched, as are `id`, the composite
/// key and `created_at`. The update is validated first; on error the product
/// is left exactly as it was.
pub fn merge_update<'a>(
    product: &'a mut Product,
    update: &ProductUpdateDto,
) -> DomainResult<&'a mut Product> {
    merge_update_at(product, update, Utc::now())
}

pub fn merge_update_at<'a>(
    product: &'a mut Product,
    update: &ProductUpdateDto,
    now: DateTime<Utc>,
) -> DomainResult<&'a mut Product> {
    update.validate()?;
    let price = update.price.map(Price::new).transpose()?;

    fn set<T: Clone>(slot: &mut T, value: &Option<T>) {
        if let Some(v) = value {
            *slot = v.clone();
        }
    }
    fn set_opt<T: Clone>(slot: &mut Option<T>, value: &Option<T>) {
        if value.is_some() {
            *slot = value.clone();
        }
    }

    set(&mut product.name, &update.name);
    set_opt(&mut product.brand, &update.brand);
    set(&mut product.price, &price);
    set_opt(&mut product.description, &update.description);
    set_opt(&mut product.image_url, &update.image_url);
    set(&mut product.features, &update.features);
    set(&mut product.specifications, &update.specifications);
    set_opt(&mut product.category, &update.category);
    set_opt(&mut product.category_name, &update.category_name);
    set_opt(&mut product.product_area, &update.product_area);
    set_opt(&mut product.product_area_name, &update.product_area_name);
    set_opt(&mut product.stock_quantity, &update.stock_quantity);
    set_opt(&mut product.sku, &update.sku);
    set(&mut product.status, &update.status);
    set(&mut product.featured, &update.featured);
    set_opt(&mut product.weight, &update.weight);
    set_opt(&mut product.dimensions, &update.dimensions);
    set_opt(&mut product.warranty, &update.warranty);
    set_opt(&mut product.manufacturer, &update.manufacturer);
    set(&mut product.tags, &update.tags);

    product.touch(now);
    Ok(product)
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl From<&Product> for ProductResponseDto {
    fn from(p: &Product) -> Self {
        Self {
            id: p.id.clone(),
            name: p.name.clone(),
            brand: p.brand.clone(),
            price: p.price,
            description: p.description.clone(),
            image_url: p.image_url.clone(),
            category: p.category.clone(),
            category_name: p.category_name.clone(),
            product_area: p.product_area.clone(),
            product_area_name: p.product_area_name.clone(),
            stock_quantity: p.stock_quantity,
            sku: p.sku.clone(),
            status: p.status,
            featured: p.featured,
            weight: p.weight,
            dimensions: p.dimensions.clone(),
            warranty: p.warranty.clone(),
            manufacturer: p.manufacturer.clone(),
            features: p.features.clone(),
            specifications: p.specifications.clone(),
            tags: p.tags.clone(),
            partition_key: p.partition_key.clone(),
            row_key: p.row_key.clone(),
            created_at: format_timestamp(&p.created_at),
            updated_at: format_timestamp(&p.updated_at),
            in_stock: p.in_stock(),
            stock_status: p.stock_status(),
        }
    }
}

impl From<&Product> for ProductSummaryDto {
    fn from(p: &Product) -> Self {
        Self {
            id: p.id.clone(),
            name: p.name.clone(),
            brand: p.brand.clone(),
            price: p.price,
            image_url: p.image_url.clone(),
            category: p.category.clone(),
            category_name: p.category_name.clone(),
            stock_quantity: p.stock_quantity,
            featured: p.featured,
            status: p.status,
            in_stock: p.in_stock(),
        }
    }
}
