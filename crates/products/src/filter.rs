//! Declarative product filter.
//!
//! Every criterion is optional and all set criteria must hold (logical AND).
//! `matches` is the reference semantics; backends that push filtering down to
//! their query language must agree with it.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::product::{Product, ProductStatus};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProductFilter {
    /// Case-insensitive equality.
    pub category: Option<String>,
    /// Case-insensitive equality.
    pub brand: Option<String>,
    /// Case-insensitive equality.
    pub product_area: Option<String>,
    /// Inclusive lower bound.
    pub min_price: Option<Decimal>,
    /// Inclusive upper bound.
    pub max_price: Option<Decimal>,
    /// Case-insensitive substring over name, description, brand and tags.
    /// Blank text counts as unset.
    pub search: Option<String>,
    pub status: Option<ProductStatus>,
    pub featured: Option<bool>,
    /// `Some(true)` keeps products with stock; `Some(false)` keeps the rest.
    pub in_stock: Option<bool>,
    /// Exact match.
    pub sku: Option<String>,
    /// Case-insensitive equality.
    pub manufacturer: Option<String>,
    /// Case-insensitive equality with any one tag.
    pub tag: Option<String>,
}

impl ProductFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn brand(mut self, brand: impl Into<String>) -> Self {
        self.brand = Some(brand.into());
        self
    }

    pub fn product_area(mut self, area: impl Into<String>) -> Self {
        self.product_area = Some(area.into());
        self
    }

    pub fn min_price(mut self, min: Decimal) -> Self {
        self.min_price = Some(min);
        self
    }

    pub fn max_price(mut self, max: Decimal) -> Self {
        self.max_price = Some(max);
        self
    }

    pub fn search(mut self, text: impl Into<String>) -> Self {
        self.search = Some(text.into());
        self
    }

    pub fn status(mut self, status: ProductStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn featured(mut self, featured: bool) -> Self {
        self.featured = Some(featured);
        self
    }

    pub fn in_stock(mut self, in_stock: bool) -> Self {
        self.in_stock = Some(in_stock);
        self
    }

    pub fn sku(mut self, sku: impl Into<String>) -> Self {
        self.sku = Some(sku.into());
        self
    }

    pub fn manufacturer(mut self, manufacturer: impl Into<String>) -> Self {
        self.manufacturer = Some(manufacturer.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Search text with surrounding whitespace removed, or `None` when blank.
    pub fn search_text(&self) -> Option<&str> {
        self.search.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    pub fn matches(&self, product: &Product) -> bool {
        if !eq_ignore_case(&self.category, &product.category) {
            return false;
        }
        if !eq_ignore_case(&self.brand, &product.brand) {
            return false;
        }
        if !eq_ignore_case(&self.product_area, &product.product_area) {
            return false;
        }
        if !eq_ignore_case(&self.manufacturer, &product.manufacturer) {
            return false;
        }
        if let Some(tag) = &self.tag {
            let tag = tag.to_lowercase();
            if !product.tags.iter().any(|t| t.to_lowercase() == tag) {
                return false;
            }
        }

        let price = product.price.amount();
        if self.min_price.is_some_and(|min| price < min) {
            return false;
        }
        if self.max_price.is_some_and(|max| price > max) {
            return false;
        }

        if self.status.is_some_and(|s| s != product.status) {
            return false;
        }
        if self.featured.is_some_and(|f| f != product.featured) {
            return false;
        }
        if self.in_stock.is_some_and(|wanted| wanted != product.in_stock()) {
            return false;
        }
        if let Some(sku) = &self.sku {
            if product.sku.as_deref() != Some(sku.as_str()) {
                return false;
            }
        }

        match self.search_text() {
            Some(text) => matches_text(product, &text.to_lowercase()),
            None => true,
        }
    }
}

fn eq_ignore_case(wanted: &Option<String>, actual: &Option<String>) -> bool {
    match (wanted, actual) {
        (None, _) => true,
        (Some(w), Some(a)) => w.to_lowercase() == a.to_lowercase(),
        (Some(_), None) => false,
    }
}

fn matches_text(product: &Product, needle: &str) -> bool {
    let contains = |value: &str| value.to_lowercase().contains(needle);

    contains(&product.name)
        || product.description.as_deref().is_some_and(contains)
        || product.brand.as_deref().is_some_and(contains)
        || product.tags.iter().any(|tag| contains(tag))
}
