//! Value object trait: equality by value, not identity.
//!
//! Value objects are domain objects that have **no identity** - they are defined entirely
//! by their attribute values. Two value objects with the same values are considered equal.

use core::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Marker trait for value objects.
///
/// Value objects are domain objects that are **immutable** and **compared by value**.
/// To "modify" a value object, create a new one with the new values.
///
/// ## Value Object vs Entity
///
/// - **Value Object**: No identity (two prices of 9.99 are the same price)
/// - **Entity**: Has identity (two products with the same name are still two products)
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}

/// Currency scale used by [`Price`].
pub const PRICE_SCALE: u32 = 2;

/// Non-negative monetary amount with a fixed scale of two decimal places.
///
/// Construction rounds half away from zero, so `9.995` becomes `10.00`.
/// Serialized as a decimal string (`"9.99"`); deserialization accepts strings
/// and JSON numbers and enforces the same invariants as [`Price::new`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Price(Decimal);

impl ValueObject for Price {}

impl Price {
    pub const ZERO: Price = Price(Decimal::from_parts(0, 0, 0, false, PRICE_SCALE));

    pub fn new(amount: Decimal) -> DomainResult<Self> {
        if amount < Decimal::ZERO {
            return Err(DomainError::validation("price", "must not be negative"));
        }
        let mut rounded = amount.round_dp_with_strategy(PRICE_SCALE, RoundingStrategy::MidpointAwayFromZero);
        rounded.rescale(PRICE_SCALE);
        Ok(Self(rounded))
    }

    pub fn amount(&self) -> Decimal {
        self.0
    }
}

impl Default for Price {
    fn default() -> Self {
        Self::ZERO
    }
}

impl TryFrom<Decimal> for Price {
    type Error = DomainError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Price> for Decimal {
    fn from(value: Price) -> Self {
        value.0
    }
}

impl FromStr for Price {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let amount = Decimal::from_str(s.trim())
            .map_err(|e| DomainError::validation("price", format!("not a decimal: {e}")))?;
        Self::new(amount)
    }
}

impl core::fmt::Display for Price {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}
