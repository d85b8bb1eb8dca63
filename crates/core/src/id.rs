//! Identifiers used across the catalog.
//!
//! A product has an opaque string identity (`ProductId`) and, for key/row
//! oriented storage, an optional natural key (`CompositeKey`).

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DomainError, DomainResult};

/// Opaque product identity.
///
/// Backends either assign one (database-generated) or call [`ProductId::generate`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(String);

impl ProductId {
    /// Create a new identifier.
    ///
    /// Uses UUIDv7 (time-ordered). Prefer passing IDs explicitly in tests
    /// for determinism.
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for ProductId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<Uuid> for ProductId {
    fn from(value: Uuid) -> Self {
        Self(value.to_string())
    }
}

impl From<&str> for ProductId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ProductId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl FromStr for ProductId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err(DomainError::invalid_id("ProductId: must not be blank"));
        }
        Ok(Self(s.to_string()))
    }
}

/// Characters a partition or row key may never contain.
///
/// `/` doubles as the separator in [`CompositeKey::storage_key`], which keeps
/// the joined form unambiguous.
const FORBIDDEN_KEY_CHARS: [char; 4] = ['/', '\\', '#', '?'];

/// `(partition_key, row_key)` natural key used by key/row oriented storage.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositeKey {
    partition_key: String,
    row_key: String,
}

impl CompositeKey {
    pub fn new(partition_key: impl Into<String>, row_key: impl Into<String>) -> DomainResult<Self> {
        let partition_key = partition_key.into();
        let row_key = row_key.into();
        validate_key_part("partitionKey", &partition_key)?;
        validate_key_part("rowKey", &row_key)?;
        Ok(Self {
            partition_key,
            row_key,
        })
    }

    pub fn partition_key(&self) -> &str {
        &self.partition_key
    }

    pub fn row_key(&self) -> &str {
        &self.row_key
    }

    /// Single-string form, `partition/row`.
    pub fn storage_key(&self) -> String {
        format!("{}/{}", self.partition_key, self.row_key)
    }

    /// Inverse of [`CompositeKey::storage_key`].
    pub fn from_storage_key(raw: &str) -> DomainResult<Self> {
        let (partition, row) = raw
            .split_once('/')
            .ok_or_else(|| DomainError::invalid_id(format!("composite key without separator: {raw}")))?;
        Self::new(partition, row)
    }
}

impl core::fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}:{}", self.partition_key, self.row_key)
    }
}

/// Validate one half of a composite key.
pub fn validate_key_part(field: &'static str, value: &str) -> DomainResult<()> {
    if value.is_empty() {
        return Err(DomainError::validation(field, "must not be empty"));
    }
    if let Some(c) = value
        .chars()
        .find(|c| FORBIDDEN_KEY_CHARS.contains(c) || c.is_control())
    {
        return Err(DomainError::validation(
            field,
            format!("contains forbidden character {c:?}"),
        ));
    }
    Ok(())
}
