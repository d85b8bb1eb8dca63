//! Storage configuration, read once at startup.
//!
//! | Variable | Meaning | Default |
//! |----------|---------|---------|
//! | `CATALOG_BACKEND` | `in-memory`, `table` or `document` | `in-memory` |
//! | `CATALOG_MEMORY_KEY_MODE` | `id` or `composite` | `id` |
//! | `CATALOG_MEMORY_SEED` | seed sample products | `true` |
//! | `CATALOG_TABLE_ENDPOINT` | Redis URL | required for `table` |
//! | `CATALOG_TABLE_ACCOUNT_NAME` | Redis ACL user | required for `table` |
//! | `CATALOG_TABLE_ACCOUNT_KEY` | Redis ACL password | required for `table` |
//! | `CATALOG_TABLE_NAME` | key namespace | required for `table` |
//! | `CATALOG_DOCUMENT_URI` | PostgreSQL URI | required for `document` |
//! | `CATALOG_DOCUMENT_DATABASE` | database name | required for `document` |
//! | `CATALOG_DOCUMENT_COLLECTION` | table holding the documents | required for `document` |

use thiserror::Error;
use tracing::warn;

use crate::store::StoreError;
use crate::store::document::is_valid_collection_name;
use crate::store::in_memory::KeyMode;

pub const BACKEND: &str = "CATALOG_BACKEND";
pub const MEMORY_KEY_MODE: &str = "CATALOG_MEMORY_KEY_MODE";
pub const MEMORY_SEED: &str = "CATALOG_MEMORY_SEED";
pub const TABLE_ENDPOINT: &str = "CATALOG_TABLE_ENDPOINT";
pub const TABLE_ACCOUNT_NAME: &str = "CATALOG_TABLE_ACCOUNT_NAME";
pub const TABLE_ACCOUNT_KEY: &str = "CATALOG_TABLE_ACCOUNT_KEY";
pub const TABLE_NAME: &str = "CATALOG_TABLE_NAME";
pub const DOCUMENT_URI: &str = "CATALOG_DOCUMENT_URI";
pub const DOCUMENT_DATABASE: &str = "CATALOG_DOCUMENT_DATABASE";
pub const DOCUMENT_COLLECTION: &str = "CATALOG_DOCUMENT_COLLECTION";

/// Fatal startup error. The process must not serve requests after one.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("missing required setting {0}")]
    MissingSetting(&'static str),

    #[error("invalid value for {key}: {value}")]
    InvalidSetting { key: &'static str, value: String },

    #[error("failed to initialize storage backend: {0}")]
    Connect(#[source] StoreError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    pub backend: BackendConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendConfig {
    InMemory { key_mode: KeyMode, seed: bool },
    Table(TableConfig),
    Document(DocumentConfig),
}

#[derive(Clone, PartialEq, Eq)]
pub struct TableConfig {
    pub endpoint: String,
    pub account_name: String,
    pub account_key: String,
    pub table_name: String,
}

impl core::fmt::Debug for TableConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TableConfig")
            .field("endpoint", &self.endpoint)
            .field("account_name", &self.account_name)
            .field("account_key", &"<redacted>")
            .field("table_name", &self.table_name)
            .finish()
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct DocumentConfig {
    pub uri: String,
    pub database: String,
    pub collection: String,
}

impl core::fmt::Debug for DocumentConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DocumentConfig")
            .field("uri", &"<redacted>")
            .field("database", &self.database)
            .field("collection", &self.collection)
            .finish()
    }
}

impl StorageConfig {
    /// Load from the process environment, after applying `.env` if present.
    pub fn from_env() -> Result<Self, StartupError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from any key -> value source. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, StartupError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let require = |key: &'static str| get(key).ok_or(StartupError::MissingSetting(key));

        let backend = match get(BACKEND) {
            Some(name) => name.to_ascii_lowercase(),
            None => {
                warn!("{BACKEND} not set; defaulting to in-memory storage");
                "in-memory".to_string()
            }
        };

        let backend = match backend.as_str() {
            "in-memory" | "memory" => {
                let key_mode = match get(MEMORY_KEY_MODE) {
                    Some(raw) => raw.parse::<KeyMode>().map_err(|_| StartupError::InvalidSetting {
                        key: MEMORY_KEY_MODE,
                        value: raw,
                    })?,
                    None => KeyMode::Id,
                };
                let seed = match get(MEMORY_SEED) {
                    Some(raw) => parse_flag(&raw).ok_or(StartupError::InvalidSetting {
                        key: MEMORY_SEED,
                        value: raw,
                    })?,
                    None => true,
                };
                BackendConfig::InMemory { key_mode, seed }
            }
            "table" => {
                let table_name = require(TABLE_NAME)?;
                if table_name.contains('/') {
                    return Err(StartupError::InvalidSetting {
                        key: TABLE_NAME,
                        value: table_name,
                    });
                }
                BackendConfig::Table(TableConfig {
                    endpoint: require(TABLE_ENDPOINT)?,
                    account_name: require(TABLE_ACCOUNT_NAME)?,
                    account_key: require(TABLE_ACCOUNT_KEY)?,
                    table_name,
                })
            }
            "document" => {
                let collection = require(DOCUMENT_COLLECTION)?;
                if !is_valid_collection_name(&collection) {
                    return Err(StartupError::InvalidSetting {
                        key: DOCUMENT_COLLECTION,
                        value: collection,
                    });
                }
                BackendConfig::Document(DocumentConfig {
                    uri: require(DOCUMENT_URI)?,
                    database: require(DOCUMENT_DATABASE)?,
                    collection,
                })
            }
            _ => {
                return Err(StartupError::InvalidSetting {
                    key: BACKEND,
                    value: backend,
                });
            }
        };

        Ok(Self { backend })
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
