//! Document store on PostgreSQL JSONB.
//!
//! Each collection is a table of JSON documents:
//!
//! ```sql
//! CREATE TABLE IF NOT EXISTS {collection} (
//!     id  UUID PRIMARY KEY DEFAULT gen_random_uuid(),
//!     seq BIGSERIAL,
//!     doc JSONB NOT NULL
//! )
//! ```
//!
//! `id` is database-assigned and is not repeated inside `doc`. `seq` records
//! insertion order. Filters run natively in SQL and follow
//! `ProductFilter::matches`.
//!
//! ## Error Mapping
//!
//! | SQLx Error | StoreError |
//! |------------|------------|
//! | Database, code `23505` (unique violation) | `AlreadyExists` |
//! | Database (other) | `Backend` |
//! | Io, Tls, PoolTimedOut, PoolClosed | `Connection` |
//! | Other | `Backend` |

use std::str::FromStr;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use tracing::{info, instrument};
use uuid::Uuid;

use catalog_core::{CompositeKey, ProductId};
use catalog_products::{Product, ProductFilter};

use super::r#trait::{BackendKind, ProductStore, StoreError, StoreResult};
use crate::config::DocumentConfig;

const MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Clone)]
pub struct DocumentProductStore {
    pool: PgPool,
    collection: String,
}

impl DocumentProductStore {
    /// Connect, verify the connection and make sure the collection exists.
    #[instrument(skip(config), fields(database = %config.database, collection = %config.collection), err)]
    pub async fn connect(config: &DocumentConfig) -> StoreResult<Self> {
        if !is_valid_collection_name(&config.collection) {
            return Err(StoreError::InvalidKey(format!(
                "collection name '{}' is not a valid identifier",
                config.collection
            )));
        }

        let options = PgConnectOptions::from_str(&config.uri)
            .map_err(|e| StoreError::Connection(format!("invalid connection uri: {e}")))?
            .database(&config.database);

        let pool = PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        sqlx::query("SELECT 1")
            .execute(&pool)
            .await
            .map_err(|e| map_sqlx_error("ping", e))?;

        let store = Self {
            pool,
            collection: config.collection.clone(),
        };
        store.ensure_collection().await?;
        Ok(store)
    }

    async fn ensure_collection(&self) -> StoreResult<()> {
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                seq BIGSERIAL,
                doc JSONB NOT NULL
            )",
            self.collection
        );
        sqlx::query(&sql)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_collection", e))?;
        info!(collection = %self.collection, "document collection ready");
        Ok(())
    }

    async fn fetch_one_where(
        &self,
        operation: &str,
        condition: &str,
        binds: &[&str],
    ) -> StoreResult<Option<Product>> {
        let sql = format!(
            "SELECT id, doc FROM {} WHERE {condition} ORDER BY seq LIMIT 1",
            self.collection
        );
        let mut query = sqlx::query(&sql);
        for value in binds {
            query = query.bind(*value);
        }
        let row = query
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;

        row.map(|r| product_from_row(&r)).transpose()
    }
}

#[async_trait]
impl ProductStore for DocumentProductStore {
    fn backend(&self) -> BackendKind {
        BackendKind::Document
    }

    #[instrument(skip(self, product), fields(collection = %self.collection), err)]
    async fn create(&self, mut product: Product) -> StoreResult<Product> {
        let doc = product_to_doc(&product)?;

        let id: Uuid = match &product.id {
            Some(id) => {
                let requested = parse_document_id(id)?;
                let sql = format!(
                    "INSERT INTO {} (id, doc) VALUES ($1, $2) ON CONFLICT (id) DO NOTHING RETURNING id",
                    self.collection
                );
                let row = sqlx::query(&sql)
                    .bind(requested)
                    .bind(&doc)
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(|e| map_sqlx_error("create", e))?;
                match row {
                    Some(row) => read_id(&row)?,
                    None => return Err(StoreError::AlreadyExists(format!("product id '{id}'"))),
                }
            }
            None => {
                let sql = format!("INSERT INTO {} (doc) VALUES ($1) RETURNING id", self.collection);
                let row = sqlx::query(&sql)
                    .bind(&doc)
                    .fetch_one(&self.pool)
                    .await
                    .map_err(|e| map_sqlx_error("create", e))?;
                read_id(&row)?
            }
        };

        product.id = Some(ProductId::from(id));
        Ok(product)
    }

    #[instrument(skip(self), fields(collection = %self.collection), err)]
    async fn get_by_id(&self, id: &ProductId) -> StoreResult<Option<Product>> {
        let uuid = parse_document_id(id)?;
        let sql = format!("SELECT id, doc FROM {} WHERE id = $1", self.collection);
        let row = sqlx::query(&sql)
            .bind(uuid)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_by_id", e))?;

        row.map(|r| product_from_row(&r)).transpose()
    }

    #[instrument(skip(self), fields(collection = %self.collection), err)]
    async fn get_by_composite_key(&self, key: &CompositeKey) -> StoreResult<Option<Product>> {
        self.fetch_one_where(
            "get_by_composite_key",
            "doc->>'partitionKey' = $1 AND doc->>'rowKey' = $2",
            &[key.partition_key(), key.row_key()],
        )
        .await
    }

    #[instrument(skip(self), fields(collection = %self.collection), err)]
    async fn get_by_name(&self, name: &str) -> StoreResult<Option<Product>> {
        self.fetch_one_where("get_by_name", "doc->>'name' = $1", &[name]).await
    }

    #[instrument(skip(self, product), fields(collection = %self.collection, id = ?product.id), err)]
    async fn update(&self, product: Product) -> StoreResult<Option<Product>> {
        let id = product
            .id
            .as_ref()
            .ok_or_else(|| StoreError::InvalidKey("update requires an id".to_string()))?;
        let uuid = parse_document_id(id)?;
        let doc = product_to_doc(&product)?;

        let sql = format!("UPDATE {} SET doc = $2 WHERE id = $1", self.collection);
        let result = sqlx::query(&sql)
            .bind(uuid)
            .bind(&doc)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("update", e))?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        Ok(Some(product))
    }

    #[instrument(skip(self), fields(collection = %self.collection), err)]
    async fn delete(&self, id: &ProductId) -> StoreResult<()> {
        let uuid = parse_document_id(id)?;
        let sql = format!("DELETE FROM {} WHERE id = $1", self.collection);
        sqlx::query(&sql)
            .bind(uuid)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(collection = %self.collection), err)]
    async fn list_all(&self) -> StoreResult<Vec<Product>> {
        let sql = format!("SELECT id, doc FROM {} ORDER BY seq", self.collection);
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_all", e))?;

        rows.iter().map(product_from_row).collect()
    }

    #[instrument(skip(self), fields(collection = %self.collection), err)]
    async fn find_by_filter(&self, filter: &ProductFilter) -> StoreResult<Vec<Product>> {
        let sql = filter_sql(&self.collection);
        let rows = sqlx::query(&sql)
            .bind(filter.category.as_deref())
            .bind(filter.brand.as_deref())
            .bind(filter.product_area.as_deref())
            .bind(filter.min_price)
            .bind(filter.max_price)
            .bind(filter.status.map(|s| s.as_str()))
            .bind(filter.featured)
            .bind(filter.in_stock)
            .bind(filter.sku.as_deref())
            .bind(filter.search_text().map(like_pattern))
            .bind(filter.manufacturer.as_deref())
            .bind(filter.tag.as_deref())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_by_filter", e))?;

        rows.iter().map(product_from_row).collect()
    }

    async fn close(&self) {
        self.pool.close().await;
        info!(collection = %self.collection, "document store closed");
    }
}

/// Filter query over `collection`. Bind order is the one in `find_by_filter`.
fn filter_sql(collection: &str) -> String {
    format!(
        r#"
        SELECT id, doc
        FROM {}
        WHERE ($1::text IS NULL OR lower(doc->>'category') = lower($1))
            AND ($2::text IS NULL OR lower(doc->>'brand') = lower($2))
            AND ($3::text IS NULL OR lower(doc->>'productArea') = lower($3))
            AND ($4::numeric IS NULL OR (doc->>'price')::numeric >= $4)
            AND ($5::numeric IS NULL OR (doc->>'price')::numeric <= $5)
            AND ($6::text IS NULL OR doc->>'status' = $6)
            AND ($7::boolean IS NULL OR COALESCE((doc->>'featured')::boolean, false) = $7)
            AND ($8::boolean IS NULL OR (COALESCE((doc->>'stockQuantity')::int, 0) > 0) = $8)
            AND ($9::text IS NULL OR doc->>'sku' = $9)
            AND ($10::text IS NULL
                OR doc->>'name' ILIKE $10 ESCAPE '\'
                OR doc->>'description' ILIKE $10 ESCAPE '\'
                OR doc->>'brand' ILIKE $10 ESCAPE '\'
                OR EXISTS (
                    SELECT 1
                    FROM jsonb_array_elements_text(COALESCE(doc->'tags', '[]'::jsonb)) AS t(tag)
                    WHERE t.tag ILIKE $10 ESCAPE '\'
                ))
            AND ($11::text IS NULL OR lower(doc->>'manufacturer') = lower($11))
            AND ($12::text IS NULL OR EXISTS (
                    SELECT 1
                    FROM jsonb_array_elements_text(COALESCE(doc->'tags', '[]'::jsonb)) AS t(tag)
                    WHERE lower(t.tag) = lower($12)
                ))
        ORDER BY seq
        "#,
        collection
    )
}

/// Table names are interpolated into SQL, so only plain identifiers pass.
pub fn is_valid_collection_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    name.len() <= 63 && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// `%text%` with LIKE metacharacters escaped.
pub(crate) fn like_pattern(text: &str) -> String {
    let mut pattern = String::with_capacity(text.len() + 2);
    pattern.push('%');
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

fn parse_document_id(id: &ProductId) -> StoreResult<Uuid> {
    Uuid::parse_str(id.as_str())
        .map_err(|e| StoreError::InvalidKey(format!("'{id}' is not a document id: {e}")))
}

pub(crate) fn product_to_doc(product: &Product) -> StoreResult<JsonValue> {
    let mut doc = serde_json::to_value(product).map_err(|e| StoreError::Serialization(e.to_string()))?;
    if let Some(object) = doc.as_object_mut() {
        object.remove("id");
    }
    Ok(doc)
}

pub(crate) fn product_from_doc(id: Uuid, mut doc: JsonValue) -> StoreResult<Product> {
    let object = doc
        .as_object_mut()
        .ok_or_else(|| StoreError::Serialization(format!("document {id} is not an object")))?;
    object.insert("id".to_string(), JsonValue::String(id.to_string()));

    serde_json::from_value(doc)
        .map_err(|e| StoreError::Serialization(format!("document {id}: {e}")))
}

fn read_id(row: &PgRow) -> StoreResult<Uuid> {
    row.try_get("id")
        .map_err(|e| StoreError::Serialization(format!("failed to read id: {e}")))
}

fn product_from_row(row: &PgRow) -> StoreResult<Product> {
    let id = read_id(row)?;
    let doc: JsonValue = row
        .try_get("doc")
        .map_err(|e| StoreError::Serialization(format!("failed to read document: {e}")))?;
    product_from_doc(id, doc)
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {operation}: {}", db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::AlreadyExists(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::Io(_) | sqlx::Error::Tls(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
            StoreError::Connection(format!("{operation}: {err}"))
        }
        _ => StoreError::Backend(format!("sqlx error in {operation}: {err}")),
    }
}
