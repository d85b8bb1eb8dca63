//! Key/row table store on Redis hashes.
//!
//! ## Key Layout
//!
//! | Key | Type | Contents |
//! |-----|------|----------|
//! | `{table}/row/{partition}/{row}` | hash | product properties (string -> string) |
//! | `{table}/ids/{id}` | hash | `partitionKey`, `rowKey` of the row owning `id` |
//! | `{table}/rows` | sorted set | `partition/row` members scored by insertion sequence |
//! | `{table}/seq` | string | insertion sequence counter |
//!
//! Creates run as one server-side script, so a row is never visible half
//! written. Every property is stored as a string. Reads tolerate absent properties
//! (price falls back to `0.00`, optionals stay unset) but reject present values
//! that do not parse.

use std::collections::HashMap;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, IntoConnectionInfo};
use tracing::instrument;

use catalog_core::{CompositeKey, Price, ProductId};
use catalog_products::{Product, ProductFilter, ProductStatus};

use super::assign_identity;
use super::r#trait::{BackendKind, ProductStore, StoreError, StoreResult};
use crate::config::TableConfig;

const PARTITION_KEY: &str = "partitionKey";
const ROW_KEY: &str = "rowKey";

#[derive(Clone)]
pub struct TableProductStore {
    conn: MultiplexedConnection,
    table: String,
}

impl core::fmt::Debug for TableProductStore {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TableProductStore").field("table", &self.table).finish()
    }
}

impl TableProductStore {
    /// Open a multiplexed connection and verify it with `PING`.
    #[instrument(skip(config), fields(table = %config.table_name), err)]
    pub async fn connect(config: &TableConfig) -> StoreResult<Self> {
        let mut info = config
            .endpoint
            .as_str()
            .into_connection_info()
            .map_err(|e| StoreError::Connection(format!("invalid endpoint: {e}")))?;
        info.redis.username = Some(config.account_name.clone());
        info.redis.password = Some(config.account_key.clone());

        let client = redis::Client::open(info).map_err(|e| StoreError::Connection(e.to_string()))?;
        let mut conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        Ok(Self {
            conn,
            table: config.table_name.clone(),
        })
    }

    fn row_key(&self, key: &CompositeKey) -> String {
        format!("{}/row/{}", self.table, key.storage_key())
    }

    fn id_key(&self, id: &ProductId) -> String {
        format!("{}/ids/{}", self.table, id)
    }

    fn order_key(&self) -> String {
        format!("{}/rows", self.table)
    }

    fn seq_key(&self) -> String {
        format!("{}/seq", self.table)
    }

    async fn resolve_id(&self, id: &ProductId) -> StoreResult<Option<CompositeKey>> {
        let mut conn = self.conn.clone();
        let index: HashMap<String, String> =
            conn.hgetall(self.id_key(id)).await.map_err(map_redis_error)?;

        match (index.get(PARTITION_KEY), index.get(ROW_KEY)) {
            (Some(p), Some(r)) => Ok(Some(CompositeKey::new(p.as_str(), r.as_str())?)),
            _ => Ok(None),
        }
    }
}

#[async_trait]
impl ProductStore for TableProductStore {
    fn backend(&self) -> BackendKind {
        BackendKind::Table
    }

    #[instrument(skip(self, product), fields(table = %self.table), err)]
    async fn create(&self, mut product: Product) -> StoreResult<Product> {
        let (id, key) = assign_identity(&mut product)?;
        let row = self.row_key(&key);
        let index = self.id_key(&id);
        let mut conn = self.conn.clone();

        let script = create_script();
        let mut invocation = script.prepare_invoke();
        invocation
            .key(&index)
            .key(&row)
            .key(self.seq_key())
            .key(self.order_key())
            .arg(key.partition_key())
            .arg(key.row_key())
            .arg(key.storage_key());
        for (name, value) in to_properties(&product) {
            invocation.arg(name).arg(value);
        }

        let reply: i64 = invocation
            .invoke_async(&mut conn)
            .await
            .map_err(map_redis_error)?;
        create_outcome(reply, &id, &key)?;

        Ok(product)
    }

    #[instrument(skip(self), fields(table = %self.table), err)]
    async fn get_by_id(&self, id: &ProductId) -> StoreResult<Option<Product>> {
        match self.resolve_id(id).await? {
            Some(key) => self.get_by_composite_key(&key).await,
            None => Ok(None),
        }
    }

    #[instrument(skip(self), fields(table = %self.table), err)]
    async fn get_by_composite_key(&self, key: &CompositeKey) -> StoreResult<Option<Product>> {
        let mut conn = self.conn.clone();
        let properties: HashMap<String, String> =
            conn.hgetall(self.row_key(key)).await.map_err(map_redis_error)?;

        if properties.is_empty() {
            return Ok(None);
        }
        from_properties(properties).map(Some)
    }

    async fn get_by_name(&self, name: &str) -> StoreResult<Option<Product>> {
        Ok(self.list_all().await?.into_iter().find(|p| p.name == name))
    }

    #[instrument(skip(self, product), fields(table = %self.table, id = ?product.id), err)]
    async fn update(&self, mut product: Product) -> StoreResult<Option<Product>> {
        let id = product
            .id
            .clone()
            .ok_or_else(|| StoreError::InvalidKey("update requires an id".to_string()))?;
        let Some(key) = self.resolve_id(&id).await? else {
            return Ok(None);
        };

        let row = self.row_key(&key);
        let mut conn = self.conn.clone();
        let exists: bool = conn.exists(&row).await.map_err(map_redis_error)?;
        if !exists {
            return Ok(None);
        }

        // Rows are addressed by their natural key; it never moves.
        product.set_composite_key(&key);
        redis::pipe()
            .atomic()
            .del(&row)
            .ignore()
            .hset_multiple(&row, &to_properties(&product))
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(map_redis_error)?;

        Ok(Some(product))
    }

    #[instrument(skip(self), fields(table = %self.table), err)]
    async fn delete(&self, id: &ProductId) -> StoreResult<()> {
        let Some(key) = self.resolve_id(id).await? else {
            return Ok(());
        };

        let mut conn = self.conn.clone();
        redis::pipe()
            .atomic()
            .del(self.row_key(&key))
            .ignore()
            .del(self.id_key(id))
            .ignore()
            .zrem(self.order_key(), key.storage_key())
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(map_redis_error)
    }

    #[instrument(skip(self), fields(table = %self.table), err)]
    async fn list_all(&self) -> StoreResult<Vec<Product>> {
        let mut conn = self.conn.clone();
        let members: Vec<String> = conn
            .zrange(self.order_key(), 0, -1)
            .await
            .map_err(map_redis_error)?;
        if members.is_empty() {
            return Ok(vec![]);
        }

        let mut pipe = redis::pipe();
        for member in &members {
            let key = CompositeKey::from_storage_key(member)?;
            pipe.hgetall(self.row_key(&key));
        }
        let rows: Vec<HashMap<String, String>> =
            pipe.query_async(&mut conn).await.map_err(map_redis_error)?;

        rows.into_iter()
            .filter(|properties| !properties.is_empty())
            .map(from_properties)
            .collect()
    }

    async fn find_by_filter(&self, filter: &ProductFilter) -> StoreResult<Vec<Product>> {
        let mut products = self.list_all().await?;
        products.retain(|p| filter.matches(p));
        Ok(products)
    }
}

/// Claims the id index and the row, bumps the sequence and writes the row in
/// one step. `KEYS`: id index, row, sequence, order set. `ARGV`: partition,
/// row, order member, then property name/value pairs.
///
/// Replies `0` on success, `1` when the id is taken, `2` when the row is.
const CREATE_SCRIPT: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 1 then
    return 1
end
if redis.call('EXISTS', KEYS[2]) == 1 then
    return 2
end
local seq = redis.call('INCR', KEYS[3])
redis.call('HSET', KEYS[1], 'partitionKey', ARGV[1], 'rowKey', ARGV[2])
redis.call('ZADD', KEYS[4], seq, ARGV[3])
for i = 4, #ARGV, 2 do
    redis.call('HSET', KEYS[2], ARGV[i], ARGV[i + 1])
end
return 0
"#;

fn create_script() -> redis::Script {
    redis::Script::new(CREATE_SCRIPT)
}

fn create_outcome(reply: i64, id: &ProductId, key: &CompositeKey) -> StoreResult<()> {
    match reply {
        0 => Ok(()),
        1 => Err(StoreError::AlreadyExists(format!("product id '{id}'"))),
        2 => Err(StoreError::AlreadyExists(format!("row '{key}'"))),
        other => Err(StoreError::Backend(format!("unexpected create reply {other}"))),
    }
}

fn map_redis_error(err: redis::RedisError) -> StoreError {
    if err.is_io_error() || err.is_connection_dropped() || err.is_connection_refusal() || err.is_timeout() {
        StoreError::Connection(err.to_string())
    } else {
        StoreError::Backend(err.to_string())
    }
}

/// Flatten a product into table properties. Unset optionals are omitted.
pub(crate) fn to_properties(product: &Product) -> Vec<(&'static str, String)> {
    let mut props: Vec<(&'static str, String)> = Vec::with_capacity(28);

    let mut text = |name: &'static str, value: &Option<String>| {
        if let Some(v) = value {
            props.push((name, v.clone()));
        }
    };
    text("id", &product.id.as_ref().map(|id| id.to_string()));
    text(PARTITION_KEY, &product.partition_key);
    text(ROW_KEY, &product.row_key);
    text("name", &Some(product.name.clone()));
    text("brand", &product.brand);
    text("description", &product.description);
    text("imageUrl", &product.image_url);
    text("category", &product.category);
    text("categoryName", &product.category_name);
    text("productArea", &product.product_area);
    text("productAreaName", &product.product_area_name);
    text("manufacturer", &product.manufacturer);
    text("dimensions", &product.dimensions);
    text("warranty", &product.warranty);
    text("sku", &product.sku);
    text("stockQuantity", &product.stock_quantity.map(|q| q.to_string()));
    text("weight", &product.weight.map(|w| w.to_string()));

    props.push(("price", product.price.to_string()));
    props.push(("status", product.status.as_str().to_string()));
    props.push(("featured", product.featured.to_string()));
    props.push(("features", json_string(&product.features)));
    props.push(("specifications", json_string(&product.specifications)));
    props.push(("tags", json_string(&product.tags)));
    props.push(("createdAt", format_timestamp(&product.created_at)));
    props.push(("updatedAt", format_timestamp(&product.updated_at)));
    props
}

/// Rebuild a product from table properties.
pub(crate) fn from_properties(mut props: HashMap<String, String>) -> StoreResult<Product> {
    let mut take = |name: &str| props.remove(name);

    let price = parse_or(take("price"), "price", Price::ZERO)?;
    let created_at = parse_timestamp(take("createdAt"), "createdAt")?;
    let updated_at = parse_timestamp(take("updatedAt"), "updatedAt")?;

    let mut product = Product::new(take("name").unwrap_or_default(), price, created_at);
    product.updated_at = updated_at;
    product.id = take("id").map(ProductId::new);
    product.partition_key = take(PARTITION_KEY);
    product.row_key = take(ROW_KEY);
    product.brand = take("brand");
    product.description = take("description");
    product.image_url = take("imageUrl");
    product.category = take("category");
    product.category_name = take("categoryName");
    product.product_area = take("productArea");
    product.product_area_name = take("productAreaName");
    product.manufacturer = take("manufacturer");
    product.dimensions = take("dimensions");
    product.warranty = take("warranty");
    product.sku = take("sku");
    product.stock_quantity = parse_opt(take("stockQuantity"), "stockQuantity")?;
    product.weight = parse_opt(take("weight"), "weight")?;
    product.status = parse_or(take("status"), "status", ProductStatus::Active)?;
    product.featured = parse_or(take("featured"), "featured", false)?;
    product.features = parse_json(take("features"), "features")?;
    product.specifications = parse_json(take("specifications"), "specifications")?;
    product.tags = parse_json(take("tags"), "tags")?;
    Ok(product)
}

fn json_string<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "null".to_string())
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn malformed(name: &str, raw: &str, err: impl core::fmt::Display) -> StoreError {
    StoreError::Serialization(format!("property '{name}' has malformed value '{raw}': {err}"))
}

fn parse_opt<T>(raw: Option<String>, name: &str) -> StoreResult<Option<T>>
where
    T: FromStr,
    T::Err: core::fmt::Display,
{
    match raw {
        Some(raw) => raw.trim().parse().map(Some).map_err(|e| malformed(name, &raw, e)),
        None => Ok(None),
    }
}

fn parse_or<T>(raw: Option<String>, name: &str, default: T) -> StoreResult<T>
where
    T: FromStr,
    T::Err: core::fmt::Display,
{
    Ok(parse_opt(raw, name)?.unwrap_or(default))
}

fn parse_timestamp(raw: Option<String>, name: &str) -> StoreResult<DateTime<Utc>> {
    match raw {
        Some(raw) => DateTime::parse_from_rfc3339(raw.trim())
            .map(|ts| ts.with_timezone(&Utc))
            .map_err(|e| malformed(name, &raw, e)),
        None => Ok(DateTime::<Utc>::UNIX_EPOCH),
    }
}

fn parse_json<T>(raw: Option<String>, name: &str) -> StoreResult<T>
where
    T: serde::de::DeserializeOwned + Default,
{
    match raw {
        Some(raw) => serde_json::from_str::<Option<T>>(&raw)
            .map(Option::unwrap_or_default)
            .map_err(|e| malformed(name, &raw, e)),
        None => Ok(T::default()),
    }
}
