use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::Row;
use std::env;
use std::str::FromStr;
use uuid::Uuid;

pub mod models;

use models::{DeleteAck, FoodRecord, InsertAck, UpdateAck, STATUS_AVAILABLE, STATUS_REQUESTED};
use serde_json::{Map, Value};

pub type DbPool = sqlx::SqlitePool;

pub async fn init_pool() -> anyhow::Result<DbPool> {
    let env_mode = env::var("RUST_ENV").unwrap_or_else(|_| "development".to_string());
    let url = match env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) if env_mode != "production" => "sqlite::memory:".to_string(),
        Err(_) => anyhow::bail!("DATABASE_URL must be set in production"),
    };
    connect(&url).await
}

pub async fn connect(url: &str) -> anyhow::Result<DbPool> {
    let options = SqliteConnectOptions::from_str(url)
        .map_err(|e| anyhow::anyhow!("Invalid DATABASE_URL: {}", e))?
        .create_if_missing(true);

    // An in-memory database exists per connection, so the pool must not
    // hand out more than one.
    let max_connections = if url.contains(":memory:") { 1 } else { 5 };

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create DB pool: {}", e))?;

    sqlx::query("CREATE TABLE IF NOT EXISTS foods (id TEXT PRIMARY KEY, doc TEXT NOT NULL)")
        .execute(&pool)
        .await?;

    Ok(pool)
}

/// Orderings offered by the sorted listing endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortKey {
    Name,
    Quantity,
    Expire,
}

impl SortKey {
    pub fn parse(raw: &str) -> Option<SortKey> {
        match raw {
            "foodName" => Some(SortKey::Name),
            "foodQuantity" => Some(SortKey::Quantity),
            "expire" => Some(SortKey::Expire),
            _ => None,
        }
    }
}

fn rows_to_records(rows: Vec<sqlx::sqlite::SqliteRow>) -> anyhow::Result<Vec<FoodRecord>> {
    rows.into_iter().map(row_to_record).collect()
}

fn row_to_record(row: sqlx::sqlite::SqliteRow) -> anyhow::Result<FoodRecord> {
    let id: String = row.try_get("id")?;
    let doc: String = row.try_get("doc")?;
    let fields: Map<String, Value> = serde_json::from_str(&doc)?;
    Ok(FoodRecord { id, fields })
}

async fn list_by_status(pool: &DbPool, status: &str) -> anyhow::Result<Vec<FoodRecord>> {
    let rows = sqlx::query("SELECT id, doc FROM foods WHERE json_extract(doc, '$.foodStatus') = ?")
        .bind(status)
        .fetch_all(pool)
        .await?;
    rows_to_records(rows)
}

pub async fn list_available(pool: &DbPool) -> anyhow::Result<Vec<FoodRecord>> {
    list_by_status(pool, STATUS_AVAILABLE).await
}

pub async fn list_requested(pool: &DbPool) -> anyhow::Result<Vec<FoodRecord>> {
    list_by_status(pool, STATUS_REQUESTED).await
}

/// Available records whose name contains `search` case-insensitively,
/// in the ordering selected by `key`.
pub async fn list_available_sorted(
    pool: &DbPool,
    key: SortKey,
    search: &str,
) -> anyhow::Result<Vec<FoodRecord>> {
    let rows = sqlx::query(
        "SELECT id, doc FROM foods \
         WHERE json_extract(doc, '$.foodStatus') = ? \
         AND (? = '' OR instr(lower(coalesce(json_extract(doc, '$.foodName'), '')), lower(?)) > 0)",
    )
    .bind(STATUS_AVAILABLE)
    .bind(search)
    .bind(search)
    .fetch_all(pool)
    .await?;
    let mut records = rows_to_records(rows)?;
    match key {
        SortKey::Name => records.sort_by(|a, b| a.name_lower().cmp(&b.name_lower())),
        SortKey::Quantity => records.sort_by(|a, b| b.quantity().total_cmp(&a.quantity())),
        SortKey::Expire => records.sort_by(|a, b| b.expires_at().cmp(&a.expires_at())),
    }
    Ok(records)
}

/// All records ordered by descending quantity, truncated to `limit`.
pub async fn list_top_by_quantity(pool: &DbPool, limit: usize) -> anyhow::Result<Vec<FoodRecord>> {
    let rows = sqlx::query("SELECT id, doc FROM foods")
        .fetch_all(pool)
        .await?;
    let mut records = rows_to_records(rows)?;
    records.sort_by(|a, b| b.quantity().total_cmp(&a.quantity()));
    records.truncate(limit);
    Ok(records)
}

pub async fn list_by_donator(pool: &DbPool, email: &str) -> anyhow::Result<Vec<FoodRecord>> {
    let rows =
        sqlx::query("SELECT id, doc FROM foods WHERE json_extract(doc, '$.donatorEmail') = ?")
            .bind(email)
            .fetch_all(pool)
            .await?;
    rows_to_records(rows)
}

pub async fn get_food(pool: &DbPool, id: &str) -> anyhow::Result<Option<FoodRecord>> {
    let row = sqlx::query("SELECT id, doc FROM foods WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    row.map(row_to_record).transpose()
}

/// Store the submitted document verbatim. A client-supplied `_id` is honored;
/// otherwise the key is generated.
pub async fn insert_food(pool: &DbPool, mut fields: Map<String, Value>) -> anyhow::Result<InsertAck> {
    let id = match fields.remove("_id") {
        Some(Value::String(id)) => id,
        _ => Uuid::new_v4().to_string(),
    };
    let doc = serde_json::to_string(&Value::Object(fields))?;
    sqlx::query("INSERT INTO foods (id, doc) VALUES (?, ?)")
        .bind(&id)
        .bind(&doc)
        .execute(pool)
        .await?;
    Ok(InsertAck {
        acknowledged: true,
        inserted_id: id,
    })
}

/// Merge `patch` into the matching document. When no document matches, the
/// patch itself becomes a new document under that id (upsert).
pub async fn patch_food(
    pool: &DbPool,
    id: &str,
    patch: &Map<String, Value>,
) -> anyhow::Result<UpdateAck> {
    let patch_doc = serde_json::to_string(&Value::Object(patch.clone()))?;
    let result = sqlx::query("UPDATE foods SET doc = json_patch(doc, ?) WHERE id = ?")
        .bind(&patch_doc)
        .bind(id)
        .execute(pool)
        .await?;
    let matched = result.rows_affected();
    if matched == 0 {
        sqlx::query("INSERT INTO foods (id, doc) VALUES (?, ?)")
            .bind(id)
            .bind(&patch_doc)
            .execute(pool)
            .await?;
        return Ok(UpdateAck {
            acknowledged: true,
            matched_count: 0,
            modified_count: 0,
            upserted_id: Some(id.to_string()),
        });
    }
    Ok(UpdateAck {
        acknowledged: true,
        matched_count: matched,
        modified_count: matched,
        upserted_id: None,
    })
}

pub async fn delete_food(pool: &DbPool, id: &str) -> anyhow::Result<DeleteAck> {
    let result = sqlx::query("DELETE FROM foods WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(DeleteAck {
        acknowledged: true,
        deleted_count: result.rows_affected(),
    })
}
