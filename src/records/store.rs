//! Record persistence. Every query is scoped to the owning user.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::ApiError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Record {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const COLUMNS: &str = "id, owner_id, title, content, created_at, updated_at";

pub async fn list(pool: &SqlitePool, owner_id: &str) -> Result<Vec<Record>, ApiError> {
    let records = sqlx::query_as::<_, Record>(&format!(
        "SELECT {COLUMNS} FROM records WHERE owner_id = ? ORDER BY created_at DESC, id"
    ))
    .bind(owner_id)
    .fetch_all(pool)
    .await?;
    Ok(records)
}

pub async fn insert(
    pool: &SqlitePool,
    owner_id: &str,
    title: &str,
    content: &str,
) -> Result<Record, ApiError> {
    let now = Utc::now();
    let record = Record {
        id: Uuid::new_v4().to_string(),
        owner_id: owner_id.to_string(),
        title: title.to_string(),
        content: content.to_string(),
        created_at: now,
        updated_at: now,
    };

    sqlx::query(&format!("INSERT INTO records ({COLUMNS}) VALUES (?, ?, ?, ?, ?, ?)"))
        .bind(&record.id)
        .bind(&record.owner_id)
        .bind(&record.title)
        .bind(&record.content)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(pool)
        .await?;

    Ok(record)
}

pub async fn find(pool: &SqlitePool, owner_id: &str, id: &str) -> Result<Option<Record>, ApiError> {
    let record = sqlx::query_as::<_, Record>(&format!(
        "SELECT {COLUMNS} FROM records WHERE id = ? AND owner_id = ?"
    ))
    .bind(id)
    .bind(owner_id)
    .fetch_optional(pool)
    .await?;
    Ok(record)
}

/// Apply the given changes. Returns `None` if the record does not exist for this owner.
pub async fn update(
    pool: &SqlitePool,
    owner_id: &str,
    id: &str,
    title: Option<&str>,
    content: Option<&str>,
) -> Result<Option<Record>, ApiError> {
    let result = sqlx::query(
        "UPDATE records
         SET title = COALESCE(?, title), content = COALESCE(?, content), updated_at = ?
         WHERE id = ? AND owner_id = ?",
    )
    .bind(title)
    .bind(content)
    .bind(Utc::now())
    .bind(id)
    .bind(owner_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }
    find(pool, owner_id, id).await
}

/// Returns `false` if nothing was deleted.
pub async fn delete(pool: &SqlitePool, owner_id: &str, id: &str) -> Result<bool, ApiError> {
    let result = sqlx::query("DELETE FROM records WHERE id = ? AND owner_id = ?")
        .bind(id)
        .bind(owner_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
