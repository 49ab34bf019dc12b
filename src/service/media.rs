//! Media rows: object key and public URL of each post attachment.

use crate::error::AppError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgConnection;
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Media {
    pub id: Uuid,
    pub post_id: Uuid,
    #[serde(skip_serializing)]
    pub object_key: String,
    pub url: String,
    pub content_type: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const MEDIA_COLUMNS: &str = "id, post_id, object_key, url, content_type, created_at, updated_at";

pub async fn insert_media(
    conn: &mut PgConnection,
    post_id: Uuid,
    object_key: &str,
    url: &str,
    content_type: Option<&str>,
) -> Result<Media, AppError> {
    let media = sqlx::query_as::<_, Media>(&format!(
        "INSERT INTO media (id, post_id, object_key, url, content_type, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, NOW(), NOW()) RETURNING {}",
        MEDIA_COLUMNS
    ))
    .bind(Uuid::new_v4())
    .bind(post_id)
    .bind(object_key)
    .bind(url)
    .bind(content_type)
    .fetch_one(&mut *conn)
    .await?;
    Ok(media)
}

pub async fn media_for_post(conn: &mut PgConnection, post_id: Uuid) -> Result<Vec<Media>, AppError> {
    let rows = sqlx::query_as::<_, Media>(&format!(
        "SELECT {} FROM media WHERE post_id = $1 ORDER BY created_at, id",
        MEDIA_COLUMNS
    ))
    .bind(post_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows)
}

pub async fn require_media(conn: &mut PgConnection, id: Uuid) -> Result<Media, AppError> {
    sqlx::query_as::<_, Media>(&format!("SELECT {} FROM media WHERE id = $1", MEDIA_COLUMNS))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("media {}", id)))
}

pub async fn delete_media(conn: &mut PgConnection, id: Uuid) -> Result<(), AppError> {
    sqlx::query("DELETE FROM media WHERE id = $1")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}
