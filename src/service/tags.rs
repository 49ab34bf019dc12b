//! Tags. Posts can only reference tags that already exist in the tenant database.

use crate::error::AppError;
use serde::Serialize;
use sqlx::PgConnection;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Tag {
    pub id: Uuid,
    pub name: String,
}

pub async fn list_tags(conn: &mut PgConnection) -> Result<Vec<Tag>, AppError> {
    let tags = sqlx::query_as::<_, Tag>("SELECT id, name FROM tags ORDER BY name")
        .fetch_all(&mut *conn)
        .await?;
    Ok(tags)
}

/// Fails with a validation error naming the first unknown id.
pub async fn ensure_tags_exist(conn: &mut PgConnection, ids: &[Uuid]) -> Result<(), AppError> {
    if ids.is_empty() {
        return Ok(());
    }
    let found: Vec<Uuid> = sqlx::query_scalar("SELECT id FROM tags WHERE id = ANY($1)")
        .bind(ids)
        .fetch_all(&mut *conn)
        .await?;
    match ids.iter().find(|id| !found.contains(id)) {
        Some(missing) => Err(AppError::Validation(format!("unknown tag: {}", missing))),
        None => Ok(()),
    }
}
