//! Per-user post bookmarks. Toggling flips membership; the listing shows the newest first.

use crate::error::AppError;
use crate::response::Page;
use crate::service::posts::{push_listed, PostRow};
use crate::service::{into_page, known_cursor, PageParams};
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, Postgres, QueryBuilder};
use uuid::Uuid;

/// Add the bookmark when absent, remove it when present. Returns whether the post is now bookmarked.
pub async fn toggle_bookmark(conn: &mut PgConnection, post_id: Uuid, user_id: Uuid) -> Result<bool, AppError> {
    let removed = sqlx::query("DELETE FROM post_bookmarks WHERE post_id = $1 AND user_id = $2")
        .bind(post_id)
        .bind(user_id)
        .execute(&mut *conn)
        .await?
        .rows_affected();
    if removed > 0 {
        return Ok(false);
    }
    sqlx::query(
        "INSERT INTO post_bookmarks (post_id, user_id, bookmarked_at) VALUES ($1, $2, NOW()) ON CONFLICT DO NOTHING",
    )
    .bind(post_id)
    .bind(user_id)
    .execute(&mut *conn)
    .await?;
    Ok(true)
}

async fn cursor_bookmarked_at(conn: &mut PgConnection, user_id: Uuid, cursor: Uuid) -> Result<DateTime<Utc>, AppError> {
    let at = sqlx::query_scalar("SELECT bookmarked_at FROM post_bookmarks WHERE post_id = $1 AND user_id = $2")
        .bind(cursor)
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?;
    known_cursor(cursor, at)
}

/// Live posts bookmarked by `user_id`, most recently bookmarked first. The cursor is a post id
/// from the previous page.
pub async fn list_bookmarked(
    conn: &mut PgConnection,
    user_id: Uuid,
    params: &PageParams,
    include_hidden: bool,
) -> Result<Page<PostRow>, AppError> {
    let cursor = match params.cursor {
        Some(id) => Some((id, cursor_bookmarked_at(conn, user_id, id).await?)),
        None => None,
    };

    let mut qb = QueryBuilder::<Postgres>::new("");
    push_listed(&mut qb, Some(user_id));
    qb.push(" JOIN post_bookmarks mb ON mb.post_id = listed.id AND mb.user_id = ");
    qb.push_bind(user_id);
    qb.push(" WHERE NOT listed.is_deleted AND NOT listed.author_banned");
    if !include_hidden {
        qb.push(" AND listed.visibility = 'published'");
    }
    if let Some((cursor_id, bookmarked_at)) = cursor {
        qb.push(" AND (mb.bookmarked_at, listed.id) < (");
        qb.push_bind(bookmarked_at);
        qb.push(", ");
        qb.push_bind(cursor_id);
        qb.push(")");
    }
    qb.push(" ORDER BY mb.bookmarked_at DESC, listed.id DESC LIMIT ");
    qb.push_bind(i64::from(params.limit) + 1);

    let rows = qb.build_query_as::<PostRow>().fetch_all(&mut *conn).await?;
    Ok(into_page(rows, params.limit, |r| r.post.id))
}
