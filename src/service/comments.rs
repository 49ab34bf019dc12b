//! Comments on posts, listed oldest first with keyset pagination.

use crate::error::AppError;
use crate::response::Page;
use crate::service::validation::{required_text, COMMENT_MAX};
use crate::service::votes::VoteType;
use crate::service::{into_page, known_cursor, PageParams, Visibility};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, Postgres, QueryBuilder};
use uuid::Uuid;

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct Comment {
    pub id: Uuid,
    pub post_id: Uuid,
    pub author_id: Uuid,
    pub content: String,
    pub visibility: String,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Comment {
    pub fn is_hidden(&self) -> bool {
        Visibility::from_db(&self.visibility) == Visibility::Hidden
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct CommentRow {
    #[sqlx(flatten)]
    pub comment: Comment,
    pub author_name: Option<String>,
    pub upvote_count: i64,
    pub downvote_count: i64,
    pub my_vote: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
    pub id: Uuid,
    pub post_id: Uuid,
    pub author_id: Uuid,
    pub author_name: Option<String>,
    pub content: String,
    pub upvote_count: i64,
    pub downvote_count: i64,
    pub vote_status: VoteType,
    pub visibility: Visibility,
    pub can_mutate: bool,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CommentView {
    pub fn new(row: CommentRow, can_mutate: bool) -> Self {
        let CommentRow {
            comment,
            author_name,
            upvote_count,
            downvote_count,
            my_vote,
        } = row;
        CommentView {
            id: comment.id,
            post_id: comment.post_id,
            author_id: comment.author_id,
            author_name,
            content: comment.content,
            upvote_count,
            downvote_count,
            vote_status: VoteType::from_db(my_vote.as_deref()),
            visibility: Visibility::from_db(&comment.visibility),
            can_mutate,
            is_deleted: comment.is_deleted,
            created_at: comment.created_at,
            updated_at: comment.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CommentBody {
    pub content: String,
}

impl CommentBody {
    pub fn validate(&self) -> Result<(), AppError> {
        required_text("content", &self.content, COMMENT_MAX)
    }
}

fn push_comment_select<'a>(qb: &mut QueryBuilder<'a, Postgres>, viewer: Option<Uuid>) {
    qb.push(
        "SELECT c.id, c.post_id, c.author_id, c.content, c.visibility, c.is_deleted, c.created_at, c.updated_at, \
         u.username AS author_name, \
         COUNT(cv.id) FILTER (WHERE cv.vote_type = 'upvote') AS upvote_count, \
         COUNT(cv.id) FILTER (WHERE cv.vote_type = 'downvote') AS downvote_count, \
         MAX(cv.vote_type) FILTER (WHERE cv.voter_id = ",
    );
    qb.push_bind(viewer);
    qb.push(
        ") AS my_vote \
         FROM comments c \
         LEFT JOIN users u ON u.id = c.author_id \
         LEFT JOIN comment_votes cv ON cv.comment_id = c.id",
    );
}

const COMMENT_GROUP_BY: &str = " GROUP BY c.id, u.username";

/// Creation time of the cursor comment, which must belong to `post_id`.
async fn cursor_created_at(conn: &mut PgConnection, post_id: Uuid, cursor: Uuid) -> Result<DateTime<Utc>, AppError> {
    let created_at = sqlx::query_scalar("SELECT created_at FROM comments WHERE id = $1 AND post_id = $2")
        .bind(cursor)
        .bind(post_id)
        .fetch_optional(&mut *conn)
        .await?;
    known_cursor(cursor, created_at)
}

/// Live comments of a post. Hidden comments are only included for admins.
pub async fn list_comments(
    conn: &mut PgConnection,
    post_id: Uuid,
    params: &PageParams,
    viewer: Option<Uuid>,
    include_hidden: bool,
) -> Result<Page<CommentRow>, AppError> {
    let cursor = match params.cursor {
        Some(id) => Some((id, cursor_created_at(conn, post_id, id).await?)),
        None => None,
    };

    let mut qb = QueryBuilder::<Postgres>::new("");
    push_comment_select(&mut qb, viewer);
    qb.push(" WHERE c.post_id = ");
    qb.push_bind(post_id);
    qb.push(" AND NOT c.is_deleted");
    if !include_hidden {
        qb.push(" AND c.visibility = 'published'");
    }
    if let Some((cursor_id, created_at)) = cursor {
        qb.push(" AND (c.created_at, c.id) > (");
        qb.push_bind(created_at);
        qb.push(", ");
        qb.push_bind(cursor_id);
        qb.push(")");
    }
    qb.push(COMMENT_GROUP_BY);
    qb.push(" ORDER BY c.created_at ASC, c.id ASC LIMIT ");
    qb.push_bind(i64::from(params.limit) + 1);

    let rows = qb.build_query_as::<CommentRow>().fetch_all(&mut *conn).await?;
    Ok(into_page(rows, params.limit, |r| r.comment.id))
}

pub async fn get_comment_row(conn: &mut PgConnection, id: Uuid, viewer: Option<Uuid>) -> Result<Option<CommentRow>, AppError> {
    let mut qb = QueryBuilder::<Postgres>::new("");
    push_comment_select(&mut qb, viewer);
    qb.push(" WHERE c.id = ");
    qb.push_bind(id);
    qb.push(COMMENT_GROUP_BY);
    let row = qb.build_query_as::<CommentRow>().fetch_optional(&mut *conn).await?;
    Ok(row)
}

pub async fn require_comment(conn: &mut PgConnection, id: Uuid) -> Result<Comment, AppError> {
    sqlx::query_as::<_, Comment>(
        "SELECT id, post_id, author_id, content, visibility, is_deleted, created_at, updated_at \
         FROM comments WHERE id = $1 AND NOT is_deleted",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("comment {}", id)))
}

pub async fn create_comment(
    conn: &mut PgConnection,
    post_id: Uuid,
    author_id: Uuid,
    body: &CommentBody,
) -> Result<Uuid, AppError> {
    body.validate()?;
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO comments (id, post_id, author_id, content, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, NOW(), NOW())",
    )
    .bind(id)
    .bind(post_id)
    .bind(author_id)
    .bind(&body.content)
    .execute(&mut *conn)
    .await?;
    tracing::info!(comment_id = %id, %post_id, "comment created");
    Ok(id)
}

pub async fn update_comment(conn: &mut PgConnection, id: Uuid, body: &CommentBody) -> Result<(), AppError> {
    body.validate()?;
    sqlx::query("UPDATE comments SET content = $2, updated_at = NOW() WHERE id = $1")
        .bind(id)
        .bind(&body.content)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn set_comment_visibility(conn: &mut PgConnection, id: Uuid, visibility: Visibility) -> Result<(), AppError> {
    sqlx::query("UPDATE comments SET visibility = $2, updated_at = NOW() WHERE id = $1")
        .bind(id)
        .bind(visibility.as_db())
        .execute(&mut *conn)
        .await?;
    tracing::info!(comment_id = %id, visibility = visibility.as_db(), "comment visibility changed");
    Ok(())
}

pub async fn soft_delete_comment(conn: &mut PgConnection, id: Uuid) -> Result<(), AppError> {
    sqlx::query("UPDATE comments SET is_deleted = TRUE, updated_at = NOW() WHERE id = $1")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}
