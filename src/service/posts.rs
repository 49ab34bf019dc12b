//! Posts: keyset-paginated listing with search, tag and sort options; CRUD; tags per post.

use crate::error::AppError;
use crate::response::Page;
use crate::service::tags::{ensure_tags_exist, Tag};
use crate::service::validation::{optional_text, page_limit, required_text, DESCRIPTION_MAX, LOCATION_MAX, TITLE_MAX};
use crate::service::votes::VoteType;
use crate::service::{into_page, known_cursor, like_pattern, parse_cursor, Visibility, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Connection, PgConnection, Postgres, QueryBuilder};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct Post {
    pub id: Uuid,
    pub author_id: Uuid,
    pub title: String,
    pub description: String,
    pub location: Option<String>,
    pub visibility: String,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Post {
    pub fn is_hidden(&self) -> bool {
        Visibility::from_db(&self.visibility) == Visibility::Hidden
    }
}

/// Post with vote tallies and the viewer's own vote.
#[derive(Debug, sqlx::FromRow)]
pub struct PostRow {
    #[sqlx(flatten)]
    pub post: Post,
    pub upvote_count: i64,
    pub downvote_count: i64,
    pub comment_count: i64,
    pub my_vote: Option<String>,
    pub bookmarked: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    pub id: Uuid,
    pub author_id: Uuid,
    pub title: String,
    pub description: String,
    pub location: Option<String>,
    pub upvote_count: i64,
    pub downvote_count: i64,
    pub comment_count: i64,
    pub vote_status: VoteType,
    pub bookmarked: bool,
    pub tags: Vec<Tag>,
    pub visibility: Visibility,
    pub can_mutate: bool,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PostView {
    pub fn new(row: PostRow, tags: Vec<Tag>, can_mutate: bool) -> Self {
        let PostRow {
            post,
            upvote_count,
            downvote_count,
            comment_count,
            my_vote,
            bookmarked,
        } = row;
        PostView {
            id: post.id,
            author_id: post.author_id,
            title: post.title,
            description: post.description,
            location: post.location,
            upvote_count,
            downvote_count,
            comment_count,
            vote_status: VoteType::from_db(my_vote.as_deref()),
            bookmarked,
            tags,
            visibility: Visibility::from_db(&post.visibility),
            can_mutate,
            is_deleted: post.is_deleted,
            created_at: post.created_at,
            updated_at: post.updated_at,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SortBy {
    #[default]
    Date,
    Votes,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    fn keyword(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }

    /// Comparison that selects rows after the cursor in this order.
    fn after(&self) -> &'static str {
        match self {
            SortOrder::Asc => ">",
            SortOrder::Desc => "<",
        }
    }
}

/// Parsed `GET /posts` query.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PostListParams {
    pub cursor: Option<Uuid>,
    pub limit: u32,
    pub search_term: Option<String>,
    pub tags: Vec<Uuid>,
    pub sort_by: SortBy,
    pub sort_order: SortOrder,
}

impl PostListParams {
    pub fn from_query(params: &HashMap<String, String>) -> Result<Self, AppError> {
        let get = |k: &str| params.get(k).map(|s| s.trim()).filter(|s| !s.is_empty());

        let cursor = parse_cursor(get("cursor"))?;
        let limit = page_limit(get("limit"), DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE)?;
        let tags = match get("tags") {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| Uuid::parse_str(s).map_err(|_| AppError::BadRequest(format!("invalid tag id: {}", s))))
                .collect::<Result<Vec<_>, _>>()?,
            None => Vec::new(),
        };
        let sort_by = match get("sortBy").map(str::to_lowercase).as_deref() {
            None | Some("date") => SortBy::Date,
            Some("votes") => SortBy::Votes,
            Some(other) => return Err(AppError::BadRequest(format!("invalid sortBy: {} (expected date or votes)", other))),
        };
        let sort_order = match get("sortOrder").map(str::to_lowercase).as_deref() {
            None | Some("desc") => SortOrder::Desc,
            Some("asc") => SortOrder::Asc,
            Some(other) => return Err(AppError::BadRequest(format!("invalid sortOrder: {} (expected asc or desc)", other))),
        };

        Ok(PostListParams {
            cursor,
            limit,
            search_term: get("searchTerm").map(String::from),
            tags,
            sort_by,
            sort_order,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePost {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub tag_ids: Vec<Uuid>,
}

impl CreatePost {
    pub fn validate(&self) -> Result<(), AppError> {
        required_text("title", &self.title, TITLE_MAX)?;
        required_text("description", &self.description, DESCRIPTION_MAX)?;
        optional_text("location", self.location.as_deref(), LOCATION_MAX)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePost {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub tag_ids: Option<Vec<Uuid>>,
}

impl UpdatePost {
    pub fn validate(&self) -> Result<(), AppError> {
        if let Some(title) = &self.title {
            required_text("title", title, TITLE_MAX)?;
        }
        if let Some(description) = &self.description {
            required_text("description", description, DESCRIPTION_MAX)?;
        }
        optional_text("location", self.location.as_deref(), LOCATION_MAX)
    }
}

/// SELECT producing [`PostRow`] columns plus `score`, as a derived table named `listed`.
pub(crate) fn push_listed<'a>(qb: &mut QueryBuilder<'a, Postgres>, viewer: Option<Uuid>) {
    qb.push(
        "SELECT * FROM (SELECT p.id, p.author_id, p.title, p.description, p.location, p.visibility, \
         p.is_deleted, p.created_at, p.updated_at, \
         COALESCE(v.upvotes, 0) AS upvote_count, COALESCE(v.downvotes, 0) AS downvote_count, \
         COALESCE(v.upvotes, 0) - COALESCE(v.downvotes, 0) AS score, \
         (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id AND NOT c.is_deleted \
         AND c.visibility = 'published') AS comment_count, \
         (SELECT pv.vote_type FROM post_votes pv WHERE pv.post_id = p.id AND pv.voter_id = ",
    );
    qb.push_bind(viewer);
    qb.push(") AS my_vote, EXISTS (SELECT 1 FROM post_bookmarks b WHERE b.post_id = p.id AND b.user_id = ");
    qb.push_bind(viewer);
    qb.push(
        ") AS bookmarked, COALESCE(u.is_banned, FALSE) AS author_banned \
         FROM posts p \
         LEFT JOIN users u ON u.id = p.author_id \
         LEFT JOIN LATERAL (SELECT COUNT(*) FILTER (WHERE vote_type = 'upvote') AS upvotes, \
         COUNT(*) FILTER (WHERE vote_type = 'downvote') AS downvotes \
         FROM post_votes WHERE post_id = p.id) v ON TRUE) listed",
    );
}

/// Sort key values of the cursor post, or None when no such post exists.
async fn cursor_keys(conn: &mut PgConnection, cursor: Uuid) -> Result<Option<(DateTime<Utc>, i64)>, AppError> {
    let keys = sqlx::query_as::<_, (DateTime<Utc>, i64)>(
        "SELECT p.created_at, \
         (SELECT COUNT(*) FILTER (WHERE vote_type = 'upvote') - COUNT(*) FILTER (WHERE vote_type = 'downvote') \
          FROM post_votes WHERE post_id = p.id) \
         FROM posts p WHERE p.id = $1",
    )
    .bind(cursor)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(keys)
}

/// Listing of live posts by non-banned authors. Hidden posts are only included for admins.
pub async fn list_posts(
    conn: &mut PgConnection,
    params: &PostListParams,
    viewer: Option<Uuid>,
    include_hidden: bool,
) -> Result<Page<PostRow>, AppError> {
    let cursor = match params.cursor {
        Some(id) => Some((id, known_cursor(id, cursor_keys(conn, id).await?)?)),
        None => None,
    };

    let mut qb = QueryBuilder::<Postgres>::new("");
    push_listed(&mut qb, viewer);
    qb.push(" WHERE NOT listed.is_deleted AND NOT listed.author_banned");
    if !include_hidden {
        qb.push(" AND listed.visibility = 'published'");
    }

    if let Some(term) = &params.search_term {
        let pattern = like_pattern(term);
        qb.push(" AND (listed.title ILIKE ");
        qb.push_bind(pattern.clone());
        qb.push(" OR listed.description ILIKE ");
        qb.push_bind(pattern);
        qb.push(")");
    }
    if !params.tags.is_empty() {
        qb.push(" AND EXISTS (SELECT 1 FROM post_tags pt WHERE pt.post_id = listed.id AND pt.tag_id = ANY(");
        qb.push_bind(params.tags.clone());
        qb.push("))");
    }

    let key_column = match params.sort_by {
        SortBy::Date => "listed.created_at",
        SortBy::Votes => "listed.score",
    };
    if let Some((cursor_id, (created_at, score))) = cursor {
        qb.push(format!(" AND ({}, listed.id) {} (", key_column, params.sort_order.after()));
        match params.sort_by {
            SortBy::Date => qb.push_bind(created_at),
            SortBy::Votes => qb.push_bind(score),
        };
        qb.push(", ");
        qb.push_bind(cursor_id);
        qb.push(")");
    }

    let order = params.sort_order.keyword();
    qb.push(format!(" ORDER BY {} {}, listed.id {}", key_column, order, order));
    qb.push(" LIMIT ");
    qb.push_bind(i64::from(params.limit) + 1);

    tracing::debug!(sql = %qb.sql(), "list posts");
    let rows = qb.build_query_as::<PostRow>().fetch_all(&mut *conn).await?;
    Ok(into_page(rows, params.limit, |r| r.post.id))
}

pub async fn get_post_row(conn: &mut PgConnection, id: Uuid, viewer: Option<Uuid>) -> Result<Option<PostRow>, AppError> {
    let mut qb = QueryBuilder::<Postgres>::new("");
    push_listed(&mut qb, viewer);
    qb.push(" WHERE listed.id = ");
    qb.push_bind(id);
    let row = qb.build_query_as::<PostRow>().fetch_optional(&mut *conn).await?;
    Ok(row)
}

/// Post without aggregates; deleted posts are reported as absent.
pub async fn find_post(conn: &mut PgConnection, id: Uuid) -> Result<Option<Post>, AppError> {
    let post = sqlx::query_as::<_, Post>(
        "SELECT id, author_id, title, description, location, visibility, is_deleted, created_at, updated_at \
         FROM posts WHERE id = $1 AND NOT is_deleted",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(post)
}

pub async fn require_post(conn: &mut PgConnection, id: Uuid) -> Result<Post, AppError> {
    find_post(conn, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("post {}", id)))
}

/// Tags of each post, ordered by tag name.
pub async fn tags_for_posts(conn: &mut PgConnection, post_ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<Tag>>, AppError> {
    let mut out: HashMap<Uuid, Vec<Tag>> = HashMap::new();
    if post_ids.is_empty() {
        return Ok(out);
    }
    let rows = sqlx::query_as::<_, (Uuid, Uuid, String)>(
        "SELECT pt.post_id, t.id, t.name FROM post_tags pt JOIN tags t ON t.id = pt.tag_id \
         WHERE pt.post_id = ANY($1) ORDER BY t.name",
    )
    .bind(post_ids)
    .fetch_all(&mut *conn)
    .await?;
    for (post_id, id, name) in rows {
        out.entry(post_id).or_default().push(Tag { id, name });
    }
    Ok(out)
}

pub async fn create_post(conn: &mut PgConnection, author_id: Uuid, input: &CreatePost) -> Result<Uuid, AppError> {
    input.validate()?;
    ensure_tags_exist(conn, &input.tag_ids).await?;

    let id = Uuid::new_v4();
    let mut tx = conn.begin().await?;
    sqlx::query(
        "INSERT INTO posts (id, author_id, title, description, location, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, NOW(), NOW())",
    )
    .bind(id)
    .bind(author_id)
    .bind(&input.title)
    .bind(&input.description)
    .bind(&input.location)
    .execute(&mut *tx)
    .await?;
    insert_post_tags(&mut tx, id, &input.tag_ids).await?;
    tx.commit().await?;
    tracing::info!(post_id = %id, %author_id, "post created");
    Ok(id)
}

pub async fn update_post(conn: &mut PgConnection, id: Uuid, input: &UpdatePost) -> Result<(), AppError> {
    input.validate()?;
    if let Some(tag_ids) = &input.tag_ids {
        ensure_tags_exist(conn, tag_ids).await?;
    }

    let mut tx = conn.begin().await?;
    sqlx::query(
        "UPDATE posts SET title = COALESCE($2, title), description = COALESCE($3, description), \
         location = COALESCE($4, location), updated_at = NOW() WHERE id = $1 AND NOT is_deleted",
    )
    .bind(id)
    .bind(&input.title)
    .bind(&input.description)
    .bind(&input.location)
    .execute(&mut *tx)
    .await?;
    if let Some(tag_ids) = &input.tag_ids {
        sqlx::query("DELETE FROM post_tags WHERE post_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        insert_post_tags(&mut tx, id, tag_ids).await?;
    }
    tx.commit().await?;
    Ok(())
}

async fn insert_post_tags(conn: &mut PgConnection, post_id: Uuid, tag_ids: &[Uuid]) -> Result<(), AppError> {
    if tag_ids.is_empty() {
        return Ok(());
    }
    sqlx::query(
        "INSERT INTO post_tags (post_id, tag_id) SELECT $1, t FROM UNNEST($2::uuid[]) AS t ON CONFLICT DO NOTHING",
    )
    .bind(post_id)
    .bind(tag_ids)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn soft_delete_post(conn: &mut PgConnection, id: Uuid) -> Result<(), AppError> {
    sqlx::query("UPDATE posts SET is_deleted = TRUE, updated_at = NOW() WHERE id = $1")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn set_post_visibility(conn: &mut PgConnection, id: Uuid, visibility: Visibility) -> Result<(), AppError> {
    sqlx::query("UPDATE posts SET visibility = $2, updated_at = NOW() WHERE id = $1")
        .bind(id)
        .bind(visibility.as_db())
        .execute(&mut *conn)
        .await?;
    tracing::info!(post_id = %id, visibility = visibility.as_db(), "post visibility changed");
    Ok(())
}

pub async fn touch_post(conn: &mut PgConnection, id: Uuid) -> Result<(), AppError> {
    sqlx::query("UPDATE posts SET updated_at = NOW() WHERE id = $1")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn list_params_defaults() {
        let p = PostListParams::from_query(&query(&[])).unwrap();
        assert_eq!(p.limit, DEFAULT_PAGE_SIZE);
        assert_eq!(p.sort_by, SortBy::Date);
        assert_eq!(p.sort_order, SortOrder::Desc);
        assert!(p.cursor.is_none());
        assert!(p.tags.is_empty());
    }

    #[test]
    fn list_params_parse_all_fields() {
        let cursor = Uuid::new_v4();
        let (t1, t2) = (Uuid::new_v4(), Uuid::new_v4());
        let tags = format!("{}, {}", t1, t2);
        let cursor_s = cursor.to_string();
        let p = PostListParams::from_query(&query(&[
            ("cursor", &cursor_s),
            ("limit", "10"),
            ("searchTerm", "pothole"),
            ("tags", &tags),
            ("sortBy", "Votes"),
            ("sortOrder", "asc"),
        ]))
        .unwrap();
        assert_eq!(p.cursor, Some(cursor));
        assert_eq!(p.limit, 10);
        assert_eq!(p.search_term.as_deref(), Some("pothole"));
        assert_eq!(p.tags, vec![t1, t2]);
        assert_eq!(p.sort_by, SortBy::Votes);
        assert_eq!(p.sort_order, SortOrder::Asc);
    }

    #[test]
    fn list_params_reject_bad_values() {
        assert!(matches!(
            PostListParams::from_query(&query(&[("limit", "100")])),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            PostListParams::from_query(&query(&[("cursor", "abc")])),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            PostListParams::from_query(&query(&[("sortBy", "title")])),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn create_post_validation() {
        let ok = CreatePost {
            title: "Broken streetlight".into(),
            description: "Corner of Main and 3rd".into(),
            location: None,
            tag_ids: vec![],
        };
        assert!(ok.validate().is_ok());
        let blank = CreatePost {
            title: "  ".into(),
            ..ok
        };
        assert!(blank.validate().is_err());
    }

    #[test]
    fn update_post_allows_partial_body() {
        let update: UpdatePost = serde_json::from_str(r#"{"description":"now fixed"}"#).unwrap();
        assert!(update.validate().is_ok());
        assert!(update.title.is_none());
        assert!(update.tag_ids.is_none());
    }
}
