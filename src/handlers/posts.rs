//! Post handlers: list, read, create, update, delete, vote, bookmarks and moderation.

use crate::error::AppError;
use crate::extractors::{CurrentUser, ForumAdmin, Participant, TenantDb};
use crate::policy::{require_any, Policy};
use crate::response::{success_one, success_one_ok, success_page, Page};
use crate::service::bookmarks;
use crate::service::posts::{self, CreatePost, Post, PostListParams, PostRow, PostView, UpdatePost};
use crate::service::users::ensure_participant;
use crate::service::votes::{cast_vote, VoteChange, VoteRequest, VoteTarget};
use crate::service::{PageParams, VisibilityRequest};
use axum::{extract::Path, http::StatusCode, response::IntoResponse, Json};
use sqlx::PgConnection;
use uuid::Uuid;

/// Live post the caller may see. Hidden posts read as absent to everyone else.
pub(crate) async fn require_visible_post(conn: &mut PgConnection, id: Uuid, user: &CurrentUser) -> Result<Post, AppError> {
    let post = posts::require_post(conn, id).await?;
    if !Policy::ViewPost(&post).evaluate(user) {
        return Err(AppError::NotFound(format!("post {}", id)));
    }
    Ok(post)
}

async fn load_view(conn: &mut PgConnection, id: Uuid, user: &CurrentUser) -> Result<PostView, AppError> {
    let row = posts::get_post_row(conn, id, user.id())
        .await?
        .filter(|row| !row.post.is_deleted && Policy::ViewPost(&row.post).evaluate(user))
        .ok_or_else(|| AppError::NotFound(format!("post {}", id)))?;
    let tags = posts::tags_for_posts(conn, &[id]).await?.remove(&id).unwrap_or_default();
    let can_mutate = Policy::MutatePost(&row.post).evaluate(user);
    Ok(PostView::new(row, tags, can_mutate))
}

async fn page_of_views(conn: &mut PgConnection, page: Page<PostRow>, user: &CurrentUser) -> Result<Page<PostView>, AppError> {
    let ids: Vec<Uuid> = page.items.iter().map(|r| r.post.id).collect();
    let mut tags = posts::tags_for_posts(conn, &ids).await?;
    let items = page
        .items
        .into_iter()
        .map(|row| {
            let post_tags = tags.remove(&row.post.id).unwrap_or_default();
            let can_mutate = Policy::MutatePost(&row.post).evaluate(user);
            PostView::new(row, post_tags, can_mutate)
        })
        .collect();
    Ok(Page {
        items,
        next_cursor: page.next_cursor,
    })
}

pub async fn list(user: CurrentUser, params: PostListParams, mut db: TenantDb) -> Result<impl IntoResponse, AppError> {
    let page = posts::list_posts(db.conn(), &params, user.id(), user.is_admin()).await?;
    let page = page_of_views(db.conn(), page, &user).await?;
    Ok(success_page(page))
}

pub async fn read(user: CurrentUser, Path(id): Path<Uuid>, mut db: TenantDb) -> Result<impl IntoResponse, AppError> {
    let view = load_view(db.conn(), id, &user).await?;
    Ok(success_one_ok(view))
}

pub async fn create(
    caller: Participant,
    mut db: TenantDb,
    Json(body): Json<CreatePost>,
) -> Result<impl IntoResponse, AppError> {
    ensure_participant(db.conn(), caller.id, caller.user.name()).await?;
    let id = posts::create_post(db.conn(), caller.id, &body).await?;
    let view = load_view(db.conn(), id, &caller.user).await?;
    Ok(success_one(view))
}

pub async fn update(
    caller: Participant,
    Path(id): Path<Uuid>,
    mut db: TenantDb,
    Json(body): Json<UpdatePost>,
) -> Result<impl IntoResponse, AppError> {
    let post = posts::require_post(db.conn(), id).await?;
    Policy::MutatePost(&post).require(&caller.user)?;
    ensure_participant(db.conn(), caller.id, caller.user.name()).await?;
    posts::update_post(db.conn(), id, &body).await?;
    let view = load_view(db.conn(), id, &caller.user).await?;
    Ok(success_one_ok(view))
}

pub async fn delete(caller: Participant, Path(id): Path<Uuid>, mut db: TenantDb) -> Result<impl IntoResponse, AppError> {
    let post = posts::require_post(db.conn(), id).await?;
    require_any(&[Policy::MutatePost(&post), Policy::AdministrateForum], &caller.user)?;
    posts::soft_delete_post(db.conn(), id).await?;
    tracing::info!(tenant = db.tenant().name(), post_id = %id, "post deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn vote(
    caller: Participant,
    Path(id): Path<Uuid>,
    mut db: TenantDb,
    Json(body): Json<VoteRequest>,
) -> Result<impl IntoResponse, AppError> {
    ensure_participant(db.conn(), caller.id, caller.user.name()).await?;
    require_visible_post(db.conn(), id, &caller.user).await?;
    let change = cast_vote(db.conn(), VoteTarget::Post, id, caller.id, body.vote_type).await?;
    if !matches!(change, VoteChange::Unchanged) {
        posts::touch_post(db.conn(), id).await?;
    }
    let view = load_view(db.conn(), id, &caller.user).await?;
    Ok(success_one_ok(view))
}

pub async fn toggle_bookmark(
    caller: Participant,
    Path(id): Path<Uuid>,
    mut db: TenantDb,
) -> Result<impl IntoResponse, AppError> {
    ensure_participant(db.conn(), caller.id, caller.user.name()).await?;
    require_visible_post(db.conn(), id, &caller.user).await?;
    let bookmarked = bookmarks::toggle_bookmark(db.conn(), id, caller.id).await?;
    tracing::debug!(post_id = %id, bookmarked, "bookmark toggled");
    let view = load_view(db.conn(), id, &caller.user).await?;
    Ok(success_one_ok(view))
}

pub async fn bookmarked(caller: Participant, params: PageParams, mut db: TenantDb) -> Result<impl IntoResponse, AppError> {
    let page = bookmarks::list_bookmarked(db.conn(), caller.id, &params, caller.user.is_admin()).await?;
    let page = page_of_views(db.conn(), page, &caller.user).await?;
    Ok(success_page(page))
}

pub async fn set_visibility(
    admin: ForumAdmin,
    Path(id): Path<Uuid>,
    mut db: TenantDb,
    Json(body): Json<VisibilityRequest>,
) -> Result<impl IntoResponse, AppError> {
    posts::require_post(db.conn(), id).await?;
    posts::set_post_visibility(db.conn(), id, body.visibility).await?;
    let view = load_view(db.conn(), id, &admin.user).await?;
    Ok(success_one_ok(view))
}
