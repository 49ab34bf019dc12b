//! Comment handlers. Comments hang off visible posts; hidden comments follow the same rules.

use crate::error::AppError;
use crate::extractors::{CurrentUser, ForumAdmin, Participant, TenantDb};
use crate::handlers::posts::require_visible_post;
use crate::policy::{require_any, Policy};
use crate::response::{success_one, success_one_ok, success_page, Page};
use crate::service::comments::{self, CommentBody, CommentView};
use crate::service::users::ensure_participant;
use crate::service::votes::{cast_vote, VoteRequest, VoteTarget};
use crate::service::{PageParams, VisibilityRequest};
use axum::{extract::Path, http::StatusCode, response::IntoResponse, Json};
use sqlx::PgConnection;
use uuid::Uuid;

async fn load_view(conn: &mut PgConnection, id: Uuid, user: &CurrentUser) -> Result<CommentView, AppError> {
    let row = comments::get_comment_row(conn, id, user.id())
        .await?
        .filter(|row| !row.comment.is_deleted && Policy::ViewComment(&row.comment).evaluate(user))
        .ok_or_else(|| AppError::NotFound(format!("comment {}", id)))?;
    let can_mutate = Policy::MutateComment(&row.comment).evaluate(user);
    Ok(CommentView::new(row, can_mutate))
}

pub async fn list(
    user: CurrentUser,
    Path(post_id): Path<Uuid>,
    params: PageParams,
    mut db: TenantDb,
) -> Result<impl IntoResponse, AppError> {
    require_visible_post(db.conn(), post_id, &user).await?;
    let page = comments::list_comments(db.conn(), post_id, &params, user.id(), user.is_admin()).await?;
    let items = page
        .items
        .into_iter()
        .map(|row| {
            let can_mutate = Policy::MutateComment(&row.comment).evaluate(&user);
            CommentView::new(row, can_mutate)
        })
        .collect();
    Ok(success_page(Page {
        items,
        next_cursor: page.next_cursor,
    }))
}

pub async fn create(
    caller: Participant,
    Path(post_id): Path<Uuid>,
    mut db: TenantDb,
    Json(body): Json<CommentBody>,
) -> Result<impl IntoResponse, AppError> {
    ensure_participant(db.conn(), caller.id, caller.user.name()).await?;
    require_visible_post(db.conn(), post_id, &caller.user).await?;
    let id = comments::create_comment(db.conn(), post_id, caller.id, &body).await?;
    let view = load_view(db.conn(), id, &caller.user).await?;
    Ok(success_one(view))
}

pub async fn update(
    caller: Participant,
    Path(id): Path<Uuid>,
    mut db: TenantDb,
    Json(body): Json<CommentBody>,
) -> Result<impl IntoResponse, AppError> {
    let comment = comments::require_comment(db.conn(), id).await?;
    Policy::MutateComment(&comment).require(&caller.user)?;
    ensure_participant(db.conn(), caller.id, caller.user.name()).await?;
    comments::update_comment(db.conn(), id, &body).await?;
    let view = load_view(db.conn(), id, &caller.user).await?;
    Ok(success_one_ok(view))
}

pub async fn delete(caller: Participant, Path(id): Path<Uuid>, mut db: TenantDb) -> Result<impl IntoResponse, AppError> {
    let comment = comments::require_comment(db.conn(), id).await?;
    require_any(&[Policy::MutateComment(&comment), Policy::AdministrateForum], &caller.user)?;
    comments::soft_delete_comment(db.conn(), id).await?;
    tracing::info!(tenant = db.tenant().name(), comment_id = %id, "comment deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn vote(
    caller: Participant,
    Path(id): Path<Uuid>,
    mut db: TenantDb,
    Json(body): Json<VoteRequest>,
) -> Result<impl IntoResponse, AppError> {
    ensure_participant(db.conn(), caller.id, caller.user.name()).await?;
    load_view(db.conn(), id, &caller.user).await?;
    cast_vote(db.conn(), VoteTarget::Comment, id, caller.id, body.vote_type).await?;
    let view = load_view(db.conn(), id, &caller.user).await?;
    Ok(success_one_ok(view))
}

pub async fn set_visibility(
    admin: ForumAdmin,
    Path(id): Path<Uuid>,
    mut db: TenantDb,
    Json(body): Json<VisibilityRequest>,
) -> Result<impl IntoResponse, AppError> {
    comments::require_comment(db.conn(), id).await?;
    comments::set_comment_visibility(db.conn(), id, body.visibility).await?;
    let view = load_view(db.conn(), id, &admin.user).await?;
    Ok(success_one_ok(view))
}
