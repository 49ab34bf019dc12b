//! User lookup, reports and admin bans.

use crate::error::AppError;
use crate::extractors::{ForumAdmin, Participant, TenantDb};
use crate::response::success_one_ok;
use crate::service::users::{self, ReportRequest};
use axum::{extract::Path, response::IntoResponse, Json};
use uuid::Uuid;

/// The path segment is a user id or a username.
pub async fn read(Path(key): Path<String>, mut db: TenantDb) -> Result<impl IntoResponse, AppError> {
    let user = users::find_user(db.conn(), key.trim()).await?;
    Ok(success_one_ok(user))
}

pub async fn ban(admin: ForumAdmin, Path(id): Path<Uuid>, mut db: TenantDb) -> Result<impl IntoResponse, AppError> {
    let user = users::set_banned(db.conn(), admin.id, id, true).await?;
    Ok(success_one_ok(user))
}

pub async fn unban(admin: ForumAdmin, Path(id): Path<Uuid>, mut db: TenantDb) -> Result<impl IntoResponse, AppError> {
    let user = users::set_banned(db.conn(), admin.id, id, false).await?;
    Ok(success_one_ok(user))
}

pub async fn report(
    caller: Participant,
    Path(id): Path<Uuid>,
    mut db: TenantDb,
    Json(body): Json<ReportRequest>,
) -> Result<impl IntoResponse, AppError> {
    users::ensure_participant(db.conn(), caller.id, caller.user.name()).await?;
    let status = users::toggle_report(db.conn(), caller.id, id, &body).await?;
    Ok(success_one_ok(status))
}
