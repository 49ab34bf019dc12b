//! Post attachments. Bytes go to object storage; the tenant database keeps the key and URL.
//!
//! Upload and delete talk to storage without holding a tenant connection, and take one only
//! for the checks before and the bookkeeping after.

use crate::error::AppError;
use crate::extractors::{CurrentUser, Participant, ResolvedTenant, TenantDb};
use crate::handlers::posts::require_visible_post;
use crate::media::{object_key, upload_then_record, ObjectStore};
use crate::policy::Policy;
use crate::response::{success_many, success_one, success_one_ok};
use crate::service::media;
use crate::service::posts::require_post;
use crate::service::users::ensure_participant;
use crate::state::AppState;
use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

const FILE_FIELD: &str = "file";

fn store(state: &AppState) -> Result<Arc<dyn ObjectStore>, AppError> {
    state
        .media
        .clone()
        .ok_or_else(|| AppError::Storage("media storage is not configured".into()))
}

async fn tenant_pool(state: &AppState, tenant: &ResolvedTenant) -> Result<PgPool, AppError> {
    state.pools.pool_for(tenant.context.name(), &tenant.connection).await
}

struct Upload {
    file_name: String,
    content_type: Option<String>,
    bytes: Vec<u8>,
}

async fn read_file_field(multipart: &mut Multipart) -> Result<Upload, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("invalid multipart body: {}", e)))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let file_name = field.file_name().unwrap_or("file").to_string();
        let content_type = field.content_type().map(String::from);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(format!("invalid multipart body: {}", e)))?;
        if bytes.is_empty() {
            return Err(AppError::Validation(format!("{} is empty", FILE_FIELD)));
        }
        return Ok(Upload {
            file_name,
            content_type,
            bytes: bytes.to_vec(),
        });
    }
    Err(AppError::BadRequest(format!("multipart field `{}` is required", FILE_FIELD)))
}

pub async fn upload(
    State(state): State<AppState>,
    caller: Participant,
    tenant: ResolvedTenant,
    Path(post_id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let store = store(&state)?;
    let pool = tenant_pool(&state, &tenant).await?;
    {
        let mut conn = pool.acquire().await?;
        ensure_participant(&mut conn, caller.id, caller.user.name()).await?;
        let post = require_visible_post(&mut conn, post_id, &caller.user).await?;
        Policy::MutatePost(&post).require(&caller.user)?;
    }

    let upload = read_file_field(&mut multipart).await?;
    let key = object_key(tenant.context.name(), post_id, Uuid::new_v4(), &upload.file_name)?;
    let recorded_type = upload.content_type.clone();
    let row = upload_then_record(
        store.as_ref(),
        &key,
        upload.content_type.as_deref(),
        upload.bytes,
        |stored| async move {
            let mut conn = pool.acquire().await?;
            require_post(&mut conn, post_id).await?;
            media::insert_media(&mut conn, post_id, &stored.key, &stored.url, recorded_type.as_deref()).await
        },
    )
    .await?;
    Ok(success_one(row))
}

pub async fn list_for_post(
    caller: CurrentUser,
    Path(post_id): Path<Uuid>,
    mut db: TenantDb,
) -> Result<impl IntoResponse, AppError> {
    require_visible_post(db.conn(), post_id, &caller).await?;
    let rows = media::media_for_post(db.conn(), post_id).await?;
    Ok(success_many(rows))
}

pub async fn read(Path(id): Path<Uuid>, mut db: TenantDb) -> Result<impl IntoResponse, AppError> {
    let row = media::require_media(db.conn(), id).await?;
    Ok(success_one_ok(row))
}

pub async fn delete(
    State(state): State<AppState>,
    caller: Participant,
    tenant: ResolvedTenant,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let store = store(&state)?;
    let pool = tenant_pool(&state, &tenant).await?;
    let row = {
        let mut conn = pool.acquire().await?;
        let row = media::require_media(&mut conn, id).await?;
        let post = require_post(&mut conn, row.post_id).await?;
        Policy::MutatePost(&post).require(&caller.user)?;
        row
    };
    store.delete(&row.object_key).await?;
    let mut conn = pool.acquire().await?;
    media::delete_media(&mut conn, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
