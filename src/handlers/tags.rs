//! Tag catalogue of the tenant, for post filtering and tagging.

use crate::error::AppError;
use crate::extractors::TenantDb;
use crate::response::success_many;
use crate::service::tags::list_tags;
use axum::response::IntoResponse;

pub async fn list(mut db: TenantDb) -> Result<impl IntoResponse, AppError> {
    let tags = list_tags(db.conn()).await?;
    Ok(success_many(tags))
}
