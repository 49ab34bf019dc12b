//! Introspection of the tenant a request resolved to.

use crate::error::AppError;
use crate::extractors::ResolvedTenant;
use crate::response::success_one_ok;
use axum::response::IntoResponse;
use serde::Serialize;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TenantInfo {
    name: String,
    database_host: String,
    database: String,
}

/// GET /tenant: which tenant this host maps to and where its data lives. Credentials are not echoed.
pub async fn current(resolved: ResolvedTenant) -> Result<impl IntoResponse, AppError> {
    let ResolvedTenant { context, connection } = resolved;
    Ok(success_one_ok(TenantInfo {
        name: context.name().to_string(),
        database_host: connection.host().to_string(),
        database: connection.database().to_string(),
    }))
}
