//! Admin dashboard endpoints. All require `ViewAdminDashboard`.

use crate::error::AppError;
use crate::extractors::{DashboardViewer, TenantDb};
use crate::response::success_one_ok;
use crate::service::analytics::{self, Period};
use axum::response::IntoResponse;
use chrono::Utc;

pub async fn summary(_: DashboardViewer, period: Period, mut db: TenantDb) -> Result<impl IntoResponse, AppError> {
    let body = analytics::summary(db.conn(), period, Utc::now()).await?;
    Ok(success_one_ok(body))
}

pub async fn time_series(_: DashboardViewer, period: Period, mut db: TenantDb) -> Result<impl IntoResponse, AppError> {
    let body = analytics::time_series(db.conn(), period, Utc::now()).await?;
    Ok(success_one_ok(body))
}

pub async fn tags(_: DashboardViewer, period: Period, mut db: TenantDb) -> Result<impl IntoResponse, AppError> {
    let body = analytics::tag_breakdown(db.conn(), period, Utc::now()).await?;
    Ok(success_one_ok(body))
}
