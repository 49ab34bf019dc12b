//! Per-request tenant values: the context set by the middleware, the resolved connection
//! string, and a tenant database connection.

use crate::error::AppError;
use crate::resolver::ConnectionString;
use crate::state::AppState;
use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};
use sqlx::pool::PoolConnection;
use sqlx::{PgConnection, Postgres};

/// Name of the tenant this request belongs to. One per request, set by
/// [`resolve_tenant`](crate::middleware::tenant::resolve_tenant).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TenantContext {
    name: String,
}

impl TenantContext {
    pub fn new(name: impl Into<String>) -> Self {
        TenantContext { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for TenantContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<TenantContext>()
            .cloned()
            .ok_or_else(|| AppError::Internal("tenant resolution middleware is not installed".into()))
    }
}

/// Tenant context plus its connection string, looked up in the registry for this request.
#[derive(Clone, Debug)]
pub struct ResolvedTenant {
    pub context: TenantContext,
    pub connection: ConnectionString,
}

#[async_trait]
impl FromRequestParts<AppState> for ResolvedTenant {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let context = TenantContext::from_request_parts(parts, state).await?;
        let connection = state.resolver.resolve(context.name()).await?;
        Ok(ResolvedTenant { context, connection })
    }
}

/// Tenant database connection for the lifetime of one request.
///
/// Only handlers that take this extractor trigger resolution. The connection goes back to
/// the tenant pool when the value is dropped, whichever way the handler exits.
pub struct TenantDb {
    tenant: TenantContext,
    conn: PoolConnection<Postgres>,
}

impl TenantDb {
    pub fn tenant(&self) -> &TenantContext {
        &self.tenant
    }

    pub fn conn(&mut self) -> &mut PgConnection {
        &mut self.conn
    }
}

#[async_trait]
impl FromRequestParts<AppState> for TenantDb {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let resolved = ResolvedTenant::from_request_parts(parts, state).await?;
        let pool = state
            .pools
            .pool_for(resolved.context.name(), &resolved.connection)
            .await?;
        let conn = pool.acquire().await?;
        Ok(TenantDb {
            tenant: resolved.context,
            conn,
        })
    }
}
