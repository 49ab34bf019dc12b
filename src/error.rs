//! Typed errors and HTTP mapping.

use crate::response::{problem_response, ErrorDetail, GENERIC_DETAIL};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required setting: {0}")]
    Missing(&'static str),
    #[error("invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

/// Failures while turning a request host into a tenant database. Knows nothing about HTTP.
#[derive(Error, Debug)]
pub enum TenantError {
    #[error("tenant not found: {0}")]
    NotFound(String),
    #[error("malformed host header")]
    MalformedHost,
    #[error("tenant registry: {0}")]
    Registry(#[from] sqlx::Error),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Tenant(#[from] TenantError),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("validation: {0}")]
    Validation(String),
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("authentication required")]
    Unauthorized,
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("media storage: {0}")]
    Storage(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl AppError {
    /// Status code and stable machine-readable code for this error.
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
            AppError::Tenant(TenantError::NotFound(_)) => (StatusCode::NOT_FOUND, "tenant_not_found"),
            AppError::Tenant(TenantError::MalformedHost) => (StatusCode::BAD_REQUEST, "malformed_host"),
            AppError::Tenant(TenantError::Registry(_)) => (StatusCode::INTERNAL_SERVER_ERROR, "registry_error"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "validation_error"),
            AppError::Db(e) => match e {
                sqlx::Error::RowNotFound => (StatusCode::NOT_FOUND, "not_found"),
                sqlx::Error::Database(db) if db.is_unique_violation() => (StatusCode::CONFLICT, "conflict"),
                sqlx::Error::PoolTimedOut => (StatusCode::SERVICE_UNAVAILABLE, "database_unavailable"),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "database_error"),
            },
            AppError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized"),
            AppError::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden"),
            AppError::Storage(_) => (StatusCode::BAD_GATEWAY, "storage_error"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if !status.is_server_error() {
            return problem_response(status, code, self.to_string());
        }
        // Server-side failures may carry connection details: logged, and only kept as a
        // response extension for the development error layer.
        tracing::error!(error = %self, code, "request failed");
        let mut response = problem_response(status, code, GENERIC_DETAIL.to_string());
        response.extensions_mut().insert(ErrorDetail {
            code,
            detail: self.to_string(),
        });
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tenant_errors_map_to_client_statuses() {
        let not_found = AppError::from(TenantError::NotFound("ghost".into()));
        assert_eq!(not_found.status_and_code(), (StatusCode::NOT_FOUND, "tenant_not_found"));

        let malformed = AppError::from(TenantError::MalformedHost);
        assert_eq!(malformed.status_and_code(), (StatusCode::BAD_REQUEST, "malformed_host"));
    }

    #[test]
    fn database_errors_are_server_errors() {
        let err = AppError::Db(sqlx::Error::PoolClosed);
        let (status, code) = err.status_and_code();
        assert!(status.is_server_error());
        assert_eq!(code, "database_error");
    }

    #[test]
    fn server_errors_keep_detail_out_of_the_body() {
        let response = AppError::Internal("pool for Host=db1 exhausted".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let detail = response.extensions().get::<ErrorDetail>().unwrap();
        assert_eq!(detail.code, "internal_error");
        assert!(detail.detail.contains("Host=db1"));

        let client = AppError::NotFound("post".into()).into_response();
        assert!(client.extensions().get::<ErrorDetail>().is_none());
    }

    #[test]
    fn row_not_found_is_not_found() {
        let err = AppError::Db(sqlx::Error::RowNotFound);
        assert_eq!(err.status_and_code().0, StatusCode::NOT_FOUND);
    }
}
