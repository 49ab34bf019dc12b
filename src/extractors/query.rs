//! Listing and dashboard query parameters, validated before any tenant work.

use crate::error::AppError;
use crate::service::analytics::Period;
use crate::service::posts::PostListParams;
use crate::service::PageParams;
use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Query},
    http::request::Parts,
};
use std::collections::HashMap;

fn query_map(parts: &Parts) -> Result<HashMap<String, String>, AppError> {
    let Query(q) = Query::<HashMap<String, String>>::try_from_uri(&parts.uri)
        .map_err(|e| AppError::BadRequest(e.body_text()))?;
    Ok(q)
}

#[async_trait]
impl<S> FromRequestParts<S> for PostListParams
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        PostListParams::from_query(&query_map(parts)?)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for PageParams
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        PageParams::from_query(&query_map(parts)?)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Period
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Period::from_query(&query_map(parts)?)
    }
}
