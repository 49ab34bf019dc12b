//! Tenant-scoped forum routes. Every route here runs behind tenant resolution.

use crate::handlers::{analytics, comments, media, posts, tags, tenant, users};
use crate::middleware::resolve_tenant;
use crate::response::{expose_error_detail, panic_response};
use crate::settings::Environment;
use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};
use tower_http::{catch_panic::CatchPanicLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};

pub fn forum_routes(state: AppState) -> Router {
    Router::new()
        .route("/tenant", get(tenant::current))
        .route("/tags", get(tags::list))
        .route("/posts", get(posts::list).post(posts::create))
        .route(
            "/posts/:id",
            get(posts::read).put(posts::update).delete(posts::delete),
        )
        .route("/posts/bookmarks", get(posts::bookmarked))
        .route("/posts/:id/votes", put(posts::vote))
        .route("/posts/:id/bookmarks", put(posts::toggle_bookmark))
        .route("/posts/:id/comments", get(comments::list).post(comments::create))
        .route("/posts/:id/media", get(media::list_for_post).post(media::upload))
        .route("/comments/:id", put(comments::update).delete(comments::delete))
        .route("/comments/:id/votes", put(comments::vote))
        .route("/media/:id", get(media::read).delete(media::delete))
        .route("/users/:id", get(users::read))
        .route("/users/:id/reports", post(users::report))
        .route("/admin/users/:id/ban", post(users::ban))
        .route("/admin/users/:id/unban", post(users::unban))
        .route("/admin/posts/:id/visibility", put(posts::set_visibility))
        .route("/admin/comments/:id/visibility", put(comments::set_visibility))
        .route("/admin/analytics/summary", get(analytics::summary))
        .route("/admin/analytics/timeseries", get(analytics::time_series))
        .route("/admin/analytics/tags", get(analytics::tags))
        .layer(axum::middleware::from_fn(resolve_tenant))
        .with_state(state)
}

/// Request tracing, panic-to-500 and the body size cap, applied to the merged router.
/// In development, server error bodies also carry the real error message.
pub fn with_http_layers(router: Router, max_body_bytes: usize, environment: Environment) -> Router {
    let router = match environment {
        Environment::Development => router.layer(axum::middleware::map_response(expose_error_detail)),
        Environment::Production => router,
    };
    router
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
}
