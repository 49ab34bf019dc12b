//! Routers per area. The server merges them and wraps the result with [`with_http_layers`].

pub mod common;
pub mod forum;

pub use common::{common_routes, common_routes_with_ready};
pub use forum::{forum_routes, with_http_layers};
