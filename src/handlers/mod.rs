//! HTTP handlers for the tenant-scoped forum surface.

pub mod analytics;
pub mod comments;
pub mod media;
pub mod posts;
pub mod tags;
pub mod tenant;
pub mod users;
