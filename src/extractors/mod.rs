//! Request extractors for tenant and caller identity.

pub mod policy;
pub mod query;
pub mod tenant;
pub mod user;

pub use policy::{DashboardViewer, ForumAdmin, Participant};
pub use tenant::{ResolvedTenant, TenantContext, TenantDb};
pub use user::{CurrentUser, Role};
