//! Multi-tenant community forum backend.
//!
//! The first label of the request host names a tenant. The tenant registry in the host
//! database maps that name to the tenant's own database, and every forum query for the
//! request runs there.

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod media;
pub mod middleware;
pub mod policy;
pub mod pools;
pub mod resolver;
pub mod response;
pub mod routes;
pub mod service;
pub mod settings;
pub mod state;
pub mod store;
pub mod tenant;

pub use error::{AppError, ConfigError, TenantError};
pub use extractors::{CurrentUser, DashboardViewer, ForumAdmin, Participant, ResolvedTenant, Role, TenantContext, TenantDb};
pub use media::{MediaStore, ObjectStore};
pub use middleware::{resolve_tenant, tenant_name_from_host};
pub use policy::Policy;
pub use pools::TenantPools;
pub use resolver::{ConnectionString, ConnectionStringResolver};
pub use routes::{common_routes, common_routes_with_ready, forum_routes, with_http_layers};
pub use settings::Settings;
pub use state::AppState;
pub use store::{ensure_host_tables, PgTenantDirectory};
pub use tenant::{Tenant, TenantDirectory, TenantRegistry};
