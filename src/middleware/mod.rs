//! Request middleware for tenant-scoped routes.

pub mod tenant;

pub use tenant::{resolve_tenant, tenant_name_from_host};
