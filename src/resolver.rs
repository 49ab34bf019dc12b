//! Connection string resolution: tenant name -> registry record -> database coordinates.

use crate::error::TenantError;
use crate::tenant::{Tenant, TenantDirectory};
use sqlx::postgres::PgConnectOptions;
use std::fmt;
use std::sync::Arc;

/// Database coordinates of one tenant.
///
/// `Display` renders the literal `Host=..;Username=..;Password=..;Database=..` form with no
/// escaping. Connections are opened from the individual fields through
/// [`ConnectionString::connect_options`], so credentials containing `;` or `=` still connect.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ConnectionString {
    host: String,
    username: String,
    password: String,
    database: String,
}

impl ConnectionString {
    pub fn from_tenant(tenant: &Tenant) -> Self {
        ConnectionString {
            host: tenant.db_server.clone(),
            username: tenant.db_user.clone(),
            password: tenant.db_password.clone(),
            database: tenant.db_name.clone(),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    /// Driver options for this tenant. A `server:port` host is split into host and port.
    pub fn connect_options(&self) -> PgConnectOptions {
        let opts = PgConnectOptions::new()
            .username(&self.username)
            .password(&self.password)
            .database(&self.database);
        match split_host_port(&self.host) {
            (host, Some(port)) => opts.host(host).port(port),
            (host, None) => opts.host(host),
        }
    }
}

fn split_host_port(server: &str) -> (&str, Option<u16>) {
    if let Some((host, port)) = server.rsplit_once(':') {
        if !host.is_empty() && !host.contains(':') {
            if let Ok(port) = port.parse() {
                return (host, Some(port));
            }
        }
    }
    (server, None)
}

impl fmt::Display for ConnectionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Host={};Username={};Password={};Database={}",
            self.host, self.username, self.password, self.database
        )
    }
}

impl fmt::Debug for ConnectionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Host={};Username={};Password=***;Database={}",
            self.host, self.username, self.database
        )
    }
}

/// Looks up a tenant on every call; nothing is cached here.
#[derive(Clone)]
pub struct ConnectionStringResolver {
    directory: Arc<dyn TenantDirectory>,
}

impl ConnectionStringResolver {
    pub fn new(directory: Arc<dyn TenantDirectory>) -> Self {
        ConnectionStringResolver { directory }
    }

    pub async fn resolve(&self, tenant_name: &str) -> Result<ConnectionString, TenantError> {
        let tenant = self
            .directory
            .find_by_name(tenant_name)
            .await?
            .ok_or_else(|| TenantError::NotFound(tenant_name.to_string()))?;
        tracing::debug!(tenant = %tenant.name, db = %tenant.db_name, "resolved tenant database");
        Ok(ConnectionString::from_tenant(&tenant))
    }
}
