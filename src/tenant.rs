//! Tenant registry: one record per tenant database, looked up by tenant name.

use crate::error::TenantError;
use async_trait::async_trait;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use uuid::Uuid;

/// A tenant and the coordinates of its database. `name` is the subdomain key.
#[derive(Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Tenant {
    pub id: Uuid,
    pub name: String,
    pub db_server: String,
    pub db_name: String,
    pub db_user: String,
    pub db_password: String,
}

impl Tenant {
    pub fn new(
        name: impl Into<String>,
        db_server: impl Into<String>,
        db_user: impl Into<String>,
        db_password: impl Into<String>,
        db_name: impl Into<String>,
    ) -> Self {
        Tenant {
            id: Uuid::new_v4(),
            name: name.into(),
            db_server: db_server.into(),
            db_name: db_name.into(),
            db_user: db_user.into(),
            db_password: db_password.into(),
        }
    }
}

impl fmt::Debug for Tenant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tenant")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("db_server", &self.db_server)
            .field("db_name", &self.db_name)
            .field("db_user", &self.db_user)
            .field("db_password", &"***")
            .finish()
    }
}

/// Read side of the tenant registry.
#[async_trait]
pub trait TenantDirectory: Send + Sync {
    /// Exact, case-sensitive match on name. When several records share a name the first one wins.
    async fn find_by_name(&self, name: &str) -> Result<Option<Tenant>, TenantError>;
}

/// In-memory registry. Insertion order is lookup order. Cheap to clone; clones share records.
#[derive(Clone, Default)]
pub struct TenantRegistry {
    tenants: Arc<RwLock<Vec<Tenant>>>,
}

impl TenantRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tenants(tenants: impl IntoIterator<Item = Tenant>) -> Self {
        TenantRegistry {
            tenants: Arc::new(RwLock::new(tenants.into_iter().collect())),
        }
    }

    /// Appends a record. Names are not checked for uniqueness.
    pub fn insert(&self, tenant: Tenant) {
        self.tenants
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tenant);
    }

    /// Applies `f` to the first record named `name`. Returns false when there is none.
    pub fn update<F>(&self, name: &str, f: F) -> bool
    where
        F: FnOnce(&mut Tenant),
    {
        let mut guard = self.tenants.write().unwrap_or_else(PoisonError::into_inner);
        match guard.iter_mut().find(|t| t.name == name) {
            Some(tenant) => {
                f(tenant);
                true
            }
            None => false,
        }
    }

    /// Removes every record named `name`; returns how many were removed.
    pub fn remove(&self, name: &str) -> usize {
        let mut guard = self.tenants.write().unwrap_or_else(PoisonError::into_inner);
        let before = guard.len();
        guard.retain(|t| t.name != name);
        before - guard.len()
    }

    pub fn len(&self) -> usize {
        self.tenants.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl TenantDirectory for TenantRegistry {
    async fn find_by_name(&self, name: &str) -> Result<Option<Tenant>, TenantError> {
        let guard = self.tenants.read().unwrap_or_else(PoisonError::into_inner);
        Ok(guard.iter().find(|t| t.name == name).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn acme() -> Tenant {
        Tenant::new("acme", "db1", "u", "p", "acme_db")
    }

    #[tokio::test]
    async fn finds_by_exact_name() {
        let registry = TenantRegistry::with_tenants([acme()]);
        let found = registry.find_by_name("acme").await.unwrap().unwrap();
        assert_eq!(found.db_name, "acme_db");
        assert!(registry.find_by_name("ACME").await.unwrap().is_none());
        assert!(registry.find_by_name("acm").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn first_duplicate_wins() {
        let registry = TenantRegistry::new();
        registry.insert(acme());
        registry.insert(Tenant::new("acme", "db2", "u2", "p2", "other_db"));
        let found = registry.find_by_name("acme").await.unwrap().unwrap();
        assert_eq!(found.db_server, "db1");
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn update_and_remove() {
        let registry = TenantRegistry::with_tenants([acme()]);
        assert!(registry.update("acme", |t| t.db_server = "db9".into()));
        assert!(!registry.update("ghost", |t| t.db_server = "x".into()));
        let found = registry.find_by_name("acme").await.unwrap().unwrap();
        assert_eq!(found.db_server, "db9");
        assert_eq!(registry.remove("acme"), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn debug_hides_password() {
        let rendered = format!("{:?}", Tenant::new("acme", "db1", "u", "s3cret", "acme_db"));
        assert!(!rendered.contains("s3cret"));
    }
}
