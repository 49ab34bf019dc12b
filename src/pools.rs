//! Connection pools for tenant databases, one per tenant name.
//!
//! Each slot remembers the connection string it was built for. When the resolver returns a
//! different one for the same tenant (rotated credentials, moved database) the old pool is
//! closed and replaced. The map lock is only held to look up or swap a slot; connecting and
//! bootstrapping happen on the slot's own `OnceCell`, so a slow tenant only delays itself.

use crate::error::AppError;
use crate::resolver::ConnectionString;
use crate::settings::PoolSettings;
use crate::store::ensure_forum_tables;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{OnceCell, RwLock};

struct PoolSlot {
    connection: ConnectionString,
    pool: Arc<OnceCell<PgPool>>,
}

#[derive(Clone)]
pub struct TenantPools {
    slots: Arc<RwLock<HashMap<String, PoolSlot>>>,
    settings: PoolSettings,
}

impl TenantPools {
    pub fn new(settings: PoolSettings) -> Self {
        TenantPools {
            slots: Arc::new(RwLock::new(HashMap::new())),
            settings,
        }
    }

    /// Pool for `tenant` at `conn`, built on first use. Building a pool also creates the forum
    /// tables. A failed build leaves the slot empty and the next request retries.
    pub async fn pool_for(&self, tenant: &str, conn: &ConnectionString) -> Result<PgPool, AppError> {
        let cell = self.slot(tenant, conn).await;
        let pool = cell
            .get_or_try_init(|| async {
                let pool = PgPoolOptions::new()
                    .max_connections(self.settings.max_connections)
                    .acquire_timeout(self.settings.acquire_timeout)
                    .connect_lazy_with(conn.connect_options());
                let mut bootstrap = pool.acquire().await?;
                ensure_forum_tables(&mut bootstrap).await?;
                drop(bootstrap);
                tracing::info!(tenant, host = %conn.host(), db = %conn.database(), "opened tenant pool");
                Ok::<_, AppError>(pool)
            })
            .await?;
        Ok(pool.clone())
    }

    /// Cell for `tenant`, replacing the slot when its connection string is stale.
    async fn slot(&self, tenant: &str, conn: &ConnectionString) -> Arc<OnceCell<PgPool>> {
        if let Some(slot) = self.slots.read().await.get(tenant) {
            if slot.connection == *conn {
                return slot.pool.clone();
            }
        }

        let mut guard = self.slots.write().await;
        if let Some(slot) = guard.get(tenant) {
            if slot.connection == *conn {
                return slot.pool.clone();
            }
        }
        let cell = Arc::new(OnceCell::new());
        let replaced = guard.insert(
            tenant.to_string(),
            PoolSlot {
                connection: conn.clone(),
                pool: cell.clone(),
            },
        );
        drop(guard);

        if let Some(stale) = replaced.and_then(|slot| slot.pool.get().cloned()) {
            tracing::info!(tenant, "tenant connection changed, closing previous pool");
            tokio::spawn(async move { stale.close().await });
        }
        cell
    }

    pub async fn len(&self) -> usize {
        self.slots.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Close every pool, waiting for checked-out connections to come back.
    pub async fn close_all(&self) {
        let pools: Vec<PgPool> = self
            .slots
            .write()
            .await
            .drain()
            .filter_map(|(_, slot)| slot.pool.get().cloned())
            .collect();
        for pool in pools {
            pool.close().await;
        }
    }
}
