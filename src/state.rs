//! Shared application state for tenant-scoped routes. Holds no per-request data.

use crate::media::ObjectStore;
use crate::pools::TenantPools;
use crate::resolver::ConnectionStringResolver;
use crate::settings::PoolSettings;
use crate::tenant::TenantDirectory;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub resolver: ConnectionStringResolver,
    pub pools: TenantPools,
    /// None when no media bucket is configured.
    pub media: Option<Arc<dyn ObjectStore>>,
}

impl AppState {
    pub fn new(directory: Arc<dyn TenantDirectory>, pool_settings: PoolSettings) -> Self {
        AppState {
            resolver: ConnectionStringResolver::new(directory),
            pools: TenantPools::new(pool_settings),
            media: None,
        }
    }

    pub fn with_media(mut self, media: Arc<dyn ObjectStore>) -> Self {
        self.media = Some(media);
        self
    }
}
