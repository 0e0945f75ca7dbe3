//! # Application State
//!
//! Shared state handed to every handler: the artifact management service.
//! Cheaply cloneable; all clones share the same service, registry, and
//! checksum cache.

use std::sync::Arc;

use citadel_storage::{ArtifactService, ChecksumCache, ServerConfig, StorageRegistry};

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ArtifactService>,
}

impl AppState {
    pub fn new(service: Arc<ArtifactService>) -> Self {
        Self { service }
    }

    /// Assemble registry, cache, and service from configuration. The
    /// checksum cache sweeper is NOT started here — the server binary
    /// starts it once a runtime exists.
    pub fn from_config(config: &ServerConfig) -> Self {
        let registry = Arc::new(StorageRegistry::new(config.storages.clone()));
        let cache = Arc::new(ChecksumCache::from_config(&config.checksum_cache));
        Self::new(Arc::new(ArtifactService::new(registry, cache)))
    }
}
