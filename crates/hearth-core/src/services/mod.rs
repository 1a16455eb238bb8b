//! Model lifecycle services built on the catalog store and a
//! [`RemoteGateway`].

pub mod availability;
pub mod download;
pub mod models;
pub mod state_machine;
pub mod sync;
pub mod tasks;

use std::sync::Arc;
use std::time::Duration;

pub use availability::{AvailabilityCache, CacheInfo, DEFAULT_CATALOG_TTL, FALLBACK_MODELS};
pub use download::{DownloadOrchestrator, DownloadProgress, DownloadStatus, DownloadTicket};
pub use models::ModelService;
pub use state_machine::ModelStateMachine;
pub use sync::{SyncReport, Synchronizer};

use crate::entities::AnyStore;
use crate::gateway::RemoteGateway;

pub const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Tunables for [`ModelServices::new`].
#[derive(Debug, Clone)]
pub struct ServiceOptions {
    /// Upper bound on a single background pull.
    pub download_timeout: Duration,
    /// How long a library listing is served before it is refetched.
    pub catalog_ttl: Duration,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            download_timeout: DEFAULT_DOWNLOAD_TIMEOUT,
            catalog_ttl: DEFAULT_CATALOG_TTL,
        }
    }
}

/// Every lifecycle service, wired to one store and one gateway.
#[derive(Clone)]
pub struct ModelServices {
    pub models: ModelService,
    pub lifecycle: ModelStateMachine,
    pub sync: Synchronizer,
    pub downloads: DownloadOrchestrator,
    pub library: AvailabilityCache,
}

impl ModelServices {
    pub fn new(store: AnyStore, gateway: Arc<dyn RemoteGateway>, options: ServiceOptions) -> Self {
        let lifecycle = ModelStateMachine::new(store.clone());
        let sync = Synchronizer::new(store.clone(), gateway.clone(), lifecycle.clone());
        let downloads = DownloadOrchestrator::new(
            store.clone(),
            gateway.clone(),
            lifecycle.clone(),
            sync.clone(),
            options.download_timeout,
        );
        let library = AvailabilityCache::new(store.clone(), gateway.clone(), options.catalog_ttl);
        let models = ModelService::new(store, gateway, lifecycle.clone(), downloads.clone());
        Self {
            models,
            lifecycle,
            sync,
            downloads,
            library,
        }
    }
}
