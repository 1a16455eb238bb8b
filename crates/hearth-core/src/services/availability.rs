//! TTL cache of model names downloadable from the public library.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::entities::{normalize_model_name, AnyStore, ModelStore};
use crate::error::Result;
use crate::gateway::RemoteGateway;

/// Served when the library has never been reachable.
pub const FALLBACK_MODELS: &[&str] = &[
    "llama3.2",
    "llama3.1",
    "mistral",
    "gemma2",
    "qwen2.5",
    "phi3",
    "codellama",
    "nomic-embed-text",
];

pub const DEFAULT_CATALOG_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheInfo {
    pub size: usize,
    pub last_updated: Option<DateTime<Utc>>,
    pub ttl_secs: u64,
    pub expired: bool,
}

#[derive(Debug, Default)]
struct Snapshot {
    names: Vec<String>,
    updated_at: Option<DateTime<Utc>>,
    /// Set by `refresh` until the next successful fetch.
    force: bool,
}

impl Snapshot {
    fn is_fresh(&self, ttl: Duration) -> bool {
        if self.force {
            return false;
        }
        match self.updated_at {
            Some(at) if !self.names.is_empty() => {
                let age = Utc::now().signed_duration_since(at);
                age.to_std().map_or(true, |age| age < ttl)
            }
            _ => false,
        }
    }
}

#[derive(Clone)]
pub struct AvailabilityCache {
    store: AnyStore,
    gateway: Arc<dyn RemoteGateway>,
    ttl: Duration,
    snapshot: Arc<RwLock<Snapshot>>,
}

impl AvailabilityCache {
    pub fn new(store: AnyStore, gateway: Arc<dyn RemoteGateway>, ttl: Duration) -> Self {
        Self {
            store,
            gateway,
            ttl,
            snapshot: Arc::new(RwLock::new(Snapshot::default())),
        }
    }

    /// Library models not yet in the local catalog.
    ///
    /// Never fails because of the library: a stale list or the built-in
    /// fallback is served instead.
    pub async fn get_available(&self) -> Result<Vec<String>> {
        let names = self.library_names().await;
        let installed: HashSet<String> = self
            .store
            .list_models()
            .await?
            .into_iter()
            .map(|m| m.name)
            .collect();
        Ok(names
            .into_iter()
            .filter(|name| !installed.contains(&normalize_model_name(name)))
            .collect())
    }

    /// Fetch the list again regardless of its age. The previous list and its
    /// timestamp stay in place until a fetch succeeds.
    pub async fn refresh(&self) -> Result<Vec<String>> {
        self.snapshot.write().await.force = true;
        self.get_available().await
    }

    pub async fn cache_info(&self) -> CacheInfo {
        let snap = self.snapshot.read().await;
        CacheInfo {
            size: snap.names.len(),
            last_updated: snap.updated_at,
            ttl_secs: self.ttl.as_secs(),
            expired: !snap.is_fresh(self.ttl),
        }
    }

    async fn library_names(&self) -> Vec<String> {
        {
            let snap = self.snapshot.read().await;
            if snap.is_fresh(self.ttl) {
                return snap.names.clone();
            }
        }

        // Readers keep being served while the library is slow.
        let fetched = self.gateway.list_catalog().await;

        let mut snap = self.snapshot.write().await;
        // Another caller may have refreshed while we were fetching.
        if snap.is_fresh(self.ttl) {
            return snap.names.clone();
        }
        match fetched {
            Ok(names) if !names.is_empty() => {
                debug!(count = names.len(), "library listing refreshed");
                snap.names = names;
                snap.updated_at = Some(Utc::now());
                snap.force = false;
                snap.names.clone()
            }
            Ok(_) => {
                warn!("library listing was empty; serving previous list");
                fallback(&snap)
            }
            Err(e) => {
                warn!(error = %e, "failed to fetch library listing; serving previous list");
                fallback(&snap)
            }
        }
    }
}

fn fallback(snap: &Snapshot) -> Vec<String> {
    if snap.names.is_empty() {
        FALLBACK_MODELS.iter().map(|n| (*n).to_owned()).collect()
    } else {
        snap.names.clone()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::entities::{ModelStatus, NewModel};
    use crate::gateway::fake::FakeGateway;

    async fn setup(ttl: Duration) -> (AvailabilityCache, AnyStore, Arc<FakeGateway>) {
        let store = AnyStore::in_memory().await;
        let gw = Arc::new(FakeGateway::default());
        let cache = AvailabilityCache::new(store.clone(), gw.clone(), ttl);
        (cache, store, gw)
    }

    fn calls(gw: &FakeGateway) -> usize {
        *gw.catalog_calls.lock().unwrap()
    }

    #[tokio::test]
    async fn fresh_cache_is_served_without_refetching() {
        let (cache, _, gw) = setup(DEFAULT_CATALOG_TTL).await;
        gw.set_catalog(Some(&["llama3.2", "mistral"]));

        assert_eq!(cache.get_available().await.unwrap(), vec!["llama3.2", "mistral"]);
        gw.set_catalog(Some(&["changed"]));
        assert_eq!(cache.get_available().await.unwrap(), vec!["llama3.2", "mistral"]);
        assert_eq!(calls(&gw), 1);

        let info = cache.cache_info().await;
        assert_eq!(info.size, 2);
        assert!(!info.expired);
        assert_eq!(info.ttl_secs, 24 * 60 * 60);
    }

    #[tokio::test]
    async fn expired_cache_with_failing_fetch_serves_stale_list() {
        let (cache, _, gw) = setup(Duration::ZERO).await;
        gw.set_catalog(Some(&["llama3.2", "mistral"]));
        cache.get_available().await.unwrap();

        gw.set_catalog(None);
        assert_eq!(cache.get_available().await.unwrap(), vec!["llama3.2", "mistral"]);
        assert_eq!(calls(&gw), 2);
        assert!(cache.cache_info().await.expired);
    }

    #[tokio::test]
    async fn empty_cache_with_failing_fetch_serves_fallback() {
        let (cache, _, gw) = setup(DEFAULT_CATALOG_TTL).await;
        gw.set_catalog(None);

        let names = cache.get_available().await.unwrap();
        assert_eq!(names, FALLBACK_MODELS.to_vec());
        assert_eq!(cache.cache_info().await.size, 0);
    }

    #[tokio::test]
    async fn installed_models_are_filtered_out() {
        let (cache, store, gw) = setup(DEFAULT_CATALOG_TTL).await;
        gw.set_catalog(Some(&["llama3.2", "mistral", "phi3:mini"]));
        store
            .create_model(NewModel::named("llama3.2:latest", ModelStatus::Available))
            .await
            .unwrap();
        store
            .create_model(NewModel::named("phi3:mini", ModelStatus::Removed))
            .await
            .unwrap();

        assert_eq!(cache.get_available().await.unwrap(), vec!["mistral"]);
    }

    #[tokio::test]
    async fn refresh_refetches_and_degrades_like_get() {
        let (cache, _, gw) = setup(DEFAULT_CATALOG_TTL).await;
        gw.set_catalog(Some(&["mistral"]));
        cache.get_available().await.unwrap();

        gw.set_catalog(Some(&["mistral", "gemma2"]));
        assert_eq!(cache.refresh().await.unwrap(), vec!["mistral", "gemma2"]);

        gw.set_catalog(None);
        assert_eq!(cache.refresh().await.unwrap(), vec!["mistral", "gemma2"]);
        assert_eq!(calls(&gw), 3);
    }

    #[tokio::test]
    async fn failed_refresh_keeps_last_successful_timestamp() {
        let (cache, _, gw) = setup(DEFAULT_CATALOG_TTL).await;
        gw.set_catalog(Some(&["mistral"]));
        cache.get_available().await.unwrap();
        let before = cache.cache_info().await.last_updated;
        assert!(before.is_some());

        gw.set_catalog(None);
        cache.refresh().await.unwrap();
        let info = cache.cache_info().await;
        assert_eq!(info.size, 1);
        assert_eq!(info.last_updated, before);
        assert!(info.expired);

        // Still forced: the next read retries and recovers.
        gw.set_catalog(Some(&["mistral", "phi3"]));
        assert_eq!(cache.get_available().await.unwrap(), vec!["mistral", "phi3"]);
        assert!(!cache.cache_info().await.expired);
    }

    #[tokio::test]
    async fn slow_fetch_does_not_block_cache_info() {
        let (cache, _, gw) = setup(DEFAULT_CATALOG_TTL).await;
        gw.set_catalog_hangs(true);

        let pending = tokio::spawn({
            let cache = cache.clone();
            async move { cache.get_available().await }
        });
        while calls(&gw) == 0 {
            tokio::task::yield_now().await;
        }

        let info = tokio::time::timeout(Duration::from_secs(1), cache.cache_info())
            .await
            .expect("cache_info waited on the library fetch");
        assert_eq!(info.size, 0);
        pending.abort();
    }
}
