//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use hearth_core::ModelServices;

use crate::config::Config;

#[derive(Clone)]
pub struct AppState {
    /// Server configuration (env-derived).
    pub config: Arc<Config>,
    /// Model lifecycle services over the catalog store.
    pub services: ModelServices,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("active_downloads", &self.services.downloads.active_downloads())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-process state and a canned gateway for router tests.

    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use futures::StreamExt;
    use hearth_core::gateway::{ModelDetails, PullProgress, PullStream, RemoteModel};
    use hearth_core::{AnyStore, GatewayError, RemoteGateway, ServiceOptions};

    use super::*;

    /// Gateway whose inventory is a fixed list of names. Pulls succeed
    /// immediately and the library is unreachable.
    #[derive(Default)]
    pub struct StubGateway {
        pub installed: Mutex<Vec<String>>,
    }

    impl StubGateway {
        pub fn with_installed(names: &[&str]) -> Self {
            Self {
                installed: Mutex::new(names.iter().map(|n| (*n).to_owned()).collect()),
            }
        }
    }

    #[async_trait]
    impl RemoteGateway for StubGateway {
        async fn list_installed(&self) -> Result<Vec<RemoteModel>, GatewayError> {
            Ok(self
                .installed
                .lock()
                .unwrap()
                .iter()
                .map(|name| RemoteModel {
                    name: name.clone(),
                    size: 1_000,
                    ..Default::default()
                })
                .collect())
        }

        async fn pull(&self, name: &str) -> Result<PullStream, GatewayError> {
            self.installed.lock().unwrap().push(name.to_owned());
            let done = PullProgress {
                status: "success".into(),
                ..Default::default()
            };
            Ok(futures::stream::iter(vec![Ok(done)]).boxed())
        }

        async fn delete(&self, name: &str) -> Result<(), GatewayError> {
            self.installed.lock().unwrap().retain(|n| n != name);
            Ok(())
        }

        async fn inspect(&self, _name: &str) -> Result<ModelDetails, GatewayError> {
            Ok(ModelDetails::default())
        }

        async fn list_catalog(&self) -> Result<Vec<String>, GatewayError> {
            Err(GatewayError::Remote("library unreachable".into()))
        }
    }

    pub async fn state_with(gateway: Arc<dyn RemoteGateway>, config: Config) -> Arc<AppState> {
        let store = AnyStore::connect("sqlite::memory:")
            .await
            .expect("in-memory store should open");
        Arc::new(AppState {
            config: Arc::new(config),
            services: ModelServices::new(store, gateway, ServiceOptions::default()),
        })
    }

    pub async fn test_state() -> Arc<AppState> {
        state_with(Arc::new(StubGateway::default()), Config::default()).await
    }
}
