//! Background model pulls with progress tracking.
//!
//! [`DownloadOrchestrator::download`] records the request and returns at
//! once; the pull itself runs in a spawned task bounded by a deadline. The
//! only way to observe its outcome is the model's status (and the progress
//! map while it is still running).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::entities::{
    normalize_model_name, AnyStore, ModelPatch, ModelRecord, ModelStatus, ModelStore, NewModel,
};
use crate::error::{CatalogError, Result};
use crate::gateway::{GatewayError, PullProgress, RemoteGateway};
use crate::services::state_machine::ModelStateMachine;
use crate::services::sync::Synchronizer;
use crate::services::tasks::TaskManager;

/// Acknowledgement returned by [`DownloadOrchestrator::download`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DownloadTicket {
    pub id: String,
    pub name: String,
    pub status: ModelStatus,
}

/// Last event seen for a running pull.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DownloadProgress {
    pub status: String,
    pub digest: Option<String>,
    pub completed: Option<u64>,
    pub total: Option<u64>,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DownloadStatus {
    pub model: ModelRecord,
    /// Only set while the model is `downloading`; 0 until the first event
    /// with a byte total arrives.
    pub percentage: Option<f64>,
    pub progress: Option<DownloadProgress>,
}

#[derive(Clone)]
pub struct DownloadOrchestrator {
    store: AnyStore,
    gateway: Arc<dyn RemoteGateway>,
    lifecycle: ModelStateMachine,
    sync: Synchronizer,
    progress: Arc<RwLock<HashMap<String, DownloadProgress>>>,
    tasks: Arc<TaskManager>,
    timeout: Duration,
}

impl DownloadOrchestrator {
    pub fn new(
        store: AnyStore,
        gateway: Arc<dyn RemoteGateway>,
        lifecycle: ModelStateMachine,
        sync: Synchronizer,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            gateway,
            lifecycle,
            sync,
            progress: Arc::new(RwLock::new(HashMap::new())),
            tasks: Arc::new(TaskManager::new()),
            timeout,
        }
    }

    /// Register a download of `name` and start pulling it in the background.
    pub async fn download(
        &self,
        name: &str,
        display_name: Option<String>,
        description: Option<String>,
    ) -> Result<DownloadTicket> {
        let name = normalize_model_name(name);
        if name.is_empty() {
            return Err(CatalogError::Validation("model name must not be empty".into()));
        }

        let model = match self.store.get_model_by_name(&name).await? {
            Some(existing) => self.reuse(existing, display_name, description).await?,
            None => {
                let mut new = NewModel::named(&name, ModelStatus::Downloading);
                new.display_name = display_name;
                new.description = description.unwrap_or_default();
                let created = self.store.create_model(new).await?;
                // A concurrent request may have found the fresh row first.
                if !self.tasks.try_reserve(&created.id) {
                    return Err(already_downloading(&created.name));
                }
                created
            }
        };

        self.spawn_pull(model.id.clone(), model.name.clone());
        info!(model_id = %model.id, name = %model.name, "download started");

        Ok(DownloadTicket {
            id: model.id,
            name: model.name,
            status: ModelStatus::Downloading,
        })
    }

    /// Claim the slot of an existing row and move it back to `downloading`.
    async fn reuse(
        &self,
        existing: ModelRecord,
        display_name: Option<String>,
        description: Option<String>,
    ) -> Result<ModelRecord> {
        if existing.status == ModelStatus::Available {
            return Err(CatalogError::Validation(format!(
                "model {} is already installed",
                existing.name
            )));
        }
        if !self.tasks.try_reserve(&existing.id) {
            return Err(already_downloading(&existing.name));
        }

        let prepared = self.prepare(&existing.id, display_name, description).await;
        if prepared.is_err() {
            self.tasks.remove(&existing.id);
        }
        prepared
    }

    async fn prepare(
        &self,
        id: &str,
        display_name: Option<String>,
        description: Option<String>,
    ) -> Result<ModelRecord> {
        let patch = ModelPatch {
            display_name: display_name.filter(|v| !v.trim().is_empty()),
            description,
            ..Default::default()
        };
        if !patch.is_empty() {
            self.store.update_model_fields(id, &patch).await?;
        }
        self.lifecycle.transition(id, ModelStatus::Downloading).await
    }

    fn spawn_pull(&self, id: String, name: String) {
        let this = self.clone();
        let tid = id.clone();
        let join = tokio::spawn(async move {
            let outcome = match tokio::time::timeout(this.timeout, this.pull(&tid, &name)).await
            {
                Ok(result) => result,
                Err(_) => Err(GatewayError::Timeout(this.timeout).into()),
            };
            this.clear_progress(&tid).await;
            match outcome {
                Ok(()) => this.complete(&tid, &name).await,
                Err(e) => this.fail(&tid, &name, &e).await,
            }
            this.tasks.remove(&tid);
        });
        self.tasks.insert(id, join.abort_handle());
    }

    /// Drain the pull stream. An error event or a broken stream is a failure.
    async fn pull(&self, id: &str, name: &str) -> Result<()> {
        let mut events = self.gateway.pull(name).await?;
        while let Some(event) = events.next().await {
            let event = event?;
            if let Some(reason) = event.error.as_deref() {
                return Err(GatewayError::Remote(reason.to_owned()).into());
            }
            self.record_progress(id, &event).await;
        }
        Ok(())
    }

    async fn record_progress(&self, id: &str, event: &PullProgress) {
        let mut map = self.progress.write().await;
        let entry = map.entry(id.to_owned()).or_default();
        entry.status = event.status.clone();
        if event.digest.is_some() {
            entry.digest = event.digest.clone();
        }
        if let Some(pct) = event.percentage() {
            entry.completed = event.completed;
            entry.total = event.total;
            entry.percentage = pct;
        }
    }

    async fn clear_progress(&self, id: &str) {
        self.progress.write().await.remove(id);
    }

    async fn complete(&self, id: &str, name: &str) {
        if let Err(e) = self.lifecycle.transition(id, ModelStatus::Available).await {
            warn!(model_id = %id, name, error = %e, "failed to mark downloaded model available");
            return;
        }
        info!(model_id = %id, name, "download finished");
        // Backfill size and metadata from the server's own inventory.
        if let Err(e) = self.sync.sync().await {
            warn!(model_id = %id, name, error = %e, "post-download sync failed");
        }
    }

    async fn fail(&self, id: &str, name: &str, cause: &CatalogError) {
        warn!(model_id = %id, name, error = %cause, "download failed");
        if let Err(e) = self.lifecycle.transition(id, ModelStatus::Error).await {
            warn!(model_id = %id, name, error = %e, "failed to mark model as errored");
        }
    }

    /// The model row plus, while downloading, the last recorded progress.
    pub async fn get_download_status(&self, id: &str) -> Result<DownloadStatus> {
        let model = self
            .store
            .get_model(id)
            .await?
            .ok_or_else(|| CatalogError::model_not_found(id))?;
        if model.status != ModelStatus::Downloading {
            return Ok(DownloadStatus {
                model,
                percentage: None,
                progress: None,
            });
        }
        let progress = self.progress.read().await.get(id).cloned();
        Ok(DownloadStatus {
            model,
            percentage: Some(progress.as_ref().map_or(0.0, |p| p.percentage)),
            progress,
        })
    }

    /// Abort a running download and mark the model `error`.
    pub async fn cancel(&self, id: &str) -> Result<ModelRecord> {
        let model = self
            .store
            .get_model(id)
            .await?
            .ok_or_else(|| CatalogError::model_not_found(id))?;
        if model.status != ModelStatus::Downloading {
            return Err(CatalogError::Validation(format!(
                "model {} is {} and has no download to cancel",
                model.name, model.status
            )));
        }
        let aborted = self.abort(id).await;
        debug!(model_id = %id, aborted, "download cancelled");
        // Fails if the pull finished and moved the row on in the meantime.
        self.lifecycle
            .transition_from(model, ModelStatus::Error)
            .await
    }

    /// Stop the pull for `id`, if any, without touching the row.
    pub(crate) async fn abort(&self, id: &str) -> bool {
        let aborted = self.tasks.cancel(id);
        self.clear_progress(id).await;
        aborted
    }

    /// Mark every `downloading` row without a live task as `error`. Run once
    /// at startup: a pull cannot survive a process restart.
    pub async fn recover_interrupted(&self) -> Result<usize> {
        let mut recovered = 0;
        for model in self.store.list_models().await? {
            if model.status != ModelStatus::Downloading || self.tasks.is_running(&model.id) {
                continue;
            }
            let id = model.id.clone();
            self.lifecycle
                .transition_from(model, ModelStatus::Error)
                .await?;
            recovered += 1;
            debug!(model_id = %id, "interrupted download marked as error");
        }
        if recovered > 0 {
            info!(count = recovered, "recovered interrupted downloads");
        }
        Ok(recovered)
    }

    /// Number of pulls currently running.
    pub fn active_downloads(&self) -> usize {
        self.tasks.len()
    }
}

fn already_downloading(name: &str) -> CatalogError {
    CatalogError::Validation(format!("model {name} is already downloading"))
}
