//! Catalog operations exposed to the admin API and the chat handler.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::entities::{
    normalize_model_name, AnyStore, ModelConfigPatch, ModelConfigRecord, ModelConfigStore,
    ModelPatch, ModelRecord, ModelStatus, ModelStore, NewModel,
};
use crate::error::{CatalogError, Result, Unavailability};
use crate::gateway::RemoteGateway;
use crate::services::download::DownloadOrchestrator;
use crate::services::state_machine::ModelStateMachine;

#[derive(Clone)]
pub struct ModelService {
    store: AnyStore,
    gateway: Arc<dyn RemoteGateway>,
    lifecycle: ModelStateMachine,
    downloads: DownloadOrchestrator,
}

impl ModelService {
    pub fn new(
        store: AnyStore,
        gateway: Arc<dyn RemoteGateway>,
        lifecycle: ModelStateMachine,
        downloads: DownloadOrchestrator,
    ) -> Self {
        Self {
            store,
            gateway,
            lifecycle,
            downloads,
        }
    }

    // ── Chat-facing ─────────────────────────────────────────────────────────

    /// Check that `name` can serve a chat request right now.
    pub async fn validate(&self, name: &str) -> Result<ModelRecord> {
        let name = normalize_model_name(name);
        let model = self
            .store
            .get_model_by_name(&name)
            .await?
            .ok_or_else(|| CatalogError::NotFound(format!("model {name} not found")))?;
        if !model.is_enabled {
            return Err(CatalogError::Unavailable {
                name,
                reason: Unavailability::Disabled,
            });
        }
        if model.status != ModelStatus::Available {
            return Err(CatalogError::Unavailable {
                name,
                reason: Unavailability::NotReady(model.status),
            });
        }
        Ok(model)
    }

    pub async fn get_default(&self) -> Result<ModelRecord> {
        self.store
            .get_default_model()
            .await?
            .ok_or_else(|| CatalogError::NotFound("no default model configured".into()))
    }

    pub async fn mark_used(&self, name: &str) -> Result<()> {
        self.store.mark_model_used(&normalize_model_name(name)).await
    }

    // ── Admin CRUD ──────────────────────────────────────────────────────────

    pub async fn create(&self, mut model: NewModel) -> Result<ModelRecord> {
        model.name = normalize_model_name(&model.name);
        let created = self.store.create_model(model).await?;
        info!(model_id = %created.id, name = %created.name, "model created");
        Ok(created)
    }

    pub async fn get(&self, id: &str) -> Result<ModelRecord> {
        self.store
            .get_model(id)
            .await?
            .ok_or_else(|| CatalogError::model_not_found(id))
    }

    pub async fn list(&self) -> Result<Vec<ModelRecord>> {
        self.store.list_models().await
    }

    pub async fn list_available(&self) -> Result<Vec<ModelRecord>> {
        self.store.list_available_models().await
    }

    pub async fn update(&self, id: &str, patch: &ModelPatch) -> Result<ModelRecord> {
        self.store.update_model_fields(id, patch).await
    }

    pub async fn set_default(&self, id: &str) -> Result<ModelRecord> {
        self.lifecycle.set_default(id).await
    }

    pub async fn soft_delete(&self, id: &str) -> Result<ModelRecord> {
        let model = self.lifecycle.soft_delete(id).await?;
        info!(model_id = %id, name = %model.name, "model soft-deleted");
        Ok(model)
    }

    /// Bring a `removed` model back: `available` when the inference server
    /// still has it, `error` otherwise.
    pub async fn restore(&self, id: &str) -> Result<ModelRecord> {
        let model = self.get(id).await?;
        if model.status != ModelStatus::Removed {
            return Err(CatalogError::Validation(format!(
                "model {} is {} and cannot be restored",
                model.name, model.status
            )));
        }

        let present = self
            .gateway
            .list_installed()
            .await?
            .iter()
            .any(|remote| normalize_model_name(&remote.name) == model.name);
        let next = if present {
            ModelStatus::Available
        } else {
            ModelStatus::Error
        };
        let restored = self.lifecycle.transition_from(model, next).await?;
        info!(
            model_id = %id,
            name = %restored.name,
            status = %restored.status,
            "model restore finished"
        );
        Ok(restored)
    }

    /// Stop any running pull, delete the catalog row and its config, then ask
    /// the inference server to drop the artifact. The remote delete is best
    /// effort.
    pub async fn hard_delete(&self, id: &str) -> Result<()> {
        let model = self.get(id).await?;
        if self.downloads.abort(id).await {
            info!(model_id = %id, name = %model.name, "running download aborted for delete");
        }
        self.store.hard_delete_model(id).await?;
        info!(model_id = %id, name = %model.name, "model deleted");

        if let Err(e) = self.gateway.delete(&model.name).await {
            warn!(
                model_id = %id,
                name = %model.name,
                error = %e,
                "failed to delete model from inference server"
            );
        }
        Ok(())
    }

    // ── Config ──────────────────────────────────────────────────────────────

    /// The stored config, or the built-in defaults when none was written.
    pub async fn get_config(&self, id: &str) -> Result<ModelConfigRecord> {
        let model = self.get(id).await?;
        Ok(self
            .store
            .get_config(&model.id)
            .await?
            .unwrap_or_else(|| ModelConfigRecord::defaults_for(&model.id, Utc::now())))
    }

    pub async fn update_config(
        &self,
        id: &str,
        patch: &ModelConfigPatch,
    ) -> Result<ModelConfigRecord> {
        self.store.update_config(id, patch).await
    }

    pub async fn reset_config(&self, id: &str) -> Result<ModelConfigRecord> {
        self.store.reset_config(id).await
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::time::Duration;

    use crate::gateway::fake::{FakeGateway, PullScript};
    use crate::services::sync::Synchronizer;

    async fn setup(gw: FakeGateway) -> (ModelService, AnyStore, Arc<FakeGateway>) {
        let store = AnyStore::in_memory().await;
        let gw = Arc::new(gw);
        let lifecycle = ModelStateMachine::new(store.clone());
        let sync = Synchronizer::new(store.clone(), gw.clone(), lifecycle.clone());
        let downloads = DownloadOrchestrator::new(
            store.clone(),
            gw.clone(),
            lifecycle.clone(),
            sync,
            Duration::from_secs(5),
        );
        let svc = ModelService::new(store.clone(), gw.clone(), lifecycle, downloads);
        (svc, store, gw)
    }

    async fn seed(svc: &ModelService, name: &str, status: ModelStatus) -> ModelRecord {
        svc.create(NewModel::named(name, status)).await.unwrap()
    }

    #[tokio::test]
    async fn restore_reactivates_model_still_on_server() {
        let (svc, _, _) = setup(FakeGateway::with_installed(&["a:latest"])).await;
        let a = seed(&svc, "a", ModelStatus::Removed).await;

        let restored = svc.restore(&a.id).await.unwrap();
        assert_eq!(restored.status, ModelStatus::Available);
    }

    #[tokio::test]
    async fn restore_marks_error_when_server_lost_model() {
        let (svc, _, _) = setup(FakeGateway::default()).await;
        let a = seed(&svc, "a", ModelStatus::Removed).await;

        let restored = svc.restore(&a.id).await.unwrap();
        assert_eq!(restored.status, ModelStatus::Error);
    }

    #[tokio::test]
    async fn restore_requires_removed_and_reachable_server() {
        let (svc, _, gw) = setup(FakeGateway::default()).await;
        let live = seed(&svc, "live", ModelStatus::Available).await;
        assert!(matches!(
            svc.restore(&live.id).await,
            Err(CatalogError::Validation(_))
        ));

        let gone = seed(&svc, "gone", ModelStatus::Removed).await;
        gw.set_listing_fails(true);
        assert!(matches!(
            svc.restore(&gone.id).await,
            Err(CatalogError::RemoteUnavailable(_))
        ));
        assert_eq!(svc.get(&gone.id).await.unwrap().status, ModelStatus::Removed);
    }

    #[tokio::test]
    async fn validate_reports_each_failure_kind() {
        let (svc, _, _) = setup(FakeGateway::default()).await;
        let ok = seed(&svc, "ok", ModelStatus::Available).await;
        let off = seed(&svc, "off", ModelStatus::Available).await;
        svc.update(
            &off.id,
            &ModelPatch {
                is_enabled: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        seed(&svc, "pending", ModelStatus::Downloading).await;

        assert_eq!(svc.validate("ok").await.unwrap().id, ok.id);
        assert!(matches!(
            svc.validate("missing").await,
            Err(CatalogError::NotFound(_))
        ));
        assert!(matches!(
            svc.validate("off:latest").await,
            Err(CatalogError::Unavailable {
                reason: Unavailability::Disabled,
                ..
            })
        ));
        let err = svc.validate("pending").await.unwrap_err();
        assert!(matches!(
            err,
            CatalogError::Unavailable {
                reason: Unavailability::NotReady(ModelStatus::Downloading),
                ..
            }
        ));
        assert_eq!(err.to_string(), "model pending:latest is unavailable");
    }

    #[tokio::test]
    async fn default_model_follows_set_default_and_removal() {
        let (svc, _, _) = setup(FakeGateway::default()).await;
        assert!(matches!(svc.get_default().await, Err(CatalogError::NotFound(_))));

        let a = seed(&svc, "a", ModelStatus::Available).await;
        let b = seed(&svc, "b", ModelStatus::Available).await;
        svc.set_default(&a.id).await.unwrap();
        svc.set_default(&b.id).await.unwrap();
        assert_eq!(svc.get_default().await.unwrap().id, b.id);
        assert!(!svc.get(&a.id).await.unwrap().is_default);

        svc.soft_delete(&b.id).await.unwrap();
        assert!(matches!(svc.get_default().await, Err(CatalogError::NotFound(_))));
    }

    #[tokio::test]
    async fn hard_delete_drops_row_config_and_remote_artifact() {
        let (svc, store, gw) = setup(FakeGateway::with_installed(&["a:latest"])).await;
        let a = seed(&svc, "a", ModelStatus::Available).await;

        svc.hard_delete(&a.id).await.unwrap();
        assert!(store.get_model(&a.id).await.unwrap().is_none());
        assert!(store.get_config(&a.id).await.unwrap().is_none());
        assert_eq!(*gw.deleted.lock().unwrap(), vec!["a:latest".to_owned()]);
        assert!(gw.installed.lock().unwrap().is_empty());

        assert!(matches!(
            svc.hard_delete(&a.id).await,
            Err(CatalogError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn hard_delete_succeeds_when_remote_delete_fails() {
        let (svc, store, gw) = setup(FakeGateway::with_installed(&["a:latest"])).await;
        gw.set_delete_fails(true);
        let a = seed(&svc, "a", ModelStatus::Available).await;

        svc.hard_delete(&a.id).await.unwrap();
        assert!(store.get_model(&a.id).await.unwrap().is_none());
        assert!(store.get_config(&a.id).await.unwrap().is_none());
        // The attempt was made; the artifact is still on the server.
        assert_eq!(*gw.deleted.lock().unwrap(), vec!["a:latest".to_owned()]);
        assert_eq!(gw.installed.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn hard_delete_stops_running_download() {
        let gw = FakeGateway::default();
        gw.script_pull("x:latest", PullScript::Hang);
        let (svc, store, _) = setup(gw).await;

        let ticket = svc.downloads.download("x", None, None).await.unwrap();
        assert_eq!(svc.downloads.active_downloads(), 1);

        svc.hard_delete(&ticket.id).await.unwrap();
        assert_eq!(svc.downloads.active_downloads(), 0);
        assert!(store.get_model(&ticket.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn config_round_trip_through_service() {
        let (svc, _, _) = setup(FakeGateway::default()).await;
        let a = seed(&svc, "a", ModelStatus::Available).await;

        let updated = svc
            .update_config(
                &a.id,
                &ModelConfigPatch {
                    max_tokens: Some(512),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.max_tokens, 512);

        let reset = svc.reset_config(&a.id).await.unwrap();
        assert_eq!(reset.max_tokens, crate::entities::dao::model_config::DEFAULT_MAX_TOKENS);
        assert!(matches!(
            svc.get_config("missing").await,
            Err(CatalogError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn mark_used_accepts_untagged_names() {
        let (svc, _, _) = setup(FakeGateway::default()).await;
        let a = seed(&svc, "a", ModelStatus::Available).await;
        svc.mark_used("a").await.unwrap();
        assert!(svc.get(&a.id).await.unwrap().last_used_at.is_some());
    }
}
