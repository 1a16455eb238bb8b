//! Status transitions and the single-default invariant.
//!
//! Every status change made by the services goes through
//! [`ModelStateMachine::transition`], which checks the edge against
//! [`ModelStatus::can_transition_to`] before touching the store.

use tracing::{debug, info};

use crate::entities::{AnyStore, ModelRecord, ModelStatus, ModelStore};
use crate::error::{CatalogError, Result};

#[derive(Clone, Debug)]
pub struct ModelStateMachine {
    store: AnyStore,
}

impl ModelStateMachine {
    pub fn new(store: AnyStore) -> Self {
        Self { store }
    }

    async fn load(&self, id: &str) -> Result<ModelRecord> {
        self.store
            .get_model(id)
            .await?
            .ok_or_else(|| CatalogError::model_not_found(id))
    }

    /// Move model `id` to `next`. Moving to the current status is a no-op.
    pub async fn transition(&self, id: &str, next: ModelStatus) -> Result<ModelRecord> {
        let model = self.load(id).await?;
        self.transition_from(model, next).await
    }

    /// Like [`transition`](Self::transition) for a row the caller already
    /// holds. The write only lands if the stored status still matches
    /// `model.status`.
    pub async fn transition_from(
        &self,
        model: ModelRecord,
        next: ModelStatus,
    ) -> Result<ModelRecord> {
        if model.status == next {
            return Ok(model);
        }
        if !model.status.can_transition_to(next) {
            return Err(CatalogError::Validation(format!(
                "model {} cannot move from {} to {}",
                model.name, model.status, next
            )));
        }
        self.store
            .update_model_status(&model.id, model.status, next)
            .await?;
        debug!(
            model_id = %model.id,
            name = %model.name,
            from = %model.status,
            to = %next,
            "model status changed"
        );
        self.load(&model.id).await
    }

    /// Make `id` the only default model. Only `available` models qualify.
    pub async fn set_default(&self, id: &str) -> Result<ModelRecord> {
        let model = self.load(id).await?;
        if model.status != ModelStatus::Available {
            return Err(CatalogError::Validation(format!(
                "model {} is {} and cannot be the default",
                model.name, model.status
            )));
        }
        self.store.set_default_model(id).await?;
        info!(model_id = %id, name = %model.name, "default model changed");
        self.load(id).await
    }

    /// Soft delete: `available -> removed`.
    pub async fn soft_delete(&self, id: &str) -> Result<ModelRecord> {
        self.transition(id, ModelStatus::Removed).await
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::entities::NewModel;

    async fn setup(status: ModelStatus) -> (ModelStateMachine, AnyStore, ModelRecord) {
        let store = AnyStore::in_memory().await;
        let model = store
            .create_model(NewModel::named("llama3:latest", status))
            .await
            .unwrap();
        (ModelStateMachine::new(store.clone()), store, model)
    }

    #[tokio::test]
    async fn legal_transition_is_applied() {
        let (sm, _, model) = setup(ModelStatus::Downloading).await;
        let model = sm.transition(&model.id, ModelStatus::Available).await.unwrap();
        assert_eq!(model.status, ModelStatus::Available);
    }

    #[tokio::test]
    async fn illegal_transition_is_rejected() {
        let (sm, store, model) = setup(ModelStatus::Available).await;
        let err = sm
            .transition(&model.id, ModelStatus::Downloading)
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Validation(_)));
        let unchanged = store.get_model(&model.id).await.unwrap().unwrap();
        assert_eq!(unchanged.status, ModelStatus::Available);
    }

    #[tokio::test]
    async fn same_status_is_a_no_op() {
        let (sm, _, model) = setup(ModelStatus::Error).await;
        let again = sm.transition(&model.id, ModelStatus::Error).await.unwrap();
        assert_eq!(again.updated_at, model.updated_at);
    }

    #[tokio::test]
    async fn stale_snapshot_does_not_overwrite_newer_status() {
        let (sm, store, snapshot) = setup(ModelStatus::Downloading).await;
        sm.transition(&snapshot.id, ModelStatus::Available).await.unwrap();

        let err = sm
            .transition_from(snapshot.clone(), ModelStatus::Error)
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Validation(_)));
        let current = store.get_model(&snapshot.id).await.unwrap().unwrap();
        assert_eq!(current.status, ModelStatus::Available);
    }

    #[tokio::test]
    async fn set_default_requires_available() {
        let (sm, _, model) = setup(ModelStatus::Removed).await;
        let err = sm.set_default(&model.id).await.unwrap_err();
        assert!(matches!(err, CatalogError::Validation(_)));
    }

    #[tokio::test]
    async fn default_count_never_exceeds_one() {
        let store = AnyStore::in_memory().await;
        let sm = ModelStateMachine::new(store.clone());
        let mut ids = Vec::new();
        for name in ["a:latest", "b:latest", "c:latest"] {
            let m = store
                .create_model(NewModel::named(name, ModelStatus::Available))
                .await
                .unwrap();
            ids.push(m.id);
        }

        for id in ids.iter().chain(ids.iter().rev()) {
            sm.set_default(id).await.unwrap();
            let defaults = store
                .list_models()
                .await
                .unwrap()
                .into_iter()
                .filter(|m| m.is_default)
                .count();
            assert!(defaults <= 1, "found {defaults} defaults");
        }
        sm.soft_delete(&ids[0]).await.unwrap();
        let defaults = store
            .list_models()
            .await
            .unwrap()
            .into_iter()
            .filter(|m| m.is_default)
            .count();
        assert_eq!(defaults, 0);
    }

    #[tokio::test]
    async fn unknown_model_is_not_found() {
        let store = AnyStore::in_memory().await;
        let sm = ModelStateMachine::new(store);
        assert!(matches!(
            sm.soft_delete("missing").await,
            Err(CatalogError::NotFound(_))
        ));
    }
}
