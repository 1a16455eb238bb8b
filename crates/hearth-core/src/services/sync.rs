//! Reconciliation of the local catalog against the inference server.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::entities::{
    normalize_model_name, AnyStore, ModelPatch, ModelRecord, ModelStatus, ModelStore, NewModel,
};
use crate::error::Result;
use crate::gateway::{RemoteGateway, RemoteModel};
use crate::services::state_machine::ModelStateMachine;

/// What one `sync()` pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub created: usize,
    pub reactivated: usize,
    pub updated: usize,
    pub removed: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct Synchronizer {
    store: AnyStore,
    gateway: Arc<dyn RemoteGateway>,
    lifecycle: ModelStateMachine,
}

impl Synchronizer {
    pub fn new(
        store: AnyStore,
        gateway: Arc<dyn RemoteGateway>,
        lifecycle: ModelStateMachine,
    ) -> Self {
        Self {
            store,
            gateway,
            lifecycle,
        }
    }

    /// Reconcile the catalog with a fresh remote snapshot.
    ///
    /// Only a failure to fetch the snapshot (or the local listing) aborts the
    /// pass; a failure on one entry is logged and counted.
    pub async fn sync(&self) -> Result<SyncReport> {
        let remote = self.gateway.list_installed().await?;
        let local = self.store.list_models().await?;
        let mut by_name: HashMap<String, ModelRecord> =
            local.into_iter().map(|m| (m.name.clone(), m)).collect();

        let mut report = SyncReport::default();
        let mut remote_names = HashSet::with_capacity(remote.len());

        for entry in remote {
            let name = normalize_model_name(&entry.name);
            if name.is_empty() || !remote_names.insert(name.clone()) {
                continue;
            }
            let outcome = match by_name.remove(&name) {
                Some(existing) => self.refresh_existing(existing, &entry, &mut report).await,
                None => self.create_discovered(&name, &entry).await.map(|_| {
                    report.created += 1;
                }),
            };
            if let Err(e) = outcome {
                report.failed += 1;
                warn!(name = %name, error = %e, "failed to reconcile model; continuing");
            }
        }

        // Whatever is left was not in the snapshot.
        for model in by_name.into_values() {
            if model.status != ModelStatus::Available || remote_names.contains(&model.name) {
                continue;
            }
            let name = model.name.clone();
            // Conditional on the listed status, so a row that moved since the
            // listing is left alone.
            match self
                .lifecycle
                .transition_from(model, ModelStatus::Removed)
                .await
            {
                Ok(_) => {
                    report.removed += 1;
                    info!(name = %name, "model no longer on inference server; marked removed");
                }
                Err(e) => {
                    report.failed += 1;
                    warn!(name = %name, error = %e, "failed to mark model removed; continuing");
                }
            }
        }

        info!(
            created = report.created,
            reactivated = report.reactivated,
            updated = report.updated,
            removed = report.removed,
            failed = report.failed,
            "model sync finished"
        );
        Ok(report)
    }

    async fn refresh_existing(
        &self,
        existing: ModelRecord,
        entry: &RemoteModel,
        report: &mut SyncReport,
    ) -> Result<()> {
        let id = existing.id.clone();

        if existing.status != ModelStatus::Available {
            self.lifecycle
                .transition_from(existing.clone(), ModelStatus::Available)
                .await?;
            report.reactivated += 1;
        }

        let mut changed = false;
        if entry.size != existing.size {
            self.store.update_model_size(&id, entry.size).await?;
            changed = true;
        }

        if let Some(patch) = metadata_patch(&existing, entry) {
            self.store.update_model_fields(&id, &patch).await?;
            changed = true;
        }

        if changed {
            report.updated += 1;
            debug!(name = %existing.name, "model metadata refreshed");
        }
        Ok(())
    }

    async fn create_discovered(&self, name: &str, entry: &RemoteModel) -> Result<ModelRecord> {
        let mut model = NewModel::named(name, ModelStatus::Available);
        model.size = entry.size;
        model.family = entry.family.clone();
        model.format = entry.format.clone();
        model.parameters = entry.parameters.clone();
        model.quantization = entry.quantization.clone();

        // Inspection only runs for new rows; it is best effort.
        match self.gateway.inspect(name).await {
            Ok(details) => {
                fill_if_empty(&mut model.family, details.family);
                fill_if_empty(&mut model.format, details.format);
                fill_if_empty(&mut model.parameters, details.parameter_size);
                fill_if_empty(&mut model.quantization, details.quantization);
                model.supports_embeddings = details.supports_embeddings;
                model.embedding_dimensions = details.embedding_dimensions;
            }
            Err(e) => debug!(name, error = %e, "inspect failed; keeping listing metadata"),
        }

        let created = self.store.create_model(model).await?;
        info!(model_id = %created.id, name, "discovered model on inference server");
        Ok(created)
    }
}

fn fill_if_empty(slot: &mut String, value: String) {
    if slot.is_empty() && !value.is_empty() {
        *slot = value;
    }
}

/// The metadata update a remote entry implies, if any. Empty remote fields
/// never blank out what the catalog already knows.
fn metadata_patch(existing: &ModelRecord, entry: &RemoteModel) -> Option<ModelPatch> {
    let pick = |remote: &str, local: &str| -> Option<String> {
        (!remote.is_empty() && remote != local).then(|| remote.to_owned())
    };
    let patch = ModelPatch {
        family: pick(&entry.family, &existing.family),
        format: pick(&entry.format, &existing.format),
        parameters: pick(&entry.parameters, &existing.parameters),
        quantization: pick(&entry.quantization, &existing.quantization),
        ..Default::default()
    };
    (!patch.is_empty()).then_some(patch)
}
