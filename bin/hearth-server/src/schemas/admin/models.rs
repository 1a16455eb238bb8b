//! Request / response types for `/admin/models/...`.

use hearth_core::entities::{ModelConfigPatch, ModelConfigRecord, ModelPatch, ModelStatus, NewModel};
use hearth_core::services::{DownloadProgress, DownloadStatus, DownloadTicket, SyncReport};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::error::ServerError;
use crate::schemas::v1::models::ModelResponse;

#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
pub struct CreateModelRequest {
    /// Model name as known to the inference server; `:latest` is implied.
    #[validate(length(min = 1, max = 256))]
    pub name: String,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub family: Option<String>,
    pub format: Option<String>,
    pub parameters: Option<String>,
    pub quantization: Option<String>,
    #[validate(range(min = 0))]
    pub size: Option<i64>,
    /// Initial status; defaults to `available`.
    pub status: Option<String>,
    pub is_enabled: Option<bool>,
    pub supports_embeddings: Option<bool>,
    #[validate(range(min = 1))]
    pub embedding_dimensions: Option<i64>,
}

impl CreateModelRequest {
    pub fn into_new_model(self) -> Result<NewModel, ServerError> {
        let status = self
            .status
            .as_deref()
            .map(ModelStatus::parse)
            .transpose()?
            .unwrap_or(ModelStatus::Available);
        let mut model = NewModel::named(self.name, status);
        model.display_name = self.display_name;
        model.description = self.description.unwrap_or_default();
        model.family = self.family.unwrap_or_default();
        model.format = self.format.unwrap_or_default();
        model.parameters = self.parameters.unwrap_or_default();
        model.quantization = self.quantization.unwrap_or_default();
        model.size = self.size.unwrap_or(0);
        model.is_enabled = self.is_enabled.unwrap_or(true);
        model.supports_embeddings = self.supports_embeddings.unwrap_or(false);
        model.embedding_dimensions = self.embedding_dimensions;
        Ok(model)
    }
}

/// Every field is optional; at least one must be present.
#[derive(Debug, Clone, Default, Deserialize, ToSchema, Validate)]
pub struct UpdateModelRequest {
    #[validate(length(min = 1))]
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub family: Option<String>,
    pub format: Option<String>,
    pub parameters: Option<String>,
    pub quantization: Option<String>,
    pub is_enabled: Option<bool>,
    pub supports_embeddings: Option<bool>,
    #[validate(range(min = 1))]
    pub embedding_dimensions: Option<i64>,
}

impl From<UpdateModelRequest> for ModelPatch {
    fn from(req: UpdateModelRequest) -> Self {
        ModelPatch {
            display_name: req.display_name,
            description: req.description,
            family: req.family,
            format: req.format,
            parameters: req.parameters,
            quantization: req.quantization,
            is_enabled: req.is_enabled,
            supports_embeddings: req.supports_embeddings,
            embedding_dimensions: req.embedding_dimensions,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ModelConfigResponse {
    pub model_id: String,
    pub temperature: f64,
    pub top_p: f64,
    pub top_k: i64,
    pub repeat_penalty: f64,
    pub context_length: i64,
    pub max_tokens: i64,
    pub system_prompt: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub custom_options: Option<serde_json::Value>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<ModelConfigRecord> for ModelConfigResponse {
    fn from(record: ModelConfigRecord) -> Self {
        Self {
            model_id: record.model_id,
            temperature: record.temperature,
            top_p: record.top_p,
            top_k: record.top_k,
            repeat_penalty: record.repeat_penalty,
            context_length: record.context_length,
            max_tokens: record.max_tokens,
            system_prompt: record.system_prompt,
            custom_options: record.custom_options,
            created_at: record.created_at.to_rfc3339(),
            updated_at: record.updated_at.to_rfc3339(),
        }
    }
}

/// Generation parameters to change. Ranges are checked by the catalog.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateModelConfigRequest {
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub top_k: Option<i64>,
    pub repeat_penalty: Option<f64>,
    pub context_length: Option<i64>,
    pub max_tokens: Option<i64>,
    pub system_prompt: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub custom_options: Option<serde_json::Value>,
}

impl From<UpdateModelConfigRequest> for ModelConfigPatch {
    fn from(req: UpdateModelConfigRequest) -> Self {
        ModelConfigPatch {
            temperature: req.temperature,
            top_p: req.top_p,
            top_k: req.top_k,
            repeat_penalty: req.repeat_penalty,
            context_length: req.context_length,
            max_tokens: req.max_tokens,
            system_prompt: req.system_prompt,
            custom_options: req.custom_options,
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
pub struct DownloadModelRequest {
    /// Library name, e.g. `llama3.2` or `qwen2.5:7b`.
    #[validate(length(min = 1, max = 256))]
    pub name: String,
    pub display_name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DownloadTicketResponse {
    pub id: String,
    pub name: String,
    pub status: String,
}

impl From<DownloadTicket> for DownloadTicketResponse {
    fn from(ticket: DownloadTicket) -> Self {
        Self {
            id: ticket.id,
            name: ticket.name,
            status: ticket.status.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DownloadProgressResponse {
    pub status: String,
    pub digest: Option<String>,
    pub completed: Option<u64>,
    pub total: Option<u64>,
    pub percentage: f64,
}

impl From<DownloadProgress> for DownloadProgressResponse {
    fn from(p: DownloadProgress) -> Self {
        Self {
            status: p.status,
            digest: p.digest,
            completed: p.completed,
            total: p.total,
            percentage: p.percentage,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DownloadStatusResponse {
    pub model: ModelResponse,
    /// Present while the model is downloading.
    pub percentage: Option<f64>,
    pub progress: Option<DownloadProgressResponse>,
}

impl From<DownloadStatus> for DownloadStatusResponse {
    fn from(status: DownloadStatus) -> Self {
        Self {
            model: status.model.into(),
            percentage: status.percentage,
            progress: status.progress.map(Into::into),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SyncReportResponse {
    pub created: usize,
    pub reactivated: usize,
    pub updated: usize,
    pub removed: usize,
    pub failed: usize,
}

impl From<SyncReport> for SyncReportResponse {
    fn from(r: SyncReport) -> Self {
        Self {
            created: r.created,
            reactivated: r.reactivated,
            updated: r.updated,
            removed: r.removed,
            failed: r.failed,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn create_request_rejects_blank_name() {
        let req: CreateModelRequest =
            serde_json::from_value(serde_json::json!({ "name": "" })).unwrap();
        assert!(req.validate().is_err());
    }

    #[test]
    fn create_request_defaults_to_enabled_available() {
        let req: CreateModelRequest =
            serde_json::from_value(serde_json::json!({ "name": "llama3" })).unwrap();
        let model = req.into_new_model().unwrap();
        assert_eq!(model.status, Some(ModelStatus::Available));
        assert!(model.is_enabled);
    }

    #[test]
    fn create_request_rejects_unknown_status() {
        let req: CreateModelRequest = serde_json::from_value(
            serde_json::json!({ "name": "llama3", "status": "deleted" }),
        )
        .unwrap();
        assert!(matches!(req.into_new_model(), Err(ServerError::Catalog(_))));
    }
}
