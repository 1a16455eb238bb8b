//! Request / response types for the chat-facing model API (`/v1/models/...`).

use hearth_core::entities::ModelRecord;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A catalog entry as returned by both `/v1` and `/admin`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ModelResponse {
    pub id: String,
    /// Catalog key, always tagged (e.g. `llama3.2:latest`).
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub family: String,
    pub format: String,
    pub parameters: String,
    pub quantization: String,
    /// Size on disk in bytes.
    pub size: i64,
    /// One of `available`, `downloading`, `installing`, `error`, `removed`.
    pub status: String,
    pub is_default: bool,
    pub is_enabled: bool,
    pub supports_embeddings: bool,
    pub embedding_dimensions: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
    pub last_used_at: Option<String>,
}

impl From<ModelRecord> for ModelResponse {
    fn from(record: ModelRecord) -> Self {
        Self {
            id: record.id,
            name: record.name,
            display_name: record.display_name,
            description: record.description,
            family: record.family,
            format: record.format,
            parameters: record.parameters,
            quantization: record.quantization,
            size: record.size,
            status: record.status.to_string(),
            is_default: record.is_default,
            is_enabled: record.is_enabled,
            supports_embeddings: record.supports_embeddings,
            embedding_dimensions: record.embedding_dimensions,
            created_at: record.created_at.to_rfc3339(),
            updated_at: record.updated_at.to_rfc3339(),
            last_used_at: record.last_used_at.map(|v| v.to_rfc3339()),
        }
    }
}

/// Response body for `GET /v1/models/{name}/validate`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ValidateModelResponse {
    pub name: String,
    pub status: String,
}
