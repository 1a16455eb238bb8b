use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::CatalogError;

/// Lifecycle status of a catalog entry.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ModelStatus {
    Available,
    Downloading,
    Installing,
    Error,
    Removed,
}

impl ModelStatus {
    pub const ALL: [ModelStatus; 5] = [
        ModelStatus::Available,
        ModelStatus::Downloading,
        ModelStatus::Installing,
        ModelStatus::Error,
        ModelStatus::Removed,
    ];

    /// Parse a stored or user-supplied status string.
    pub fn parse(raw: &str) -> Result<Self, CatalogError> {
        raw.parse()
            .map_err(|_| CatalogError::Validation(format!("invalid model status: {raw}")))
    }

    /// Legal edges of the model state machine. Same-state moves are handled
    /// by the caller as no-ops and are not listed here.
    pub fn can_transition_to(self, next: ModelStatus) -> bool {
        use ModelStatus::*;
        matches!(
            (self, next),
            (Available, Removed)
                | (Downloading, Available)
                | (Downloading, Error)
                | (Downloading, Installing)
                | (Installing, Available)
                | (Installing, Error)
                | (Removed, Available)
                | (Removed, Error)
                | (Removed, Downloading)
                | (Error, Available)
                | (Error, Downloading)
        )
    }
}

/// A row in the `models` table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelRecord {
    pub id: String,
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub family: String,
    pub format: String,
    pub parameters: String,
    pub quantization: String,
    pub size: i64,
    pub status: ModelStatus,
    pub is_default: bool,
    pub is_enabled: bool,
    pub supports_embeddings: bool,
    pub embedding_dimensions: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
}

/// Input for creating a catalog entry. The id and timestamps are assigned by
/// the store.
#[derive(Debug, Clone, Default)]
pub struct NewModel {
    pub name: String,
    pub display_name: Option<String>,
    pub description: String,
    pub family: String,
    pub format: String,
    pub parameters: String,
    pub quantization: String,
    pub size: i64,
    pub status: Option<ModelStatus>,
    pub is_enabled: bool,
    pub supports_embeddings: bool,
    pub embedding_dimensions: Option<i64>,
}

impl NewModel {
    pub fn named(name: impl Into<String>, status: ModelStatus) -> Self {
        Self {
            name: name.into(),
            status: Some(status),
            is_enabled: true,
            ..Default::default()
        }
    }
}

/// Partial update of a catalog entry; `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelPatch {
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub family: Option<String>,
    pub format: Option<String>,
    pub parameters: Option<String>,
    pub quantization: Option<String>,
    pub is_enabled: Option<bool>,
    pub supports_embeddings: Option<bool>,
    pub embedding_dimensions: Option<i64>,
}

impl ModelPatch {
    pub fn is_empty(&self) -> bool {
        self == &ModelPatch::default()
    }
}

/// Canonical catalog key for a model name.
///
/// The inference server tags untagged names as `:latest`, so `llama3` and
/// `llama3:latest` must map to the same row.
pub fn normalize_model_name(raw: &str) -> String {
    let name = raw.trim();
    if name.is_empty() || name.contains(':') {
        name.to_owned()
    } else {
        format!("{name}:latest")
    }
}

/// Human-friendly label derived from a model name: separators become spaces
/// and each word is title-cased.
pub fn display_name_for(name: &str) -> String {
    name.split([':', '-', '_', '/'])
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
