use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::CatalogError;

pub const DEFAULT_TEMPERATURE: f64 = 0.7;
pub const DEFAULT_TOP_P: f64 = 0.9;
pub const DEFAULT_TOP_K: i64 = 40;
pub const DEFAULT_REPEAT_PENALTY: f64 = 1.1;
pub const DEFAULT_CONTEXT_LENGTH: i64 = 4096;
pub const DEFAULT_MAX_TOKENS: i64 = 2048;

/// A row in the `model_configs` table (zero or one per model).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelConfigRecord {
    pub model_id: String,
    pub temperature: f64,
    pub top_p: f64,
    pub top_k: i64,
    pub repeat_penalty: f64,
    pub context_length: i64,
    pub max_tokens: i64,
    pub system_prompt: Option<String>,
    /// Free-form generation options forwarded to the inference server.
    pub custom_options: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ModelConfigRecord {
    pub fn defaults_for(model_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            model_id: model_id.to_owned(),
            temperature: DEFAULT_TEMPERATURE,
            top_p: DEFAULT_TOP_P,
            top_k: DEFAULT_TOP_K,
            repeat_penalty: DEFAULT_REPEAT_PENALTY,
            context_length: DEFAULT_CONTEXT_LENGTH,
            max_tokens: DEFAULT_MAX_TOKENS,
            system_prompt: None,
            custom_options: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update of a model's generation parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelConfigPatch {
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub top_k: Option<i64>,
    pub repeat_penalty: Option<f64>,
    pub context_length: Option<i64>,
    pub max_tokens: Option<i64>,
    pub system_prompt: Option<String>,
    pub custom_options: Option<serde_json::Value>,
}

impl ModelConfigPatch {
    pub fn is_empty(&self) -> bool {
        self == &ModelConfigPatch::default()
    }

    /// Reject empty patches and out-of-range generation parameters.
    pub fn validate(&self) -> Result<(), CatalogError> {
        if self.is_empty() {
            return Err(CatalogError::Validation(
                "config update must change at least one field".into(),
            ));
        }
        if let Some(t) = self.temperature {
            if !(0.0..=2.0).contains(&t) {
                return Err(CatalogError::Validation(format!(
                    "invalid temperature ({t}): must be between 0.0 and 2.0"
                )));
            }
        }
        if let Some(p) = self.top_p {
            if !(0.0..=1.0).contains(&p) {
                return Err(CatalogError::Validation(format!(
                    "invalid top_p ({p}): must be between 0.0 and 1.0"
                )));
            }
        }
        if let Some(k) = self.top_k {
            if k < 1 {
                return Err(CatalogError::Validation(format!(
                    "invalid top_k ({k}): must be at least 1"
                )));
            }
        }
        if let Some(r) = self.repeat_penalty {
            if r <= 0.0 {
                return Err(CatalogError::Validation(format!(
                    "invalid repeat_penalty ({r}): must be positive"
                )));
            }
        }
        if let Some(c) = self.context_length {
            if c < 1 {
                return Err(CatalogError::Validation(format!(
                    "invalid context_length ({c}): must be at least 1"
                )));
            }
        }
        if let Some(m) = self.max_tokens {
            if m < 1 {
                return Err(CatalogError::Validation(format!(
                    "invalid max_tokens ({m}): must be at least 1"
                )));
            }
        }
        if let Some(opts) = &self.custom_options {
            if !opts.is_object() {
                return Err(CatalogError::Validation(
                    "custom_options must be a JSON object".into(),
                ));
            }
        }
        Ok(())
    }
}
