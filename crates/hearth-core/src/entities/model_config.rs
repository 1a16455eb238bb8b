use std::future::Future;

use chrono::Utc;
use sqlx::any::AnyRow;
use sqlx::Row;

use crate::entities::dao::{ModelConfigPatch, ModelConfigRecord};
use crate::entities::{parse_rfc3339_or_now, AnyStore};
use crate::error::{CatalogError, Result};

/// Per-model generation parameters, stored 1:1 with `models`.
pub trait ModelConfigStore: Send + Sync + 'static {
    fn get_config(
        &self,
        model_id: &str,
    ) -> impl Future<Output = Result<Option<ModelConfigRecord>>> + Send;
    /// Apply a partial update, creating the default row first if the model
    /// has none. Fails with NotFound when the model itself is absent.
    fn update_config(
        &self,
        model_id: &str,
        patch: &ModelConfigPatch,
    ) -> impl Future<Output = Result<ModelConfigRecord>> + Send;
    /// Overwrite the config with the built-in defaults.
    fn reset_config(
        &self,
        model_id: &str,
    ) -> impl Future<Output = Result<ModelConfigRecord>> + Send;
}

const CONFIG_COLUMNS: &str = "model_id, temperature, top_p, top_k, repeat_penalty, \
     context_length, max_tokens, system_prompt, custom_options, created_at, updated_at";

fn config_from_row(row: &AnyRow) -> Result<ModelConfigRecord> {
    let custom_options = row
        .try_get::<Option<String>, _>("custom_options")?
        .map(|raw| serde_json::from_str(&raw))
        .transpose()
        .map_err(|e| CatalogError::Internal(format!("corrupt custom_options: {e}")))?;
    Ok(ModelConfigRecord {
        model_id: row.try_get("model_id")?,
        temperature: row.try_get("temperature")?,
        top_p: row.try_get("top_p")?,
        top_k: row.try_get("top_k")?,
        repeat_penalty: row.try_get("repeat_penalty")?,
        context_length: row.try_get("context_length")?,
        max_tokens: row.try_get("max_tokens")?,
        system_prompt: row.try_get("system_prompt")?,
        custom_options,
        created_at: parse_rfc3339_or_now(row.try_get("created_at")?, "created_at"),
        updated_at: parse_rfc3339_or_now(row.try_get("updated_at")?, "updated_at"),
    })
}

impl AnyStore {
    async fn ensure_config_row(&self, model_id: &str) -> Result<()> {
        let exists: Option<(String,)> = sqlx::query_as("SELECT id FROM models WHERE id = ?1")
            .bind(model_id)
            .fetch_optional(&self.pool)
            .await?;
        if exists.is_none() {
            return Err(CatalogError::model_not_found(model_id));
        }

        let defaults = ModelConfigRecord::defaults_for(model_id, Utc::now());
        sqlx::query(
            "INSERT INTO model_configs \
             (model_id, temperature, top_p, top_k, repeat_penalty, context_length, max_tokens, \
              system_prompt, custom_options, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, NULL, NULL, ?8, ?8) \
             ON CONFLICT(model_id) DO NOTHING",
        )
        .bind(model_id)
        .bind(defaults.temperature)
        .bind(defaults.top_p)
        .bind(defaults.top_k)
        .bind(defaults.repeat_penalty)
        .bind(defaults.context_length)
        .bind(defaults.max_tokens)
        .bind(defaults.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

impl ModelConfigStore for AnyStore {
    async fn get_config(&self, model_id: &str) -> Result<Option<ModelConfigRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {CONFIG_COLUMNS} FROM model_configs WHERE model_id = ?1"
        ))
        .bind(model_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(config_from_row).transpose()
    }

    async fn update_config(
        &self,
        model_id: &str,
        patch: &ModelConfigPatch,
    ) -> Result<ModelConfigRecord> {
        patch.validate()?;
        self.ensure_config_row(model_id).await?;

        let custom_options = patch
            .custom_options
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| CatalogError::Internal(format!("failed to encode custom_options: {e}")))?;

        // COALESCE keeps the stored value for every field the patch leaves out.
        sqlx::query(
            "UPDATE model_configs SET \
             temperature = COALESCE(?1, temperature), \
             top_p = COALESCE(?2, top_p), \
             top_k = COALESCE(?3, top_k), \
             repeat_penalty = COALESCE(?4, repeat_penalty), \
             context_length = COALESCE(?5, context_length), \
             max_tokens = COALESCE(?6, max_tokens), \
             system_prompt = COALESCE(?7, system_prompt), \
             custom_options = COALESCE(?8, custom_options), \
             updated_at = ?9 \
             WHERE model_id = ?10",
        )
        .bind(patch.temperature)
        .bind(patch.top_p)
        .bind(patch.top_k)
        .bind(patch.repeat_penalty)
        .bind(patch.context_length)
        .bind(patch.max_tokens)
        .bind(patch.system_prompt.clone())
        .bind(custom_options)
        .bind(Utc::now().to_rfc3339())
        .bind(model_id)
        .execute(&self.pool)
        .await?;

        self.get_config(model_id)
            .await?
            .ok_or_else(|| CatalogError::NotFound(format!("config for model {model_id} not found")))
    }

    async fn reset_config(&self, model_id: &str) -> Result<ModelConfigRecord> {
        self.ensure_config_row(model_id).await?;
        let defaults = ModelConfigRecord::defaults_for(model_id, Utc::now());
        sqlx::query(
            "UPDATE model_configs SET temperature = ?1, top_p = ?2, top_k = ?3, \
             repeat_penalty = ?4, context_length = ?5, max_tokens = ?6, \
             system_prompt = NULL, custom_options = NULL, updated_at = ?7 \
             WHERE model_id = ?8",
        )
        .bind(defaults.temperature)
        .bind(defaults.top_p)
        .bind(defaults.top_k)
        .bind(defaults.repeat_penalty)
        .bind(defaults.context_length)
        .bind(defaults.max_tokens)
        .bind(defaults.updated_at.to_rfc3339())
        .bind(model_id)
        .execute(&self.pool)
        .await?;

        self.get_config(model_id)
            .await?
            .ok_or_else(|| CatalogError::NotFound(format!("config for model {model_id} not found")))
    }
}
