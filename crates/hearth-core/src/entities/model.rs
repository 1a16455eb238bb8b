use std::future::Future;

use chrono::Utc;
use sqlx::any::AnyRow;
use sqlx::{Any, QueryBuilder, Row};
use uuid::Uuid;

use crate::entities::dao::{ModelConfigRecord, ModelPatch, ModelRecord, ModelStatus, NewModel};
use crate::entities::{parse_optional_rfc3339, parse_rfc3339_or_now, AnyStore};
use crate::error::{CatalogError, Result};

/// CRUD + query contract over the `models` table.
///
/// Every mutating operation bumps `updated_at`. Operations addressing a row
/// by id return [`CatalogError::NotFound`] when no row matches.
pub trait ModelStore: Send + Sync + 'static {
    /// Insert a model together with its default config row.
    fn create_model(&self, model: NewModel) -> impl Future<Output = Result<ModelRecord>> + Send;
    fn get_model(&self, id: &str) -> impl Future<Output = Result<Option<ModelRecord>>> + Send;
    fn get_model_by_name(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<Option<ModelRecord>>> + Send;
    fn list_models(&self) -> impl Future<Output = Result<Vec<ModelRecord>>> + Send;
    /// Models with `status = available` that are enabled.
    fn list_available_models(&self) -> impl Future<Output = Result<Vec<ModelRecord>>> + Send;
    /// The enabled, available default model, if any.
    fn get_default_model(&self) -> impl Future<Output = Result<Option<ModelRecord>>> + Send;
    /// Apply a partial update. Empty patches are rejected.
    fn update_model_fields(
        &self,
        id: &str,
        patch: &ModelPatch,
    ) -> impl Future<Output = Result<ModelRecord>> + Send;
    /// Move the row from `from` to `to`. Leaving `available` also clears
    /// `is_default`. Fails with [`CatalogError::Validation`] when the stored
    /// status is no longer `from`.
    fn update_model_status(
        &self,
        id: &str,
        from: ModelStatus,
        to: ModelStatus,
    ) -> impl Future<Output = Result<()>> + Send;
    fn update_model_size(&self, id: &str, size: i64) -> impl Future<Output = Result<()>> + Send;
    /// Clear every other default and mark `id` as the default, atomically.
    /// Only an `available` model can become the default.
    fn set_default_model(&self, id: &str) -> impl Future<Output = Result<()>> + Send;
    /// Delete the config row and then the model row in one transaction.
    fn hard_delete_model(&self, id: &str) -> impl Future<Output = Result<()>> + Send;
    /// Bump `last_used_at` for the model referenced by a chat message.
    fn mark_model_used(&self, name: &str) -> impl Future<Output = Result<()>> + Send;
}

const MODEL_COLUMNS: &str = "id, name, display_name, description, family, format, parameters, \
     quantization, size, status, is_default, is_enabled, supports_embeddings, \
     embedding_dimensions, created_at, updated_at, last_used_at";

fn model_from_row(row: &AnyRow) -> Result<ModelRecord> {
    let status: String = row.try_get("status")?;
    let status = ModelStatus::parse(&status).map_err(|_| {
        CatalogError::Internal(format!("unknown status '{status}' stored in models table"))
    })?;
    Ok(ModelRecord {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        display_name: row.try_get("display_name")?,
        description: row.try_get("description")?,
        family: row.try_get("family")?,
        format: row.try_get("format")?,
        parameters: row.try_get("parameters")?,
        quantization: row.try_get("quantization")?,
        size: row.try_get("size")?,
        status,
        is_default: row.try_get::<i64, _>("is_default")? != 0,
        is_enabled: row.try_get::<i64, _>("is_enabled")? != 0,
        supports_embeddings: row.try_get::<i64, _>("supports_embeddings")? != 0,
        embedding_dimensions: row.try_get("embedding_dimensions")?,
        created_at: parse_rfc3339_or_now(row.try_get("created_at")?, "created_at"),
        updated_at: parse_rfc3339_or_now(row.try_get("updated_at")?, "updated_at"),
        last_used_at: parse_optional_rfc3339(row.try_get("last_used_at")?, "last_used_at"),
    })
}

fn models_from_rows(rows: Vec<AnyRow>) -> Result<Vec<ModelRecord>> {
    rows.iter().map(model_from_row).collect()
}

impl ModelStore for AnyStore {
    async fn create_model(&self, model: NewModel) -> Result<ModelRecord> {
        let name = model.name.trim().to_owned();
        if name.is_empty() {
            return Err(CatalogError::Validation("model name must not be empty".into()));
        }

        let now = Utc::now();
        let record = ModelRecord {
            id: Uuid::new_v4().to_string(),
            display_name: model
                .display_name
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| super::display_name_for(&name)),
            name,
            description: model.description,
            family: model.family,
            format: model.format,
            parameters: model.parameters,
            quantization: model.quantization,
            size: model.size,
            status: model.status.unwrap_or(ModelStatus::Available),
            is_default: false,
            is_enabled: model.is_enabled,
            supports_embeddings: model.supports_embeddings,
            embedding_dimensions: model.embedding_dimensions,
            created_at: now,
            updated_at: now,
            last_used_at: None,
        };
        let config = ModelConfigRecord::defaults_for(&record.id, now);
        let created_at = now.to_rfc3339();

        let mut tx = self.pool.begin().await?;
        let inserted = sqlx::query(
            "INSERT INTO models \
             (id, name, display_name, description, family, format, parameters, quantization, size, \
              status, is_default, is_enabled, supports_embeddings, embedding_dimensions, \
              created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 0, ?11, ?12, ?13, ?14, ?14)",
        )
        .bind(&record.id)
        .bind(&record.name)
        .bind(&record.display_name)
        .bind(&record.description)
        .bind(&record.family)
        .bind(&record.format)
        .bind(&record.parameters)
        .bind(&record.quantization)
        .bind(record.size)
        .bind(record.status.to_string())
        .bind(i64::from(record.is_enabled))
        .bind(i64::from(record.supports_embeddings))
        .bind(record.embedding_dimensions)
        .bind(&created_at)
        .execute(&mut *tx)
        .await;

        if let Err(e) = inserted {
            return Err(match e {
                sqlx::Error::Database(db) if db.is_unique_violation() => CatalogError::Validation(
                    format!("model {} already exists", record.name),
                ),
                other => other.into(),
            });
        }

        sqlx::query(
            "INSERT INTO model_configs \
             (model_id, temperature, top_p, top_k, repeat_penalty, context_length, max_tokens, \
              system_prompt, custom_options, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, NULL, NULL, ?8, ?8)",
        )
        .bind(&config.model_id)
        .bind(config.temperature)
        .bind(config.top_p)
        .bind(config.top_k)
        .bind(config.repeat_penalty)
        .bind(config.context_length)
        .bind(config.max_tokens)
        .bind(&created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(record)
    }

    async fn get_model(&self, id: &str) -> Result<Option<ModelRecord>> {
        let row = sqlx::query(&format!("SELECT {MODEL_COLUMNS} FROM models WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(model_from_row).transpose()
    }

    async fn get_model_by_name(&self, name: &str) -> Result<Option<ModelRecord>> {
        let row = sqlx::query(&format!("SELECT {MODEL_COLUMNS} FROM models WHERE name = ?1"))
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(model_from_row).transpose()
    }

    async fn list_models(&self) -> Result<Vec<ModelRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {MODEL_COLUMNS} FROM models ORDER BY name ASC"
        ))
        .fetch_all(&self.pool)
        .await?;
        models_from_rows(rows)
    }

    async fn list_available_models(&self) -> Result<Vec<ModelRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {MODEL_COLUMNS} FROM models \
             WHERE status = 'available' AND is_enabled = 1 ORDER BY name ASC"
        ))
        .fetch_all(&self.pool)
        .await?;
        models_from_rows(rows)
    }

    async fn get_default_model(&self) -> Result<Option<ModelRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {MODEL_COLUMNS} FROM models \
             WHERE status = 'available' AND is_enabled = 1 AND is_default = 1 LIMIT 1"
        ))
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(model_from_row).transpose()
    }

    async fn update_model_fields(&self, id: &str, patch: &ModelPatch) -> Result<ModelRecord> {
        if patch.is_empty() {
            return Err(CatalogError::Validation(
                "update must change at least one field".into(),
            ));
        }

        let mut qb: QueryBuilder<'_, Any> = QueryBuilder::new("UPDATE models SET ");
        {
            let mut set = qb.separated(", ");
            let text_fields = [
                ("display_name", &patch.display_name),
                ("description", &patch.description),
                ("family", &patch.family),
                ("format", &patch.format),
                ("parameters", &patch.parameters),
                ("quantization", &patch.quantization),
            ];
            for (column, value) in text_fields {
                if let Some(v) = value {
                    set.push(format!("{column} = "));
                    set.push_bind_unseparated(v.clone());
                }
            }
            if let Some(enabled) = patch.is_enabled {
                set.push("is_enabled = ");
                set.push_bind_unseparated(i64::from(enabled));
            }
            if let Some(embeddings) = patch.supports_embeddings {
                set.push("supports_embeddings = ");
                set.push_bind_unseparated(i64::from(embeddings));
            }
            if let Some(dims) = patch.embedding_dimensions {
                set.push("embedding_dimensions = ");
                set.push_bind_unseparated(dims);
            }
            set.push("updated_at = ");
            set.push_bind_unseparated(Utc::now().to_rfc3339());
        }
        qb.push(" WHERE id = ");
        qb.push_bind(id.to_owned());

        let result = qb.build().execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(CatalogError::model_not_found(id));
        }
        self.get_model(id)
            .await?
            .ok_or_else(|| CatalogError::model_not_found(id))
    }

    async fn update_model_status(
        &self,
        id: &str,
        from: ModelStatus,
        to: ModelStatus,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE models SET status = ?1, \
             is_default = CASE WHEN ?1 = 'available' THEN is_default ELSE 0 END, \
             updated_at = ?2 WHERE id = ?3 AND status = ?4",
        )
        .bind(to.to_string())
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .bind(from.to_string())
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return match self.get_model(id).await? {
                None => Err(CatalogError::model_not_found(id)),
                Some(m) => Err(CatalogError::Validation(format!(
                    "model {} is {}, not {from}; status left unchanged",
                    m.name, m.status
                ))),
            };
        }
        Ok(())
    }

    async fn update_model_size(&self, id: &str, size: i64) -> Result<()> {
        let result = sqlx::query("UPDATE models SET size = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(size)
            .bind(Utc::now().to_rfc3339())
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(CatalogError::model_not_found(id));
        }
        Ok(())
    }

    async fn set_default_model(&self, id: &str) -> Result<()> {
        let updated_at = Utc::now().to_rfc3339();

        let mut tx = self.pool.begin().await?;
        // Clear first: the partial unique index forbids two defaults even
        // inside the transaction.
        sqlx::query(
            "UPDATE models SET is_default = 0, updated_at = ?1 WHERE is_default = 1 AND id <> ?2",
        )
        .bind(&updated_at)
        .bind(id)
        .execute(&mut *tx)
        .await?;
        let result = sqlx::query(
            "UPDATE models SET is_default = 1, updated_at = ?1 \
             WHERE id = ?2 AND status = 'available'",
        )
        .bind(&updated_at)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return match self.get_model(id).await? {
                None => Err(CatalogError::model_not_found(id)),
                Some(m) => Err(CatalogError::Validation(format!(
                    "model {} is {} and cannot be the default",
                    m.name, m.status
                ))),
            };
        }

        tx.commit().await?;
        Ok(())
    }

    async fn hard_delete_model(&self, id: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM model_configs WHERE model_id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM models WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(CatalogError::model_not_found(id));
        }
        tx.commit().await?;
        Ok(())
    }

    async fn mark_model_used(&self, name: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let result =
            sqlx::query("UPDATE models SET last_used_at = ?1, updated_at = ?1 WHERE name = ?2")
                .bind(&now)
                .bind(name)
                .execute(&self.pool)
                .await?;
        if result.rows_affected() == 0 {
            return Err(CatalogError::NotFound(format!("model {name} not found")));
        }
        Ok(())
    }
}
