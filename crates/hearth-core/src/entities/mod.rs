//! Persistence layer for the model catalog.
//!
//! [`ModelStore`] and [`ModelConfigStore`] define the catalog contract. The
//! default implementation is [`AnyStore`], a `sqlx::Any` pool over SQLite.
//! To swap to another database, implement the traits for your new type.
//!
//! All trait methods use `impl Future` in their signatures (stable since Rust
//! 1.75) so no extra `async-trait` crate is required here.

pub mod dao;
pub mod model;
pub mod model_config;

pub use dao::{
    display_name_for, normalize_model_name, ModelConfigPatch, ModelConfigRecord, ModelPatch,
    ModelRecord, ModelStatus, NewModel,
};

pub use model::ModelStore;
pub use model_config::ModelConfigStore;

use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::any::AnyPoolOptions;

#[derive(Clone, Debug)]
pub struct AnyStore {
    pool: sqlx::Pool<sqlx::Any>,
}

impl AnyStore {
    /// Open (or create) the database at `url` and run pending migrations.
    ///
    /// `url` should be a sqlx-compatible SQLite URL, e.g.
    /// `"sqlite://hearth.db?mode=rwc"` or `"sqlite::memory:"` for tests.
    pub async fn connect(url: &str) -> Result<Self, sqlx::Error> {
        sqlx::any::install_default_drivers();
        let options = sqlx::any::AnyConnectOptions::from_str(url)?;
        let pool = if url.contains(":memory:") {
            // Every new connection to `:memory:` is a fresh database, so the
            // pool must hold on to exactly one.
            AnyPoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            AnyPoolOptions::new().connect_with(options).await?
        };
        // Path is resolved relative to CARGO_MANIFEST_DIR at compile time.
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    #[cfg(test)]
    pub(crate) async fn in_memory() -> Self {
        Self::connect("sqlite::memory:")
            .await
            .expect("in-memory store should open")
    }

    /// Run arbitrary SQL against the pool; lets tests install triggers.
    #[cfg(test)]
    pub(crate) async fn execute_raw(&self, sql: &str) {
        sqlx::query(sql)
            .execute(&self.pool)
            .await
            .expect("raw statement should succeed");
    }
}

fn parse_rfc3339_or_now(raw: String, field: &'static str) -> DateTime<Utc> {
    raw.parse().unwrap_or_else(|e: chrono::ParseError| {
        tracing::warn!(raw = %raw, error = %e, field, "failed to parse timestamp; using now");
        Utc::now()
    })
}

fn parse_optional_rfc3339(raw: Option<String>, field: &'static str) -> Option<DateTime<Utc>> {
    raw.and_then(|v| {
        v.parse()
            .map_err(|e: chrono::ParseError| {
                tracing::warn!(
                    raw = %v,
                    error = %e,
                    field,
                    "failed to parse optional timestamp; dropping value"
                );
                e
            })
            .ok()
    })
}
