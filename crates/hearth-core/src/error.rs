//! Error types shared by every model-lifecycle component.

use thiserror::Error;

use crate::entities::ModelStatus;
use crate::gateway::GatewayError;

pub type Result<T, E = CatalogError> = std::result::Result<T, E>;

/// Why a model that exists in the catalog cannot serve a chat request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unavailability {
    Disabled,
    NotReady(ModelStatus),
}

/// All errors surfaced by the catalog, its state machine and the services
/// built on top of it.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// A model or config row with the given id / name does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Illegal status, illegal transition, empty patch, duplicate install, ...
    #[error("validation failed: {0}")]
    Validation(String),

    /// The inference server could not be reached or rejected the call.
    #[error("remote unavailable: {0}")]
    RemoteUnavailable(#[from] GatewayError),

    /// Chat-facing validation failure. The message deliberately does not
    /// carry the reconciliation state; `reason` does.
    #[error("model {name} is unavailable")]
    Unavailable { name: String, reason: Unavailability },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl CatalogError {
    pub(crate) fn model_not_found(id: &str) -> Self {
        CatalogError::NotFound(format!("model {id} not found"))
    }
}
