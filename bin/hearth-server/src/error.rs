//! Unified server error type.
//!
//! Every handler returns `Result<T, ServerError>`, which implements
//! [`axum::response::IntoResponse`] so errors are converted to a JSON-body
//! HTTP response with an appropriate status code.
//!
//! **Security note:** database and internal errors are logged with full
//! detail but only a generic message is returned to the caller so SQL and
//! file paths never leak to clients.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use hearth_core::CatalogError;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, error, warn};

#[derive(Debug, Error)]
pub enum ServerError {
    /// Propagated from the model lifecycle services.
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// The request body failed validation before reaching the services.
    #[error("bad request: {0}")]
    BadRequest(String),
}

impl From<validator::ValidationErrors> for ServerError {
    fn from(e: validator::ValidationErrors) -> Self {
        ServerError::BadRequest(e.to_string())
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, client_message) = match &self {
            ServerError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
            ServerError::Catalog(e) => match e {
                CatalogError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
                CatalogError::Validation(m) => (StatusCode::BAD_REQUEST, m.clone()),
                CatalogError::RemoteUnavailable(inner) => {
                    warn!(error = %inner, "inference server call failed");
                    (
                        StatusCode::BAD_GATEWAY,
                        format!("inference server unavailable: {inner}"),
                    )
                }
                // Chat clients only learn that the model cannot be used.
                CatalogError::Unavailable { name, reason } => {
                    debug!(name = %name, reason = ?reason, "model rejected for chat");
                    (StatusCode::SERVICE_UNAVAILABLE, "model unavailable".to_owned())
                }
                CatalogError::Database(inner) => {
                    error!(error = %inner, "database error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "internal server error".to_owned(),
                    )
                }
                CatalogError::Internal(m) => {
                    error!(message = %m, "internal server error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "internal server error".to_owned(),
                    )
                }
            },
        };
        (status, Json(json!({ "error": client_message }))).into_response()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use hearth_core::{GatewayError, Unavailability};
    use hearth_core::entities::ModelStatus;
    use http_body_util::BodyExt;
    use tracing_test::traced_test;

    async fn render(err: ServerError) -> (StatusCode, serde_json::Value) {
        let resp = err.into_response();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn catalog_errors_map_to_status_codes() {
        let cases = [
            (CatalogError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (CatalogError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (
                CatalogError::RemoteUnavailable(GatewayError::Remote("down".into())),
                StatusCode::BAD_GATEWAY,
            ),
            (CatalogError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            let (status, _) = render(err.into()).await;
            assert_eq!(status, expected);
        }
    }

    #[tokio::test]
    async fn unavailable_model_hides_reconciliation_state() {
        let err = CatalogError::Unavailable {
            name: "llama3:latest".into(),
            reason: Unavailability::NotReady(ModelStatus::Downloading),
        };
        let (status, body) = render(err.into()).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], "model unavailable");
    }

    #[tokio::test]
    #[traced_test]
    async fn internal_details_are_logged_not_exposed() {
        let (_, body) = render(CatalogError::Internal("/var/db/secret.sql".into()).into()).await;
        assert_eq!(body["error"], "internal server error");
        assert!(logs_contain("/var/db/secret.sql"));
    }
}
