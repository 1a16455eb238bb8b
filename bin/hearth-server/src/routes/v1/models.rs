//! Chat-facing model routes.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::schemas::v1::models::{ModelResponse, ValidateModelResponse};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(list_models, get_default_model, validate_model),
    components(schemas(ModelResponse, ValidateModelResponse))
)]
pub struct ModelsApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/models", get(list_models))
        .route("/models/default", get(get_default_model))
        .route("/models/{name}/validate", get(validate_model))
}

/// Models that can serve chat right now (available and enabled).
#[utoipa::path(
    get,
    path = "/v1/models",
    tag = "v1::models",
    responses(
        (status = 200, description = "Usable models", body = [ModelResponse]),
    )
)]
pub async fn list_models(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ModelResponse>>, ServerError> {
    let models = state.services.models.list_available().await?;
    Ok(Json(models.into_iter().map(ModelResponse::from).collect()))
}

#[utoipa::path(
    get,
    path = "/v1/models/default",
    tag = "v1::models",
    responses(
        (status = 200, description = "The default model", body = ModelResponse),
        (status = 404, description = "No default model configured"),
    )
)]
pub async fn get_default_model(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ModelResponse>, ServerError> {
    Ok(Json(state.services.models.get_default().await?.into()))
}

/// Check that a model can serve a chat request. Failures never reveal why a
/// known model is unusable.
#[utoipa::path(
    get,
    path = "/v1/models/{name}/validate",
    tag = "v1::models",
    params(("name" = String, Path, description = "Model name; `:latest` is implied")),
    responses(
        (status = 200, description = "Model is usable", body = ValidateModelResponse),
        (status = 404, description = "Unknown model"),
        (status = 503, description = "Model unavailable"),
    )
)]
pub async fn validate_model(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<ValidateModelResponse>, ServerError> {
    let model = state.services.models.validate(&name).await?;
    Ok(Json(ValidateModelResponse {
        name: model.name,
        status: "ok".into(),
    }))
}
