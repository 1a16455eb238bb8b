//! Catalog administration: CRUD, lifecycle actions, config, sync and
//! downloads.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use hearth_core::entities::{ModelConfigPatch, ModelPatch};
use tracing::info;
use utoipa::OpenApi;
use validator::Validate;

use crate::error::ServerError;
use crate::schemas::admin::models::{
    CreateModelRequest, DownloadModelRequest, DownloadProgressResponse, DownloadStatusResponse,
    DownloadTicketResponse, ModelConfigResponse, SyncReportResponse, UpdateModelConfigRequest,
    UpdateModelRequest,
};
use crate::schemas::v1::models::ModelResponse;
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(
        list_models,
        create_model,
        get_model,
        update_model,
        delete_model,
        set_default_model,
        remove_model,
        restore_model,
        get_model_config,
        update_model_config,
        reset_model_config,
        sync_models,
        download_model,
        get_download_status,
        cancel_download
    ),
    components(schemas(
        CreateModelRequest,
        UpdateModelRequest,
        ModelResponse,
        ModelConfigResponse,
        UpdateModelConfigRequest,
        DownloadModelRequest,
        DownloadTicketResponse,
        DownloadStatusResponse,
        DownloadProgressResponse,
        SyncReportResponse
    ))
)]
pub struct ModelsAdminApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/models", get(list_models).post(create_model))
        .route("/models/sync", post(sync_models))
        .route("/models/download", post(download_model))
        .route(
            "/models/{id}",
            get(get_model).put(update_model).delete(delete_model),
        )
        .route("/models/{id}/default", post(set_default_model))
        .route("/models/{id}/remove", post(remove_model))
        .route("/models/{id}/restore", post(restore_model))
        .route(
            "/models/{id}/config",
            get(get_model_config)
                .put(update_model_config)
                .delete(reset_model_config),
        )
        .route(
            "/models/{id}/download",
            get(get_download_status).delete(cancel_download),
        )
}

// ── CRUD ──────────────────────────────────────────────────────────────────────

#[utoipa::path(
    get,
    path = "/admin/models",
    tag = "admin",
    responses(
        (status = 200, description = "Every catalog entry", body = [ModelResponse]),
        (status = 401, description = "Unauthorised (admin token required)")
    )
)]
pub async fn list_models(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ModelResponse>>, ServerError> {
    let models = state.services.models.list().await?;
    Ok(Json(models.into_iter().map(ModelResponse::from).collect()))
}

#[utoipa::path(
    post,
    path = "/admin/models",
    tag = "admin",
    request_body = CreateModelRequest,
    responses(
        (status = 201, description = "Catalog entry created", body = ModelResponse),
        (status = 400, description = "Invalid request or duplicate name"),
        (status = 401, description = "Unauthorised (admin token required)")
    )
)]
pub async fn create_model(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateModelRequest>,
) -> Result<(StatusCode, Json<ModelResponse>), ServerError> {
    req.validate()?;
    let created = state.services.models.create(req.into_new_model()?).await?;
    Ok((StatusCode::CREATED, Json(created.into())))
}

#[utoipa::path(
    get,
    path = "/admin/models/{id}",
    tag = "admin",
    params(("id" = String, Path, description = "Model id")),
    responses(
        (status = 200, description = "Catalog entry", body = ModelResponse),
        (status = 404, description = "Model not found")
    )
)]
pub async fn get_model(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ModelResponse>, ServerError> {
    Ok(Json(state.services.models.get(&id).await?.into()))
}

#[utoipa::path(
    put,
    path = "/admin/models/{id}",
    tag = "admin",
    params(("id" = String, Path, description = "Model id")),
    request_body = UpdateModelRequest,
    responses(
        (status = 200, description = "Catalog entry updated", body = ModelResponse),
        (status = 400, description = "Empty or invalid update"),
        (status = 404, description = "Model not found")
    )
)]
pub async fn update_model(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateModelRequest>,
) -> Result<Json<ModelResponse>, ServerError> {
    req.validate()?;
    let patch = ModelPatch::from(req);
    Ok(Json(state.services.models.update(&id, &patch).await?.into()))
}

/// Permanently delete a model, its config and (best effort) the artifact on
/// the inference server.
#[utoipa::path(
    delete,
    path = "/admin/models/{id}",
    tag = "admin",
    params(("id" = String, Path, description = "Model id")),
    responses(
        (status = 204, description = "Model deleted"),
        (status = 404, description = "Model not found")
    )
)]
pub async fn delete_model(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ServerError> {
    state.services.models.hard_delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ── Lifecycle ─────────────────────────────────────────────────────────────────

#[utoipa::path(
    post,
    path = "/admin/models/{id}/default",
    tag = "admin",
    params(("id" = String, Path, description = "Model id")),
    responses(
        (status = 200, description = "Model is now the default", body = ModelResponse),
        (status = 400, description = "Model is not available"),
        (status = 404, description = "Model not found")
    )
)]
pub async fn set_default_model(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ModelResponse>, ServerError> {
    Ok(Json(state.services.models.set_default(&id).await?.into()))
}

/// Soft delete: the row stays, with status `removed`.
#[utoipa::path(
    post,
    path = "/admin/models/{id}/remove",
    tag = "admin",
    params(("id" = String, Path, description = "Model id")),
    responses(
        (status = 200, description = "Model marked removed", body = ModelResponse),
        (status = 400, description = "Model is not available"),
        (status = 404, description = "Model not found")
    )
)]
pub async fn remove_model(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ModelResponse>, ServerError> {
    Ok(Json(state.services.models.soft_delete(&id).await?.into()))
}

#[utoipa::path(
    post,
    path = "/admin/models/{id}/restore",
    tag = "admin",
    params(("id" = String, Path, description = "Model id")),
    responses(
        (status = 200, description = "Restore finished; status is `available` or `error`", body = ModelResponse),
        (status = 400, description = "Model is not removed"),
        (status = 404, description = "Model not found"),
        (status = 502, description = "Inference server unreachable")
    )
)]
pub async fn restore_model(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ModelResponse>, ServerError> {
    Ok(Json(state.services.models.restore(&id).await?.into()))
}

// ── Config ────────────────────────────────────────────────────────────────────

#[utoipa::path(
    get,
    path = "/admin/models/{id}/config",
    tag = "admin",
    params(("id" = String, Path, description = "Model id")),
    responses(
        (status = 200, description = "Generation parameters", body = ModelConfigResponse),
        (status = 404, description = "Model not found")
    )
)]
pub async fn get_model_config(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ModelConfigResponse>, ServerError> {
    Ok(Json(state.services.models.get_config(&id).await?.into()))
}

#[utoipa::path(
    put,
    path = "/admin/models/{id}/config",
    tag = "admin",
    params(("id" = String, Path, description = "Model id")),
    request_body = UpdateModelConfigRequest,
    responses(
        (status = 200, description = "Updated parameters", body = ModelConfigResponse),
        (status = 400, description = "Empty update or value out of range"),
        (status = 404, description = "Model not found")
    )
)]
pub async fn update_model_config(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateModelConfigRequest>,
) -> Result<Json<ModelConfigResponse>, ServerError> {
    let patch = ModelConfigPatch::from(req);
    Ok(Json(
        state.services.models.update_config(&id, &patch).await?.into(),
    ))
}

/// Restore the built-in generation defaults.
#[utoipa::path(
    delete,
    path = "/admin/models/{id}/config",
    tag = "admin",
    params(("id" = String, Path, description = "Model id")),
    responses(
        (status = 200, description = "Parameters reset", body = ModelConfigResponse),
        (status = 404, description = "Model not found")
    )
)]
pub async fn reset_model_config(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ModelConfigResponse>, ServerError> {
    Ok(Json(state.services.models.reset_config(&id).await?.into()))
}

// ── Sync & downloads ──────────────────────────────────────────────────────────

#[utoipa::path(
    post,
    path = "/admin/models/sync",
    tag = "admin",
    responses(
        (status = 200, description = "Catalog reconciled", body = SyncReportResponse),
        (status = 502, description = "Inference server unreachable")
    )
)]
pub async fn sync_models(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SyncReportResponse>, ServerError> {
    let report = state.services.sync.sync().await?;
    Ok(Json(report.into()))
}

/// Start pulling a model. Returns as soon as the request is recorded.
#[utoipa::path(
    post,
    path = "/admin/models/download",
    tag = "admin",
    request_body = DownloadModelRequest,
    responses(
        (status = 202, description = "Download started", body = DownloadTicketResponse),
        (status = 400, description = "Model already installed or downloading")
    )
)]
pub async fn download_model(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DownloadModelRequest>,
) -> Result<(StatusCode, Json<DownloadTicketResponse>), ServerError> {
    req.validate()?;
    let ticket = state
        .services
        .downloads
        .download(&req.name, req.display_name, req.description)
        .await?;
    info!(model_id = %ticket.id, name = %ticket.name, "download accepted");
    Ok((StatusCode::ACCEPTED, Json(ticket.into())))
}

#[utoipa::path(
    get,
    path = "/admin/models/{id}/download",
    tag = "admin",
    params(("id" = String, Path, description = "Model id")),
    responses(
        (status = 200, description = "Model status and progress", body = DownloadStatusResponse),
        (status = 404, description = "Model not found")
    )
)]
pub async fn get_download_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<DownloadStatusResponse>, ServerError> {
    let status = state.services.downloads.get_download_status(&id).await?;
    Ok(Json(status.into()))
}

#[utoipa::path(
    delete,
    path = "/admin/models/{id}/download",
    tag = "admin",
    params(("id" = String, Path, description = "Model id")),
    responses(
        (status = 200, description = "Download cancelled; model marked error", body = ModelResponse),
        (status = 400, description = "Model is not downloading"),
        (status = 404, description = "Model not found")
    )
)]
pub async fn cancel_download(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ModelResponse>, ServerError> {
    Ok(Json(state.services.downloads.cancel(&id).await?.into()))
}
