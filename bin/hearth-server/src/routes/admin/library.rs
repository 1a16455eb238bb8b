//! Downloadable-model listing backed by the availability cache.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::schemas::admin::library::{CacheInfoResponse, LibraryResponse};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(list_library, refresh_library, library_cache_info),
    components(schemas(LibraryResponse, CacheInfoResponse))
)]
pub struct LibraryApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/library", get(list_library))
        .route("/library/refresh", post(refresh_library))
        .route("/library/cache", get(library_cache_info))
}

/// Library models that are not in the catalog yet. Serves a stale or
/// built-in list when the library cannot be reached.
#[utoipa::path(
    get,
    path = "/admin/library",
    tag = "admin",
    responses(
        (status = 200, description = "Installable model names", body = LibraryResponse),
        (status = 401, description = "Unauthorised (admin token required)")
    )
)]
pub async fn list_library(
    State(state): State<Arc<AppState>>,
) -> Result<Json<LibraryResponse>, ServerError> {
    let models = state.services.library.get_available().await?;
    Ok(Json(LibraryResponse { models }))
}

#[utoipa::path(
    post,
    path = "/admin/library/refresh",
    tag = "admin",
    responses(
        (status = 200, description = "Listing refetched", body = LibraryResponse),
        (status = 401, description = "Unauthorised (admin token required)")
    )
)]
pub async fn refresh_library(
    State(state): State<Arc<AppState>>,
) -> Result<Json<LibraryResponse>, ServerError> {
    let models = state.services.library.refresh().await?;
    Ok(Json(LibraryResponse { models }))
}

#[utoipa::path(
    get,
    path = "/admin/library/cache",
    tag = "admin",
    responses(
        (status = 200, description = "Cache size, age and TTL", body = CacheInfoResponse),
        (status = 401, description = "Unauthorised (admin token required)")
    )
)]
pub async fn library_cache_info(State(state): State<Arc<AppState>>) -> Json<CacheInfoResponse> {
    Json(state.services.library.cache_info().await.into())
}
