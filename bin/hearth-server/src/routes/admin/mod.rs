pub mod library;
pub mod models;

use crate::middleware::auth;
use crate::state::AppState;

use axum::{Router, middleware};
use std::sync::Arc;
use utoipa::OpenApi;

/// Routes nested under `/admin` (models, library), behind the admin token.
pub fn router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .merge(models::router())
        .merge(library::router())
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::admin_auth))
        .with_state(state)
}

#[derive(OpenApi)]
#[openapi()]
pub struct AdminApi;

pub fn api_docs() -> utoipa::openapi::OpenApi {
    let mut spec = AdminApi::openapi();
    spec.merge(models::ModelsAdminApi::openapi());
    spec.merge(library::LibraryApi::openapi());
    spec
}
