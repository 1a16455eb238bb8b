//! Axum router construction.
//!
//! [`build`] assembles the complete application router, including:
//! - Middleware layers (CORS, per-request trace-ID injection)
//! - Optional Swagger UI / OpenAPI spec endpoint (disable with `HEARTH_ENABLE_SWAGGER=false`)
//! - Health / heartbeat route
//! - Chat-facing `/v1` routes
//! - admin `/admin` routes (optionally protected by bearer token)

mod admin;
pub mod doc;
mod health;
mod v1;

use crate::middleware::{cors, trace};
use crate::state::AppState;
use axum::{Router, middleware};
use std::sync::Arc;
use tower::ServiceBuilder;
use utoipa_swagger_ui::SwaggerUi;

/// Build the complete Axum [`Router`] for the application.
pub fn build(state: Arc<AppState>) -> Router {
    let mut app = Router::new()
        .merge(health::router())
        .nest("/v1", v1::router())
        .nest("/admin", admin::router(state.clone()));

    if state.config.enable_swagger {
        app = app.merge(
            SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", doc::get_docs()),
        );
    }

    app
        // Outermost layers execute first on the way in.
        .layer(ServiceBuilder::new().layer(cors::cors_layer(state.clone())))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            trace::trace_middleware,
        ))
        .with_state(state)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::Config;
    use crate::state::testing::{StubGateway, state_with, test_state};
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    async fn call(
        app: &Router,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let req = match body {
            Some(v) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(v.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();
        let resp = app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    #[tokio::test]
    async fn responses_carry_trace_id() {
        let app = build(test_state().await);
        let resp = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(resp.headers().contains_key(trace::X_TRACE_ID));
    }

    #[tokio::test]
    async fn admin_requires_token_when_configured() {
        let config = Config {
            admin_token: Some("s3cret".into()),
            ..Config::default()
        };
        let app = build(state_with(Arc::new(StubGateway::default()), config).await);

        let (status, _) = call(&app, "GET", "/admin/models", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let req = Request::get("/admin/models")
            .header(header::AUTHORIZATION, "Bearer s3cret")
            .body(Body::empty())
            .unwrap();
        assert_eq!(app.oneshot(req).await.unwrap().status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn model_crud_and_default_over_http() {
        let app = build(test_state().await);

        let (status, created) = call(
            &app,
            "POST",
            "/admin/models",
            Some(json!({ "name": "llama3" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["name"], "llama3:latest");
        let id = created["id"].as_str().unwrap().to_owned();

        let (status, _) = call(
            &app,
            "POST",
            "/admin/models",
            Some(json!({ "name": "llama3:latest" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, updated) = call(
            &app,
            "PUT",
            &format!("/admin/models/{id}"),
            Some(json!({ "description": "general chat" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["description"], "general chat");

        let (status, _) = call(&app, "PUT", &format!("/admin/models/{id}"), Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = call(&app, "POST", &format!("/admin/models/{id}/default"), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, default) = call(&app, "GET", "/v1/models/default", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(default["id"], id.as_str());

        let (status, _) = call(&app, "DELETE", &format!("/admin/models/{id}"), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = call(&app, "GET", &format!("/admin/models/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn validate_hides_why_model_is_unusable() {
        let app = build(test_state().await);
        call(
            &app,
            "POST",
            "/admin/models",
            Some(json!({ "name": "pending", "status": "downloading" })),
        )
        .await;

        let (status, body) = call(&app, "GET", "/v1/models/pending/validate", None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], "model unavailable");

        let (status, _) = call(&app, "GET", "/v1/models/unknown/validate", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn sync_then_remove_and_restore() {
        let gw = Arc::new(StubGateway::with_installed(&["mistral:latest"]));
        let app = build(state_with(gw, Config::default()).await);

        let (status, report) = call(&app, "POST", "/admin/models/sync", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report["created"], 1);

        let (_, models) = call(&app, "GET", "/v1/models", None).await;
        let id = models[0]["id"].as_str().unwrap().to_owned();

        let (_, removed) = call(&app, "POST", &format!("/admin/models/{id}/remove"), None).await;
        assert_eq!(removed["status"], "removed");
        let (_, restored) = call(&app, "POST", &format!("/admin/models/{id}/restore"), None).await;
        assert_eq!(restored["status"], "available");
    }

    #[tokio::test]
    async fn download_is_accepted_and_guarded() {
        let app = build(test_state().await);

        let (status, ticket) = call(
            &app,
            "POST",
            "/admin/models/download",
            Some(json!({ "name": "phi3" })),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(ticket["status"], "downloading");
        let id = ticket["id"].as_str().unwrap().to_owned();

        let mut last = Value::Null;
        for _ in 0..200 {
            let (_, status) = call(
                &app,
                "GET",
                &format!("/admin/models/{id}/download"),
                None,
            )
            .await;
            if status["model"]["status"] != "downloading" {
                last = status;
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        assert_eq!(last["model"]["status"], "available");

        let (status, _) = call(
            &app,
            "POST",
            "/admin/models/download",
            Some(json!({ "name": "phi3" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = call(
            &app,
            "POST",
            "/admin/models/download",
            Some(json!({ "name": "" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn config_endpoints_validate_and_reset() {
        let app = build(test_state().await);
        let (_, created) = call(
            &app,
            "POST",
            "/admin/models",
            Some(json!({ "name": "gemma2" })),
        )
        .await;
        let id = created["id"].as_str().unwrap().to_owned();
        let uri = format!("/admin/models/{id}/config");

        let (status, _) = call(&app, "PUT", &uri, Some(json!({ "temperature": 5.0 }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, config) = call(&app, "PUT", &uri, Some(json!({ "temperature": 0.1 }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(config["temperature"], 0.1);

        let (_, reset) = call(&app, "DELETE", &uri, None).await;
        assert_eq!(reset["temperature"], 0.7);
    }

    #[tokio::test]
    async fn library_falls_back_when_unreachable() {
        let app = build(test_state().await);
        let (status, body) = call(&app, "GET", "/admin/library", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["models"].as_array().is_some_and(|m| !m.is_empty()));

        let (_, info) = call(&app, "GET", "/admin/library/cache", None).await;
        assert_eq!(info["size"], 0);
        assert_eq!(info["expired"], true);
    }
}
