use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    message: &'static str,
    version: &'static str,
}

/// GET /health - healthy only while the user store answers.
async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    match state.store.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "healthy",
                message: "Application is running smoothly.",
                version: env!("CARGO_PKG_VERSION"),
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "Health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "unhealthy",
                    message: "Application or a dependency is experiencing issues.",
                    version: env!("CARGO_PKG_VERSION"),
                }),
            )
        }
    }
}

async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    let version = env!("CARGO_PKG_VERSION");
    let store_up = u8::from(state.store.ping().await.is_ok());
    let body = format!(
        "# HELP codemate_up Whether the service is up\n\
         # TYPE codemate_up gauge\n\
         codemate_up 1\n\
         # HELP codemate_store_up Whether the user store is reachable\n\
         # TYPE codemate_store_up gauge\n\
         codemate_store_up {}\n\
         # HELP codemate_info Service information\n\
         # TYPE codemate_info gauge\n\
         codemate_info{{version=\"{}\"}} 1\n",
        store_up, version
    );
    (StatusCode::OK, [(header::CONTENT_TYPE, "text/plain; charset=utf-8")], body).into_response()
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .with_state(state)
}
