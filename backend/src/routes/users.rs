use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::get,
    Json, Router,
};

use crate::models::user::User;
use crate::AppState;

/// GET /api/me - the synced record of the signed-in user.
async fn me(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<User>, (StatusCode, String)> {
    let jwks_client = state
        .jwks_client
        .as_ref()
        .ok_or((StatusCode::SERVICE_UNAVAILABLE, "Authentication not configured".to_string()))?;

    let auth_user = jwks_client.authenticate(&headers).await.map_err(|e| {
        tracing::debug!(error = %e, "Rejected session token");
        (StatusCode::UNAUTHORIZED, "Unauthorized".to_string())
    })?;

    let user = state
        .store
        .find_by_external_id(&auth_user.sub)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "User lookup failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal error".to_string())
        })?;

    // The created event may not have arrived yet
    user.map(Json)
        .ok_or((StatusCode::NOT_FOUND, "User not synced yet".to_string()))
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/me", get(me))
        .with_state(state)
}
