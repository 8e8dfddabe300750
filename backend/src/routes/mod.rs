pub mod health;
pub mod users;
pub mod webhooks;

use std::path::Path;
use std::sync::Arc;

use axum::http::HeaderValue;
use axum::{middleware, Router};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use crate::logging::request_logger;
use crate::AppState;

/// Build the full application router.
pub fn app(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.cors.origins);

    let mut app = Router::new()
        .merge(health::router(state.clone()))
        .merge(webhooks::router(state.clone()))
        .merge(users::router(state.clone()));

    // Serve the web client if it has been built, with index.html as the
    // fallback for client-side routes
    let static_dir = Path::new(&state.config.web.static_dir);
    if static_dir.is_dir() {
        tracing::info!("Serving static files from {}", static_dir.display());
        let index = ServeFile::new(static_dir.join("index.html"));
        app = app.fallback_service(ServeDir::new(static_dir).fallback(index));
    } else {
        tracing::info!(
            "No web build found at {}, static assets will not be served",
            static_dir.display()
        );
    }

    app.layer(middleware::from_fn(request_logger))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(origins: &str) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if origins.trim() == "*" {
        return layer.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .filter_map(|o| match o.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", o);
                None
            }
        })
        .collect();

    layer.allow_origin(AllowOrigin::list(allowed))
}
