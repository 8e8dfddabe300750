use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;

use crate::webhook::signature::HEADER_ID;

/// Middleware that logs HTTP requests at INFO level.
///
/// Webhook deliveries also carry the provider's delivery ID so redeliveries
/// of the same message can be correlated.
pub async fn request_logger(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let delivery_id = request
        .headers()
        .get(HEADER_ID)
        .and_then(|v| v.to_str().ok())
        .map(String::from);

    let response = next.run(request).await;

    let status = response.status().as_u16();
    let duration_ms = start.elapsed().as_millis();

    match delivery_id {
        Some(delivery_id) => tracing::info!(
            method = %method,
            path = %path,
            status = status,
            duration_ms = %duration_ms,
            delivery_id = %delivery_id,
            "HTTP request"
        ),
        None => tracing::info!(
            method = %method,
            path = %path,
            status = status,
            duration_ms = %duration_ms,
            "HTTP request"
        ),
    }

    response
}
