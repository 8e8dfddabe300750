use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
    Router,
};
use codemate_common::WebhookEnvelope;

use crate::webhook::signature::HEADER_ID;
use crate::webhook::{IdentityEvent, WebhookError};
use crate::AppState;

/// POST /webhooks/clerk - user lifecycle deliveries from the identity provider.
///
/// Answers 2xx only once the store mutation has completed; any error yields a
/// non-2xx status so the provider redelivers.
async fn clerk_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, WebhookError> {
    match &state.webhook_verifier {
        Some(verifier) => verifier.verify(&headers, &body)?,
        None if state.config.webhook.allow_unsigned => {
            tracing::warn!("Accepting unsigned webhook delivery");
        }
        None => return Err(WebhookError::NotConfigured),
    }

    let envelope: WebhookEnvelope = serde_json::from_slice(&body)
        .map_err(|e| WebhookError::MalformedEvent(e.to_string()))?;
    let event = IdentityEvent::from_envelope(envelope)?;

    let delivery_id = headers
        .get(HEADER_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();
    let kind = event.kind();
    let external_id = event.external_id().to_string();

    state.reconciler.dispatch(event).await?;

    tracing::info!(
        delivery_id = %delivery_id,
        kind = %kind,
        external_id = %external_id,
        "Webhook processed"
    );

    Ok(StatusCode::NO_CONTENT)
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/webhooks/clerk", post(clerk_webhook))
        .with_state(state)
}
