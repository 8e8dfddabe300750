//! Inbound identity-provider webhooks: signature checks and event decoding.

pub mod signature;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use codemate_common::{UserCreatedData, UserDeletedData, WebhookEnvelope};
use serde_json::json;

use crate::sync::SyncError;

pub use signature::WebhookVerifier;

/// A user lifecycle event, decoded from the envelope's event-kind string.
#[derive(Debug, Clone)]
pub enum IdentityEvent {
    Created(UserCreatedData),
    Deleted(UserDeletedData),
}

impl IdentityEvent {
    /// Decode an envelope. Unknown kinds are rejected, not ignored.
    pub fn from_envelope(envelope: WebhookEnvelope) -> Result<Self, WebhookError> {
        match envelope.event_type.as_str() {
            "user.created" | "clerk/user.created" => serde_json::from_value(envelope.data)
                .map(IdentityEvent::Created)
                .map_err(|e| WebhookError::MalformedEvent(e.to_string())),
            "user.deleted" | "clerk/user.deleted" => serde_json::from_value(envelope.data)
                .map(IdentityEvent::Deleted)
                .map_err(|e| WebhookError::MalformedEvent(e.to_string())),
            other => Err(WebhookError::UnsupportedEvent(other.to_string())),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            IdentityEvent::Created(_) => "user.created",
            IdentityEvent::Deleted(_) => "user.deleted",
        }
    }

    pub fn external_id(&self) -> &str {
        match self {
            IdentityEvent::Created(data) => &data.id,
            IdentityEvent::Deleted(data) => &data.id,
        }
    }
}

/// Errors surfaced by the webhook endpoint.
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("Missing header: {0}")]
    MissingHeader(&'static str),
    #[error("Invalid signature timestamp")]
    InvalidTimestamp,
    #[error("Signature timestamp outside tolerance")]
    TimestampOutOfTolerance,
    #[error("No matching signature")]
    InvalidSignature,
    #[error("Signing secret is not valid base64")]
    InvalidSecret,
    #[error("Webhook signing secret not configured")]
    NotConfigured,
    #[error("Unsupported event type: {0}")]
    UnsupportedEvent(String),
    #[error("Malformed event: {0}")]
    MalformedEvent(String),
    #[error(transparent)]
    Sync(#[from] SyncError),
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            WebhookError::MissingHeader(_)
            | WebhookError::InvalidTimestamp
            | WebhookError::TimestampOutOfTolerance
            | WebhookError::InvalidSignature => {
                (StatusCode::UNAUTHORIZED, "invalid_signature", "Webhook verification failed")
            }
            WebhookError::InvalidSecret | WebhookError::NotConfigured => {
                (StatusCode::SERVICE_UNAVAILABLE, "not_configured", "Webhook endpoint unavailable")
            }
            WebhookError::UnsupportedEvent(_) => {
                (StatusCode::BAD_REQUEST, "unsupported_event", "Unsupported event type")
            }
            WebhookError::MalformedEvent(_) | WebhookError::Sync(SyncError::MalformedEvent(_)) => {
                (StatusCode::BAD_REQUEST, "malformed_event", "Malformed event payload")
            }
            WebhookError::Sync(SyncError::PersistenceFailure(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "persistence_failure", "Failed to process event")
            }
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "Webhook processing failed");
        } else {
            tracing::warn!(error = %self, "Webhook rejected");
        }

        let body = Json(json!({
            "error": {
                "type": error_type,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
