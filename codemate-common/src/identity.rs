//! Identity-provider webhook payloads (Clerk user events).

use serde::{Deserialize, Serialize};

/// Outer envelope of every webhook delivery.
///
/// `event_type` is the event-kind string (e.g. `user.created`); `data` is kept
/// as raw JSON until the kind is known.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEnvelope {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<String>,
    /// Provider-side emission time in milliseconds since the epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

/// Data of a `user.created` event.
///
/// Required fields default to empty so that an incomplete payload decodes and
/// can be rejected with a precise reason by the consumer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserCreatedData {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub email_addresses: Vec<EmailAddress>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmailAddress {
    #[serde(default)]
    pub email_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// Data of a `user.deleted` event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserDeletedData {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<String>,
}

impl EmailAddress {
    pub fn new(email_address: impl Into<String>) -> Self {
        Self {
            email_address: email_address.into(),
            id: None,
        }
    }
}
