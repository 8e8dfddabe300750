use chrono::{DateTime, Utc};
use serde::Serialize;

/// Local mirror of an identity-provider user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    /// Local row ID, stable across re-synced events
    pub id: String,
    /// User ID issued by the identity provider
    pub external_id: String,
    /// First email address from the provider payload
    pub email: String,
    /// Given and family name, trimmed; may be empty
    pub display_name: String,
    pub profile_image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields written by an upsert. Timestamps and the local ID are owned by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub external_id: String,
    pub email: String,
    pub display_name: String,
    pub profile_image_url: Option<String>,
}
