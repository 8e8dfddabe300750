pub mod auth;
pub mod config;
pub mod logging;
pub mod models;
pub mod routes;
pub mod store;
pub mod sync;
pub mod test_util;
pub mod webhook;

pub use auth::{AuthUser, JwksClient};
pub use config::Config;
pub use models::user::{NewUser, User};
pub use store::{SqliteUserStore, StoreError, UpsertOutcome, UserStore};
pub use sync::{ChatDirectory, Reconciler, SyncError};
pub use webhook::{IdentityEvent, WebhookError, WebhookVerifier};

use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn UserStore>,
    pub reconciler: Reconciler,
    /// Absent when no signing secret is configured.
    pub webhook_verifier: Option<WebhookVerifier>,
    /// Absent when no OIDC issuer is configured.
    pub jwks_client: Option<JwksClient>,
}
