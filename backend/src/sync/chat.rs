//! Optional chat-service collaborator notified after the store changes.

use async_trait::async_trait;

use crate::models::user::NewUser;

#[derive(Debug, thiserror::Error)]
pub enum ChatSyncError {
    #[error("Chat service unavailable: {0}")]
    Unavailable(String),
    #[error("Chat service rejected request: {0}")]
    Rejected(String),
}

/// A downstream directory (e.g. a chat provider) that mirrors users too.
///
/// Calls are best-effort: a failure is logged by the caller and never undoes
/// the local store mutation.
#[async_trait]
pub trait ChatDirectory: Send + Sync {
    async fn upsert_user(&self, user: &NewUser) -> Result<(), ChatSyncError>;
    async fn delete_user(&self, external_id: &str) -> Result<(), ChatSyncError>;
}
