//! Reconciliation of identity-provider lifecycle events into the user store.
//!
//! Deliveries are at-least-once and unordered, so both handlers are
//! idempotent: a repeated `created` overwrites the record with the latest
//! values, and a `deleted` for an unknown user is a no-op.

pub mod chat;

use std::sync::Arc;

use codemate_common::{UserCreatedData, UserDeletedData};

use crate::models::user::NewUser;
use crate::store::{StoreError, UserStore};
use crate::webhook::IdentityEvent;

pub use chat::{ChatDirectory, ChatSyncError};

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Malformed event: {0}")]
    MalformedEvent(String),
    #[error("Persistence failure: {0}")]
    PersistenceFailure(#[from] StoreError),
}

/// Applies user lifecycle events to the store.
pub struct Reconciler {
    store: Arc<dyn UserStore>,
    chat: Option<Arc<dyn ChatDirectory>>,
}

impl Reconciler {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store, chat: None }
    }

    /// Attach a chat directory to be notified after each successful mutation.
    pub fn with_chat_directory(mut self, chat: Arc<dyn ChatDirectory>) -> Self {
        self.chat = Some(chat);
        self
    }

    /// Route a decoded event to its handler.
    pub async fn dispatch(&self, event: IdentityEvent) -> Result<(), SyncError> {
        match event {
            IdentityEvent::Created(data) => self.on_user_created(&data).await,
            IdentityEvent::Deleted(data) => self.on_user_deleted(&data).await,
        }
    }

    pub async fn on_user_created(&self, data: &UserCreatedData) -> Result<(), SyncError> {
        let user = user_from_created(data)?;

        let outcome = self.store.upsert_by_external_id(&user).await?;
        tracing::info!(external_id = %user.external_id, outcome = ?outcome, "Synced user.created");

        if let Some(chat) = &self.chat {
            if let Err(e) = chat.upsert_user(&user).await {
                tracing::warn!(external_id = %user.external_id, error = %e, "Chat directory upsert failed");
            }
        }

        Ok(())
    }

    pub async fn on_user_deleted(&self, data: &UserDeletedData) -> Result<(), SyncError> {
        let external_id = data.id.trim();
        if external_id.is_empty() {
            return Err(SyncError::MalformedEvent("missing user id".to_string()));
        }

        let removed = self.store.delete_by_external_id(external_id).await?;
        if removed {
            tracing::info!(external_id = %external_id, "Synced user.deleted");
        } else {
            tracing::debug!(external_id = %external_id, "user.deleted for unknown user, nothing to remove");
        }

        if let Some(chat) = &self.chat {
            if let Err(e) = chat.delete_user(external_id).await {
                tracing::warn!(external_id = %external_id, error = %e, "Chat directory delete failed");
            }
        }

        Ok(())
    }
}

/// Validate a `user.created` payload and derive the record to store.
pub fn user_from_created(data: &UserCreatedData) -> Result<NewUser, SyncError> {
    let external_id = data.id.trim();
    if external_id.is_empty() {
        return Err(SyncError::MalformedEvent("missing user id".to_string()));
    }

    let email = data
        .email_addresses
        .first()
        .map(|e| e.email_address.trim())
        .filter(|e| !e.is_empty())
        .ok_or_else(|| SyncError::MalformedEvent("no email address".to_string()))?;

    let profile_image_url = data
        .image_url
        .as_deref()
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .map(String::from);

    Ok(NewUser {
        external_id: external_id.to_string(),
        email: email.to_string(),
        display_name: display_name(data.first_name.as_deref(), data.last_name.as_deref()),
        profile_image_url,
    })
}

/// Join given and family name with a single space, trimmed.
pub fn display_name(first_name: Option<&str>, last_name: Option<&str>) -> String {
    format!("{} {}", first_name.unwrap_or(""), last_name.unwrap_or(""))
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteUserStore;
    use crate::test_util::{created_data, deleted_data, FailingStore, RecordingChat};
    use rstest::rstest;

    fn reconciler() -> (Reconciler, Arc<dyn UserStore>) {
        let store: Arc<dyn UserStore> = Arc::new(SqliteUserStore::new(":memory:").unwrap());
        (Reconciler::new(store.clone()), store)
    }

    #[rstest]
    #[case(Some("Ada"), Some(""), "Ada")]
    #[case(Some(""), Some(""), "")]
    #[case(None, None, "")]
    #[case(Some("A"), Some("B"), "A B")]
    #[case(None, Some("Lovelace"), "Lovelace")]
    #[case(Some("  Ada "), Some("Lovelace  "), "Ada  Lovelace")]
    fn test_display_name(#[case] first: Option<&str>, #[case] last: Option<&str>, #[case] expected: &str) {
        assert_eq!(display_name(first, last), expected);
    }

    #[test]
    fn test_user_from_created_uses_first_email() {
        let mut data = created_data("u1", &["first@x.com", "second@x.com"], Some("A"), Some("B"));
        data.image_url = Some("https://img.example.com/u1.png".to_string());

        let user = user_from_created(&data).unwrap();
        assert_eq!(user.external_id, "u1");
        assert_eq!(user.email, "first@x.com");
        assert_eq!(user.display_name, "A B");
        assert_eq!(user.profile_image_url.as_deref(), Some("https://img.example.com/u1.png"));
    }

    #[test]
    fn test_user_from_created_empty_image_is_none() {
        let mut data = created_data("u1", &["a@x.com"], None, None);
        data.image_url = Some(String::new());
        assert!(user_from_created(&data).unwrap().profile_image_url.is_none());
    }

    #[rstest]
    #[case(created_data("", &["a@x.com"], None, None))]
    #[case(created_data("   ", &["a@x.com"], None, None))]
    #[case(created_data("u1", &[], None, None))]
    #[case(created_data("u1", &[""], None, None))]
    fn test_user_from_created_rejects_malformed(#[case] data: UserCreatedData) {
        assert!(matches!(user_from_created(&data), Err(SyncError::MalformedEvent(_))));
    }

    #[tokio::test]
    async fn test_created_twice_yields_one_identical_record() {
        let (reconciler, store) = reconciler();
        let data = created_data("u1", &["a@x.com"], Some("A"), Some("B"));

        reconciler.on_user_created(&data).await.unwrap();
        let once = store.find_by_external_id("u1").await.unwrap().unwrap();

        reconciler.on_user_created(&data).await.unwrap();
        let twice = store.find_by_external_id("u1").await.unwrap().unwrap();

        assert_eq!(once.id, twice.id);
        assert_eq!(once.email, twice.email);
        assert_eq!(once.display_name, twice.display_name);
        assert_eq!(once.profile_image_url, twice.profile_image_url);
    }

    #[tokio::test]
    async fn test_created_with_changed_email_overwrites() {
        let (reconciler, store) = reconciler();

        reconciler
            .on_user_created(&created_data("u1", &["old@x.com"], None, None))
            .await
            .unwrap();
        reconciler
            .on_user_created(&created_data("u1", &["new@x.com"], Some("New"), None))
            .await
            .unwrap();

        let user = store.find_by_external_id("u1").await.unwrap().unwrap();
        assert_eq!(user.email, "new@x.com");
        assert_eq!(user.display_name, "New");
    }

    #[tokio::test]
    async fn test_deleted_for_absent_user_succeeds() {
        let (reconciler, store) = reconciler();
        reconciler
            .on_user_created(&created_data("other", &["o@x.com"], None, None))
            .await
            .unwrap();

        reconciler.on_user_deleted(&deleted_data("ghost")).await.unwrap();

        assert!(store.find_by_external_id("ghost").await.unwrap().is_none());
        assert!(store.find_by_external_id("other").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_deleted_with_empty_id_is_malformed() {
        let (reconciler, _) = reconciler();
        let result = reconciler.on_user_deleted(&deleted_data("")).await;
        assert!(matches!(result, Err(SyncError::MalformedEvent(_))));
    }

    #[tokio::test]
    async fn test_malformed_created_does_not_touch_store() {
        let store = Arc::new(FailingStore::default());
        let reconciler = Reconciler::new(store.clone());

        let result = reconciler
            .on_user_created(&created_data("u1", &[], Some("A"), None))
            .await;

        assert!(matches!(result, Err(SyncError::MalformedEvent(_))));
        assert_eq!(store.calls(), 0);
    }

    #[tokio::test]
    async fn test_scenario_create_delete_delete() {
        let (reconciler, store) = reconciler();

        reconciler
            .dispatch(IdentityEvent::Created(created_data("u1", &["a@x.com"], Some("A"), Some("B"))))
            .await
            .unwrap();
        let user = store.find_by_external_id("u1").await.unwrap().unwrap();
        assert_eq!(user.email, "a@x.com");
        assert_eq!(user.display_name, "A B");

        reconciler.dispatch(IdentityEvent::Deleted(deleted_data("u1"))).await.unwrap();
        assert!(store.find_by_external_id("u1").await.unwrap().is_none());

        reconciler.dispatch(IdentityEvent::Deleted(deleted_data("u1"))).await.unwrap();
        assert!(store.find_by_external_id("u1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_deleted_before_created_then_created_leaves_record() {
        let (reconciler, store) = reconciler();

        reconciler.on_user_deleted(&deleted_data("u1")).await.unwrap();
        reconciler
            .on_user_created(&created_data("u1", &["a@x.com"], None, None))
            .await
            .unwrap();

        assert!(store.find_by_external_id("u1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_store_failure_is_persistence_failure() {
        let reconciler = Reconciler::new(Arc::new(FailingStore::default()));

        let created = reconciler
            .on_user_created(&created_data("u1", &["a@x.com"], None, None))
            .await;
        assert!(matches!(created, Err(SyncError::PersistenceFailure(_))));

        let deleted = reconciler.on_user_deleted(&deleted_data("u1")).await;
        assert!(matches!(deleted, Err(SyncError::PersistenceFailure(_))));
    }

    #[tokio::test]
    async fn test_chat_failure_does_not_fail_reconciliation() {
        let (reconciler, store) = reconciler();
        let chat = Arc::new(RecordingChat::failing());
        let reconciler = reconciler.with_chat_directory(chat.clone());

        reconciler
            .on_user_created(&created_data("u1", &["a@x.com"], None, None))
            .await
            .unwrap();
        assert!(store.find_by_external_id("u1").await.unwrap().is_some());

        reconciler.on_user_deleted(&deleted_data("u1")).await.unwrap();
        assert!(store.find_by_external_id("u1").await.unwrap().is_none());

        assert_eq!(chat.upserts(), vec!["u1".to_string()]);
        assert_eq!(chat.deletes(), vec!["u1".to_string()]);
    }

    #[tokio::test]
    async fn test_chat_not_called_when_store_fails() {
        let chat = Arc::new(RecordingChat::default());
        let reconciler =
            Reconciler::new(Arc::new(FailingStore::default())).with_chat_directory(chat.clone());

        let _ = reconciler
            .on_user_created(&created_data("u1", &["a@x.com"], None, None))
            .await;

        assert!(chat.upserts().is_empty());
    }
}
