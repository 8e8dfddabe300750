//! Persistent user store keyed by identity-provider ID.

pub mod sqlite;

use async_trait::async_trait;

use crate::models::user::{NewUser, User};

pub use sqlite::SqliteUserStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),
    #[error("IO error: {0}")]
    Io(String),
}

/// What an upsert did to the stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    /// An existing record was overwritten with the new field values.
    Updated,
    /// Defensive: a unique-constraint conflict the upsert did not absorb.
    /// The single-connection SQLite store never produces it.
    AlreadyPresent,
}

/// Durable keyed storage for user records.
///
/// Implementations must be safe to share across concurrently running
/// requests. Absence is never an error: lookups return `None` and deletes
/// return `false`.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert the record, or overwrite the fields of the one with the same
    /// external ID. Never fails with a duplicate-key error.
    async fn upsert_by_external_id(&self, user: &NewUser) -> Result<UpsertOutcome, StoreError>;

    /// Remove the record with this external ID. Returns whether one existed.
    async fn delete_by_external_id(&self, external_id: &str) -> Result<bool, StoreError>;

    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<User>, StoreError>;

    /// Cheap round-trip to the storage backend, used by health checks.
    async fn ping(&self) -> Result<(), StoreError>;
}
