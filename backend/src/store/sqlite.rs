use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{StoreError, UpsertOutcome, UserStore};
use crate::models::user::{NewUser, User};

/// SQLite-backed user store.
///
/// A single connection guarded by a mutex; writes are applied in the order
/// the lock is acquired, so the last write for a key wins.
///
/// Queries run synchronously on the calling tokio worker while the lock is
/// held. Each statement is a single-row lookup or write against a local file,
/// which stays well below the latency that would call for `spawn_blocking`
/// at webhook and session-lookup volumes.
pub struct SqliteUserStore {
    conn: Mutex<Connection>,
}

impl SqliteUserStore {
    pub fn new(database_url: &str) -> Result<Self, StoreError> {
        // Parse sqlite: prefix if present
        let path = database_url.strip_prefix("sqlite:").unwrap_or(database_url);

        let conn = if path == ":memory:" {
            Connection::open_in_memory().map_err(db_err)?
        } else {
            // Create parent directories if needed
            if let Some(parent) = Path::new(path).parent() {
                std::fs::create_dir_all(parent).map_err(|e| StoreError::Io(e.to_string()))?;
            }
            Connection::open(path).map_err(db_err)?
        };

        conn.execute(
            "CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                external_id TEXT NOT NULL UNIQUE,
                email TEXT NOT NULL,
                display_name TEXT NOT NULL DEFAULT '',
                profile_image_url TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )
        .map_err(db_err)?;

        tracing::info!("User store initialized with database: {}", path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|e| StoreError::Database(e.to_string()))
    }
}

#[async_trait]
impl UserStore for SqliteUserStore {
    async fn upsert_by_external_id(&self, user: &NewUser) -> Result<UpsertOutcome, StoreError> {
        let conn = self.lock()?;
        let now = Utc::now().to_rfc3339();

        let exists = conn
            .query_row(
                "SELECT 1 FROM users WHERE external_id = ?1",
                params![user.external_id],
                |_| Ok(()),
            )
            .optional()
            .map_err(db_err)?
            .is_some();

        let result = conn.execute(
            "INSERT INTO users (id, external_id, email, display_name, profile_image_url, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
             ON CONFLICT(external_id) DO UPDATE SET
                email = excluded.email,
                display_name = excluded.display_name,
                profile_image_url = excluded.profile_image_url,
                updated_at = excluded.updated_at",
            params![
                uuid::Uuid::new_v4().to_string(),
                user.external_id,
                user.email,
                user.display_name,
                user.profile_image_url,
                now,
            ],
        );

        match result {
            Ok(_) if exists => {
                tracing::debug!(external_id = %user.external_id, "Updated user");
                Ok(UpsertOutcome::Updated)
            }
            Ok(_) => {
                tracing::info!(external_id = %user.external_id, email = %user.email, "Created user");
                Ok(UpsertOutcome::Inserted)
            }
            Err(e) if is_unique_violation(&e) => {
                tracing::debug!(external_id = %user.external_id, "User already present");
                Ok(UpsertOutcome::AlreadyPresent)
            }
            Err(e) => Err(db_err(e)),
        }
    }

    async fn delete_by_external_id(&self, external_id: &str) -> Result<bool, StoreError> {
        let conn = self.lock()?;

        let removed = conn
            .execute("DELETE FROM users WHERE external_id = ?1", params![external_id])
            .map_err(db_err)?;

        if removed > 0 {
            tracing::info!(external_id = %external_id, "Deleted user");
        }
        Ok(removed > 0)
    }

    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<User>, StoreError> {
        let conn = self.lock()?;

        conn.query_row(
            "SELECT id, external_id, email, display_name, profile_image_url, created_at, updated_at
             FROM users WHERE external_id = ?1",
            params![external_id],
            row_to_user,
        )
        .optional()
        .map_err(db_err)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.query_row("SELECT 1", [], |_| Ok(())).map_err(db_err)
    }
}

fn row_to_user(row: &Row<'_>) -> rusqlite::Result<User> {
    let created_at: String = row.get(5)?;
    let updated_at: String = row.get(6)?;
    Ok(User {
        id: row.get(0)?,
        external_id: row.get(1)?,
        email: row.get(2)?,
        display_name: row.get(3)?,
        profile_image_url: row.get(4)?,
        created_at: parse_timestamp(5, &created_at)?,
        updated_at: parse_timestamp(6, &updated_at)?,
    })
}

fn parse_timestamp(column: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(e)))
}

/// True only for UNIQUE / PRIMARY KEY conflicts; NOT NULL, CHECK and other
/// constraint failures are real errors.
fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
    )
}

fn db_err(e: rusqlite::Error) -> StoreError {
    StoreError::Database(e.to_string())
}
