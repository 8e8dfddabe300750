//! Fixtures shared by unit and integration tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::http::HeaderMap;
use chrono::{Duration, Utc};
use codemate_common::{EmailAddress, UserCreatedData, UserDeletedData};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};

use crate::config::{Config, CorsConfig, DatabaseConfig, LoggingConfig, WebConfig, WebhookConfig};
use crate::models::user::{NewUser, User};
use crate::store::{SqliteUserStore, StoreError, UpsertOutcome, UserStore};
use crate::sync::{ChatDirectory, ChatSyncError, Reconciler};
use crate::webhook::signature::{HEADER_ID, HEADER_SIGNATURE, HEADER_TIMESTAMP};
use crate::webhook::WebhookVerifier;
use crate::AppState;

pub const TEST_SIGNING_SECRET: &str = "whsec_MfKQ9r8GKYqrTwjUPD8ILPZIo2LaLaSw";

pub fn test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 5000,
        environment: "test".to_string(),
        database: DatabaseConfig {
            url: "sqlite::memory:".to_string(),
        },
        logging: LoggingConfig {
            level: "debug".to_string(),
        },
        cors: CorsConfig { origins: "*".to_string() },
        webhook: WebhookConfig {
            signing_secret: Some(TEST_SIGNING_SECRET.to_string()),
            ..WebhookConfig::default()
        },
        oidc: None,
        web: WebConfig {
            static_dir: "/nonexistent/web/dist".to_string(),
        },
    }
}

/// State with an in-memory store and the test signing secret.
pub fn create_test_state() -> AppState {
    let store: Arc<dyn UserStore> =
        Arc::new(SqliteUserStore::new(":memory:").expect("in-memory store"));
    create_test_state_with_store(store)
}

pub fn create_test_state_with_store(store: Arc<dyn UserStore>) -> AppState {
    let config = test_config();
    let webhook_verifier = config
        .webhook
        .signing_secret
        .as_deref()
        .map(|secret| WebhookVerifier::new(secret, config.webhook.tolerance_secs).expect("test secret"));

    AppState {
        reconciler: Reconciler::new(store.clone()),
        store,
        webhook_verifier,
        jwks_client: None,
        config,
    }
}

/// Svix headers signing `body` with the test secret at the current time.
pub fn signed_headers(msg_id: &str, body: &[u8]) -> HeaderMap {
    let verifier = WebhookVerifier::new(TEST_SIGNING_SECRET, 300).expect("test secret");
    let timestamp = Utc::now().timestamp();

    let mut headers = HeaderMap::new();
    headers.insert(HEADER_ID, msg_id.parse().expect("header value"));
    headers.insert(HEADER_TIMESTAMP, timestamp.to_string().parse().expect("header value"));
    headers.insert(
        HEADER_SIGNATURE,
        verifier.sign(msg_id, timestamp, body).parse().expect("header value"),
    );
    headers
}

pub fn created_data(
    id: &str,
    emails: &[&str],
    first_name: Option<&str>,
    last_name: Option<&str>,
) -> UserCreatedData {
    UserCreatedData {
        id: id.to_string(),
        email_addresses: emails.iter().map(|e| EmailAddress::new(*e)).collect(),
        first_name: first_name.map(String::from),
        last_name: last_name.map(String::from),
        image_url: None,
    }
}

pub fn deleted_data(id: &str) -> UserDeletedData {
    UserDeletedData {
        id: id.to_string(),
        deleted: Some(true),
        object: Some("user".to_string()),
    }
}

/// A store whose every operation fails, as when the database is unreachable.
#[derive(Default)]
pub struct FailingStore {
    calls: AtomicUsize,
}

impl FailingStore {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn fail<T>(&self) -> Result<T, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(StoreError::Database("database is locked".to_string()))
    }
}

#[async_trait]
impl UserStore for FailingStore {
    async fn upsert_by_external_id(&self, _user: &NewUser) -> Result<UpsertOutcome, StoreError> {
        self.fail()
    }

    async fn delete_by_external_id(&self, _external_id: &str) -> Result<bool, StoreError> {
        self.fail()
    }

    async fn find_by_external_id(&self, _external_id: &str) -> Result<Option<User>, StoreError> {
        self.fail()
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.fail()
    }
}

/// Chat directory that records calls and optionally fails them.
#[derive(Default)]
pub struct RecordingChat {
    fail: bool,
    upserts: Mutex<Vec<String>>,
    deletes: Mutex<Vec<String>>,
}

impl RecordingChat {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn upserts(&self) -> Vec<String> {
        self.upserts.lock().map(|v| v.clone()).unwrap_or_default()
    }

    pub fn deletes(&self) -> Vec<String> {
        self.deletes.lock().map(|v| v.clone()).unwrap_or_default()
    }

    fn result(&self) -> Result<(), ChatSyncError> {
        if self.fail {
            Err(ChatSyncError::Unavailable("connection refused".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ChatDirectory for RecordingChat {
    async fn upsert_user(&self, user: &NewUser) -> Result<(), ChatSyncError> {
        if let Ok(mut upserts) = self.upserts.lock() {
            upserts.push(user.external_id.clone());
        }
        self.result()
    }

    async fn delete_user(&self, external_id: &str) -> Result<(), ChatSyncError> {
        if let Ok(mut deletes) = self.deletes.lock() {
            deletes.push(external_id.to_string());
        }
        self.result()
    }
}

#[derive(serde::Serialize)]
struct TestClaims {
    sub: String,
    email: Option<String>,
    sid: String,
    iss: String,
    exp: u64,
    iat: u64,
}

pub fn generate_test_jwt(
    user_id: &str,
    email: Option<&str>,
    issuer: &str,
    kid: &str,
    signing_key: &EncodingKey,
) -> String {
    let now = Utc::now();
    let claims = TestClaims {
        sub: user_id.to_string(),
        email: email.map(String::from),
        sid: "sess_test".to_string(),
        iss: issuer.to_string(),
        exp: (now + Duration::hours(1)).timestamp() as u64,
        iat: now.timestamp() as u64,
    };

    let header = Header {
        alg: Algorithm::RS256,
        kid: Some(kid.to_string()),
        ..Default::default()
    };

    encode(&header, &claims, signing_key).expect("Failed to encode JWT")
}
