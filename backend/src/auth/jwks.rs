use std::collections::HashMap;
use std::time::{Duration, Instant};

use axum::http::HeaderMap;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// Identity extracted from a provider-issued session token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// Provider user ID; matches `User::external_id` once synced.
    pub sub: String,
    pub email: Option<String>,
    /// Session ID, when the provider includes one.
    pub session_id: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Missing Authorization header")]
    MissingHeader,
    #[error("Invalid Authorization header format")]
    InvalidFormat,
    #[error("Invalid token: {0}")]
    InvalidToken(String),
    #[error("JWKS fetch error: {0}")]
    JwksFetchError(String),
    #[error("Key not found for kid: {0}")]
    KeyNotFound(String),
}

/// JWKS key set response.
#[derive(Debug, Deserialize)]
struct JwksResponse {
    keys: Vec<Jwk>,
}

#[derive(Debug, Clone, Deserialize)]
struct Jwk {
    kid: String,
    kty: String,
    n: Option<String>,
    e: Option<String>,
}

/// Session token claims.
#[derive(Debug, Deserialize, Serialize)]
struct Claims {
    sub: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    sid: Option<String>,
    exp: u64,
    #[serde(default)]
    iat: u64,
}

/// Signing keys plus the time they were last fetched.
#[derive(Default)]
struct KeyCache {
    keys: HashMap<String, DecodingKey>,
    last_refresh: Option<Instant>,
}

impl KeyCache {
    fn refresh_due(&self, min_interval: Duration) -> bool {
        self.last_refresh
            .map_or(true, |at| at.elapsed() >= min_interval)
    }
}

/// Client for fetching and caching the provider's signing keys.
pub struct JwksClient {
    http_client: Client,
    jwks_uri: String,
    cache: RwLock<KeyCache>,
    issuer: String,
    /// Minimum time between two JWKS fetches triggered by unknown `kid`s.
    min_refresh_interval: Duration,
}

impl JwksClient {
    pub async fn new(issuer: &str, min_refresh_interval: Duration) -> Result<Self, AuthError> {
        let http_client = Client::new();
        let issuer = issuer.trim_end_matches('/');

        // Fetch OIDC configuration to get JWKS URI
        let config_url = format!("{}/.well-known/openid-configuration", issuer);
        let config: OidcConfig = http_client
            .get(&config_url)
            .send()
            .await
            .map_err(|e| AuthError::JwksFetchError(e.to_string()))?
            .json()
            .await
            .map_err(|e| AuthError::JwksFetchError(e.to_string()))?;

        let client = Self {
            http_client,
            jwks_uri: config.jwks_uri,
            cache: RwLock::new(KeyCache::default()),
            issuer: issuer.to_string(),
            min_refresh_interval,
        };

        // Fetch keys initially
        let keys = client.fetch_keys().await?;
        {
            let mut cache = client.cache.write().await;
            cache.keys = keys;
            cache.last_refresh = Some(Instant::now());
        }

        Ok(client)
    }

    async fn fetch_keys(&self) -> Result<HashMap<String, DecodingKey>, AuthError> {
        tracing::info!("Fetching JWKS from {}", self.jwks_uri);

        let response: JwksResponse = self
            .http_client
            .get(&self.jwks_uri)
            .send()
            .await
            .map_err(|e| AuthError::JwksFetchError(e.to_string()))?
            .json()
            .await
            .map_err(|e| AuthError::JwksFetchError(e.to_string()))?;

        let mut keys = HashMap::new();
        for jwk in response.keys {
            if jwk.kty != "RSA" {
                continue;
            }
            if let (Some(n), Some(e)) = (&jwk.n, &jwk.e) {
                match DecodingKey::from_rsa_components(n, e) {
                    Ok(key) => {
                        keys.insert(jwk.kid.clone(), key);
                    }
                    Err(e) => {
                        tracing::warn!("Failed to parse RSA key {}: {}", jwk.kid, e);
                    }
                }
            }
        }

        tracing::info!("Loaded {} JWKS keys", keys.len());
        Ok(keys)
    }

    /// Refetch the key set for an unknown `kid`, at most once per
    /// `min_refresh_interval`.
    ///
    /// The refresh slot is claimed under the write lock before fetching, so
    /// concurrent callers do not fetch twice. The old keys stay in place until
    /// the new set has been fetched.
    async fn refresh_for_kid(&self, kid: &str) -> Result<(), AuthError> {
        {
            let mut cache = self.cache.write().await;
            if cache.keys.contains_key(kid) {
                return Ok(());
            }
            if !cache.refresh_due(self.min_refresh_interval) {
                tracing::debug!(kid = %kid, "Unknown kid, JWKS refreshed recently, skipping");
                return Ok(());
            }
            cache.last_refresh = Some(Instant::now());
        }

        let keys = self.fetch_keys().await?;
        self.cache.write().await.keys = keys;
        Ok(())
    }

    /// Authenticate a request by validating the Bearer token.
    ///
    /// An unknown `kid` triggers a key refresh, since providers rotate keys.
    /// Refreshes are limited to one per `min_refresh_interval`.
    pub async fn authenticate(&self, headers: &HeaderMap) -> Result<AuthUser, AuthError> {
        let token = bearer_token(headers)?;

        // Decode header to get kid
        let header = decode_header(token).map_err(|e| AuthError::InvalidToken(e.to_string()))?;
        let kid = header
            .kid
            .ok_or_else(|| AuthError::InvalidToken("Missing kid in token header".to_string()))?;

        if !self.cache.read().await.keys.contains_key(&kid) {
            self.refresh_for_kid(&kid).await?;
        }

        let cache = self.cache.read().await;
        let key = cache.keys.get(&kid).ok_or_else(|| AuthError::KeyNotFound(kid.clone()))?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[&self.issuer]);
        // Session tokens carry an authorized-party claim rather than an audience
        validation.validate_aud = false;

        let token_data = decode::<Claims>(token, key, &validation)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))?;

        Ok(AuthUser {
            sub: token_data.claims.sub,
            email: token_data.claims.email,
            session_id: token_data.claims.sid,
        })
    }
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let auth_header = headers
        .get("authorization")
        .ok_or(AuthError::MissingHeader)?
        .to_str()
        .map_err(|_| AuthError::InvalidFormat)?;

    auth_header
        .strip_prefix("Bearer ")
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::InvalidFormat)
}

#[derive(Debug, Deserialize)]
struct OidcConfig {
    jwks_uri: String,
}
