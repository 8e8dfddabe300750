//! Configuration for the API server.

use config::{Config as ConfigLoader, ConfigError, Environment, File};
use serde::Deserialize;

/// Application configuration.
///
/// Built once at startup and handed to the components that need it.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Deployment environment name ("development" or "production").
    #[serde(default = "default_environment")]
    pub environment: String,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub cors: CorsConfig,
    #[serde(default)]
    pub webhook: WebhookConfig,
    /// Session token validation; `/api/me` is only served when set.
    #[serde(default)]
    pub oidc: Option<OidcConfig>,
    #[serde(default)]
    pub web: WebConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite path, optionally prefixed with `sqlite:`.
    #[serde(default = "default_database_url")]
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    /// Comma-separated allowed origins, or `*`.
    #[serde(default = "default_cors_origins")]
    pub origins: String,
}

/// Inbound webhook verification settings.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookConfig {
    /// Svix signing secret in `whsec_<base64>` form.
    #[serde(default)]
    pub signing_secret: Option<String>,
    /// Maximum allowed clock skew for the delivery timestamp.
    #[serde(default = "default_tolerance_secs")]
    pub tolerance_secs: u64,
    /// Accept deliveries without verifying signatures (development only).
    #[serde(default)]
    pub allow_unsigned: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OidcConfig {
    pub issuer: String,
    /// Minimum seconds between JWKS refetches caused by an unknown `kid`.
    #[serde(default = "default_jwks_refresh_secs")]
    pub jwks_refresh_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebConfig {
    /// Directory holding the built single-page client.
    #[serde(default = "default_static_dir")]
    pub static_dir: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { url: default_database_url() }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level() }
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self { origins: default_cors_origins() }
    }
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            signing_secret: None,
            tolerance_secs: default_tolerance_secs(),
            allow_unsigned: false,
        }
    }
}

impl Default for WebConfig {
    fn default() -> Self {
        Self { static_dir: default_static_dir() }
    }
}

// Default values
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    5000
}
fn default_environment() -> String {
    "development".to_string()
}
fn default_database_url() -> String {
    "sqlite:./data/codemate.db".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_cors_origins() -> String {
    "*".to_string()
}
fn default_tolerance_secs() -> u64 {
    300
}
fn default_jwks_refresh_secs() -> u64 {
    60
}
fn default_static_dir() -> String {
    "../web/dist".to_string()
}

impl Config {
    /// Load configuration from file and environment variables.
    ///
    /// Configuration sources (in order of precedence):
    /// 1. Environment variables (CODEMATE__SECTION__KEY format)
    /// 2. config.toml file (if present)
    /// 3. Built-in defaults
    pub fn load() -> Result<Self, ConfigError> {
        let config = ConfigLoader::builder()
            .set_default("host", default_host())?
            .set_default("port", default_port() as i64)?
            .set_default("environment", default_environment())?
            .add_source(File::with_name("config").required(false))
            .add_source(
                Environment::with_prefix("CODEMATE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject combinations that must never reach a running server.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.webhook.allow_unsigned && self.is_production() {
            return Err(ConfigError::Message(
                "webhook.allow_unsigned must not be enabled in production".to_string(),
            ));
        }
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_webhook_config() {
        let webhook = WebhookConfig::default();
        assert!(webhook.signing_secret.is_none());
        assert_eq!(webhook.tolerance_secs, 300);
        assert!(!webhook.allow_unsigned);
    }

    #[test]
    fn test_deserialize_minimal() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 5000);
        assert_eq!(config.database.url, "sqlite:./data/codemate.db");
        assert_eq!(config.logging.level, "info");
        assert!(config.oidc.is_none());
        assert!(!config.is_production());
    }

    #[test]
    fn test_deserialize_nested_sections() {
        let json = r#"{
            "port": 8080,
            "environment": "Production",
            "webhook": {"signing_secret": "whsec_dGVzdA==", "tolerance_secs": 60},
            "oidc": {"issuer": "https://clerk.example.com"}
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.port, 8080);
        assert!(config.is_production());
        assert_eq!(config.webhook.signing_secret.as_deref(), Some("whsec_dGVzdA=="));
        assert_eq!(config.webhook.tolerance_secs, 60);
        let oidc = config.oidc.unwrap();
        assert_eq!(oidc.issuer, "https://clerk.example.com");
        assert_eq!(oidc.jwks_refresh_secs, 60);
    }

    #[test]
    fn test_validate_rejects_unsigned_in_production() {
        let json = r#"{
            "environment": "production",
            "webhook": {"allow_unsigned": true}
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("allow_unsigned"));
    }

    #[test]
    fn test_validate_allows_unsigned_outside_production() {
        let json = r#"{
            "environment": "development",
            "webhook": {"allow_unsigned": true}
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_accepts_signed_production() {
        let json = r#"{
            "environment": "production",
            "webhook": {"signing_secret": "whsec_dGVzdA=="}
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_ok());
    }
}
