use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use codemate_backend::{
    routes, AppState, Config, JwksClient, Reconciler, SqliteUserStore, UserStore, WebhookVerifier,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load and validate configuration
    let config = Config::load()?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting CodeMate API ({})", config.environment);

    // Initialize components
    let store: Arc<dyn UserStore> = Arc::new(SqliteUserStore::new(&config.database.url)?);
    let reconciler = Reconciler::new(store.clone());

    let webhook_verifier = match &config.webhook.signing_secret {
        Some(secret) => Some(WebhookVerifier::new(secret, config.webhook.tolerance_secs)?),
        None => {
            tracing::warn!("No webhook signing secret configured, deliveries will be refused");
            None
        }
    };

    let jwks_client = match &config.oidc {
        Some(oidc) => Some(
            JwksClient::new(&oidc.issuer, Duration::from_secs(oidc.jwks_refresh_secs)).await?,
        ),
        None => {
            tracing::info!("No OIDC issuer configured, /api/me is disabled");
            None
        }
    };

    let state = Arc::new(AppState {
        config: config.clone(),
        store,
        reconciler,
        webhook_verifier,
        jwks_client,
    });

    let app = routes::app(state);

    // Start server
    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!("Listening on {}", addr);

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
