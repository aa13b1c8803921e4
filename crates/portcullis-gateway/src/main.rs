//! Portcullis Gateway
//!
//! Entry point of the authentication gateway. Configuration is read from the
//! environment once at start-up; see `GatewayConfig` and `AuthConfig`.

use std::sync::Arc;

use secrecy::SecretString;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use portcullis_auth::{AuthConfig, MasterSecret};
use portcullis_control::{AccessKeyService, StoreUserDirectory};
use portcullis_gateway::bootstrap::{self, SigningKeys};
use portcullis_gateway::{create_router, GatewayConfig, GatewayState};
use portcullis_store::RocksStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "portcullis_gateway=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Portcullis Gateway");

    let config = GatewayConfig::from_env()?;
    let auth_config = Arc::new(AuthConfig::from_env()?);

    tracing::info!(
        bind_address = %config.bind_address,
        data_dir = %config.data_dir.display(),
        oidc = auth_config.oidc_enabled(),
        basic_auth = auth_config.basic_auth_enabled,
        access_keys = auth_config.api_access_keys_enabled,
        "Gateway configuration loaded"
    );

    let secret = Arc::new(match std::env::var("PORTCULLIS_MASTER_SECRET") {
        Ok(encoded) => MasterSecret::from_base64(&SecretString::new(encoded))?,
        Err(_) => {
            tracing::warn!(
                "No PORTCULLIS_MASTER_SECRET set - stored refresh tokens will not survive a restart"
            );
            MasterSecret::generate()?
        }
    });

    // Initialize RocksDB store
    std::fs::create_dir_all(&config.data_dir)?;
    let db_path = config.data_dir.join("db");
    tracing::info!(path = %db_path.display(), "Opening RocksDB store");
    let store = Arc::new(RocksStore::open(&db_path)?);

    if let Some(admin) = &config.bootstrap_admin {
        let users = StoreUserDirectory::new(Arc::clone(&store));
        bootstrap::ensure_admin(&users, &store, admin)?;
    }

    let keys = SigningKeys::load(&config.data_dir)?;
    let mode = bootstrap::login_mode(&auth_config, Arc::clone(&store), secret).await?;
    let auth = bootstrap::assemble(auth_config, Arc::clone(&store), &keys, mode)?;

    let access_keys = Arc::new(AccessKeyService::new(store, Arc::new(keys.access_key_codec()?)));

    let bind_address = config.bind_address.clone();
    let state = GatewayState::new(access_keys, Arc::new(auth), config);
    let app = create_router(state);

    // Start HTTP server
    tracing::info!(bind_address = %bind_address, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
