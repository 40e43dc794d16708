//! Snapseek - image search with delegated login

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use snapseek_app::{sweeper, AppState, Config};
use snapseek_core::{AuthCoordinator, Database, Provider, SessionManager};
use snapseek_net::{github, google, UnsplashClient};

fn build_state(config: Config) -> Result<AppState> {
    let db_path = config.database_path()?;
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let db = Database::open(&db_path)
        .with_context(|| format!("Failed to open database at {}", db_path.display()))?;
    info!(path = %db_path.display(), version = db.schema_version(), "Database ready");

    let http = snapseek_net::http_client().context("Failed to build HTTP client")?;

    let mut auth = AuthCoordinator::new(SessionManager::new(config.session_ttl_hours));
    for provider in Provider::ALL {
        let Some(oauth) = config.oauth(provider) else {
            warn!(%provider, "No client credentials, provider disabled");
            continue;
        };
        let client = match provider {
            Provider::Google => google::client(http.clone(), oauth),
            Provider::GitHub => github::client(http.clone(), oauth),
        };
        auth = auth.with_provider(Arc::new(client));
    }
    info!(providers = ?auth.enabled_providers(), "Identity providers configured");

    let images = UnsplashClient::new(http, config.unsplash_access_key.clone().unwrap_or_default())
        .with_per_page(config.unsplash_per_page);

    Ok(AppState::new(config, db, auth, Arc::new(images))?)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting Snapseek");

    let config = Config::load().context("Invalid configuration")?;
    let address = config.bind_address();
    let sweep_every = Duration::from_secs(config.sweep_interval_secs);

    let state = build_state(config)?;
    let sweeper = sweeper::spawn(state.clone(), sweep_every);

    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {address}"))?;

    snapseek_app::serve(listener, state).await?;

    if let Some(handle) = sweeper {
        handle.abort();
    }
    Ok(())
}
