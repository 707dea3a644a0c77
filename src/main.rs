use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use fleet_admin::access::{RolePolicy, TenantAccessControl};
use fleet_admin::app;
use fleet_admin::config;
use fleet_admin::database::{DatabaseManager, PgStore, Store};
use fleet_admin::notify::{self, Notifier};
use fleet_admin::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,fleet_admin=debug")))
        .init();

    // Initialize configuration (this loads the config singleton)
    let config = config::config();
    config.check().map_err(anyhow::Error::msg)?;
    info!("Starting Fleet Admin API in {:?} mode", config.environment);

    let pool = DatabaseManager::connect_lazy(&config.database)?;
    if config.database.run_migrations {
        DatabaseManager::migrate(&pool).await.context("failed to run migrations")?;
    }
    let store: Arc<dyn Store> = Arc::new(PgStore::new(pool));

    let policy = RolePolicy::load(config.security.access_policy_path.as_deref())?;
    let access = Arc::new(TenantAccessControl::new(policy, store.clone()));
    let notifier: Arc<dyn Notifier> = notify::from_config(&config.notifications)?.into();

    let app = app::router(AppState { store, access, notifier });

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    info!("Fleet Admin API listening on http://{}", bind_addr);

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutting down");
}
