use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use campus_gateway::config::AppConfig;
use campus_gateway::database::DataStore;
use campus_gateway::gateway::Gateway;
use campus_gateway::housekeeping::Housekeeper;
use campus_gateway::identity::PgIdentityStore;
use campus_gateway::policy::PolicyTable;
use campus_gateway::server::{build_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, SIGNATURE_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "campus_gateway=info,tower_http=info".into()),
        )
        .init();

    let config = AppConfig::from_env();
    config.validate().context("invalid configuration")?;
    tracing::info!("Starting Campus Gateway in {:?} mode", config.environment);

    let policies = PolicyTable::load(config.policy_file.as_deref()).context("failed to load policy table")?;
    tracing::info!("Loaded {} policy rules", policies.len());

    let data = DataStore::connect_lazy(&config.identity).context("failed to create database pool")?;
    let identity = PgIdentityStore::new(data.pool().clone(), config.identity.session_jwt_secret.clone());

    let gateway = Gateway::from_config(&config, Arc::new(identity), data.clone(), policies);
    let housekeeper = Housekeeper::spawn(
        gateway.sweepers(),
        Duration::from_secs(config.cache.sweep_interval_secs),
    );

    let bind_addr = format!("0.0.0.0:{}", config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    tracing::info!("Campus Gateway listening on http://{}", bind_addr);

    let app = build_router(AppState::new(gateway, config));
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    housekeeper.shutdown().await;
    data.close().await;
    tracing::info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
