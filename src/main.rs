//! Wellbeing Hub - staff wellbeing intranet

use anyhow::Result;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wellbeing_hub::{
    api::{self, AppState},
    config::Config,
    db,
    services::create_mailer,
};

/// How often expired sessions, tokens and rate-limit windows are purged
const CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wellbeing_hub=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Wellbeing Hub...");

    let config = Config::load_with_env(Path::new("config.yml"))?;
    tracing::info!("Configuration loaded");

    let pool = db::create_pool(&config.database).await?;
    db::migrations::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed");

    let mailer = create_mailer(&config.email)?;
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState::new(config, pool.clone(), mailer)?;

    {
        let auth = state.auth.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(CLEANUP_INTERVAL);
            loop {
                interval.tick().await;
                if let Err(e) = auth.cleanup_expired().await {
                    tracing::warn!("Cleanup failed: {}", e);
                }
            }
        });
    }

    let app = api::build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    pool.close().await;
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
