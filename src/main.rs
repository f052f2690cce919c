use std::time::Duration;

use sqlx::mysql::MySqlPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use auth_broker::config::{AppState, Config};
use auth_broker::models::Client;
use auth_broker::repositories::Repositories;
use auth_broker::utils::secret::hash_secret;
use auth_broker::{admin_router, oauth2_router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "auth_broker=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    // Create database pool with production settings
    let pool = MySqlPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(5))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(&config.database_url)
        .await?;

    // Run migrations
    sqlx::migrate!("./migrations").run(&pool).await?;

    let repositories = Repositories::mysql(&pool);
    seed_client(&config, &repositories).await?;

    let oauth2_listener = tokio::net::TcpListener::bind(&config.oauth2_addr).await?;
    let admin_listener = tokio::net::TcpListener::bind(&config.admin_addr).await?;

    let shutdown_grace = Duration::from_secs(config.shutdown_grace_secs);
    let state = AppState::new(config, repositories);

    tracing::info!(
        "auth-broker v{} listening on {} (oauth2) and {} (admin)",
        env!("CARGO_PKG_VERSION"),
        oauth2_listener.local_addr()?,
        admin_listener.local_addr()?,
    );

    let mut oauth2_server = tokio::spawn({
        let app = oauth2_router(state.clone());
        async move {
            axum::serve(oauth2_listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await
        }
    });
    let mut admin_server = tokio::spawn({
        let app = admin_router(state);
        async move {
            axum::serve(admin_listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await
        }
    });

    shutdown_signal().await;
    tracing::info!("shutting down, draining in-flight requests");

    // Bounded drain: abort whatever is still running after the grace
    // period.
    let drain = async {
        let _ = tokio::join!(&mut oauth2_server, &mut admin_server);
    };
    if tokio::time::timeout(shutdown_grace, drain).await.is_err() {
        tracing::warn!("drain deadline exceeded, aborting in-flight requests");
        oauth2_server.abort();
        admin_server.abort();
    }

    tracing::info!("server shutdown complete");
    Ok(())
}

/// Register the statically configured client, replacing a stale secret
/// or redirect URI from an earlier run.
async fn seed_client(config: &Config, repositories: &Repositories) -> anyhow::Result<()> {
    let secret_hash = hash_secret(&config.seed_client_secret)?;
    let client = Client::new(
        config.seed_client_id.clone(),
        secret_hash,
        config.seed_client_redirect_uri.clone(),
    );
    repositories
        .clients
        .upsert(&client)
        .await
        .map_err(|err| anyhow::anyhow!("seed client registration failed: {err}"))?;

    tracing::info!(client_id = %client.id, "registered seed client");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown...");
        },
    }
}
