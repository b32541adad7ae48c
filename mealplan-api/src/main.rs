//! # Mealplan API Server
//!
//! Backend for the family meal-planning app: recipes, favorites, weekly meal
//! plans, family profiles, Stripe subscriptions and the AI cooking assistant.
//!
//! ## Usage
//!
//! ```bash
//! DATABASE_URL=postgres://... cargo run -p mealplan-api
//! ```
//!
//! Set `LOG_FORMAT=json` for structured logs.

use mealplan_api::{
    app::{build_router, AppState},
    config::Config,
    maintenance,
};
use mealplan_shared::db::{migrations, pool};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "mealplan_api=debug,mealplan_shared=info,tower_http=debug".into());

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
    token.cancel();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    tracing::info!("Mealplan API v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;

    let mut db_config = pool::DatabaseConfig::new(&config.database.url);
    db_config.max_connections = config.database.max_connections;
    let db = pool::create_pool(db_config).await?;

    migrations::run_migrations(&db).await?;
    let applied = migrations::applied_migration_count(&db).await?;
    tracing::info!(applied, "Database schema up to date");

    tracing::info!(
        auth = config.auth.jwt_secret.is_some(),
        storage = config.storage.is_some(),
        stripe = config.stripe.is_some(),
        webhooks = config.webhook.secret.is_some(),
        anthropic = config.anthropic.is_some(),
        elevenlabs = config.elevenlabs.is_some(),
        "Integrations configured"
    );

    let bind_address = config.bind_address();
    let retention_days = config.webhook.retention_days;

    let state = AppState::new(db.clone(), config)?;
    let shutdown = CancellationToken::new();

    let purge = maintenance::spawn_ledger_purge(
        state.webhooks.ledger().clone(),
        retention_days,
        maintenance::PURGE_INTERVAL,
        shutdown.clone(),
    );

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    tracing::info!("Server listening on http://{}", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    shutdown.cancel();
    if let Err(e) = purge.await {
        tracing::warn!(error = %e, "Ledger purge task ended abnormally");
    }

    pool::close_pool(db).await;
    tracing::info!("Server stopped");

    Ok(())
}
