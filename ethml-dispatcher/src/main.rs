use std::sync::Arc;

use anyhow::{Context, Result};
use ethml_dispatcher::config::Config;
use ethml_dispatcher::ledger::{HttpLedger, Ledger};
use ethml_dispatcher::repository::{MemoryTaskStore, PgTaskStore, TaskStore};
use ethml_dispatcher::service::Dispatcher;
use ethml_dispatcher::state::AppState;
use ethml_dispatcher::{api, db};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ethml_dispatcher=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting EthML Dispatcher...");

    let config = Config::from_env();
    config.validate().context("Invalid dispatcher configuration")?;

    let store = open_store(&config).await?;

    let http_ledger = HttpLedger::new(
        &config.ledger_url,
        &config.contract_address,
        config.ledger_timeout,
    )
    .context("Failed to create ledger client")?;
    tracing::info!("Ledger contract endpoint: {}", http_ledger.contract_url());
    let ledger: Arc<dyn Ledger> = Arc::new(http_ledger);

    let dispatcher = Arc::new(Dispatcher::new(
        store.clone(),
        ledger.clone(),
        config.dispatch_settings(),
        config.retry_policy(),
    ));

    // Reload unsettled tasks before any worker can connect
    let restored = dispatcher
        .queue()
        .restore()
        .await
        .context("Failed to restore task queue")?;
    tracing::info!("Task queue restored with {} job(s)", restored);

    let cancel = CancellationToken::new();
    let drain = tokio::spawn(Arc::clone(&dispatcher).run(cancel.clone()));
    let reaper = tokio::spawn(Arc::clone(&dispatcher).run_reaper(cancel.clone()));

    // Build router with all API endpoints
    let app = api::create_router(AppState::new(dispatcher, store, ledger));

    tracing::info!("Listening on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    let shutdown = cancel.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
            tracing::info!("Shutdown signal received");
            shutdown.cancel();
        })
        .await
        .context("Server error")?;

    cancel.cancel();
    let _ = tokio::join!(drain, reaper);

    tracing::info!("EthML Dispatcher stopped");
    Ok(())
}

/// Opens the task store selected by `DATABASE_URL`
async fn open_store(config: &Config) -> Result<Arc<dyn TaskStore>> {
    if config.uses_memory_store() {
        tracing::warn!("Using in-memory task store, tasks will not survive a restart");
        return Ok(Arc::new(MemoryTaskStore::new()));
    }

    tracing::info!("Connecting to database...");

    let pool = db::create_pool(&config.database_url)
        .await
        .context("Failed to create database pool")?;

    tracing::info!("Database connection pool created");

    db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;

    Ok(Arc::new(PgTaskStore::new(pool)))
}
