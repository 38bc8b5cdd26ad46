//! SellSync Server — multi-marketplace selling assistant backend
//!
//! Main entry point that wires all crates together and starts the server.

mod http;

use std::sync::Arc;

use tokio::sync::watch;
use tracing;
use tracing_subscriber::{EnvFilter, fmt};

use sellsync_core::config::AppConfig;
use sellsync_core::error::AppError;
use sellsync_database::store::UpsertStrategy;
use sellsync_entity::action::Marketplace;

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}

/// Load configuration for the environment named by `SELLSYNC_ENV`
fn load_configuration() -> Result<AppConfig, AppError> {
    let env = std::env::var("SELLSYNC_ENV").unwrap_or_else(|_| "development".to_string());
    AppConfig::load(&env)
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Main server run function
async fn run(config: AppConfig) -> Result<(), AppError> {
    let instance_id = format!("sellsync-{}", &uuid::Uuid::new_v4().to_string()[..8]);
    tracing::info!(
        "Starting SellSync v{} ({})",
        env!("CARGO_PKG_VERSION"),
        instance_id
    );

    // ── Step 1: Database connection + migrations ─────────────────
    tracing::info!("Connecting to database...");
    let db = sellsync_database::DatabasePool::connect(&config.database).await?;

    tracing::info!("Running database migrations...");
    sellsync_database::migration::run_migrations(db.inner()).await?;
    tracing::info!("Database migrations complete");

    // ── Step 2: Stores ───────────────────────────────────────────
    let job_store = Arc::new(sellsync_database::repositories::PgJobStore::new(
        db.inner().clone(),
    ));
    let batch_store = Arc::new(sellsync_database::repositories::PgBatchStore::new(
        db.inner().clone(),
    ));
    let order_store: Arc<dyn sellsync_database::store::OrderStore> = Arc::new(
        sellsync_database::repositories::PgOrderStore::new(db.inner().clone()),
    );

    // ── Step 3: RPC bridge ───────────────────────────────────────
    let bridge = Arc::new(sellsync_bridge::RpcBridge::new(config.bridge.clone()));
    tracing::info!("RPC bridge initialized");

    // ── Step 4: Queue and batch accounting ───────────────────────
    let queue = Arc::new(sellsync_worker::JobQueue::new(job_store, &config.worker));
    let batches = Arc::new(sellsync_worker::BatchAggregator::new(batch_store));

    // ── Step 5: Shutdown channel ─────────────────────────────────
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── Step 6: Background worker + scheduler ────────────────────
    let (worker_handle, scheduler) = if config.worker.enabled {
        tracing::info!("Starting background worker...");

        let mut registry = sellsync_worker::ActionRegistry::new();
        for marketplace in Marketplace::ALL {
            registry.register(Arc::new(
                sellsync_worker::actions::PublishListingHandler::new(
                    marketplace,
                    Arc::clone(&bridge),
                ),
            ));
            registry.register(Arc::new(
                sellsync_worker::actions::UpdateListingHandler::new(
                    marketplace,
                    Arc::clone(&bridge),
                ),
            ));
            registry.register(Arc::new(
                sellsync_worker::actions::DeleteListingHandler::new(
                    marketplace,
                    Arc::clone(&bridge),
                ),
            ));
            registry.register(Arc::new(sellsync_worker::actions::CatalogSyncHandler::new(
                marketplace,
                Arc::clone(&bridge),
            )));
            registry.register(Arc::new(sellsync_worker::actions::FetchOrdersHandler::new(
                marketplace,
                Arc::clone(&bridge),
                Arc::clone(&order_store),
                UpsertStrategy::default(),
            )));
        }
        let registry = Arc::new(registry);
        tracing::info!(
            "Registered {} action handlers",
            registry.registered_actions().len()
        );

        let processor = sellsync_worker::JobProcessor::new(
            Arc::clone(&queue),
            registry,
            Arc::clone(&batches),
            config.worker.clone(),
        );

        let scheduler = sellsync_worker::CronScheduler::new(
            Arc::clone(&queue),
            Arc::clone(&batches),
            Arc::clone(&bridge),
            config.worker.clone(),
        )
        .await?;
        scheduler.register_default_tasks().await?;
        scheduler.start().await?;

        let worker_cancel = shutdown_rx.clone();
        let handle = tokio::spawn(async move {
            processor.run(worker_cancel).await;
        });

        tracing::info!("Background worker started");
        (Some(handle), Some(scheduler))
    } else {
        tracing::info!("Background worker disabled");
        (None, None)
    };

    // ── Step 7: Build and start HTTP server ──────────────────────
    let state = http::AppState {
        bridge: Arc::clone(&bridge),
        queue: Arc::clone(&queue),
        started_at: chrono::Utc::now(),
    };
    let app = http::build_router(&config, state);

    let addr = config.server.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::internal(format!("Failed to bind {}: {}", addr, e)))?;

    tracing::info!("SellSync server listening on {}", addr);

    // ── Step 8: Graceful shutdown ────────────────────────────────
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        shutdown_signal().await;
        tracing::info!("Shutdown signal received, starting graceful shutdown...");
        let _ = shutdown_tx.send(true);
    });

    server
        .await
        .map_err(|e| AppError::internal(format!("Server error: {}", e)))?;

    // ── Step 9: Wait for background tasks ────────────────────────
    tracing::info!("Waiting for background tasks to complete...");

    if let Some(scheduler) = &scheduler {
        if let Err(e) = scheduler.shutdown().await {
            tracing::warn!("Scheduler shutdown failed: {}", e);
        }
    }
    if let Some(handle) = worker_handle {
        let grace = std::time::Duration::from_secs(config.server.shutdown_grace_seconds);
        let _ = tokio::time::timeout(grace, handle).await;
    }

    tracing::info!("SellSync server shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
