//! Startup orchestration.
//!
//! Order matters: the store is opened (and staged transactions rehydrated or
//! purged) before the admin listener accepts any request.

use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::admin::{setup_admin_router, AppState};
use crate::config::ServiceConfig;
use crate::lifecycle::{signals, Shutdown};
use crate::observability::metrics;
use crate::parser::SectionTree;
use crate::store::{ConfigStore, StoreError};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to open configuration store: {0}")]
    Store(#[from] StoreError),
    #[error("store task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
    #[error("admin listener error: {0}")]
    Listener(#[from] std::io::Error),
}

/// Open the store and serve the admin API until a termination signal.
pub async fn run(config: ServiceConfig) -> Result<(), StartupError> {
    let storage = config.storage.clone();
    let store: ConfigStore<SectionTree> = tokio::task::spawn_blocking(move || ConfigStore::open(&storage))
        .await??;
    let store = Arc::new(store);

    tracing::info!(
        config_file = %config.storage.config_file.display(),
        version = store.version(None)?,
        open_transactions = store.transactions(None).len(),
        "Configuration store ready"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    if !config.admin.enabled {
        tracing::warn!("Admin API disabled; nothing to serve");
        return Ok(());
    }

    let shutdown = Shutdown::new();
    tokio::spawn(signals::forward_termination(shutdown.clone()));

    let state = AppState::new(store, &config.admin.api_key);
    let app = setup_admin_router(state, &config.admin);

    let listener = TcpListener::bind(&config.admin.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Admin API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(Shutdown::wait(shutdown.subscribe()))
        .await?;

    tracing::info!("Admin API stopped");
    Ok(())
}
