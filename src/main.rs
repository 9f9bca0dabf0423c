//! Load balancer configuration store (v1)
//!
//! Serves versioned, transactional edits of a load balancer configuration
//! file over an authenticated management API.
//!
//! # Architecture Overview
//!
//! ```text
//!     Admin request          ┌──────────────────────────────────────────────┐
//!     ───────────────────────┼─▶ admin ──▶ entities ──▶ store::ConfigStore   │
//!                            │                              │                │
//!                            │              ┌───────────────┴──────────┐     │
//!                            │              ▼                          ▼     │
//!                            │     TransactionRegistry          VersionLedger│
//!                            │     (staged snapshots)         (live + commit)│
//!                            │              │                          │     │
//!                            │              ▼                          ▼     │
//!                            │     <transaction_dir>/...      <config_file>  │
//!                            └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use lb_config_store::config::{load_config, ServiceConfig};
use lb_config_store::lifecycle;
use lb_config_store::observability::logging;

#[derive(Parser)]
#[command(name = "lb-config-store")]
#[command(about = "Transactional configuration store for load balancer configs", long_about = None)]
struct Args {
    /// Service configuration file (TOML). Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => ServiceConfig::default(),
    };

    logging::init(&config.observability.log_level)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config_file = %config.storage.config_file.display(),
        transaction_dir = %config.storage.transaction_dir.display(),
        persistent_transactions = config.storage.persistent_transactions,
        "lb-config-store starting"
    );

    lifecycle::run(config).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
