//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber once per process
//! - Honour `RUST_LOG`, falling back to the configured level
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - Every store event carries `transaction_id` / `version` fields where known

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Directive used when `RUST_LOG` is unset.
pub fn default_directive(log_level: &str) -> String {
    format!("lb_config_store={level},tower_http={level}", level = log_level)
}

/// Install the global subscriber. Returns an error if one is already set.
pub fn init(log_level: &str) -> Result<(), tracing_subscriber::util::TryInitError> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_directive(log_level).into()))
        .with(tracing_subscriber::fmt::layer())
        .try_init()
}
