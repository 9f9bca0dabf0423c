//! Configuration schema definitions.
//!
//! This module defines the settings of the store service itself (not the
//! load-balancer configuration it manages). All types derive Serde traits for
//! deserialization from a TOML file.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration for the store service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// Where the managed configuration and its transactions live.
    pub storage: StorageConfig,

    /// Management API settings.
    pub admin: AdminConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Storage layout and transaction policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// The live load-balancer configuration file.
    pub config_file: PathBuf,

    /// Directory holding one staged artifact per open transaction.
    pub transaction_dir: PathBuf,

    /// Resume staged transactions after a restart instead of purging them.
    pub persistent_transactions: bool,

    /// Number of previous versions kept as `<config_file>.<version>` (0 disables).
    pub backups_number: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            config_file: PathBuf::from("/etc/haproxy/haproxy.cfg"),
            transaction_dir: PathBuf::from("/tmp/lb-config-store/transactions"),
            persistent_transactions: true,
            backups_number: 0,
        }
    }
}

/// Management API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Serve the management API.
    pub enabled: bool,

    /// API bind address.
    pub bind_address: String,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Maximum request body size in bytes (raw configuration uploads).
    pub max_body_size: usize,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: "127.0.0.1:5555".to_string(),
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            request_timeout_secs: 30,
            max_body_size: 4 * 1024 * 1024, // 4MB
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
