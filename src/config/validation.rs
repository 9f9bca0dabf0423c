//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check that staging artifacts cannot collide with the live file or its backups
//! - Validate addresses, timeouts and log levels
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - ServiceConfig → Result<(), Vec<ValidationError>>; the only filesystem
//!   access is resolving existing storage paths
//! - Runs before the store is opened

use std::fmt;
use std::net::SocketAddr;
use std::path::Path;

use crate::config::schema::ServiceConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// A single semantic problem in the service configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Compare resolved paths when both exist, so `./x`, `/abs/x` and symlinks agree.
fn same_directory(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let storage = &config.storage;

    if storage.config_file.file_name().is_none() {
        errors.push(ValidationError::new("storage.config_file", "must name a file"));
    }
    if storage.transaction_dir.as_os_str().is_empty() {
        errors.push(ValidationError::new("storage.transaction_dir", "must not be empty"));
    } else {
        // Backups are `<config>.<version>`; staged artifacts are `<config>.<id>`.
        let config_dir = storage
            .config_file
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| std::path::Path::new("."));
        if same_directory(config_dir, &storage.transaction_dir) {
            errors.push(ValidationError::new(
                "storage.transaction_dir",
                "must differ from the configuration file's directory",
            ));
        }
    }

    let admin = &config.admin;
    if admin.enabled {
        if admin.bind_address.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::new(
                "admin.bind_address",
                format!("invalid socket address '{}'", admin.bind_address),
            ));
        }
        if admin.api_key.trim().is_empty() {
            errors.push(ValidationError::new("admin.api_key", "must not be empty"));
        }
        if admin.request_timeout_secs == 0 {
            errors.push(ValidationError::new("admin.request_timeout_secs", "must be greater than 0"));
        }
        if admin.max_body_size == 0 {
            errors.push(ValidationError::new("admin.max_body_size", "must be greater than 0"));
        }
    }

    let observability = &config.observability;
    if !LOG_LEVELS.contains(&observability.log_level.as_str()) {
        errors.push(ValidationError::new(
            "observability.log_level",
            format!("unknown level '{}'", observability.log_level),
        ));
    }
    if observability.metrics_enabled && observability.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("invalid socket address '{}'", observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
