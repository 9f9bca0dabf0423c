//! Service configuration subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ServiceConfig (validated, immutable)
//!     → storage section opens the ConfigStore, admin section starts the API
//! ```
//!
//! # Design Decisions
//! - Service settings are read once at startup; the managed load-balancer
//!   configuration is what changes at runtime, through transactions
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::AdminConfig;
pub use schema::ObservabilityConfig;
pub use schema::ServiceConfig;
pub use schema::StorageConfig;
