//! Transactional configuration store for HAProxy-style load balancer configs.

pub mod admin;
pub mod config;
pub mod entities;
pub mod lifecycle;
pub mod observability;
pub mod parser;
pub mod store;

pub use config::schema::ServiceConfig;
pub use parser::{SectionKind, SectionTree, Snapshot};
pub use store::{ConfigStore, StoreError, Target};
