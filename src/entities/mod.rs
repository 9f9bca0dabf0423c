//! Per-entity CRUD on top of the store.
//!
//! # Data Flow
//! ```text
//! entity payload + Target
//!     → validate shape
//!     → ConfigStore::edit (explicit or implicit transaction)
//!     → Snapshot primitives (create_section / set / insert / delete)
//!     → (version, entity) or typed StoreError with entity context
//! ```
//!
//! # Design Decisions
//! - The set of entity kinds is closed (`EntityKind`); no runtime registration
//! - Entities only use the store's public contract: a snapshot to edit and a
//!   version/commit outcome

pub mod section;
pub mod server;

use std::fmt;

use crate::parser::{SectionKind, TreeError};
use crate::store::{ErrorContext, StoreError, StoreResult};

pub use section::{Directive, Section};
pub use server::Server;

/// Kinds of configuration object the entity layer manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Section(SectionKind),
    Server,
}

impl EntityKind {
    /// Error context for an entity named `name` inside `parent`.
    pub fn context(&self, name: &str, parent: Option<(SectionKind, &str)>) -> ErrorContext {
        let context = ErrorContext::entity(format!("{} {}", self, name).trim_end().to_string());
        match parent {
            Some((kind, parent)) => context.with_parent(format!("{} {}", kind, parent)),
            None => context,
        }
    }

    pub(crate) fn tree_error(&self, name: &str, parent: Option<(SectionKind, &str)>) -> impl Fn(TreeError) -> StoreError {
        let context = self.context(name, parent);
        move |e| StoreError::from_tree(e, context.clone())
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Section(kind) => write!(f, "{}", kind),
            EntityKind::Server => f.write_str("server"),
        }
    }
}

/// Names and keywords are single tokens.
pub(crate) fn validate_token(field: &str, value: &str) -> StoreResult<()> {
    if value.is_empty() || value.contains(char::is_whitespace) {
        return Err(StoreError::validation(format!(
            "{} must be a non-empty single token, got '{}'",
            field, value
        )));
    }
    Ok(())
}

/// Directive keywords are tokens that do not read back as a comment.
pub(crate) fn validate_keyword(field: &str, value: &str) -> StoreResult<()> {
    validate_token(field, value)?;
    if value.starts_with('#') {
        return Err(StoreError::validation(format!(
            "{} must not start with '#', got '{}'",
            field, value
        )));
    }
    Ok(())
}

/// Values may contain spaces but never span lines or carry surrounding whitespace.
pub(crate) fn validate_value(field: &str, value: &str) -> StoreResult<()> {
    if value.contains(['\n', '\r']) {
        return Err(StoreError::validation(format!("{} must not contain line breaks", field)));
    }
    if value.trim() != value {
        return Err(StoreError::validation(format!(
            "{} must not start or end with whitespace",
            field
        )));
    }
    Ok(())
}
