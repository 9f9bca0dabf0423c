//! Error taxonomy for store operations.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::parser::{ParseError, TreeError};

/// Where a structural error happened.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ErrorContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction: Option<String>,
}

impl ErrorContext {
    pub fn entity(entity: impl Into<String>) -> Self {
        Self {
            entity: Some(entity.into()),
            ..Self::default()
        }
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts = [
            ("entity", &self.entity),
            ("parent", &self.parent),
            ("transaction", &self.transaction),
        ];
        let mut first = true;
        for (label, value) in parts {
            if let Some(value) = value {
                f.write_str(if first { " [" } else { ", " })?;
                write!(f, "{}={}", label, value)?;
                first = false;
            }
        }
        if !first {
            f.write_str("]")?;
        }
        Ok(())
    }
}

/// Errors surfaced by the configuration store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{message}{context}")]
    ObjectDoesNotExist { message: String, context: ErrorContext },

    #[error("{message}{context}")]
    ObjectAlreadyExists { message: String, context: ErrorContext },

    #[error("validation error: {message}{context}")]
    Validation { message: String, context: ErrorContext },

    #[error("version mismatch: expected {expected}, current {current}{context}")]
    VersionMismatch {
        expected: i64,
        current: i64,
        context: ErrorContext,
    },

    #[error("transaction '{id}' does not exist")]
    TransactionNotFound { id: String },

    #[error("cannot read configuration file {path}: {source}")]
    CannotReadConfigurationFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt artifact {path}: {source}")]
    CorruptArtifact {
        path: PathBuf,
        #[source]
        source: ParseError,
    },

    #[error("I/O error during {op} on {path}: {source}")]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Stable machine-readable code for each error class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    ObjectDoesNotExist,
    ObjectAlreadyExists,
    ValidationError,
    VersionMismatch,
    TransactionDoesNotExist,
    CannotReadConfigurationFile,
    CorruptArtifact,
    IoError,
}

impl StoreError {
    pub fn not_found(message: impl Into<String>, context: ErrorContext) -> Self {
        StoreError::ObjectDoesNotExist {
            message: message.into(),
            context,
        }
    }

    pub fn already_exists(message: impl Into<String>, context: ErrorContext) -> Self {
        StoreError::ObjectAlreadyExists {
            message: message.into(),
            context,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        StoreError::Validation {
            message: message.into(),
            context: ErrorContext::default(),
        }
    }

    pub(crate) fn io(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            op,
            path: path.into(),
            source,
        }
    }

    /// Translate a structural failure, attaching what was being edited.
    pub fn from_tree(err: TreeError, context: ErrorContext) -> Self {
        let message = err.to_string();
        match err {
            TreeError::SectionNotFound { .. }
            | TreeError::KeywordNotFound { .. }
            | TreeError::IndexOutOfRange { .. } => StoreError::not_found(message, context),
            TreeError::SectionExists { .. } => StoreError::already_exists(message, context),
            TreeError::InvalidName { .. } | TreeError::InvalidKeyword { .. } | TreeError::InvalidValue { .. } => {
                StoreError::Validation { message, context }
            }
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            StoreError::ObjectDoesNotExist { .. } => ErrorCode::ObjectDoesNotExist,
            StoreError::ObjectAlreadyExists { .. } => ErrorCode::ObjectAlreadyExists,
            StoreError::Validation { .. } => ErrorCode::ValidationError,
            StoreError::VersionMismatch { .. } => ErrorCode::VersionMismatch,
            StoreError::TransactionNotFound { .. } => ErrorCode::TransactionDoesNotExist,
            StoreError::CannotReadConfigurationFile { .. } => ErrorCode::CannotReadConfigurationFile,
            StoreError::CorruptArtifact { .. } => ErrorCode::CorruptArtifact,
            StoreError::Io { .. } => ErrorCode::IoError,
        }
    }

    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            StoreError::ObjectDoesNotExist { context, .. }
            | StoreError::ObjectAlreadyExists { context, .. }
            | StoreError::Validation { context, .. }
            | StoreError::VersionMismatch { context, .. } => Some(context),
            _ => None,
        }
    }

    /// Stamp the transaction id on errors that carry a context.
    pub fn in_transaction(mut self, id: &str) -> Self {
        if let StoreError::ObjectDoesNotExist { context, .. }
        | StoreError::ObjectAlreadyExists { context, .. }
        | StoreError::Validation { context, .. }
        | StoreError::VersionMismatch { context, .. } = &mut self
        {
            if context.transaction.is_none() {
                context.transaction = Some(id.to_string());
            }
        }
        self
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::SectionKind;

    #[test]
    fn test_tree_error_translation() {
        let err = StoreError::from_tree(
            TreeError::SectionExists {
                kind: SectionKind::Backend,
                name: "app1".into(),
            },
            ErrorContext::entity("app1"),
        );
        assert_eq!(err.code(), ErrorCode::ObjectAlreadyExists);

        let err = StoreError::from_tree(
            TreeError::KeywordNotFound {
                kind: SectionKind::Backend,
                name: "web".into(),
                keyword: "server".into(),
            },
            ErrorContext::entity("web3").with_parent("backend web"),
        );
        assert_eq!(err.code(), ErrorCode::ObjectDoesNotExist);
        assert_eq!(err.context().unwrap().parent.as_deref(), Some("backend web"));
    }

    #[test]
    fn test_context_display() {
        let err = StoreError::not_found("server 'web3' does not exist", ErrorContext::entity("web3"))
            .in_transaction("tx-1");
        assert_eq!(
            err.to_string(),
            "server 'web3' does not exist [entity=web3, transaction=tx-1]"
        );

        let err = StoreError::VersionMismatch {
            expected: 5,
            current: 6,
            context: ErrorContext::default(),
        };
        assert_eq!(err.to_string(), "version mismatch: expected 5, current 6");
    }

    #[test]
    fn test_in_transaction_keeps_existing_id() {
        let err = StoreError::validation("bad").in_transaction("a").in_transaction("b");
        assert_eq!(err.context().unwrap().transaction.as_deref(), Some("a"));

        let err = StoreError::TransactionNotFound { id: "x".into() }.in_transaction("y");
        assert!(err.context().is_none());
    }
}
