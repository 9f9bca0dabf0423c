//! Transaction records.

use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// Who drives the transaction's lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// Opened, committed or discarded by the caller across several calls.
    Explicit,
    /// Opened and closed inside a single store operation.
    Implicit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TxnState {
    Open,
    Committed,
    Discarded,
}

impl TxnState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TxnState::Open)
    }
}

/// Status reported when listing transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxnStatus {
    InProgress,
    /// Another commit landed after this transaction was opened; it can only be discarded.
    Outdated,
}

/// An isolated editing session over a private snapshot.
#[derive(Debug)]
pub struct Transaction<S> {
    pub id: String,
    pub base_version: i64,
    pub snapshot: S,
    pub origin: Origin,
    pub state: TxnState,
    pub created_at: SystemTime,
}

impl<S> Transaction<S> {
    pub fn new(id: String, base_version: i64, snapshot: S, origin: Origin) -> Self {
        Self {
            id,
            base_version,
            snapshot,
            origin,
            state: TxnState::Open,
            created_at: SystemTime::now(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.state == TxnState::Open
    }

    /// Move to a terminal state. Terminal states never change again.
    pub fn close(&mut self, state: TxnState) {
        if self.is_open() {
            self.state = state;
        }
    }

    pub fn info(&self, current_version: i64) -> TransactionInfo {
        TransactionInfo {
            id: self.id.clone(),
            base_version: self.base_version,
            origin: self.origin,
            status: if self.base_version == current_version {
                TxnStatus::InProgress
            } else {
                TxnStatus::Outdated
            },
            created_at: self
                .created_at
                .duration_since(SystemTime::UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
        }
    }
}

/// Public view of an open transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionInfo {
    pub id: String,
    #[serde(rename = "_version")]
    pub base_version: i64,
    pub origin: Origin,
    pub status: TxnStatus,
    /// Seconds since the Unix epoch.
    pub created_at: u64,
}

/// Transaction ids double as file name suffixes.
pub fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 128
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
