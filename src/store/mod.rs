//! Transactional configuration store.
//!
//! # Data Flow
//! ```text
//! explicit caller                       implicit caller
//!   open_transaction(id?)                 edit(Target::Version(v), ..)
//!   edit(Target::Transaction(id), ..)       → version check (fail fast)
//!     → registry.rs (draft → staged)        → registry.rs (open, edit, persist)
//!   commit(id) / discard(id)                → commit / discard on failure
//!
//! commit(id)
//!     → ledger.rs: lock → compare base version → backup → atomic rename → swap
//!     → registry.rs: forget transaction, remove staged artifact
//! ```
//!
//! # Design Decisions
//! - Optimistic concurrency: transactions never block each other; only the
//!   commit instant is serialised
//! - One Transaction type; `Origin` only decides the cleanup policy
//! - Artifacts carry their version in a header line (see artifact.rs)
//! - Implicit transactions stage under an `implicit.` infix and are deleted,
//!   never resumed, when the store reopens

pub mod artifact;
pub mod config_store;
pub mod error;
pub mod ledger;
pub mod registry;
pub mod transaction;

pub use config_store::{ConfigStore, Target};
pub use error::{ErrorCode, ErrorContext, StoreError, StoreResult};
pub use transaction::{Origin, TransactionInfo, TxnState, TxnStatus};
