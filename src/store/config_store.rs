//! The transactional configuration store.
//!
//! Every mutation resolves to "get or create a transaction, apply one edit to
//! its snapshot, persist it". Explicit transactions stop there and wait for the
//! caller to commit or discard; implicit ones are committed immediately and torn
//! down on any failure.

use crate::config::StorageConfig;
use crate::observability::metrics;
use crate::parser::{SectionTree, Snapshot};
use crate::store::error::{ErrorContext, StoreError, StoreResult};
use crate::store::ledger::{BackupPolicy, VersionLedger};
use crate::store::registry::{lock, TransactionRegistry};
use crate::store::transaction::{Origin, TransactionInfo, TxnState, TxnStatus};

/// Which transaction an edit runs in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Edit an explicit transaction; nothing is committed.
    Transaction(String),
    /// One-shot edit against the given expected version, committed immediately.
    Version(i64),
}

impl Target {
    /// Build a target from the usual pair of optional request parameters.
    /// A transaction id wins over a version.
    pub fn from_params(transaction_id: Option<String>, version: Option<i64>) -> StoreResult<Self> {
        match (transaction_id, version) {
            (Some(id), _) if !id.is_empty() => Ok(Target::Transaction(id)),
            (_, Some(version)) => Ok(Target::Version(version)),
            _ => Err(StoreError::validation("either a transaction id or a version is required")),
        }
    }
}

pub struct ConfigStore<S = SectionTree> {
    ledger: VersionLedger<S>,
    registry: TransactionRegistry<S>,
}

impl<S: Snapshot> ConfigStore<S> {
    /// Open the store. Fails if the live configuration cannot be read or parsed.
    pub fn open(storage: &StorageConfig) -> StoreResult<Self> {
        let ledger = VersionLedger::open(
            &storage.config_file,
            BackupPolicy {
                keep: storage.backups_number,
            },
        )?;
        let registry = TransactionRegistry::new(
            &storage.transaction_dir,
            &storage.config_file,
            storage.persistent_transactions,
        )?;
        metrics::record_version(ledger.current_version());

        Ok(Self { ledger, registry })
    }

    /// Current committed version, or a transaction's base version.
    pub fn version(&self, transaction: Option<&str>) -> StoreResult<i64> {
        match transaction {
            None => Ok(self.ledger.current_version()),
            Some(id) => {
                let handle = self.registry.get(id)?;
                let txn = lock(&handle);
                if !txn.is_open() {
                    return Err(StoreError::TransactionNotFound { id: id.to_string() });
                }
                Ok(txn.base_version)
            }
        }
    }

    /// Open (or resume) an explicit transaction.
    pub fn open_transaction(&self, id: Option<&str>) -> StoreResult<TransactionInfo> {
        let live = self.ledger.live();
        let handle = self.registry.open(id, Origin::Explicit, &live)?;
        let info = lock(&handle).info(self.ledger.current_version());
        tracing::info!(transaction_id = %info.id, base_version = info.base_version, "Explicit transaction ready");
        Ok(info)
    }

    /// Open an explicit transaction only if `version` is still current.
    pub fn start_transaction(&self, version: i64) -> StoreResult<TransactionInfo> {
        let live = self.ledger.live();
        self.check_version(version, live.version)?;
        let handle = self.registry.open(None, Origin::Explicit, &live)?;
        let info = lock(&handle).info(live.version);
        tracing::info!(transaction_id = %info.id, base_version = info.base_version, "Explicit transaction started");
        Ok(info)
    }

    pub fn transaction(&self, id: &str) -> StoreResult<TransactionInfo> {
        let handle = self.registry.get(id)?;
        let txn = lock(&handle);
        if !txn.is_open() {
            return Err(StoreError::TransactionNotFound { id: id.to_string() });
        }
        Ok(txn.info(self.ledger.current_version()))
    }

    pub fn transactions(&self, status: Option<TxnStatus>) -> Vec<TransactionInfo> {
        self.registry
            .list(self.ledger.current_version())
            .into_iter()
            .filter(|info| status.map_or(true, |s| info.status == s))
            .collect()
    }

    /// Commit transaction `id` if its base version is still current.
    ///
    /// On a version mismatch the transaction stays open so the caller can
    /// inspect and discard it.
    pub fn commit(&self, id: &str) -> StoreResult<i64> {
        let handle = self.registry.get(id)?;
        let mut txn = lock(&handle);
        if !txn.is_open() {
            return Err(StoreError::TransactionNotFound { id: id.to_string() });
        }

        let version = match self.ledger.advance(txn.base_version, &txn.snapshot) {
            Ok(version) => version,
            Err(e) => {
                if matches!(e, StoreError::VersionMismatch { .. }) {
                    metrics::record_version_mismatch();
                    tracing::warn!(transaction_id = %id, base_version = txn.base_version, error = %e, "Commit rejected");
                }
                return Err(e.in_transaction(id));
            }
        };

        txn.close(TxnState::Committed);
        let origin = txn.origin;
        drop(txn);
        self.registry.forget(id);

        metrics::record_commit(origin, version);
        tracing::info!(transaction_id = %id, version, origin = ?origin, "Transaction committed");
        Ok(version)
    }

    /// Discard transaction `id`. Unknown or finished ids are a no-op.
    pub fn discard(&self, id: &str) -> StoreResult<()> {
        self.registry.discard(id)
    }

    /// Apply one structural edit.
    ///
    /// Returns the transaction's base version for explicit targets and the newly
    /// committed version for implicit ones.
    pub fn edit<R>(&self, target: &Target, edit: impl FnOnce(&mut S) -> StoreResult<R>) -> StoreResult<(i64, R)> {
        match target {
            Target::Transaction(id) => self.registry.edit(id, edit),
            Target::Version(expected) => self.edit_implicit(*expected, edit),
        }
    }

    fn edit_implicit<R>(&self, expected: i64, edit: impl FnOnce(&mut S) -> StoreResult<R>) -> StoreResult<(i64, R)> {
        let live = self.ledger.live();
        self.check_version(expected, live.version)?;

        let handle = self.registry.open(None, Origin::Implicit, &live)?;
        let id = lock(&handle).id.clone();
        drop(live);

        let result = self
            .registry
            .edit(&id, edit)
            .and_then(|(_, out)| self.commit(&id).map(|version| (version, out)));

        if let Err(e) = &result {
            metrics::record_implicit_rollback();
            tracing::debug!(transaction_id = %id, error = %e, "Implicit transaction rolled back");
            if let Err(cleanup) = self.registry.discard(&id) {
                tracing::warn!(transaction_id = %id, error = %cleanup, "Failed to discard implicit transaction");
            }
        }
        result
    }

    fn check_version(&self, expected: i64, current: i64) -> StoreResult<()> {
        if expected == current {
            return Ok(());
        }
        metrics::record_version_mismatch();
        Err(StoreError::VersionMismatch {
            expected,
            current,
            context: ErrorContext::default(),
        })
    }

    /// Read from the live configuration or from a transaction's snapshot.
    pub fn read<R>(&self, transaction: Option<&str>, read: impl FnOnce(&S) -> StoreResult<R>) -> StoreResult<(i64, R)> {
        match transaction {
            None => {
                let live = self.ledger.live();
                Ok((live.version, read(&live.snapshot)?))
            }
            Some(id) => {
                let handle = self.registry.get(id)?;
                let txn = lock(&handle);
                if !txn.is_open() {
                    return Err(StoreError::TransactionNotFound { id: id.to_string() });
                }
                let out = read(&txn.snapshot).map_err(|e| e.in_transaction(id))?;
                Ok((txn.base_version, out))
            }
        }
    }

    /// Serialized configuration (without the version header).
    pub fn raw(&self, transaction: Option<&str>) -> StoreResult<(i64, String)> {
        self.read(transaction, |snapshot| Ok(snapshot.serialize()))
    }

    /// Replace the whole configuration with `text`.
    pub fn replace_raw(&self, target: &Target, text: &str) -> StoreResult<i64> {
        let parsed = S::parse(text).map_err(|e| StoreError::validation(format!("configuration does not parse: {}", e)))?;
        let (version, ()) = self.edit(target, move |snapshot| {
            *snapshot = parsed;
            Ok(())
        })?;
        Ok(version)
    }
}
