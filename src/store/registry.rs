//! Transaction registry and staging persistence.
//!
//! # Responsibilities
//! - Create, resume, look up and forget transactions
//! - Mirror every transaction's snapshot to a staged artifact
//! - Rehydrate (or purge) staged artifacts at startup
//!
//! # Design Decisions
//! - One mutex per transaction; calls against the same id run one at a time
//! - Edits run on a draft copy that replaces the snapshot only once persisted
//! - Discard is idempotent so cleanup paths never have to branch

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::observability::metrics;
use crate::parser::Snapshot;
use crate::store::artifact;
use crate::store::error::{StoreError, StoreResult};
use crate::store::ledger::LiveState;
use crate::store::transaction::{is_valid_id, Origin, Transaction, TransactionInfo, TxnState};

pub type TxnHandle<S> = Arc<Mutex<Transaction<S>>>;

/// Marks staged artifacts of implicit transactions: `<prefix>implicit.<id>`.
/// Ids never contain a dot, so the two layouts cannot collide.
const IMPLICIT_INFIX: &str = "implicit.";

pub(crate) fn lock<S>(handle: &TxnHandle<S>) -> MutexGuard<'_, Transaction<S>> {
    handle.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct TransactionRegistry<S> {
    dir: PathBuf,
    /// `<config file name>.`; staged artifacts are `<prefix><id>`.
    prefix: String,
    open: DashMap<String, TxnHandle<S>>,
}

impl<S: Snapshot> TransactionRegistry<S> {
    /// Prepare the staging directory for the configuration at `config_path`.
    ///
    /// With `persistent` set, staged artifacts left by a previous run are
    /// resumed as explicit transactions; otherwise they are deleted.
    pub fn new(dir: &Path, config_path: &Path, persistent: bool) -> StoreResult<Self> {
        fs::create_dir_all(dir).map_err(|e| StoreError::io("create_staging_dir", dir, e))?;

        let file_name = config_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "config".to_string());

        let registry = Self {
            dir: dir.to_path_buf(),
            prefix: format!("{}.", file_name),
            open: DashMap::new(),
        };

        let staged = registry.scan_staged()?;
        for (id, origin, path) in staged {
            if origin == Origin::Implicit {
                // Left behind by a call that never returned; nobody can commit it.
                artifact::remove_if_exists(&path)?;
                tracing::warn!(transaction_id = %id, "Removed interrupted implicit transaction");
                continue;
            }
            if !persistent {
                artifact::remove_if_exists(&path)?;
                tracing::debug!(transaction_id = %id, "Purged staged transaction");
                continue;
            }
            match artifact::load_staged::<S>(&path) {
                Ok(Some(staged)) => {
                    let txn = Transaction::new(id.clone(), staged.version, staged.snapshot, Origin::Explicit);
                    registry.open.insert(id.clone(), Arc::new(Mutex::new(txn)));
                    tracing::info!(transaction_id = %id, base_version = staged.version, "Resumed staged transaction");
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::error!(transaction_id = %id, error = %e, "Skipping corrupt staged transaction");
                }
            }
        }
        metrics::record_open_transactions(registry.open.len());

        Ok(registry)
    }

    fn scan_staged(&self) -> StoreResult<Vec<(String, Origin, PathBuf)>> {
        let entries = fs::read_dir(&self.dir).map_err(|e| StoreError::io("scan_staging_dir", &self.dir, e))?;
        let mut staged = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::io("scan_staging_dir", &self.dir, e))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if let Some(rest) = name.strip_prefix(&self.prefix) {
                let (origin, id) = match rest.strip_prefix(IMPLICIT_INFIX) {
                    Some(id) => (Origin::Implicit, id),
                    None => (Origin::Explicit, rest),
                };
                if is_valid_id(id) {
                    staged.push((id.to_string(), origin, entry.path()));
                }
            }
        }
        Ok(staged)
    }

    /// Staged artifact of explicit transaction `id`.
    pub fn staging_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}{}", self.prefix, id))
    }

    fn staged_path(&self, id: &str, origin: Origin) -> PathBuf {
        match origin {
            Origin::Explicit => self.staging_path(id),
            Origin::Implicit => self.dir.join(format!("{}{}{}", self.prefix, IMPLICIT_INFIX, id)),
        }
    }

    fn remove_staged(&self, id: &str) -> StoreResult<()> {
        artifact::remove_if_exists(&self.staged_path(id, Origin::Explicit))?;
        artifact::remove_if_exists(&self.staged_path(id, Origin::Implicit))
    }

    /// Resume transaction `id`, or start a new one from `live`.
    pub fn open(&self, id: Option<&str>, origin: Origin, live: &LiveState<S>) -> StoreResult<TxnHandle<S>> {
        let id = match id {
            Some(id) if !is_valid_id(id) => {
                return Err(StoreError::validation(format!("invalid transaction id '{}'", id)));
            }
            Some(id) => id.to_string(),
            None => uuid::Uuid::new_v4().to_string(),
        };

        let handle = match self.open.entry(id.clone()) {
            Entry::Occupied(existing) => return Ok(existing.get().clone()),
            Entry::Vacant(slot) => {
                let path = self.staging_path(&id);
                let txn = match artifact::load_staged::<S>(&path)? {
                    Some(staged) => {
                        tracing::info!(transaction_id = %id, base_version = staged.version, "Resumed staged transaction");
                        Transaction::new(id.clone(), staged.version, staged.snapshot, Origin::Explicit)
                    }
                    None => {
                        let txn = Transaction::new(id.clone(), live.version, live.snapshot.clone(), origin);
                        self.persist(&txn)?;
                        tracing::debug!(transaction_id = %id, base_version = live.version, origin = ?origin, "Transaction opened");
                        txn
                    }
                };
                slot.insert(Arc::new(Mutex::new(txn))).clone()
            }
        };
        metrics::record_open_transactions(self.open.len());
        Ok(handle)
    }

    pub fn get(&self, id: &str) -> StoreResult<TxnHandle<S>> {
        self.open
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| StoreError::TransactionNotFound { id: id.to_string() })
    }

    /// Write the transaction's snapshot to its staged artifact.
    pub fn persist(&self, txn: &Transaction<S>) -> StoreResult<()> {
        self.write_staged(&txn.id, txn.origin, txn.base_version, &txn.snapshot)
    }

    fn write_staged(&self, id: &str, origin: Origin, base_version: i64, snapshot: &S) -> StoreResult<()> {
        let path = self.staged_path(id, origin);
        artifact::atomic_write(&path, artifact::render(base_version, snapshot).as_bytes())
    }

    /// Apply one edit to transaction `id` and persist it before returning.
    ///
    /// Returns the transaction's base version alongside the edit's result. If
    /// either the edit or the persistence fails the transaction is unchanged.
    pub fn edit<R>(&self, id: &str, edit: impl FnOnce(&mut S) -> StoreResult<R>) -> StoreResult<(i64, R)> {
        let handle = self.get(id)?;
        let mut txn = lock(&handle);
        if !txn.is_open() {
            return Err(StoreError::TransactionNotFound { id: id.to_string() });
        }

        let mut draft = txn.snapshot.clone();
        let out = edit(&mut draft).map_err(|e| e.in_transaction(id))?;
        self.write_staged(id, txn.origin, txn.base_version, &draft)?;
        txn.snapshot = draft;

        Ok((txn.base_version, out))
    }

    /// Forget transaction `id` and delete its staged artifact. Unknown ids are a no-op.
    pub fn discard(&self, id: &str) -> StoreResult<()> {
        if !is_valid_id(id) {
            return Ok(());
        }
        if let Some((_, handle)) = self.open.remove(id) {
            lock(&handle).close(TxnState::Discarded);
            tracing::debug!(transaction_id = %id, "Transaction discarded");
        }
        metrics::record_open_transactions(self.open.len());
        self.remove_staged(id)
    }

    /// Drop a committed transaction. The commit is already durable, so a
    /// leftover staged file is only logged.
    pub(crate) fn forget(&self, id: &str) {
        self.open.remove(id);
        metrics::record_open_transactions(self.open.len());
        if let Err(e) = self.remove_staged(id) {
            tracing::warn!(transaction_id = %id, error = %e, "Failed to remove staged artifact after commit");
        }
    }

    pub fn list(&self, current_version: i64) -> Vec<TransactionInfo> {
        let handles: Vec<TxnHandle<S>> = self.open.iter().map(|e| e.value().clone()).collect();
        let mut infos: Vec<TransactionInfo> = handles
            .iter()
            .map(|h| lock(h))
            .filter(|txn| txn.is_open())
            .map(|txn| txn.info(current_version))
            .collect();
        infos.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        infos
    }

    pub fn len(&self) -> usize {
        self.open.len()
    }

    pub fn is_empty(&self) -> bool {
        self.open.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{SectionKind, SectionTree};
    use tempfile::TempDir;

    fn live(version: i64) -> LiveState<SectionTree> {
        LiveState {
            version,
            snapshot: SectionTree::parse("backend web\n    balance roundrobin\n").unwrap(),
        }
    }

    fn registry(dir: &TempDir, persistent: bool) -> TransactionRegistry<SectionTree> {
        TransactionRegistry::new(&dir.path().join("txn"), &dir.path().join("lb.cfg"), persistent).unwrap()
    }

    #[test]
    fn test_open_writes_staged_artifact() {
        let dir = TempDir::new().unwrap();
        let registry = registry(&dir, true);
        let handle = registry.open(None, Origin::Explicit, &live(4)).unwrap();
        let id = lock(&handle).id.clone();

        let staged = fs::read_to_string(registry.staging_path(&id)).unwrap();
        assert!(staged.starts_with("# _version=4\nbackend web\n"));
        assert!(registry.staging_path(&id).ends_with(format!("lb.cfg.{}", id)));
    }

    #[test]
    fn test_open_same_id_resumes() {
        let dir = TempDir::new().unwrap();
        let registry = registry(&dir, true);
        let first = registry.open(Some("deploy"), Origin::Explicit, &live(4)).unwrap();
        let second = registry.open(Some("deploy"), Origin::Explicit, &live(9)).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(lock(&second).base_version, 4);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_invalid_id_rejected() {
        let dir = TempDir::new().unwrap();
        let registry = registry(&dir, true);
        let err = registry.open(Some("../x"), Origin::Explicit, &live(1)).err().unwrap();
        assert!(matches!(err, StoreError::Validation { .. }));
    }

    #[test]
    fn test_failed_edit_leaves_snapshot_untouched() {
        let dir = TempDir::new().unwrap();
        let registry = registry(&dir, true);
        registry.open(Some("t1"), Origin::Explicit, &live(1)).unwrap();

        let err = registry
            .edit("t1", |s| {
                s.delete_section(SectionKind::Backend, "web")
                    .map_err(|e| StoreError::from_tree(e, Default::default()))?;
                s.delete_section(SectionKind::Backend, "web")
                    .map_err(|e| StoreError::from_tree(e, Default::default()))
            })
            .unwrap_err();
        assert_eq!(err.context().unwrap().transaction.as_deref(), Some("t1"));

        let handle = registry.get("t1").unwrap();
        assert!(lock(&handle).snapshot.section_exists(SectionKind::Backend, "web"));
        let staged = fs::read_to_string(registry.staging_path("t1")).unwrap();
        assert!(staged.contains("backend web"));
    }

    #[test]
    fn test_edit_is_persisted() {
        let dir = TempDir::new().unwrap();
        let registry = registry(&dir, true);
        registry.open(Some("t1"), Origin::Explicit, &live(2)).unwrap();

        let (base, ()) = registry
            .edit("t1", |s| {
                s.create_section(SectionKind::Backend, "app1")
                    .map_err(|e| StoreError::from_tree(e, Default::default()))
            })
            .unwrap();
        assert_eq!(base, 2);
        let staged = fs::read_to_string(registry.staging_path("t1")).unwrap();
        assert!(staged.contains("backend app1"));
    }

    #[test]
    fn test_discard_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let registry = registry(&dir, true);
        let handle = registry.open(Some("t1"), Origin::Explicit, &live(1)).unwrap();

        registry.discard("t1").unwrap();
        registry.discard("t1").unwrap();
        registry.discard("never-existed").unwrap();
        registry.discard("../bad").unwrap();

        assert_eq!(lock(&handle).state, TxnState::Discarded);
        assert!(!registry.staging_path("t1").exists());
        assert!(matches!(registry.get("t1"), Err(StoreError::TransactionNotFound { .. })));
        assert!(matches!(
            registry.edit("t1", |_| Ok(())),
            Err(StoreError::TransactionNotFound { .. })
        ));
    }

    #[test]
    fn test_rehydrate_and_purge() {
        let dir = TempDir::new().unwrap();
        {
            let registry = registry(&dir, true);
            registry.open(Some("keep"), Origin::Explicit, &live(3)).unwrap();
        }
        fs::write(dir.path().join("txn").join("lb.cfg.broken"), "# _version=3\nnonsense\n").unwrap();

        let resumed = registry(&dir, true);
        assert_eq!(resumed.len(), 1);
        assert_eq!(lock(&resumed.get("keep").unwrap()).base_version, 3);
        assert!(matches!(
            resumed.open(Some("broken"), Origin::Explicit, &live(3)),
            Err(StoreError::CorruptArtifact { .. })
        ));

        let purged = registry(&dir, false);
        assert!(purged.is_empty());
        assert!(!purged.staging_path("keep").exists());
    }

    #[test]
    fn test_list_reports_outdated() {
        let dir = TempDir::new().unwrap();
        let registry = registry(&dir, true);
        registry.open(Some("a"), Origin::Explicit, &live(1)).unwrap();
        registry.open(Some("b"), Origin::Explicit, &live(2)).unwrap();

        let infos = registry.list(2);
        let a = infos.iter().find(|i| i.id == "a").unwrap();
        let b = infos.iter().find(|i| i.id == "b").unwrap();
        assert_eq!(a.status, crate::store::transaction::TxnStatus::Outdated);
        assert_eq!(b.status, crate::store::transaction::TxnStatus::InProgress);
    }

    #[test]
    fn test_interrupted_implicit_transaction_is_removed_on_restart() {
        let dir = TempDir::new().unwrap();
        {
            let registry = registry(&dir, true);
            let handle = registry.open(None, Origin::Implicit, &live(1)).unwrap();
            let id = lock(&handle).id.clone();
            registry
                .edit(&id, |s| {
                    s.create_section(SectionKind::Backend, "app1")
                        .map_err(|e| StoreError::from_tree(e, Default::default()))
                })
                .unwrap();
            registry.open(Some("kept"), Origin::Explicit, &live(1)).unwrap();
            assert!(!registry.staging_path(&id).exists());
            assert_eq!(fs::read_dir(dir.path().join("txn")).unwrap().count(), 2);
        }

        let restarted = registry(&dir, true);
        assert_eq!(restarted.len(), 1);
        assert!(restarted.get("kept").is_ok());
        let left: Vec<_> = fs::read_dir(dir.path().join("txn"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(left, vec!["lb.cfg.kept".to_string()]);
    }

    #[test]
    fn test_discard_removes_implicit_artifact() {
        let dir = TempDir::new().unwrap();
        let registry = registry(&dir, true);
        let handle = registry.open(None, Origin::Implicit, &live(1)).unwrap();
        let id = lock(&handle).id.clone();
        assert_eq!(fs::read_dir(dir.path().join("txn")).unwrap().count(), 1);

        registry.discard(&id).unwrap();
        assert_eq!(fs::read_dir(dir.path().join("txn")).unwrap().count(), 0);
    }

    #[test]
    fn test_edit_not_applied_when_persistence_fails() {
        let dir = TempDir::new().unwrap();
        let registry = registry(&dir, true);
        registry.open(Some("t1"), Origin::Explicit, &live(1)).unwrap();

        // A directory in place of the staged file makes the final rename fail.
        let staged = registry.staging_path("t1");
        fs::remove_file(&staged).unwrap();
        fs::create_dir(&staged).unwrap();

        let err = registry
            .edit("t1", |s| {
                s.create_section(SectionKind::Backend, "app1")
                    .map_err(|e| StoreError::from_tree(e, Default::default()))
            })
            .unwrap_err();
        assert_eq!(err.code(), crate::store::ErrorCode::IoError);

        let handle = registry.get("t1").unwrap();
        assert!(!lock(&handle).snapshot.section_exists(SectionKind::Backend, "app1"));
        assert!(lock(&handle).is_open());
        assert!(staged.is_dir());
        // The temp file is cleaned up.
        assert_eq!(fs::read_dir(dir.path().join("txn")).unwrap().count(), 1);

        fs::remove_dir(&staged).unwrap();
        registry
            .edit("t1", |s| {
                s.create_section(SectionKind::Backend, "app2")
                    .map_err(|e| StoreError::from_tree(e, Default::default()))
            })
            .unwrap();
        let text = fs::read_to_string(&staged).unwrap();
        assert!(text.contains("backend app2"));
        assert!(!text.contains("backend app1"));
    }
}
