//! Version ledger: the committed `(version, snapshot)` pair.
//!
//! # Responsibilities
//! - Hand out consistent views of the live configuration to readers
//! - Serialise commits behind a single lock
//! - Publish a new artifact and its version as one step
//!
//! # Design Decisions
//! - Readers never block: the live pair sits behind `ArcSwap`
//! - The version lives in the artifact header, so the rename is the commit point
//! - The in-memory pair is swapped only after the rename succeeded

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use arc_swap::ArcSwap;

use crate::parser::Snapshot;
use crate::store::artifact::{self, Artifact};
use crate::store::error::{ErrorContext, StoreError, StoreResult};

/// Committed configuration at one version.
#[derive(Debug)]
pub struct LiveState<S> {
    pub version: i64,
    pub snapshot: S,
}

/// Backup policy applied before each commit.
#[derive(Debug, Clone, Copy, Default)]
pub struct BackupPolicy {
    /// Number of previous versions to keep next to the live file; 0 disables.
    pub keep: u32,
}

pub struct VersionLedger<S> {
    path: PathBuf,
    live: ArcSwap<LiveState<S>>,
    commit_lock: Mutex<()>,
    backups: BackupPolicy,
}

impl<S: Snapshot> VersionLedger<S> {
    /// Load the live artifact. A parse failure here is fatal to the store.
    pub fn open(path: &Path, backups: BackupPolicy) -> StoreResult<Self> {
        let Artifact { version, snapshot } = artifact::load_live::<S>(path)?;
        tracing::info!(path = %path.display(), version, "Live configuration loaded");
        Ok(Self {
            path: path.to_path_buf(),
            live: ArcSwap::from_pointee(LiveState { version, snapshot }),
            commit_lock: Mutex::new(()),
            backups,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn current_version(&self) -> i64 {
        self.live.load().version
    }

    /// Consistent view of the committed configuration.
    pub fn live(&self) -> Arc<LiveState<S>> {
        self.live.load_full()
    }

    /// Publish `snapshot` as `base_version + 1` if `base_version` is still current.
    ///
    /// Nothing changes on failure: the version check, the backup and the rename
    /// all happen before the in-memory pair is swapped.
    pub fn advance(&self, base_version: i64, snapshot: &S) -> StoreResult<i64> {
        let _guard = self.commit_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let current = self.current_version();
        if current != base_version {
            return Err(StoreError::VersionMismatch {
                expected: base_version,
                current,
                context: ErrorContext::default(),
            });
        }

        self.write_backup(current)?;

        let next = current + 1;
        artifact::atomic_write(&self.path, artifact::render(next, snapshot).as_bytes())?;
        self.live.store(Arc::new(LiveState {
            version: next,
            snapshot: snapshot.clone(),
        }));
        self.prune_backups(next);

        Ok(next)
    }

    fn backup_path(&self, version: i64) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(format!(".{}", version));
        PathBuf::from(name)
    }

    fn write_backup(&self, version: i64) -> StoreResult<()> {
        if self.backups.keep == 0 || !self.path.exists() {
            return Ok(());
        }
        let target = self.backup_path(version);
        fs::copy(&self.path, &target).map_err(|e| StoreError::io("backup", &target, e))?;
        tracing::debug!(backup = %target.display(), version, "Configuration backup written");
        Ok(())
    }

    fn prune_backups(&self, new_version: i64) {
        if self.backups.keep == 0 {
            return;
        }
        // Backups are named after the version they replaced: new_version - 1 is the newest.
        let stale = new_version - 1 - i64::from(self.backups.keep);
        if stale < 1 {
            return;
        }
        if let Err(e) = artifact::remove_if_exists(&self.backup_path(stale)) {
            tracing::warn!(error = %e, version = stale, "Failed to prune configuration backup");
        }
    }
}
