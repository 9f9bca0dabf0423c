//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use lb_config_store::config::StorageConfig;
use lb_config_store::{ConfigStore, SectionTree};
use tempfile::TempDir;

pub const SAMPLE: &str = "\
global
    daemon
    maxconn 256

defaults
    mode http
    timeout connect 5s

frontend http-in
    bind *:80
    default_backend web

backend web
    balance roundrobin
    server web1 10.0.0.1:8080 check
";

/// A temporary live configuration plus a staging directory.
pub struct Fixture {
    pub dir: TempDir,
    pub storage: StorageConfig,
}

impl Fixture {
    /// Live configuration at `version` with the sample content.
    pub fn new(version: i64) -> Self {
        Self::with_content(&format!("# _version={}\n{}", version, SAMPLE))
    }

    pub fn with_content(content: &str) -> Self {
        let dir = TempDir::new().unwrap();
        let config_file = dir.path().join("haproxy.cfg");
        fs::write(&config_file, content).unwrap();
        let storage = StorageConfig {
            config_file,
            transaction_dir: dir.path().join("transactions"),
            persistent_transactions: true,
            backups_number: 0,
        };
        Self { dir, storage }
    }

    pub fn open(&self) -> ConfigStore<SectionTree> {
        ConfigStore::open(&self.storage).unwrap()
    }

    pub fn config_file(&self) -> &Path {
        &self.storage.config_file
    }

    pub fn live_text(&self) -> String {
        fs::read_to_string(&self.storage.config_file).unwrap()
    }

    /// Files currently in the staging directory.
    pub fn staged_files(&self) -> Vec<PathBuf> {
        match fs::read_dir(&self.storage.transaction_dir) {
            Ok(entries) => entries.map(|e| e.unwrap().path()).collect(),
            Err(_) => Vec::new(),
        }
    }
}
