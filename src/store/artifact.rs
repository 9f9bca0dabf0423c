//! On-disk artifacts: the live configuration file and staged transaction files.
//!
//! Both share one format: a `# _version=N` header line followed by the
//! serialized snapshot. Keeping the version inside the file means one rename
//! publishes content and version together.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::parser::{ParseError, Snapshot};
use crate::store::error::{StoreError, StoreResult};

const VERSION_PREFIX: &str = "# _version=";

/// Version assigned to an artifact that has never been committed.
pub const BASELINE_VERSION: i64 = 1;

/// A parsed artifact.
#[derive(Debug, Clone)]
pub struct Artifact<S> {
    pub version: i64,
    pub snapshot: S,
}

/// Split off the version header. Returns `None` when the text has no header.
pub fn split_header(text: &str) -> Result<(Option<i64>, &str), ParseError> {
    let Some(rest) = text.strip_prefix(VERSION_PREFIX) else {
        return Ok((None, text));
    };
    let (number, body) = match rest.find('\n') {
        Some(at) => (&rest[..at], &rest[at + 1..]),
        None => (rest, ""),
    };
    let version = number
        .trim()
        .parse::<i64>()
        .map_err(|_| ParseError::new(1, format!("invalid version header '{}'", number.trim())))?;
    if version < 1 {
        return Err(ParseError::new(1, format!("version must be positive, got {}", version)));
    }
    Ok((Some(version), body))
}

pub fn render<S: Snapshot>(version: i64, snapshot: &S) -> String {
    format!("{}{}\n{}", VERSION_PREFIX, version, snapshot.serialize())
}

pub fn decode<S: Snapshot>(path: &Path, text: &str) -> StoreResult<Artifact<S>> {
    let corrupt = |source| StoreError::CorruptArtifact {
        path: path.to_path_buf(),
        source,
    };
    let (version, body) = split_header(text).map_err(corrupt)?;
    let snapshot = S::parse(body).map_err(|mut e| {
        // Report line numbers relative to the whole file.
        if version.is_some() {
            e.line += 1;
        }
        corrupt(e)
    })?;
    Ok(Artifact {
        version: version.unwrap_or(BASELINE_VERSION),
        snapshot,
    })
}

/// Load the live configuration, treating a missing file as an empty baseline.
pub fn load_live<S: Snapshot>(path: &Path) -> StoreResult<Artifact<S>> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
        Err(source) => {
            return Err(StoreError::CannotReadConfigurationFile {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    decode(path, &text)
}

/// Load a staged artifact, or `None` if it does not exist.
pub fn load_staged<S: Snapshot>(path: &Path) -> StoreResult<Option<Artifact<S>>> {
    match fs::read_to_string(path) {
        Ok(text) => decode(path, &text).map(Some),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(source) => Err(StoreError::io("read_staged", path, source)),
    }
}

/// Write via temp file + fsync + rename so readers never see a partial file.
pub fn atomic_write(target: &Path, content: &[u8]) -> StoreResult<()> {
    let parent = match target.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent).map_err(|e| StoreError::io("create_dir", &parent, e))?;

    let file_name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp = parent.join(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4().simple()));

    let result = (|| {
        let mut file = fs::File::create(&temp).map_err(|e| StoreError::io("create_temp", &temp, e))?;
        file.write_all(content)
            .map_err(|e| StoreError::io("write_temp", &temp, e))?;
        file.sync_all().map_err(|e| StoreError::io("sync_temp", &temp, e))?;
        fs::rename(&temp, target).map_err(|e| StoreError::io("rename_temp", target, e))
    })();

    if result.is_err() {
        let _ = fs::remove_file(&temp);
    }
    result
}

/// Remove a file, treating "already gone" as success.
pub fn remove_if_exists(path: &Path) -> StoreResult<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(source) => Err(StoreError::io("remove", path, source)),
    }
}
