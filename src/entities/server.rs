//! `server` lines inside backend and listen sections.

use serde::{Deserialize, Serialize};

use crate::entities::{validate_token, EntityKind};
use crate::parser::{SectionKind, Snapshot};
use crate::store::{ConfigStore, StoreError, StoreResult, Target};

const KEYWORD: &str = "server";

/// A backend server: `server <name> <address> [params...]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Server {
    pub name: String,
    pub address: String,
    #[serde(default)]
    pub params: Vec<String>,
}

impl Server {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            params: Vec::new(),
        }
    }

    pub fn param(mut self, param: &str) -> Self {
        self.params.push(param.to_string());
        self
    }

    fn parse(value: &str) -> Option<Self> {
        let mut tokens = value.split_whitespace();
        let name = tokens.next()?.to_string();
        let address = tokens.next()?.to_string();
        Some(Self {
            name,
            address,
            params: tokens.map(str::to_string).collect(),
        })
    }

    fn render(&self) -> String {
        let mut value = format!("{} {}", self.name, self.address);
        for param in &self.params {
            value.push(' ');
            value.push_str(param);
        }
        value
    }

    fn validate(&self) -> StoreResult<()> {
        validate_token("server name", &self.name)?;
        validate_token("server address", &self.address)?;
        for param in &self.params {
            validate_token("server param", param)?;
        }
        Ok(())
    }
}

fn check_parent(kind: SectionKind) -> StoreResult<()> {
    if kind.holds_servers() {
        Ok(())
    } else {
        Err(StoreError::validation(format!("{} sections cannot hold servers", kind)))
    }
}

fn read_servers<S: Snapshot>(snapshot: &S, kind: SectionKind, backend: &str) -> StoreResult<Vec<Server>> {
    let values = snapshot
        .get(kind, backend, KEYWORD)
        .map_err(EntityKind::Section(kind).tree_error(backend, None))?;
    Ok(values.iter().filter_map(|v| Server::parse(v)).collect())
}

/// Position of server `name` among the section's `server` lines.
fn position<S: Snapshot>(snapshot: &S, kind: SectionKind, backend: &str, name: &str) -> StoreResult<Option<usize>> {
    let values = snapshot
        .get(kind, backend, KEYWORD)
        .map_err(EntityKind::Section(kind).tree_error(backend, None))?;
    Ok(values
        .iter()
        .position(|v| v.split_whitespace().next() == Some(name)))
}

fn missing(kind: SectionKind, backend: &str, name: &str) -> StoreError {
    StoreError::not_found(
        format!("server '{}' does not exist", name),
        EntityKind::Server.context(name, Some((kind, backend))),
    )
}

pub fn list_servers<S: Snapshot>(
    store: &ConfigStore<S>,
    kind: SectionKind,
    backend: &str,
    transaction: Option<&str>,
) -> StoreResult<(i64, Vec<Server>)> {
    check_parent(kind)?;
    store.read(transaction, |snapshot| read_servers(snapshot, kind, backend))
}

pub fn get_server<S: Snapshot>(
    store: &ConfigStore<S>,
    kind: SectionKind,
    backend: &str,
    name: &str,
    transaction: Option<&str>,
) -> StoreResult<(i64, Server)> {
    check_parent(kind)?;
    store.read(transaction, |snapshot| {
        read_servers(snapshot, kind, backend)?
            .into_iter()
            .find(|s| s.name == name)
            .ok_or_else(|| missing(kind, backend, name))
    })
}

pub fn create_server<S: Snapshot>(
    store: &ConfigStore<S>,
    kind: SectionKind,
    backend: &str,
    server: &Server,
    target: &Target,
) -> StoreResult<(i64, Server)> {
    check_parent(kind)?;
    server.validate()?;
    let context = EntityKind::Server.context(&server.name, Some((kind, backend)));
    let err = EntityKind::Server.tree_error(&server.name, Some((kind, backend)));

    store.edit(target, |snapshot| {
        if position(snapshot, kind, backend, &server.name)?.is_some() {
            return Err(StoreError::already_exists(
                format!("server '{}' already exists", server.name),
                context,
            ));
        }
        snapshot
            .insert(kind, backend, KEYWORD, &server.render(), None)
            .map_err(&err)?;
        Ok(server.clone())
    })
}

/// Replace server `name` in place.
pub fn replace_server<S: Snapshot>(
    store: &ConfigStore<S>,
    kind: SectionKind,
    backend: &str,
    name: &str,
    server: &Server,
    target: &Target,
) -> StoreResult<(i64, Server)> {
    check_parent(kind)?;
    server.validate()?;
    if server.name != name {
        return Err(StoreError::validation(format!(
            "server name '{}' does not match '{}'",
            server.name, name
        )));
    }
    let err = EntityKind::Server.tree_error(name, Some((kind, backend)));

    store.edit(target, |snapshot| {
        let index = position(snapshot, kind, backend, name)?.ok_or_else(|| missing(kind, backend, name))?;
        snapshot.delete(kind, backend, KEYWORD, Some(index)).map_err(&err)?;
        snapshot
            .insert(kind, backend, KEYWORD, &server.render(), Some(index))
            .map_err(&err)?;
        Ok(server.clone())
    })
}

pub fn delete_server<S: Snapshot>(
    store: &ConfigStore<S>,
    kind: SectionKind,
    backend: &str,
    name: &str,
    target: &Target,
) -> StoreResult<i64> {
    check_parent(kind)?;
    let err = EntityKind::Server.tree_error(name, Some((kind, backend)));

    let (version, ()) = store.edit(target, |snapshot| {
        let index = position(snapshot, kind, backend, name)?.ok_or_else(|| missing(kind, backend, name))?;
        snapshot.delete(kind, backend, KEYWORD, Some(index)).map_err(&err)
    })?;
    Ok(version)
}
