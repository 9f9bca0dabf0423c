//! Whole sections (`backend app1`, `frontend http-in`, `global`, ...).

use serde::{Deserialize, Serialize};

use crate::entities::{validate_keyword, validate_token, validate_value, EntityKind};
use crate::parser::{SectionKind, Snapshot};
use crate::store::{ConfigStore, StoreError, StoreResult, Target};

/// One `keyword value` line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Directive {
    pub keyword: String,
    #[serde(default)]
    pub value: String,
}

impl Directive {
    pub fn new(keyword: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            value: value.into(),
        }
    }
}

/// A section and its directives. Directive order is kept per keyword.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub directives: Vec<Directive>,
}

impl Section {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            directives: Vec::new(),
        }
    }

    pub fn with(mut self, keyword: &str, value: &str) -> Self {
        self.directives.push(Directive::new(keyword, value));
        self
    }

    fn validate(&self, kind: SectionKind) -> StoreResult<()> {
        if kind.requires_name() || !self.name.is_empty() {
            if !kind.allows_name() {
                return Err(StoreError::validation(format!("{} section does not take a name", kind)));
            }
            validate_token("name", &self.name)?;
        }
        for directive in &self.directives {
            validate_keyword("keyword", &directive.keyword)?;
            validate_value("value", &directive.value)?;
        }
        Ok(())
    }

    /// Keywords in first-appearance order with their values.
    fn grouped(&self) -> Vec<(&str, Vec<String>)> {
        let mut groups: Vec<(&str, Vec<String>)> = Vec::new();
        for d in &self.directives {
            match groups.iter_mut().find(|(k, _)| *k == d.keyword) {
                Some((_, values)) => values.push(d.value.clone()),
                None => groups.push((d.keyword.as_str(), vec![d.value.clone()])),
            }
        }
        groups
    }
}

fn read_section<S: Snapshot>(snapshot: &S, kind: SectionKind, name: &str) -> StoreResult<Section> {
    let entries = snapshot
        .entries(kind, name)
        .map_err(EntityKind::Section(kind).tree_error(name, None))?;
    Ok(Section {
        name: name.to_string(),
        directives: entries
            .into_iter()
            .map(|(keyword, value)| Directive { keyword, value })
            .collect(),
    })
}

pub fn list_sections<S: Snapshot>(
    store: &ConfigStore<S>,
    kind: SectionKind,
    transaction: Option<&str>,
) -> StoreResult<(i64, Vec<Section>)> {
    store.read(transaction, |snapshot| {
        snapshot
            .sections(kind)
            .iter()
            .map(|name| read_section(snapshot, kind, name))
            .collect()
    })
}

pub fn get_section<S: Snapshot>(
    store: &ConfigStore<S>,
    kind: SectionKind,
    name: &str,
    transaction: Option<&str>,
) -> StoreResult<(i64, Section)> {
    store.read(transaction, |snapshot| read_section(snapshot, kind, name))
}

pub fn create_section<S: Snapshot>(
    store: &ConfigStore<S>,
    kind: SectionKind,
    section: &Section,
    target: &Target,
) -> StoreResult<(i64, Section)> {
    section.validate(kind)?;
    let name = section.name.as_str();
    let err = EntityKind::Section(kind).tree_error(name, None);

    store.edit(target, |snapshot| {
        snapshot.create_section(kind, name).map_err(&err)?;
        for (keyword, values) in section.grouped() {
            snapshot.set(kind, name, keyword, &values).map_err(&err)?;
        }
        read_section(snapshot, kind, name)
    })
}

/// Replace a section's directives in place, keeping its position in the file.
pub fn replace_section<S: Snapshot>(
    store: &ConfigStore<S>,
    kind: SectionKind,
    name: &str,
    section: &Section,
    target: &Target,
) -> StoreResult<(i64, Section)> {
    section.validate(kind)?;
    if section.name != name {
        return Err(StoreError::validation(format!(
            "section name '{}' does not match '{}'",
            section.name, name
        )));
    }
    let err = EntityKind::Section(kind).tree_error(name, None);

    store.edit(target, |snapshot| {
        let groups = section.grouped();
        let existing = snapshot.entries(kind, name).map_err(&err)?;
        for (keyword, _) in &existing {
            if !groups.iter().any(|(k, _)| k == keyword) {
                snapshot.set(kind, name, keyword, &[]).map_err(&err)?;
            }
        }
        for (keyword, values) in &groups {
            snapshot.set(kind, name, keyword, values).map_err(&err)?;
        }
        read_section(snapshot, kind, name)
    })
}

pub fn delete_section<S: Snapshot>(
    store: &ConfigStore<S>,
    kind: SectionKind,
    name: &str,
    target: &Target,
) -> StoreResult<i64> {
    let err = EntityKind::Section(kind).tree_error(name, None);
    let (version, ()) = store.edit(target, |snapshot| snapshot.delete_section(kind, name).map_err(&err))?;
    Ok(version)
}
