//! Structured configuration snapshots.
//!
//! # Data Flow
//! ```text
//! artifact text
//!     → Snapshot::parse (tree of sections / keywords)
//!     → generic primitives: get / set / insert / delete / sections
//!     → Snapshot::serialize (back to text)
//! ```
//!
//! # Design Decisions
//! - The store only talks to the `Snapshot` trait; `SectionTree` is the bundled implementation
//! - `Clone` is a deep copy; transactions never share a tree
//! - Comments and blank lines survive a parse/serialize cycle untouched

pub mod kind;
pub mod tree;

use thiserror::Error;

pub use kind::SectionKind;
pub use tree::SectionTree;

/// Text could not be turned into a snapshot.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("line {line}: {message}")]
pub struct ParseError {
    /// 1-based line number within the parsed text.
    pub line: usize,
    pub message: String,
}

impl ParseError {
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

/// A structural primitive could not be applied.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TreeError {
    #[error("{kind} section '{name}' does not exist")]
    SectionNotFound { kind: SectionKind, name: String },

    #[error("{kind} section '{name}' already exists")]
    SectionExists { kind: SectionKind, name: String },

    #[error("keyword '{keyword}' not found in {kind} '{name}'")]
    KeywordNotFound {
        kind: SectionKind,
        name: String,
        keyword: String,
    },

    #[error("index {index} out of range for '{keyword}' ({len} entries)")]
    IndexOutOfRange {
        keyword: String,
        index: usize,
        len: usize,
    },

    #[error("invalid section name '{name}' for {kind}")]
    InvalidName { kind: SectionKind, name: String },

    /// The entry would not read back as the same keyword (empty, spaced, or a comment marker).
    #[error("invalid keyword '{keyword}'")]
    InvalidKeyword { keyword: String },

    #[error("invalid value for '{keyword}': must be one line without surrounding whitespace")]
    InvalidValue { keyword: String, value: String },
}

/// Contract the store needs from a configuration tree.
///
/// Sections are addressed by kind and name (`""` for unnamed sections such as
/// `global`); entries inside a section by keyword and, where several lines share
/// a keyword, by the position among those lines.
pub trait Snapshot: Clone + Send + Sync + 'static {
    fn parse(text: &str) -> Result<Self, ParseError>;

    fn serialize(&self) -> String;

    /// Names of all sections of `kind`, in file order.
    fn sections(&self, kind: SectionKind) -> Vec<String>;

    fn section_exists(&self, kind: SectionKind, name: &str) -> bool;

    fn create_section(&mut self, kind: SectionKind, name: &str) -> Result<(), TreeError>;

    fn delete_section(&mut self, kind: SectionKind, name: &str) -> Result<(), TreeError>;

    /// All `(keyword, value)` entries of a section, in order.
    fn entries(&self, kind: SectionKind, name: &str) -> Result<Vec<(String, String)>, TreeError>;

    /// Values of every line using `keyword`; empty when the keyword is absent.
    fn get(&self, kind: SectionKind, name: &str, keyword: &str) -> Result<Vec<String>, TreeError>;

    /// Replace all lines using `keyword` with `values` (empty removes them).
    fn set(
        &mut self,
        kind: SectionKind,
        name: &str,
        keyword: &str,
        values: &[String],
    ) -> Result<(), TreeError>;

    /// Insert a `keyword value` line before the `index`-th existing occurrence,
    /// or after the last one when `index` is `None` or equals the count.
    fn insert(
        &mut self,
        kind: SectionKind,
        name: &str,
        keyword: &str,
        value: &str,
        index: Option<usize>,
    ) -> Result<(), TreeError>;

    /// Delete the `index`-th occurrence of `keyword`, or every occurrence when `None`.
    fn delete(
        &mut self,
        kind: SectionKind,
        name: &str,
        keyword: &str,
        index: Option<usize>,
    ) -> Result<(), TreeError>;
}
