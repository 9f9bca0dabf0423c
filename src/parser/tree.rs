//! Section/keyword tree for load-balancer configuration text.
//!
//! # Responsibilities
//! - Split text into sections (`kind [name]` at column 0) and indented directives
//! - Keep comments, blank lines and untouched directives byte-for-byte
//! - Render edited directives in a canonical `    keyword value` form

use crate::parser::{ParseError, SectionKind, Snapshot, TreeError};

const INDENT: &str = "    ";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Line {
    /// Comment or blank line.
    Verbatim(String),
    Entry {
        keyword: String,
        value: String,
        /// Original text; dropped once the entry is edited.
        raw: Option<String>,
    },
}

impl Line {
    fn entry(keyword: &str, value: &str) -> Self {
        Line::Entry {
            keyword: keyword.to_string(),
            value: value.to_string(),
            raw: None,
        }
    }

    fn is_keyword(&self, wanted: &str) -> bool {
        matches!(self, Line::Entry { keyword, .. } if keyword == wanted)
    }

    fn is_blank(&self) -> bool {
        matches!(self, Line::Verbatim(text) if text.trim().is_empty())
    }

    fn render(&self, out: &mut String) {
        match self {
            Line::Verbatim(text) => out.push_str(text),
            Line::Entry { raw: Some(raw), .. } => out.push_str(raw),
            Line::Entry { keyword, value, raw: None } => {
                out.push_str(INDENT);
                out.push_str(keyword);
                if !value.is_empty() {
                    out.push(' ');
                    out.push_str(value);
                }
            }
        }
        out.push('\n');
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Section {
    kind: SectionKind,
    name: String,
    header: Option<String>,
    lines: Vec<Line>,
}

impl Section {
    fn positions(&self, keyword: &str) -> Vec<usize> {
        self.lines
            .iter()
            .enumerate()
            .filter(|(_, line)| line.is_keyword(keyword))
            .map(|(i, _)| i)
            .collect()
    }

    /// Index just past the last non-blank line.
    fn append_position(&self) -> usize {
        self.lines
            .iter()
            .rposition(|line| !line.is_blank())
            .map(|i| i + 1)
            .unwrap_or(0)
    }

    fn render(&self, out: &mut String) {
        match &self.header {
            Some(raw) => out.push_str(raw),
            None => {
                out.push_str(self.kind.as_str());
                if !self.name.is_empty() {
                    out.push(' ');
                    out.push_str(&self.name);
                }
            }
        }
        out.push('\n');
        for line in &self.lines {
            line.render(out);
        }
    }
}

/// Parsed configuration: a preamble of comments followed by ordered sections.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SectionTree {
    preamble: Vec<String>,
    sections: Vec<Section>,
}

impl SectionTree {
    pub fn new() -> Self {
        Self::default()
    }

    fn find(&self, kind: SectionKind, name: &str) -> Option<usize> {
        self.sections
            .iter()
            .position(|s| s.kind == kind && s.name == name)
    }

    fn section(&self, kind: SectionKind, name: &str) -> Result<&Section, TreeError> {
        self.find(kind, name)
            .map(|i| &self.sections[i])
            .ok_or_else(|| TreeError::SectionNotFound {
                kind,
                name: name.to_string(),
            })
    }

    fn section_mut(&mut self, kind: SectionKind, name: &str) -> Result<&mut Section, TreeError> {
        match self.find(kind, name) {
            Some(i) => Ok(&mut self.sections[i]),
            None => Err(TreeError::SectionNotFound {
                kind,
                name: name.to_string(),
            }),
        }
    }

    fn parse_header(line_no: usize, line: &str) -> Result<(SectionKind, String), ParseError> {
        let mut tokens = line.split_whitespace();
        let keyword = tokens.next().unwrap_or_default();
        let kind: SectionKind = keyword
            .parse()
            .map_err(|_| ParseError::new(line_no, format!("unknown section '{}'", keyword)))?;
        let name = tokens.next().unwrap_or_default().to_string();

        if name.is_empty() && kind.requires_name() {
            return Err(ParseError::new(line_no, format!("{} section requires a name", kind)));
        }
        if !name.is_empty() && !kind.allows_name() {
            return Err(ParseError::new(line_no, format!("{} section does not take a name", kind)));
        }
        Ok((kind, name))
    }
}

/// Entries written by the store must parse back unchanged.
fn check_entry(keyword: &str, value: &str) -> Result<(), TreeError> {
    if keyword.is_empty() || keyword.starts_with('#') || keyword.contains(char::is_whitespace) {
        return Err(TreeError::InvalidKeyword {
            keyword: keyword.to_string(),
        });
    }
    if value.contains(['\n', '\r']) || value.trim() != value {
        return Err(TreeError::InvalidValue {
            keyword: keyword.to_string(),
            value: value.to_string(),
        });
    }
    Ok(())
}

fn split_directive(line: &str) -> (&str, &str) {
    let trimmed = line.trim();
    match trimmed.find(char::is_whitespace) {
        Some(at) => (&trimmed[..at], trimmed[at..].trim_start()),
        None => (trimmed, ""),
    }
}

impl Snapshot for SectionTree {
    fn parse(text: &str) -> Result<Self, ParseError> {
        let mut tree = SectionTree::new();

        for (i, line) in text.lines().enumerate() {
            let line_no = i + 1;
            let trimmed = line.trim();

            if trimmed.is_empty() || trimmed.starts_with('#') {
                match tree.sections.last_mut() {
                    Some(section) => section.lines.push(Line::Verbatim(line.to_string())),
                    None => tree.preamble.push(line.to_string()),
                }
                continue;
            }

            if !line.starts_with(char::is_whitespace) {
                let (kind, name) = Self::parse_header(line_no, line)?;
                if !name.is_empty() && tree.find(kind, &name).is_some() {
                    return Err(ParseError::new(
                        line_no,
                        format!("duplicate {} section '{}'", kind, name),
                    ));
                }
                tree.sections.push(Section {
                    kind,
                    name,
                    header: Some(line.to_string()),
                    lines: Vec::new(),
                });
                continue;
            }

            let section = tree
                .sections
                .last_mut()
                .ok_or_else(|| ParseError::new(line_no, "directive outside of a section"))?;
            let (keyword, value) = split_directive(line);
            section.lines.push(Line::Entry {
                keyword: keyword.to_string(),
                value: value.to_string(),
                raw: Some(line.to_string()),
            });
        }

        Ok(tree)
    }

    fn serialize(&self) -> String {
        let mut out = String::new();
        for line in &self.preamble {
            out.push_str(line);
            out.push('\n');
        }
        for section in &self.sections {
            section.render(&mut out);
        }
        out
    }

    fn sections(&self, kind: SectionKind) -> Vec<String> {
        self.sections
            .iter()
            .filter(|s| s.kind == kind)
            .map(|s| s.name.clone())
            .collect()
    }

    fn section_exists(&self, kind: SectionKind, name: &str) -> bool {
        self.find(kind, name).is_some()
    }

    fn create_section(&mut self, kind: SectionKind, name: &str) -> Result<(), TreeError> {
        let name_ok = if name.is_empty() {
            !kind.requires_name()
        } else {
            kind.allows_name() && !name.contains(char::is_whitespace)
        };
        if !name_ok {
            return Err(TreeError::InvalidName {
                kind,
                name: name.to_string(),
            });
        }
        if self.section_exists(kind, name) {
            return Err(TreeError::SectionExists {
                kind,
                name: name.to_string(),
            });
        }

        // Keep one blank line between sections.
        match self.sections.last_mut() {
            Some(prev) if !prev.lines.last().is_some_and(Line::is_blank) => {
                prev.lines.push(Line::Verbatim(String::new()));
            }
            None if self.preamble.last().is_some_and(|l| !l.trim().is_empty()) => {
                self.preamble.push(String::new());
            }
            _ => {}
        }

        self.sections.push(Section {
            kind,
            name: name.to_string(),
            header: None,
            lines: Vec::new(),
        });
        Ok(())
    }

    fn delete_section(&mut self, kind: SectionKind, name: &str) -> Result<(), TreeError> {
        let index = self.find(kind, name).ok_or_else(|| TreeError::SectionNotFound {
            kind,
            name: name.to_string(),
        })?;
        self.sections.remove(index);
        Ok(())
    }

    fn entries(&self, kind: SectionKind, name: &str) -> Result<Vec<(String, String)>, TreeError> {
        let section = self.section(kind, name)?;
        Ok(section
            .lines
            .iter()
            .filter_map(|line| match line {
                Line::Entry { keyword, value, .. } => Some((keyword.clone(), value.clone())),
                Line::Verbatim(_) => None,
            })
            .collect())
    }

    fn get(&self, kind: SectionKind, name: &str, keyword: &str) -> Result<Vec<String>, TreeError> {
        let section = self.section(kind, name)?;
        Ok(section
            .lines
            .iter()
            .filter_map(|line| match line {
                Line::Entry { keyword: k, value, .. } if k == keyword => Some(value.clone()),
                _ => None,
            })
            .collect())
    }

    fn set(
        &mut self,
        kind: SectionKind,
        name: &str,
        keyword: &str,
        values: &[String],
    ) -> Result<(), TreeError> {
        if values.is_empty() {
            check_entry(keyword, "")?;
        }
        for value in values {
            check_entry(keyword, value)?;
        }
        let section = self.section_mut(kind, name)?;
        let positions = section.positions(keyword);

        for (pos, value) in positions.iter().zip(values) {
            section.lines[*pos] = Line::entry(keyword, value);
        }
        for pos in positions.iter().skip(values.len()).rev() {
            section.lines.remove(*pos);
        }
        if values.len() > positions.len() {
            let mut at = match positions.last() {
                Some(last) => last + 1,
                None => section.append_position(),
            };
            for value in &values[positions.len()..] {
                section.lines.insert(at, Line::entry(keyword, value));
                at += 1;
            }
        }
        Ok(())
    }

    fn insert(
        &mut self,
        kind: SectionKind,
        name: &str,
        keyword: &str,
        value: &str,
        index: Option<usize>,
    ) -> Result<(), TreeError> {
        check_entry(keyword, value)?;
        let section = self.section_mut(kind, name)?;
        let positions = section.positions(keyword);
        let len = positions.len();
        let index = index.unwrap_or(len);

        let at = if index < len {
            positions[index]
        } else if index == len {
            match positions.last() {
                Some(last) => last + 1,
                None => section.append_position(),
            }
        } else {
            return Err(TreeError::IndexOutOfRange {
                keyword: keyword.to_string(),
                index,
                len,
            });
        };

        section.lines.insert(at, Line::entry(keyword, value));
        Ok(())
    }

    fn delete(
        &mut self,
        kind: SectionKind,
        name: &str,
        keyword: &str,
        index: Option<usize>,
    ) -> Result<(), TreeError> {
        let section = self.section_mut(kind, name)?;
        let positions = section.positions(keyword);
        if positions.is_empty() {
            return Err(TreeError::KeywordNotFound {
                kind,
                name: name.to_string(),
                keyword: keyword.to_string(),
            });
        }

        match index {
            None => {
                for pos in positions.iter().rev() {
                    section.lines.remove(*pos);
                }
            }
            Some(i) if i < positions.len() => {
                section.lines.remove(positions[i]);
            }
            Some(i) => {
                return Err(TreeError::IndexOutOfRange {
                    keyword: keyword.to_string(),
                    index: i,
                    len: positions.len(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
# managed by lb-config-store
global
    daemon
    maxconn 256

defaults
  mode http
    timeout connect 5s

frontend http-in
    bind *:80
    # route everything to the web farm
    default_backend web

backend web
    balance roundrobin
    server web1 10.0.0.1:8080 check
    server web2 10.0.0.2:8080 check
";

    #[test]
    fn test_round_trip_preserves_text() {
        let tree = SectionTree::parse(SAMPLE).unwrap();
        assert_eq!(tree.serialize(), SAMPLE);
    }

    #[test]
    fn test_sections_and_get() {
        let tree = SectionTree::parse(SAMPLE).unwrap();
        assert_eq!(tree.sections(SectionKind::Backend), vec!["web".to_string()]);
        assert_eq!(tree.sections(SectionKind::Global), vec![String::new()]);
        assert!(tree.section_exists(SectionKind::Frontend, "http-in"));

        let servers = tree.get(SectionKind::Backend, "web", "server").unwrap();
        assert_eq!(servers, vec!["web1 10.0.0.1:8080 check", "web2 10.0.0.2:8080 check"]);
        let timeouts = tree.get(SectionKind::Defaults, "", "timeout").unwrap();
        assert_eq!(timeouts, vec!["connect 5s"]);
        assert!(tree.get(SectionKind::Backend, "web", "missing").unwrap().is_empty());
    }

    #[test]
    fn test_parse_errors() {
        let err = SectionTree::parse("global\nupstream x\n").unwrap_err();
        assert_eq!(err.line, 2);

        let err = SectionTree::parse("    maxconn 10\n").unwrap_err();
        assert!(err.message.contains("outside"));

        assert!(SectionTree::parse("backend\n").is_err());
        assert!(SectionTree::parse("global main\n").is_err());
        assert!(SectionTree::parse("backend a\nbackend a\n").is_err());
    }

    #[test]
    fn test_create_and_delete_section() {
        let mut tree = SectionTree::parse(SAMPLE).unwrap();
        tree.create_section(SectionKind::Backend, "app1").unwrap();
        tree.insert(SectionKind::Backend, "app1", "balance", "leastconn", None).unwrap();

        let text = tree.serialize();
        assert!(text.ends_with("    server web2 10.0.0.2:8080 check\n\nbackend app1\n    balance leastconn\n"));

        assert_eq!(
            tree.create_section(SectionKind::Backend, "app1"),
            Err(TreeError::SectionExists {
                kind: SectionKind::Backend,
                name: "app1".into()
            })
        );
        assert!(matches!(
            tree.create_section(SectionKind::Backend, ""),
            Err(TreeError::InvalidName { .. })
        ));

        tree.delete_section(SectionKind::Backend, "app1").unwrap();
        assert!(!tree.section_exists(SectionKind::Backend, "app1"));
        assert!(matches!(
            tree.delete_section(SectionKind::Backend, "app1"),
            Err(TreeError::SectionNotFound { .. })
        ));
    }

    #[test]
    fn test_set_replaces_in_place() {
        let mut tree = SectionTree::parse(SAMPLE).unwrap();
        tree.set(SectionKind::Global, "", "maxconn", &["1024".to_string()]).unwrap();
        let text = tree.serialize();
        assert!(text.contains("    daemon\n    maxconn 1024\n\ndefaults"));

        tree.set(SectionKind::Backend, "web", "server", &[]).unwrap();
        assert!(tree.get(SectionKind::Backend, "web", "server").unwrap().is_empty());

        tree.set(
            SectionKind::Frontend,
            "http-in",
            "bind",
            &["*:80".to_string(), "*:443".to_string()],
        )
        .unwrap();
        assert_eq!(
            tree.get(SectionKind::Frontend, "http-in", "bind").unwrap(),
            vec!["*:80", "*:443"]
        );
    }

    #[test]
    fn test_insert_and_delete_by_index() {
        let mut tree = SectionTree::parse(SAMPLE).unwrap();
        tree.insert(SectionKind::Backend, "web", "server", "web0 10.0.0.9:8080", Some(0))
            .unwrap();
        let servers = tree.get(SectionKind::Backend, "web", "server").unwrap();
        assert_eq!(servers[0], "web0 10.0.0.9:8080");
        assert_eq!(servers.len(), 3);

        assert!(matches!(
            tree.insert(SectionKind::Backend, "web", "server", "x 1.1.1.1:1", Some(9)),
            Err(TreeError::IndexOutOfRange { index: 9, len: 3, .. })
        ));

        tree.delete(SectionKind::Backend, "web", "server", Some(1)).unwrap();
        let servers = tree.get(SectionKind::Backend, "web", "server").unwrap();
        assert_eq!(servers, vec!["web0 10.0.0.9:8080", "web2 10.0.0.2:8080 check"]);

        tree.delete(SectionKind::Backend, "web", "server", None).unwrap();
        assert!(matches!(
            tree.delete(SectionKind::Backend, "web", "server", None),
            Err(TreeError::KeywordNotFound { .. })
        ));
    }

    #[test]
    fn test_clone_is_independent() {
        let original = SectionTree::parse(SAMPLE).unwrap();
        let mut copy = original.clone();
        copy.delete_section(SectionKind::Backend, "web").unwrap();
        assert!(original.section_exists(SectionKind::Backend, "web"));
        assert_eq!(original.serialize(), SAMPLE);
    }

    #[test]
    fn test_empty_text() {
        let tree = SectionTree::parse("").unwrap();
        assert_eq!(tree.serialize(), "");
        assert!(tree.sections(SectionKind::Backend).is_empty());
    }

    #[test]
    fn test_entries_that_would_not_reparse_are_rejected() {
        let mut tree = SectionTree::parse(SAMPLE).unwrap();
        let before = tree.clone();

        assert!(matches!(
            tree.set(SectionKind::Backend, "web", "#note", &["keep".to_string()]),
            Err(TreeError::InvalidKeyword { .. })
        ));
        assert!(matches!(
            tree.insert(SectionKind::Backend, "web", "acl ok", "always_true", None),
            Err(TreeError::InvalidKeyword { .. })
        ));
        assert!(matches!(
            tree.insert(SectionKind::Backend, "web", "balance", " source", None),
            Err(TreeError::InvalidValue { .. })
        ));
        assert!(matches!(
            tree.set(SectionKind::Backend, "web", "balance", &["source\nbind".to_string()]),
            Err(TreeError::InvalidValue { .. })
        ));
        assert_eq!(tree, before);

        tree.set(SectionKind::Backend, "web", "option", &["httpchk".to_string()]).unwrap();
        assert_eq!(SectionTree::parse(&tree.serialize()).unwrap().serialize(), tree.serialize());
        assert_eq!(
            SectionTree::parse(&tree.serialize()).unwrap().get(SectionKind::Backend, "web", "option").unwrap(),
            vec!["httpchk"]
        );
    }
}
