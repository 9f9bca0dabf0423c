//! Section kinds understood by the configuration tree.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Top-level section kinds of a load-balancer configuration.
///
/// The set is closed: anything else at column 0 is a parse error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SectionKind {
    Global,
    Defaults,
    Frontend,
    Backend,
    Listen,
    Resolvers,
    Peers,
    Userlist,
    Mailers,
    Cache,
    Program,
    HttpErrors,
    Ring,
    LogForward,
    FcgiApp,
}

impl SectionKind {
    pub const ALL: [SectionKind; 15] = [
        SectionKind::Global,
        SectionKind::Defaults,
        SectionKind::Frontend,
        SectionKind::Backend,
        SectionKind::Listen,
        SectionKind::Resolvers,
        SectionKind::Peers,
        SectionKind::Userlist,
        SectionKind::Mailers,
        SectionKind::Cache,
        SectionKind::Program,
        SectionKind::HttpErrors,
        SectionKind::Ring,
        SectionKind::LogForward,
        SectionKind::FcgiApp,
    ];

    /// Keyword used in the section header.
    pub fn as_str(&self) -> &'static str {
        match self {
            SectionKind::Global => "global",
            SectionKind::Defaults => "defaults",
            SectionKind::Frontend => "frontend",
            SectionKind::Backend => "backend",
            SectionKind::Listen => "listen",
            SectionKind::Resolvers => "resolvers",
            SectionKind::Peers => "peers",
            SectionKind::Userlist => "userlist",
            SectionKind::Mailers => "mailers",
            SectionKind::Cache => "cache",
            SectionKind::Program => "program",
            SectionKind::HttpErrors => "http-errors",
            SectionKind::Ring => "ring",
            SectionKind::LogForward => "log-forward",
            SectionKind::FcgiApp => "fcgi-app",
        }
    }

    /// Whether a header of this kind must carry a name.
    pub fn requires_name(&self) -> bool {
        !matches!(self, SectionKind::Global | SectionKind::Defaults)
    }

    /// Whether a header of this kind may carry a name at all.
    pub fn allows_name(&self) -> bool {
        !matches!(self, SectionKind::Global)
    }

    /// Sections that may hold `server` lines.
    pub fn holds_servers(&self) -> bool {
        matches!(self, SectionKind::Backend | SectionKind::Listen)
    }
}

impl fmt::Display for SectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SectionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SectionKind::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("unknown section kind '{}'", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trip() {
        for kind in SectionKind::ALL {
            assert_eq!(kind.as_str().parse::<SectionKind>().unwrap(), kind);
        }
        assert!("upstream".parse::<SectionKind>().is_err());
    }

    #[test]
    fn test_naming_rules() {
        assert!(!SectionKind::Global.allows_name());
        assert!(SectionKind::Defaults.allows_name());
        assert!(!SectionKind::Defaults.requires_name());
        assert!(SectionKind::Backend.requires_name());
        assert!(SectionKind::Listen.holds_servers());
        assert!(!SectionKind::Frontend.holds_servers());
    }
}
