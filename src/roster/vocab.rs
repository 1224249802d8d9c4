use std::collections::{HashMap, HashSet};

use serde::Serialize;

/// Header and control labels copied along with the member table.
const STRUCTURAL_TOKENS: &[&str] = &["Name", "Account type", "Date added", "Invite member", "Filter"];

/// Labels that open a new section of the page; a backward name search must not cross them.
const BLOCK_BOUNDARIES: &[&str] = &["Invite member", "Filter"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum Role {
    #[default]
    Member,
    Owner,
    Admin,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Member, Role::Owner, Role::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Member => "Member",
            Role::Owner => "Owner",
            Role::Admin => "Admin",
        }
    }
}

/// Lookup tables the scanners consult. Scanning code never names a literal token.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    structural: HashSet<String>,
    boundaries: HashSet<String>,
    roles: HashMap<String, Role>,
}

impl Default for Vocabulary {
    fn default() -> Self {
        Vocabulary {
            structural: STRUCTURAL_TOKENS.iter().map(|t| t.to_string()).collect(),
            boundaries: BLOCK_BOUNDARIES.iter().map(|t| t.to_string()).collect(),
            roles: Role::ALL.iter().map(|r| (r.as_str().to_string(), *r)).collect(),
        }
    }
}

impl Vocabulary {
    /// Extra header labels to skip during name resolution (e.g. a renamed column).
    pub fn with_structural_tokens<I, S>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.structural.extend(
            tokens
                .into_iter()
                .map(|t| {
                    let t: String = t.into();
                    t.trim().to_string()
                })
                .filter(|t| !t.is_empty()),
        );
        self
    }

    pub fn is_structural(&self, line: &str) -> bool {
        self.structural.contains(line) || self.boundaries.contains(line)
    }

    pub fn is_boundary(&self, line: &str) -> bool {
        self.boundaries.contains(line)
    }

    /// Exact, whole-line match only: "Members" or "member" are not roles.
    pub fn role(&self, line: &str) -> Option<Role> {
        self.roles.get(line).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_tables() {
        let v = Vocabulary::default();
        assert!(v.is_structural("Account type"));
        assert!(v.is_structural("Filter"));
        assert!(v.is_boundary("Invite member"));
        assert!(!v.is_boundary("Name"));
        assert!(!v.is_structural("John Doe"));
    }

    #[test]
    fn roles_match_whole_line() {
        let v = Vocabulary::default();
        assert_eq!(v.role("Owner"), Some(Role::Owner));
        assert_eq!(v.role("Admin"), Some(Role::Admin));
        assert_eq!(v.role("owner"), None);
        assert_eq!(v.role("Members"), None);
    }

    #[test]
    fn extra_structural_tokens() {
        let v = Vocabulary::default().with_structural_tokens(["Seat type ", ""]);
        assert!(v.is_structural("Seat type"));
        assert!(!v.is_structural(""));
        assert!(!v.is_boundary("Seat type"));
    }
}
