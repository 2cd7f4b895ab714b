//! Ownership and ACL snapshot types

use std::fmt;
use std::path::PathBuf;

/// Whether a named principal is a user or a group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrincipalKind {
    User,
    Group,
}

impl PrincipalKind {
    /// Prefix used in ACL text
    pub fn as_str(&self) -> &'static str {
        match self {
            PrincipalKind::User => "user",
            PrincipalKind::Group => "group",
        }
    }
}

/// A principal that resolved to a name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NamedPrincipal {
    pub kind: PrincipalKind,
    pub name: String,
}

impl NamedPrincipal {
    pub fn user(name: impl Into<String>) -> Self {
        Self {
            kind: PrincipalKind::User,
            name: name.into(),
        }
    }

    pub fn group(name: impl Into<String>) -> Self {
        Self {
            kind: PrincipalKind::Group,
            name: name.into(),
        }
    }
}

impl fmt::Display for NamedPrincipal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.as_str(), self.name)
    }
}

/// Subject of an ACE
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    /// `user:<name>` or `group:<name>`
    Named(NamedPrincipal),

    /// Bare UUID that no provider resolves any more
    Orphan(String),
}

impl Principal {
    pub fn is_orphan(&self) -> bool {
        matches!(self, Principal::Orphan(_))
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Principal::Named(named) => named.fmt(f),
            Principal::Orphan(uuid) => f.write_str(uuid),
        }
    }
}

/// One access control entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ace {
    /// Position in the ACL at inspection time
    pub ordinal: usize,

    /// Who the entry applies to
    pub principal: Principal,

    /// Entry was inherited from a parent directory
    pub inherited: bool,

    /// Everything after the principal, e.g. `allow read,write`
    pub permissions: String,
}

/// Ownership and ACL of one path, from a single listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSnapshot {
    pub path: PathBuf,

    /// Owner name as listed
    pub owner: String,

    /// Group name as listed
    pub group: String,

    /// Entries in listing order
    pub aces: Vec<Ace>,
}

impl PathSnapshot {
    pub fn has_acl(&self) -> bool {
        !self.aces.is_empty()
    }

    /// Number of orphan entries
    pub fn orphan_count(&self) -> usize {
        self.aces.iter().filter(|a| a.principal.is_orphan()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_principal_display() {
        assert_eq!(NamedPrincipal::user("alice").to_string(), "user:alice");
        assert_eq!(
            Principal::Named(NamedPrincipal::group("staff")).to_string(),
            "group:staff"
        );
        assert_eq!(Principal::Orphan("ABCD".into()).to_string(), "ABCD");
    }

    #[test]
    fn test_orphan_count() {
        let snapshot = PathSnapshot {
            path: "/data".into(),
            owner: "alice".into(),
            group: "staff".into(),
            aces: vec![
                Ace {
                    ordinal: 0,
                    principal: Principal::Orphan("A".into()),
                    inherited: false,
                    permissions: "allow read".into(),
                },
                Ace {
                    ordinal: 1,
                    principal: Principal::Named(NamedPrincipal::user("alice")),
                    inherited: false,
                    permissions: "allow read".into(),
                },
            ],
        };
        assert!(snapshot.has_acl());
        assert_eq!(snapshot.orphan_count(), 1);
    }
}
