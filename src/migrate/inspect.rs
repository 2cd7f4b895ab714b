//! Path inspection
//!
//! Parses a long listing with ACLs, e.g.
//!
//! ```text
//! drwxr-xr-x+ 4 alice  staff  128 Jun 30 10:00 /Shares/Projects
//!  0: user:alice allow list,add_file,search
//!  1: 5A1C0E2B-6F4D-4C3B-9E2A-1D0F8B7C6A59 allow read
//!  2: group:staff inherited allow list,search,file_inherit,directory_inherit
//! ```

use super::types::{Ace, NamedPrincipal, PathSnapshot, Principal};
use crate::error::InspectError;
use crate::tools::PathTools;
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;
use tracing::trace;

/// Field positions of owner and group on the first line
const OWNER_FIELD: usize = 2;
const GROUP_FIELD: usize = 3;

/// Names may contain spaces, so the principal ends where the optional
/// `inherited` marker and the `allow`/`deny` clause begin
static ACE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*(\d+):\s+(?:(user|group):(.+?)|([0-9A-Fa-f]{8}(?:-[0-9A-Fa-f]{4}){3}-[0-9A-Fa-f]{12}))(?:\s+(inherited))?\s+((?:allow|deny)\b.*?)\s*$",
    )
    .expect("Invalid ACE regex")
});

/// List `path` once and parse the result
pub fn inspect_path<T: PathTools + ?Sized>(
    tools: &T,
    path: &Path,
) -> Result<PathSnapshot, InspectError> {
    let listing = tools.list(path).map_err(|source| InspectError::Listing {
        path: path.to_path_buf(),
        source,
    })?;
    parse_listing(path, &listing)
}

/// Parse a listing into a snapshot
///
/// A listing without ACE lines is a valid snapshot with no entries. Any
/// other line that is not an ACE fails the whole path.
pub fn parse_listing(path: &Path, listing: &str) -> Result<PathSnapshot, InspectError> {
    let mut lines = listing.lines();

    let first = lines
        .by_ref()
        .find(|l| !l.trim().is_empty())
        .ok_or_else(|| InspectError::EmptyListing {
            path: path.to_path_buf(),
        })?;

    let fields: Vec<&str> = first.split_whitespace().collect();
    let (owner, group) = match (fields.get(OWNER_FIELD), fields.get(GROUP_FIELD)) {
        (Some(owner), Some(group)) => (owner.to_string(), group.to_string()),
        _ => {
            return Err(InspectError::MalformedOwnerLine {
                path: path.to_path_buf(),
                line: first.to_string(),
            })
        }
    };

    let aces = lines
        .filter(|l| !l.trim().is_empty())
        .map(|l| parse_ace(l).ok_or_else(|| malformed(path, l)))
        .collect::<Result<Vec<_>, _>>()?;

    trace!(path = %path.display(), owner = %owner, group = %group, aces = aces.len(), "Inspected");

    Ok(PathSnapshot {
        path: path.to_path_buf(),
        owner,
        group,
        aces,
    })
}

/// Parse one ACE line
pub fn parse_ace(line: &str) -> Option<Ace> {
    let caps = ACE_REGEX.captures(line)?;
    let ordinal = caps[1].parse().ok()?;

    let principal = match (caps.get(2), caps.get(3), caps.get(4)) {
        (Some(kind), Some(name), _) => {
            let name = name.as_str();
            Principal::Named(if kind.as_str() == "user" {
                NamedPrincipal::user(name)
            } else {
                NamedPrincipal::group(name)
            })
        }
        (_, _, Some(uuid)) => Principal::Orphan(uuid.as_str().to_string()),
        _ => return None,
    };

    Some(Ace {
        ordinal,
        principal,
        inherited: caps.get(5).is_some(),
        permissions: caps[6].to_string(),
    })
}

fn malformed(path: &Path, line: &str) -> InspectError {
    InspectError::MalformedAce {
        path: path.to_path_buf(),
        line: line.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrate::types::PrincipalKind;

    const LISTING: &str = "\
drwxr-xr-x+ 4 alice  staff  128 Jun 30 10:00 /Shares/Projects
 0: user:alice allow list,add_file,search
 1: 5A1C0E2B-6F4D-4C3B-9E2A-1D0F8B7C6A59 allow read
 2: group:staff inherited allow list,search,file_inherit,directory_inherit
";

    #[test]
    fn test_parse_listing() {
        let snap = parse_listing(Path::new("/Shares/Projects"), LISTING).unwrap();
        assert_eq!(snap.owner, "alice");
        assert_eq!(snap.group, "staff");
        assert_eq!(snap.aces.len(), 3);

        let first = &snap.aces[0];
        assert_eq!(first.ordinal, 0);
        assert_eq!(first.principal, Principal::Named(NamedPrincipal::user("alice")));
        assert!(!first.inherited);
        assert_eq!(first.permissions, "allow list,add_file,search");

        assert_eq!(
            snap.aces[1].principal,
            Principal::Orphan("5A1C0E2B-6F4D-4C3B-9E2A-1D0F8B7C6A59".into())
        );

        let third = &snap.aces[2];
        assert!(third.inherited);
        match &third.principal {
            Principal::Named(p) => assert_eq!(p.kind, PrincipalKind::Group),
            other => panic!("unexpected principal {other:?}"),
        }
        assert_eq!(
            third.permissions,
            "allow list,search,file_inherit,directory_inherit"
        );
    }

    #[test]
    fn test_no_acl_is_empty_sequence() {
        let listing = "-rw-r--r--  1 bob  staff  0 Jun 30 10:00 /Shares/file.txt\n";
        let snap = parse_listing(Path::new("/Shares/file.txt"), listing).unwrap();
        assert_eq!(snap.owner, "bob");
        assert!(snap.aces.is_empty());
    }

    #[test]
    fn test_empty_listing() {
        let err = parse_listing(Path::new("/x"), "\n").unwrap_err();
        assert!(matches!(err, InspectError::EmptyListing { .. }));
    }

    #[test]
    fn test_short_owner_line() {
        let err = parse_listing(Path::new("/x"), "-rw-r--r-- 1\n").unwrap_err();
        assert!(matches!(err, InspectError::MalformedOwnerLine { .. }));
    }

    #[test]
    fn test_garbage_ace_fails_path() {
        let listing = "-rw-r--r--+ 1 bob staff 0 Jun 30 10:00 /f\n 0: something odd\n";
        let err = parse_listing(Path::new("/f"), listing).unwrap_err();
        assert!(matches!(err, InspectError::MalformedAce { .. }));
    }

    #[test]
    fn test_parse_ace_deny_entry() {
        let ace = parse_ace(" 12: group:everyone deny delete").unwrap();
        assert_eq!(ace.ordinal, 12);
        assert_eq!(ace.permissions, "deny delete");
        assert!(!ace.inherited);
    }

    #[test]
    fn test_parse_ace_name_with_spaces() {
        let ace = parse_ace(" 3: group:CORP\\Domain Admins inherited allow read").unwrap();
        assert_eq!(
            ace.principal,
            Principal::Named(NamedPrincipal::group("CORP\\Domain Admins"))
        );
        assert!(ace.inherited);
        assert_eq!(ace.permissions, "allow read");

        let ace = parse_ace(" 4: user:Jane Q Public deny write,delete").unwrap();
        assert_eq!(
            ace.principal,
            Principal::Named(NamedPrincipal::user("Jane Q Public"))
        );
        assert!(!ace.inherited);
        assert_eq!(ace.permissions, "deny write,delete");
    }
}
