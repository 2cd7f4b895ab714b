//! Source and target provider discovery from the search policy
//!
//! The search policy must list exactly three nodes, in this order:
//!
//! ```text
//! CSPSearchPath:
//!  /Local/Default
//!  /Active Directory/CORP/All Domains     <- target
//!  /LDAPv3/od.example.com                 <- source
//! ```

use super::types::{DirectoryDescriptor, ProviderKind};
use crate::error::ConfigError;
use crate::tools::DirectoryService;
use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, info};

/// Nodes expected in the custom search path
const SEARCH_PATH_NODES: usize = 3;

static LDAP_NODE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/LDAPv3/(.+)$").expect("Invalid LDAP node regex"));

static AD_NODE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/Active Directory/(.+)/All Domains$").expect("Invalid AD node regex")
});

/// Source and target providers for a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderPair {
    /// Provider the filesystem currently refers to
    pub source: DirectoryDescriptor,

    /// Provider the filesystem is migrated to
    pub target: DirectoryDescriptor,
}

impl ProviderPair {
    /// Exchange source and target (test runs in reverse)
    pub fn swapped(self) -> Self {
        Self {
            source: self.target,
            target: self.source,
        }
    }
}

/// Read the search policy and resolve the source and target providers
pub fn discover_providers<D: DirectoryService + ?Sized>(
    service: &D,
) -> Result<ProviderPair, ConfigError> {
    info!("Get source and target directories");
    let policy = service.search_policy()?;
    let pair = parse_search_policy(&policy)?;
    debug!(source = %pair.source, target = %pair.target, "Providers discovered");
    Ok(pair)
}

/// Parse the `CSPSearchPath` block of a search policy dump
pub fn parse_search_policy(policy: &str) -> Result<ProviderPair, ConfigError> {
    let mut lines = policy.lines();
    lines
        .by_ref()
        .find(|line| line.trim_end() == "CSPSearchPath:")
        .ok_or(ConfigError::SearchPathMissing)?;

    let nodes: Vec<String> = lines
        .take_while(|line| line.starts_with(' '))
        .map(|line| line[1..].trim_end().to_string())
        .collect();

    if nodes.len() != SEARCH_PATH_NODES {
        return Err(ConfigError::SearchPathLength {
            nodes,
            expected: SEARCH_PATH_NODES,
        });
    }

    Ok(ProviderPair {
        source: parse_node(&nodes[2])?,
        target: parse_node(&nodes[1])?,
    })
}

/// Parse a node path into a descriptor
pub fn parse_node(node: &str) -> Result<DirectoryDescriptor, ConfigError> {
    let (kind, caps) = if let Some(caps) = LDAP_NODE_REGEX.captures(node) {
        (ProviderKind::Ldap, caps)
    } else if let Some(caps) = AD_NODE_REGEX.captures(node) {
        (ProviderKind::ActiveDirectory, caps)
    } else {
        return Err(ConfigError::UnsupportedNode {
            node: node.to_string(),
        });
    };

    Ok(DirectoryDescriptor {
        kind,
        domain: caps[1].to_string(),
        node: node.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const POLICY: &str = "\
CSPSearchPath:
 /Local/Default
 /Active Directory/CORP/All Domains
 /LDAPv3/od.example.com
DHCPLDAPDefault: off
SearchPolicy: dsAttrTypeStandard:CSPSearchPath
";

    #[test]
    fn test_parse_search_policy() {
        let pair = parse_search_policy(POLICY).unwrap();
        assert_eq!(pair.source.kind, ProviderKind::Ldap);
        assert_eq!(pair.source.domain, "od.example.com");
        assert_eq!(pair.source.node, "/LDAPv3/od.example.com");
        assert_eq!(pair.target.kind, ProviderKind::ActiveDirectory);
        assert_eq!(pair.target.domain, "CORP");
    }

    #[test]
    fn test_swapped() {
        let pair = parse_search_policy(POLICY).unwrap().swapped();
        assert_eq!(pair.source.kind, ProviderKind::ActiveDirectory);
        assert_eq!(pair.target.kind, ProviderKind::Ldap);
    }

    #[test]
    fn test_missing_search_path() {
        let err = parse_search_policy("SearchPolicy: dsAttrTypeStandard:NSPSearchPath\n");
        assert!(matches!(err, Err(ConfigError::SearchPathMissing)));
    }

    #[test]
    fn test_wrong_node_count() {
        let policy = "CSPSearchPath:\n /Local/Default\n /LDAPv3/od.example.com\n";
        match parse_search_policy(policy) {
            Err(ConfigError::SearchPathLength { nodes, expected }) => {
                assert_eq!(nodes.len(), 2);
                assert_eq!(expected, 3);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_unsupported_node() {
        assert!(matches!(
            parse_node("/NIS/example"),
            Err(ConfigError::UnsupportedNode { .. })
        ));
    }
}
