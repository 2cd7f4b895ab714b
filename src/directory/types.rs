//! Identity provider types

use std::collections::HashMap;
use std::fmt;

/// Kind of directory service backing a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    /// OpenLDAP / Open Directory (`/LDAPv3/...`)
    Ldap,
    /// Active Directory (`/Active Directory/...`)
    ActiveDirectory,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::Ldap => f.write_str("LDAP"),
            ProviderKind::ActiveDirectory => f.write_str("AD"),
        }
    }
}

/// One identity provider endpoint, resolved once per run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryDescriptor {
    /// Provider kind
    pub kind: ProviderKind,

    /// Domain (LDAP host or AD domain name)
    pub domain: String,

    /// Node path passed verbatim to the identity query
    pub node: String,
}

impl fmt::Display for DirectoryDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} {})", self.node, self.kind, self.domain)
    }
}

/// Record category queried from a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordCategory {
    /// User records, keyed by `UniqueID`
    Users,
    /// Group records, keyed by `PrimaryGroupID`
    Groups,
}

impl RecordCategory {
    /// Record path on the node
    pub fn record_path(&self) -> &'static str {
        match self {
            RecordCategory::Users => "/Users",
            RecordCategory::Groups => "/Groups",
        }
    }

    /// Numeric id attribute
    pub fn key_attribute(&self) -> &'static str {
        match self {
            RecordCategory::Users => "UniqueID",
            RecordCategory::Groups => "PrimaryGroupID",
        }
    }
}

/// One user or group on one provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityRecord {
    /// Record name (join key)
    pub name: String,

    /// Numeric POSIX id
    pub legacy_id: i64,

    /// Provider-generated UUID
    pub generated_uid: String,
}

/// All records of one category on one provider, by name
#[derive(Debug, Clone)]
pub struct IdentityTable {
    category: RecordCategory,
    records: HashMap<String, IdentityRecord>,
}

impl IdentityTable {
    /// Create an empty table
    pub fn new(category: RecordCategory) -> Self {
        Self {
            category,
            records: HashMap::new(),
        }
    }

    /// Insert a record, replacing any earlier record with the same name
    pub fn insert(&mut self, record: IdentityRecord) {
        self.records.insert(record.name.clone(), record);
    }

    /// Record category
    pub fn category(&self) -> RecordCategory {
        self.category
    }

    /// Look up a record by name
    pub fn get(&self, name: &str) -> Option<&IdentityRecord> {
        self.records.get(name)
    }

    /// Iterate over records in arbitrary order
    pub fn iter(&self) -> impl Iterator<Item = &IdentityRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Legacy ids of one name on both providers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergedIdentity {
    pub source_id: i64,
    pub target_id: i64,
}

/// Name-keyed join of source and target records
#[derive(Debug, Clone)]
pub struct MergedIdentityTable {
    category: RecordCategory,
    entries: HashMap<String, MergedIdentity>,
}

impl MergedIdentityTable {
    /// Create an empty table
    pub fn new(category: RecordCategory) -> Self {
        Self {
            category,
            entries: HashMap::new(),
        }
    }

    /// Add or replace a joined name
    pub fn insert(&mut self, name: String, identity: MergedIdentity) {
        self.entries.insert(name, identity);
    }

    /// Record category
    pub fn category(&self) -> RecordCategory {
        self.category
    }

    /// Look up a name
    pub fn get(&self, name: &str) -> Option<MergedIdentity> {
        self.entries.get(name).copied()
    }

    /// Target id for a name
    pub fn target_id(&self, name: &str) -> Option<i64> {
        self.get(name).map(|m| m.target_id)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Iterate over joined names
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The read-only lookup pair shared by every worker
#[derive(Debug, Clone)]
pub struct IdentityMap {
    /// Users by name
    pub users: MergedIdentityTable,

    /// Groups by name
    pub groups: MergedIdentityTable,
}

impl IdentityMap {
    pub fn new(users: MergedIdentityTable, groups: MergedIdentityTable) -> Self {
        Self { users, groups }
    }
}
