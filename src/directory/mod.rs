//! Identity providers
//!
//! Builds the two read-only lookup tables a run needs, once, before any
//! filesystem work starts:
//!
//! ```text
//!  source users ─┐                    source groups ─┐
//!                ├─ merge ─► users                   ├─ merge ─► groups
//!  target users ─┘                    target groups ─┘
//! ```

pub mod discovery;
pub mod merge;
pub mod resolver;
pub mod types;

pub use discovery::{discover_providers, parse_node, parse_search_policy, ProviderPair};
pub use merge::{merge_identities, MergeOutcome};
pub use resolver::{parse_records, resolve_identities, MIN_USER_ID};
pub use types::{
    DirectoryDescriptor, IdentityMap, IdentityRecord, IdentityTable, MergedIdentity,
    MergedIdentityTable, ProviderKind, RecordCategory,
};

use crate::error::DirectoryError;
use crate::tools::DirectoryService;

/// Merged tables plus the names that could not be joined
#[derive(Debug, Clone)]
pub struct IdentityResolution {
    /// Lookup tables for the run
    pub identities: IdentityMap,

    /// Source user names missing on the target
    pub missing_users: Vec<String>,

    /// Source group names missing on the target
    pub missing_groups: Vec<String>,
}

/// Resolve and merge users, then groups, for a provider pair
pub fn build_identity_map<D: DirectoryService + ?Sized>(
    service: &D,
    providers: &ProviderPair,
) -> Result<IdentityResolution, DirectoryError> {
    let users = merge_category(service, providers, RecordCategory::Users)?;
    let groups = merge_category(service, providers, RecordCategory::Groups)?;

    Ok(IdentityResolution {
        identities: IdentityMap::new(users.table, groups.table),
        missing_users: users.missing,
        missing_groups: groups.missing,
    })
}

fn merge_category<D: DirectoryService + ?Sized>(
    service: &D,
    providers: &ProviderPair,
    category: RecordCategory,
) -> Result<MergeOutcome, DirectoryError> {
    let source = resolve_identities(service, &providers.source, category)?;
    let target = resolve_identities(service, &providers.target, category)?;
    Ok(merge_identities(&source, &target))
}
