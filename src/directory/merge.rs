//! Name-keyed join of two provider inventories

use super::types::{IdentityTable, MergedIdentity, MergedIdentityTable};
use tracing::{debug, info};

/// Result of merging a source and target inventory
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    /// Names present on both providers
    pub table: MergedIdentityTable,

    /// Source names with no target record, sorted
    pub missing: Vec<String>,
}

/// Inner-join `source` and `target` on record name
///
/// Names only present on the source are reported, not treated as errors:
/// paths owned by them simply keep their ownership.
pub fn merge_identities(source: &IdentityTable, target: &IdentityTable) -> MergeOutcome {
    info!(
        category = source.category().record_path(),
        "Merging identities"
    );

    let mut table = MergedIdentityTable::new(source.category());
    let mut missing = Vec::new();

    for record in source.iter() {
        match target.get(&record.name) {
            Some(found) => table.insert(
                record.name.clone(),
                MergedIdentity {
                    source_id: record.legacy_id,
                    target_id: found.legacy_id,
                },
            ),
            None => missing.push(record.name.clone()),
        }
    }

    missing.sort();
    for name in &missing {
        info!(name = %name, "Source record missing on target");
    }
    debug!(combined = table.len(), missing = missing.len(), "Records combined");

    MergeOutcome { table, missing }
}
