//! Identity inventory for one provider
//!
//! Parses the key/value dump produced by a read-all query:
//!
//! ```text
//! GeneratedUID: 9D1F...
//! RecordName: alice alice@example.com
//! UniqueID: 1001
//! -
//! GeneratedUID: 51A2...
//! RecordName:
//!  CORP\Domain Users
//! PrimaryGroupID: 513
//! ```
//!
//! Records are separated by a line containing only `-`. A key with no
//! inline value takes its values from the following space-indented lines.

use super::types::{
    DirectoryDescriptor, IdentityRecord, IdentityTable, ProviderKind, RecordCategory,
};
use crate::error::DirectoryError;
use crate::tools::DirectoryService;
use std::collections::HashMap;
use tracing::{debug, info};

/// User ids below this are reserved for the system
pub const MIN_USER_ID: i64 = 1000;

const ATTR_PREFIXES: [&str; 2] = ["dsAttrTypeStandard:", "dsAttrTypeNative:"];

/// Query one provider for one record category
///
/// Every failure here is fatal for the run: an empty table means the
/// provider is misconfigured, never that there is nothing to migrate.
pub fn resolve_identities<D: DirectoryService + ?Sized>(
    service: &D,
    directory: &DirectoryDescriptor,
    category: RecordCategory,
) -> Result<IdentityTable, DirectoryError> {
    info!(
        node = %directory.node,
        path = category.record_path(),
        key = category.key_attribute(),
        "Reading directory"
    );

    let output = service
        .read_records(&directory.node, category)
        .map_err(|source| DirectoryError::QueryFailed {
            node: directory.node.clone(),
            record_path: category.record_path(),
            source,
        })?;

    let table = parse_records(&output, directory, category)?;
    debug!(count = table.len(), node = %directory.node, "Records read");
    Ok(table)
}

/// Parse and filter a read-all dump
pub fn parse_records(
    output: &str,
    directory: &DirectoryDescriptor,
    category: RecordCategory,
) -> Result<IdentityTable, DirectoryError> {
    let mut table = IdentityTable::new(category);
    let mut well_formed = 0usize;

    for block in split_blocks(output) {
        let Some(record) = block.into_record(category) else {
            continue;
        };
        well_formed += 1;

        if let Some(record) = filter_record(record, directory, category) {
            table.insert(record);
        }
    }

    if well_formed == 0 && !output.trim().is_empty() {
        return Err(DirectoryError::Unparseable {
            node: directory.node.clone(),
            record_path: category.record_path(),
        });
    }

    if table.is_empty() {
        return Err(DirectoryError::NoRecords {
            node: directory.node.clone(),
            record_path: category.record_path(),
        });
    }

    Ok(table)
}

/// Apply the reserved-name and reserved-id rules, and normalize the join key
fn filter_record(
    mut record: IdentityRecord,
    directory: &DirectoryDescriptor,
    category: RecordCategory,
) -> Option<IdentityRecord> {
    if record.name.starts_with('_') {
        debug!(name = %record.name, "Skipping reserved record");
        return None;
    }

    match category {
        RecordCategory::Users => {
            if record.legacy_id < MIN_USER_ID {
                debug!(name = %record.name, id = record.legacy_id, "Skipping system user");
                return None;
            }
        }
        RecordCategory::Groups => {
            if directory.kind == ProviderKind::ActiveDirectory {
                let prefix = format!("{}\\", directory.domain);
                if let Some(stripped) = record.name.strip_prefix(&prefix) {
                    record.name = stripped.to_string();
                }
            }
        }
    }

    Some(record)
}

/// Attributes of one record, by key
#[derive(Debug, Default)]
struct RawBlock {
    fields: HashMap<String, Vec<String>>,
}

impl RawBlock {
    fn first(&self, key: &str) -> Option<&str> {
        self.fields
            .get(key)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    fn into_record(self, category: RecordCategory) -> Option<IdentityRecord> {
        let name = self.first("RecordName")?;
        let uid = self.first("GeneratedUID")?;
        let id = self.first(category.key_attribute())?;

        let legacy_id = match id.parse::<i64>() {
            Ok(id) => id,
            Err(_) => {
                debug!(name = name, value = id, "Skipping record with non-numeric id");
                return None;
            }
        };

        Some(IdentityRecord {
            name: name.to_string(),
            legacy_id,
            generated_uid: uid.to_string(),
        })
    }
}

fn split_blocks(output: &str) -> Vec<RawBlock> {
    let mut blocks = Vec::new();
    let mut current = RawBlock::default();
    let mut last_key: Option<String> = None;

    for line in output.lines() {
        if line.trim_end() == "-" {
            blocks.push(std::mem::take(&mut current));
            last_key = None;
            continue;
        }

        if line.starts_with(' ') {
            let value = line.trim();
            if let (Some(key), false) = (&last_key, value.is_empty()) {
                current
                    .fields
                    .entry(key.clone())
                    .or_default()
                    .push(value.to_string());
            }
            continue;
        }

        let stripped = ATTR_PREFIXES
            .iter()
            .find_map(|prefix| line.strip_prefix(prefix))
            .unwrap_or(line);

        let Some((key, rest)) = stripped.split_once(':') else {
            last_key = None;
            continue;
        };

        let values: Vec<String> = rest.split_whitespace().map(str::to_string).collect();
        current.fields.insert(key.to_string(), values);
        last_key = Some(key.to_string());
    }

    if !current.fields.is_empty() {
        blocks.push(current);
    }

    blocks
}
