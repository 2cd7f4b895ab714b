//! Migration planning
//!
//! Turns a [`PathSnapshot`] into an ordered list of operations:
//! at most one ownership change, then ACE edits in ascending ordinal order.
//!
//! ACL entries are addressed by their dense position in the list, so every
//! deletion shifts the entries after it down by one. Planned ordinals are
//! therefore corrected by the number of deletions planned before them:
//!
//! ```text
//!  listed   0: user:alice      1: <orphan uuid>   2: group:staff
//!  planned  =a# 0              -a# 1              =ai# 1
//! ```

use super::types::{Ace, NamedPrincipal, PathSnapshot, Principal, PrincipalKind};
use crate::directory::{IdentityMap, MergedIdentityTable};
use crate::tools::ToolCommand;
use std::fmt;
use std::path::PathBuf;
use tracing::debug;

/// What to do with an ACE whose principal has no merged identity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnresolvedAcePolicy {
    /// Rewrite the entry with its unchanged name
    #[default]
    Rewrite,

    /// Leave the entry alone
    Skip,
}

/// New numeric owner and/or group for a path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnershipChange {
    OwnerAndGroup { owner: i64, group: i64 },
    Owner { owner: i64 },
    Group { group: i64 },
}

impl OwnershipChange {
    /// `owner:group`, `owner` or `:group`
    pub fn chown_spec(&self) -> String {
        match self {
            OwnershipChange::OwnerAndGroup { owner, group } => format!("{owner}:{group}"),
            OwnershipChange::Owner { owner } => owner.to_string(),
            OwnershipChange::Group { group } => format!(":{group}"),
        }
    }
}

/// One ACL edit, addressed by corrected ordinal
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AceOperation {
    /// Re-set the entry so its name resolves against the target provider
    Rewrite {
        ordinal: usize,
        principal: NamedPrincipal,
        /// Target id the name resolves to, when known
        target_id: Option<i64>,
        inherited: bool,
        permissions: String,
    },

    /// Remove an orphan entry
    Delete { ordinal: usize, uuid: String },
}

impl AceOperation {
    /// Corrected ordinal
    pub fn ordinal(&self) -> usize {
        match self {
            AceOperation::Rewrite { ordinal, .. } | AceOperation::Delete { ordinal, .. } => {
                *ordinal
            }
        }
    }

    pub fn is_delete(&self) -> bool {
        matches!(self, AceOperation::Delete { .. })
    }
}

/// A single step of a plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Ownership(OwnershipChange),
    Ace(AceOperation),
}

impl Operation {
    /// The mutation command that performs this step
    pub fn to_command(&self) -> ToolCommand {
        match self {
            Operation::Ownership(change) => ToolCommand::chown(change.chown_spec()),
            Operation::Ace(AceOperation::Rewrite {
                ordinal,
                principal,
                inherited,
                permissions,
                ..
            }) => {
                let mode = if *inherited { "=ai#" } else { "=a#" };
                ToolCommand::chmod(vec![
                    mode.to_string(),
                    ordinal.to_string(),
                    format!("{principal} {permissions}"),
                ])
            }
            Operation::Ace(AceOperation::Delete { ordinal, .. }) => {
                ToolCommand::chmod(vec!["-a#".to_string(), ordinal.to_string()])
            }
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Ownership(change) => write!(f, "chown {}", change.chown_spec()),
            Operation::Ace(AceOperation::Rewrite {
                ordinal,
                principal,
                target_id: Some(id),
                ..
            }) => write!(f, "rewrite ACE #{ordinal} {principal} (-> {id})"),
            Operation::Ace(AceOperation::Rewrite {
                ordinal, principal, ..
            }) => write!(f, "rewrite ACE #{ordinal} {principal} (unresolved)"),
            Operation::Ace(AceOperation::Delete { ordinal, uuid }) => {
                write!(f, "delete ACE #{ordinal} {uuid}")
            }
        }
    }
}

/// Ordered operations for one path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationPlan {
    pub path: PathBuf,
    pub operations: Vec<Operation>,
}

impl MigrationPlan {
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }
}

/// Computes plans against the merged identity tables
#[derive(Debug, Clone, Copy)]
pub struct MigrationPlanner<'a> {
    identities: &'a IdentityMap,
    unresolved: UnresolvedAcePolicy,
}

impl<'a> MigrationPlanner<'a> {
    pub fn new(identities: &'a IdentityMap, unresolved: UnresolvedAcePolicy) -> Self {
        Self {
            identities,
            unresolved,
        }
    }

    /// Plan every change for one snapshot
    pub fn plan(&self, snapshot: &PathSnapshot) -> MigrationPlan {
        let mut operations = Vec::with_capacity(snapshot.aces.len() + 1);

        if let Some(change) = self.plan_ownership(&snapshot.owner, &snapshot.group) {
            operations.push(Operation::Ownership(change));
        }
        operations.extend(self.plan_acl(&snapshot.aces).into_iter().map(Operation::Ace));

        debug!(
            path = %snapshot.path.display(),
            operations = operations.len(),
            "Planned"
        );

        MigrationPlan {
            path: snapshot.path.clone(),
            operations,
        }
    }

    /// Decide the ownership change from owner and group membership
    pub fn plan_ownership(&self, owner: &str, group: &str) -> Option<OwnershipChange> {
        let owner = self.identities.users.target_id(owner);
        let group = self.identities.groups.target_id(group);

        match (owner, group) {
            (Some(owner), Some(group)) => Some(OwnershipChange::OwnerAndGroup { owner, group }),
            (Some(owner), None) => Some(OwnershipChange::Owner { owner }),
            (None, Some(group)) => Some(OwnershipChange::Group { group }),
            (None, None) => None,
        }
    }

    /// Plan ACE edits in ascending ordinal order, correcting for deletions
    pub fn plan_acl(&self, aces: &[Ace]) -> Vec<AceOperation> {
        let mut ordered: Vec<&Ace> = aces.iter().collect();
        ordered.sort_by_key(|ace| ace.ordinal);

        let mut deleted = 0usize;
        let mut ops = Vec::with_capacity(ordered.len());

        for ace in ordered {
            let ordinal = ace.ordinal.saturating_sub(deleted);

            match &ace.principal {
                Principal::Orphan(uuid) => {
                    ops.push(AceOperation::Delete {
                        ordinal,
                        uuid: uuid.clone(),
                    });
                    deleted += 1;
                }
                Principal::Named(principal) => {
                    let target_id = self.table_for(principal.kind).target_id(&principal.name);
                    if target_id.is_none() && self.unresolved == UnresolvedAcePolicy::Skip {
                        debug!(principal = %principal, ordinal = ace.ordinal, "Unresolved ACE left as is");
                        continue;
                    }
                    ops.push(AceOperation::Rewrite {
                        ordinal,
                        principal: principal.clone(),
                        target_id,
                        inherited: ace.inherited,
                        permissions: ace.permissions.clone(),
                    });
                }
            }
        }

        ops
    }

    fn table_for(&self, kind: PrincipalKind) -> &MergedIdentityTable {
        match kind {
            PrincipalKind::User => &self.identities.users,
            PrincipalKind::Group => &self.identities.groups,
        }
    }
}
