//! MERGE and REPLACE reconciliation policies.
//!
//! A policy turns a [`DiffResult`] into a [`ReconciliationPlan`]: the exact
//! endpoint mutations to persist plus the breaking changes they imply.
//! Planning is pure; [`ReconciliationPlan::apply`] performs the writes on a
//! connection supplied by the caller, normally an open transaction.

use rusqlite::Connection;

use super::diff::{ChangedEndpoint, DiffResult};
use super::model::{
    BreakingChange, BreakingChangeType, EndpointRecord, ReconciliationResult, SyncMode,
};
use crate::db::{endpoint_repo, DatabaseError};

/// Detail text attached to every removed-endpoint breaking change.
pub const REMOVED_ENDPOINT_DETAILS: &str = "Endpoint removed from OpenAPI spec";

/// Mutations a policy decided on for one contract.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciliationPlan {
    pub creates: Vec<EndpointRecord>,
    pub updates: Vec<ChangedEndpoint>,
    pub deletes: Vec<EndpointRecord>,
    pub breaking_changes: Vec<BreakingChange>,
}

impl ReconciliationPlan {
    /// Counts and breaking changes this plan produces once applied.
    pub fn result(&self) -> ReconciliationResult {
        ReconciliationResult {
            added_count: self.creates.len() as u32,
            updated_count: self.updates.len() as u32,
            deleted_count: self.deletes.len() as u32,
            breaks_detected: !self.breaking_changes.is_empty(),
            breaking_changes: self.breaking_changes.clone(),
        }
    }

    /// Persists the planned endpoint mutations for `contract_id`.
    pub fn apply(&self, conn: &Connection, contract_id: &str) -> Result<(), DatabaseError> {
        for record in &self.creates {
            endpoint_repo::insert(conn, contract_id, record)?;
        }
        for change in &self.updates {
            endpoint_repo::update_attributes(conn, contract_id, &change.proposed)?;
        }
        for record in &self.deletes {
            endpoint_repo::delete_by_identity(conn, contract_id, &record.identity())?;
        }
        Ok(())
    }
}

/// Strategy that decides which parts of a diff become mutations.
pub trait ReconciliationPolicy: Send + Sync {
    fn mode(&self) -> SyncMode;

    fn plan(&self, diff: &DiffResult) -> ReconciliationPlan;
}

/// Convergent additive sync: creates and updates, ignores removals.
#[derive(Debug, Clone, Copy, Default)]
pub struct MergePolicy;

impl ReconciliationPolicy for MergePolicy {
    fn mode(&self) -> SyncMode {
        SyncMode::Merge
    }

    fn plan(&self, diff: &DiffResult) -> ReconciliationPlan {
        ReconciliationPlan {
            creates: diff.added.clone(),
            updates: diff.changed.clone(),
            deletes: Vec::new(),
            breaking_changes: Vec::new(),
        }
    }
}

/// Full convergence: every removed endpoint is deleted and reported as breaking.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReplacePolicy;

impl ReconciliationPolicy for ReplacePolicy {
    fn mode(&self) -> SyncMode {
        SyncMode::Replace
    }

    fn plan(&self, diff: &DiffResult) -> ReconciliationPlan {
        let breaking_changes = diff
            .removed
            .iter()
            .map(|removed| BreakingChange {
                kind: BreakingChangeType::RemovedEndpoint,
                method: removed.method,
                path: removed.path.clone(),
                details: REMOVED_ENDPOINT_DETAILS.to_string(),
            })
            .collect();

        ReconciliationPlan {
            creates: diff.added.clone(),
            updates: diff.changed.clone(),
            deletes: diff.removed.clone(),
            breaking_changes,
        }
    }
}

impl SyncMode {
    /// The policy implementing this mode.
    pub fn policy(&self) -> &'static dyn ReconciliationPolicy {
        match self {
            SyncMode::Merge => &MergePolicy,
            SyncMode::Replace => &ReplacePolicy,
        }
    }
}
