//! Builds and persists the audit record of one reconciliation attempt.

use rusqlite::Connection;
use serde::Serialize;

use super::model::{BreakingChange, ReconciliationResult, SyncMode, SyncStatus};
use crate::db::sync_run_repo::{self, SyncRunRow};
use crate::db::{new_id, now_timestamp, DatabaseError};
use crate::sanitize::{truncate_chars, SYNC_RUN_ERROR_MAX_CHARS};

/// A sync run together with the breaking changes recorded for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRunSummary {
    pub id: String,
    pub api_id: String,
    pub run_at: String,
    pub status: SyncStatus,
    pub mode: SyncMode,
    pub added_count: u32,
    pub updated_count: u32,
    pub deleted_count: u32,
    pub breaks_detected: bool,
    pub error_message: Option<String>,
    pub breaking_changes: Vec<BreakingChange>,
}

impl SyncRunSummary {
    fn new(run: SyncRunRow, breaking_changes: Vec<BreakingChange>) -> Self {
        Self {
            id: run.id,
            api_id: run.api_id,
            run_at: run.run_at,
            status: run.status,
            mode: run.mode,
            added_count: run.added_count,
            updated_count: run.updated_count,
            deleted_count: run.deleted_count,
            breaks_detected: run.breaks_detected,
            error_message: run.error_message,
            breaking_changes,
        }
    }
}

/// A SUCCESS run carrying the counts of `result`.
pub fn success_run(contract_id: &str, mode: SyncMode, result: &ReconciliationResult) -> SyncRunRow {
    SyncRunRow {
        id: new_id(),
        api_id: contract_id.to_string(),
        run_at: now_timestamp(),
        status: SyncStatus::Success,
        mode,
        added_count: result.added_count,
        updated_count: result.updated_count,
        deleted_count: result.deleted_count,
        breaks_detected: result.breaks_detected,
        error_message: None,
    }
}

/// A FAILED run with zero counts and the error message cut to 500 characters.
pub fn failure_run(contract_id: &str, mode: SyncMode, message: &str) -> SyncRunRow {
    SyncRunRow {
        id: new_id(),
        api_id: contract_id.to_string(),
        run_at: now_timestamp(),
        status: SyncStatus::Failed,
        mode,
        added_count: 0,
        updated_count: 0,
        deleted_count: 0,
        breaks_detected: false,
        error_message: Some(truncate_chars(message, SYNC_RUN_ERROR_MAX_CHARS)),
    }
}

/// Persists `run` and one breaking-change row per entry, linked to the run.
pub fn record(
    conn: &Connection,
    run: &SyncRunRow,
    breaking_changes: &[BreakingChange],
) -> Result<(), DatabaseError> {
    debug_assert_eq!(run.breaks_detected, !breaking_changes.is_empty());

    sync_run_repo::insert(conn, run)?;
    for change in breaking_changes {
        sync_run_repo::insert_breaking_change(conn, &run.id, change)?;
    }
    Ok(())
}

/// Loads the breaking changes of `run` and returns the combined summary.
pub fn summarize(conn: &Connection, run: SyncRunRow) -> Result<SyncRunSummary, DatabaseError> {
    let breaking_changes = sync_run_repo::list_breaking_changes(conn, &run.id)?;
    Ok(SyncRunSummary::new(run, breaking_changes))
}
