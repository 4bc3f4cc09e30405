//! Sync run repository: append-only audit rows in `sync_runs` and
//! `breaking_changes`.

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{new_id, DatabaseError};
use crate::sync::model::{BreakingChange, SyncMode, SyncStatus};

/// A stored sync run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncRunRow {
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
}

impl SyncRunRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            api_id: row.get("api_id")?,
            run_at: row.get("run_at")?,
            status: row.get("status")?,
            mode: row.get("mode")?,
            added_count: row.get("added_count")?,
            updated_count: row.get("updated_count")?,
            deleted_count: row.get("deleted_count")?,
            breaks_detected: row.get("breaks_detected")?,
            error_message: row.get("error_message")?,
        })
    }
}

fn breaking_change_from_row(row: &Row<'_>) -> Result<BreakingChange, rusqlite::Error> {
    Ok(BreakingChange {
        kind: row.get("type")?,
        method: row.get("method")?,
        path: row.get("path")?,
        details: row.get::<_, Option<String>>("details")?.unwrap_or_default(),
    })
}

/// Inserts a sync run row.
pub fn insert(conn: &Connection, run: &SyncRunRow) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO sync_runs (id, api_id, run_at, status, mode, added_count, updated_count,
         deleted_count, breaks_detected, error_message)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            run.id,
            run.api_id,
            run.run_at,
            run.status,
            run.mode,
            run.added_count,
            run.updated_count,
            run.deleted_count,
            run.breaks_detected,
            run.error_message,
        ],
    )?;
    Ok(())
}

/// Inserts a breaking change linked to a sync run. Returns the new row id.
pub fn insert_breaking_change(
    conn: &Connection,
    sync_run_id: &str,
    change: &BreakingChange,
) -> Result<String, DatabaseError> {
    let id = new_id();
    conn.execute(
        "INSERT INTO breaking_changes (id, sync_run_id, type, method, path, details)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            id,
            sync_run_id,
            change.kind,
            change.method,
            change.path,
            change.details,
        ],
    )?;
    Ok(id)
}

/// Finds a sync run by its ID.
pub fn find_by_id(conn: &Connection, id: &str) -> Result<Option<SyncRunRow>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT * FROM sync_runs WHERE id = ?1",
            params![id],
            SyncRunRow::from_row,
        )
        .optional()?;
    Ok(row)
}

/// Lists a contract's sync runs, most recent first.
pub fn list_by_contract(
    conn: &Connection,
    api_id: &str,
) -> Result<Vec<SyncRunRow>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT * FROM sync_runs WHERE api_id = ?1 ORDER BY run_at DESC, rowid DESC",
    )?;
    let rows = stmt
        .query_map(params![api_id], SyncRunRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Lists the breaking changes recorded for a sync run, in insertion order.
pub fn list_breaking_changes(
    conn: &Connection,
    sync_run_id: &str,
) -> Result<Vec<BreakingChange>, DatabaseError> {
    let mut stmt =
        conn.prepare("SELECT * FROM breaking_changes WHERE sync_run_id = ?1 ORDER BY rowid")?;
    let rows = stmt
        .query_map(params![sync_run_id], breaking_change_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
