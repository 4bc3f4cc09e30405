//! Changelog repository: operations on the `changelog_entries` table.

use rusqlite::{params, Connection, Row};
use serde::Serialize;

use super::DatabaseError;

/// A stored changelog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangelogRow {
    pub id: String,
    pub api_id: String,
    #[serde(rename = "type")]
    pub entry_type: String,
    pub breaking: bool,
    pub summary: String,
    pub details: Option<String>,
    pub released_at: String,
}

impl ChangelogRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            api_id: row.get("api_id")?,
            entry_type: row.get("type")?,
            breaking: row.get("breaking")?,
            summary: row.get("summary")?,
            details: row.get("details")?,
            released_at: row.get("released_at")?,
        })
    }
}

/// Inserts a changelog entry.
pub fn insert(conn: &Connection, entry: &ChangelogRow) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO changelog_entries (id, api_id, type, breaking, summary, details, released_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            entry.id,
            entry.api_id,
            entry.entry_type,
            entry.breaking,
            entry.summary,
            entry.details,
            entry.released_at,
        ],
    )?;
    Ok(())
}

/// Lists a contract's changelog, newest release first.
pub fn list_by_contract(
    conn: &Connection,
    api_id: &str,
) -> Result<Vec<ChangelogRow>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT * FROM changelog_entries WHERE api_id = ?1
         ORDER BY released_at DESC, rowid DESC",
    )?;
    let rows = stmt
        .query_map(params![api_id], ChangelogRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
