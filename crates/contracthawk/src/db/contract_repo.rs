//! API contract repository: operations on the `api_contracts` table.
//!
//! Deleting a contract cascades to its endpoints, changelog entries and
//! sync runs through the schema's foreign keys.

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use super::{new_id, now_timestamp, DatabaseError};

/// A stored API contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractRow {
    pub id: String,
    pub name: String,
    pub base_url: String,
    pub version: String,
    pub owner_team: String,
    pub lifecycle: String,
    pub open_api_url: Option<String>,
    pub description: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl ContractRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            base_url: row.get("base_url")?,
            version: row.get("version")?,
            owner_team: row.get("owner_team")?,
            lifecycle: row.get("lifecycle")?,
            open_api_url: row.get("open_api_url")?,
            description: row.get("description")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    /// The configured OpenAPI URL, if it is present and not blank.
    pub fn open_api_url(&self) -> Option<&str> {
        self.open_api_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }
}

/// Fields for a contract that has not been stored yet.
#[derive(Debug, Clone)]
pub struct NewContract {
    pub name: String,
    pub base_url: String,
    pub version: String,
    pub owner_team: String,
    pub lifecycle: String,
    pub open_api_url: Option<String>,
    pub description: Option<String>,
}

impl NewContract {
    pub fn new(name: impl Into<String>, owner_team: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: String::new(),
            version: "1.0.0".to_string(),
            owner_team: owner_team.into(),
            lifecycle: "ACTIVE".to_string(),
            open_api_url: None,
            description: None,
        }
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn open_api_url(mut self, url: impl Into<String>) -> Self {
        self.open_api_url = Some(url.into());
        self
    }
}

/// Inserts a new contract and returns the stored row.
pub fn insert(conn: &Connection, contract: &NewContract) -> Result<ContractRow, DatabaseError> {
    let now = now_timestamp();
    let row = ContractRow {
        id: new_id(),
        name: contract.name.clone(),
        base_url: contract.base_url.clone(),
        version: contract.version.clone(),
        owner_team: contract.owner_team.clone(),
        lifecycle: contract.lifecycle.clone(),
        open_api_url: contract.open_api_url.clone(),
        description: contract.description.clone(),
        created_at: now.clone(),
        updated_at: now,
    };
    conn.execute(
        "INSERT INTO api_contracts (id, name, base_url, version, owner_team, lifecycle,
         open_api_url, description, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            row.id,
            row.name,
            row.base_url,
            row.version,
            row.owner_team,
            row.lifecycle,
            row.open_api_url,
            row.description,
            row.created_at,
            row.updated_at,
        ],
    )?;
    Ok(row)
}

/// Finds a contract by its ID.
pub fn find_by_id(conn: &Connection, id: &str) -> Result<Option<ContractRow>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT * FROM api_contracts WHERE id = ?1",
            params![id],
            ContractRow::from_row,
        )
        .optional()?;
    Ok(row)
}

/// Returns true when a contract with this ID exists.
pub fn exists(conn: &Connection, id: &str) -> Result<bool, DatabaseError> {
    let count: u32 = conn.query_row(
        "SELECT COUNT(*) FROM api_contracts WHERE id = ?1",
        params![id],
        |r| r.get(0),
    )?;
    Ok(count > 0)
}

/// Lists every contract with a non-blank OpenAPI URL, ordered by name.
pub fn list_with_open_api_url(conn: &Connection) -> Result<Vec<ContractRow>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT * FROM api_contracts WHERE open_api_url IS NOT NULL ORDER BY name, id",
    )?;
    let rows = stmt
        .query_map([], ContractRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    // Blank checks go through `open_api_url()`; SQL TRIM only strips spaces.
    Ok(rows
        .into_iter()
        .filter(|contract| contract.open_api_url().is_some())
        .collect())
}

/// Sets or clears the OpenAPI URL of a contract. Returns false if the contract does not exist.
pub fn set_open_api_url(
    conn: &Connection,
    id: &str,
    url: Option<&str>,
) -> Result<bool, DatabaseError> {
    let updated = conn.execute(
        "UPDATE api_contracts SET open_api_url = ?2, updated_at = ?3 WHERE id = ?1",
        params![id, url, now_timestamp()],
    )?;
    Ok(updated > 0)
}

/// Deletes a contract and, by cascade, everything it owns.
pub fn delete(conn: &Connection, id: &str) -> Result<bool, DatabaseError> {
    let deleted = conn.execute("DELETE FROM api_contracts WHERE id = ?1", params![id])?;
    Ok(deleted > 0)
}
