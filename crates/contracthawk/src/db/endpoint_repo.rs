//! Endpoint repository: operations on the `endpoints` table.
//!
//! Endpoints are addressed by contract and `(method, path)` identity, which
//! the schema keeps unique per contract.

use rusqlite::{params, Connection, Row};

use super::error::is_unique_violation;
use super::{new_id, now_timestamp, DatabaseError};
use crate::sync::model::{EndpointIdentity, EndpointRecord};

fn from_row(row: &Row<'_>) -> Result<EndpointRecord, rusqlite::Error> {
    Ok(EndpointRecord {
        id: Some(row.get("id")?),
        method: row.get("method")?,
        path: row.get("path")?,
        description: row.get("description")?,
        deprecated: row.get("deprecated")?,
        created_at: Some(row.get("created_at")?),
    })
}

/// Inserts an endpoint under a contract. A fresh id and creation timestamp
/// are assigned; any id on `record` is ignored.
///
/// Fails with [`DatabaseError::EndpointExists`] if the identity is taken.
pub fn insert(
    conn: &Connection,
    contract_id: &str,
    record: &EndpointRecord,
) -> Result<EndpointRecord, DatabaseError> {
    let stored = EndpointRecord {
        id: Some(new_id()),
        created_at: Some(now_timestamp()),
        ..record.clone()
    };
    conn.execute(
        "INSERT INTO endpoints (id, api_id, method, path, description, deprecated, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            stored.id,
            contract_id,
            stored.method,
            stored.path,
            stored.description,
            stored.deprecated,
            stored.created_at,
        ],
    )
    .map_err(|e| {
        if is_unique_violation(&e) {
            DatabaseError::EndpointExists {
                contract_id: contract_id.to_string(),
                identity: stored.identity(),
            }
        } else {
            DatabaseError::from(e)
        }
    })?;
    Ok(stored)
}

/// Overwrites `description` and `deprecated` on the endpoint with the same
/// identity as `record`. Returns the number of rows touched (0 or 1).
pub fn update_attributes(
    conn: &Connection,
    contract_id: &str,
    record: &EndpointRecord,
) -> Result<usize, DatabaseError> {
    let updated = conn.execute(
        "UPDATE endpoints SET description = ?4, deprecated = ?5
         WHERE api_id = ?1 AND method = ?2 AND path = ?3",
        params![
            contract_id,
            record.method,
            record.path,
            record.description,
            record.deprecated,
        ],
    )?;
    Ok(updated)
}

/// Deletes the endpoint with the given identity. Returns the number of rows deleted.
pub fn delete_by_identity(
    conn: &Connection,
    contract_id: &str,
    identity: &EndpointIdentity,
) -> Result<usize, DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM endpoints WHERE api_id = ?1 AND method = ?2 AND path = ?3",
        params![contract_id, identity.method, identity.path],
    )?;
    Ok(deleted)
}

/// Lists a contract's endpoints in insertion order.
pub fn list_by_contract(
    conn: &Connection,
    contract_id: &str,
) -> Result<Vec<EndpointRecord>, DatabaseError> {
    let mut stmt = conn.prepare("SELECT * FROM endpoints WHERE api_id = ?1 ORDER BY rowid")?;
    let rows = stmt
        .query_map(params![contract_id], from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Counts a contract's endpoints.
pub fn count_by_contract(conn: &Connection, contract_id: &str) -> Result<u64, DatabaseError> {
    let count: u64 = conn.query_row(
        "SELECT COUNT(*) FROM endpoints WHERE api_id = ?1",
        params![contract_id],
        |r| r.get(0),
    )?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::contract_repo::{self, NewContract};
    use crate::db::Database;
    use crate::sync::model::HttpMethod;

    fn setup() -> (Database, String) {
        let db = Database::open_in_memory().expect("Failed to create test database");
        let id = db
            .with_conn(|conn| Ok(contract_repo::insert(conn, &NewContract::new("Users", "t"))?.id))
            .unwrap();
        (db, id)
    }

    #[test]
    fn test_insert_assigns_id_and_created_at() {
        let (db, contract_id) = setup();
        let stored = db
            .with_conn(|conn| {
                insert(
                    conn,
                    &contract_id,
                    &EndpointRecord::new(HttpMethod::Get, "/users").with_description("List"),
                )
            })
            .unwrap();
        assert!(stored.id.is_some());
        assert!(stored.created_at.is_some());

        let listed = db
            .with_conn(|conn| list_by_contract(conn, &contract_id))
            .unwrap();
        assert_eq!(listed, vec![stored]);
    }

    #[test]
    fn test_insert_duplicate_identity_is_rejected() {
        let (db, contract_id) = setup();
        let err = db
            .with_conn(|conn| {
                insert(conn, &contract_id, &EndpointRecord::new(HttpMethod::Get, "/users"))?;
                insert(conn, &contract_id, &EndpointRecord::new(HttpMethod::Get, "/users"))
            })
            .unwrap_err();
        match err {
            DatabaseError::EndpointExists {
                contract_id: id,
                identity,
            } => {
                assert_eq!(id, contract_id);
                assert_eq!(identity, EndpointIdentity::new(HttpMethod::Get, "/users"));
            }
            other => panic!("expected EndpointExists, got {:?}", other),
        }

        // Same path under another method is a different identity.
        db.with_conn(|conn| {
            insert(conn, &contract_id, &EndpointRecord::new(HttpMethod::Post, "/users"))
        })
        .unwrap();
    }

    #[test]
    fn test_update_attributes_keeps_created_at() {
        let (db, contract_id) = setup();
        let stored = db
            .with_conn(|conn| {
                insert(conn, &contract_id, &EndpointRecord::new(HttpMethod::Get, "/users"))
            })
            .unwrap();

        let touched = db
            .with_conn(|conn| {
                update_attributes(
                    conn,
                    &contract_id,
                    &EndpointRecord::new(HttpMethod::Get, "/users")
                        .with_description("Updated")
                        .with_deprecated(true),
                )
            })
            .unwrap();
        assert_eq!(touched, 1);

        let listed = db
            .with_conn(|conn| list_by_contract(conn, &contract_id))
            .unwrap();
        assert_eq!(listed[0].description.as_deref(), Some("Updated"));
        assert!(listed[0].deprecated);
        assert_eq!(listed[0].created_at, stored.created_at);
        assert_eq!(listed[0].id, stored.id);
    }

    #[test]
    fn test_delete_by_identity() {
        let (db, contract_id) = setup();
        db.with_conn(|conn| {
            insert(conn, &contract_id, &EndpointRecord::new(HttpMethod::Get, "/users"))?;
            insert(conn, &contract_id, &EndpointRecord::new(HttpMethod::Delete, "/users/{id}"))?;
            Ok(())
        })
        .unwrap();

        let deleted = db
            .with_conn(|conn| {
                delete_by_identity(
                    conn,
                    &contract_id,
                    &EndpointIdentity::new(HttpMethod::Delete, "/users/{id}"),
                )
            })
            .unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(
            db.with_conn(|conn| count_by_contract(conn, &contract_id))
                .unwrap(),
            1
        );
    }

    #[test]
    fn test_endpoints_cascade_on_contract_delete() {
        let (db, contract_id) = setup();
        db.with_conn(|conn| {
            insert(conn, &contract_id, &EndpointRecord::new(HttpMethod::Get, "/users"))?;
            contract_repo::delete(conn, &contract_id)?;
            Ok(())
        })
        .unwrap();
        assert_eq!(
            db.with_conn(|conn| count_by_contract(conn, &contract_id))
                .unwrap(),
            0
        );
    }
}
