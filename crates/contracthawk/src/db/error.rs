//! Errors raised by the contract registry store.

use std::path::PathBuf;

use rusqlite::ffi;
use thiserror::Error;

use crate::sync::model::EndpointIdentity;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The directory holding the registry database could not be created.
    #[error("Cannot create registry directory '{path}': {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Schema migration {version} failed: {reason}")]
    Migration { version: u32, reason: String },

    /// An endpoint with the same `(method, path)` is already stored under the contract.
    #[error("Endpoint {identity} already exists on API contract {contract_id}")]
    EndpointExists {
        contract_id: String,
        identity: EndpointIdentity,
    },

    /// A thread panicked while holding the connection.
    #[error("Registry connection lock poisoned")]
    LockPoisoned,
}

/// True when `err` is a UNIQUE constraint failure.
pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}
