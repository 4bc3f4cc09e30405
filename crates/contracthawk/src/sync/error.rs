//! Reconciliation error types.

use thiserror::Error;

use crate::db::DatabaseError;
use crate::source::SourceError;

/// Errors raised by the reconciliation engine.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("{kind} not found with id: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Invalid OpenAPI source: {0}")]
    InvalidSource(String),

    #[error("Failed to fetch OpenAPI spec: {0}")]
    FetchFailure(String),

    #[error("Fetching OpenAPI spec timed out after {0} ms")]
    FetchTimeout(u64),

    #[error("Failed to parse OpenAPI spec: {0}")]
    ParseFailure(String),

    #[error("Duplicate endpoint identity: {method} {path}")]
    DuplicateIdentity { method: String, path: String },

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// The attempt failed after its FAILED sync run was recorded.
    #[error("Failed to import OpenAPI: {source}")]
    RunFailed {
        sync_run_id: String,
        #[source]
        source: Box<SyncError>,
    },
}

impl SyncError {
    pub(crate) fn contract_not_found(id: &str) -> Self {
        SyncError::NotFound {
            kind: "API contract",
            id: id.to_string(),
        }
    }

    /// The id of the FAILED sync run recorded for this error, if any.
    pub fn sync_run_id(&self) -> Option<&str> {
        match self {
            SyncError::RunFailed { sync_run_id, .. } => Some(sync_run_id),
            _ => None,
        }
    }

    /// The innermost error, skipping the `RunFailed` wrapper.
    pub fn root(&self) -> &SyncError {
        match self {
            SyncError::RunFailed { source, .. } => source.root(),
            other => other,
        }
    }
}

impl From<rusqlite::Error> for SyncError {
    fn from(err: rusqlite::Error) -> Self {
        SyncError::Database(DatabaseError::Sqlite(err))
    }
}

impl From<SourceError> for SyncError {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::InvalidSource(msg) => SyncError::InvalidSource(msg),
            SourceError::Timeout(millis) => SyncError::FetchTimeout(millis),
            err @ (SourceError::Network(_) | SourceError::HttpStatus { .. }) => {
                SyncError::FetchFailure(err.to_string())
            }
            SourceError::Parse(msg) => SyncError::ParseFailure(msg),
        }
    }
}

/// Result type for reconciliation operations.
pub type Result<T> = std::result::Result<T, SyncError>;
