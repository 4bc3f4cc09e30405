//! Endpoint set model and the value types shared by the reconciliation engine.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

use super::error::{Result, SyncError};

/// Error returned when a stored or supplied enum token is not recognised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown {} '{}'", self.kind, self.value)
    }
}

impl std::error::Error for UnknownVariant {}

/// Implements `Display`, `FromStr` and rusqlite text conversions for a
/// fieldless enum with an `as_str` method and an `ALL` constant.
macro_rules! text_enum {
    ($ty:ident, $kind:literal) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                $ty::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str() == s)
                    .ok_or_else(|| UnknownVariant {
                        kind: $kind,
                        value: s.to_string(),
                    })
            }
        }

        impl ToSql for $ty {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $ty {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse()
                    .map_err(|e| FromSqlError::Other(Box::new(e)))
            }
        }
    };
}

/// HTTP methods an endpoint can be registered under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub const ALL: [HttpMethod; 5] = [
        HttpMethod::Get,
        HttpMethod::Post,
        HttpMethod::Put,
        HttpMethod::Patch,
        HttpMethod::Delete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }
}

text_enum!(HttpMethod, "HTTP method");

/// Reconciliation policy selector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SyncMode {
    /// Additive: creates and updates, never deletes.
    #[default]
    Merge,
    /// Mirrors the description exactly, deleting endpoints it no longer lists.
    Replace,
}

impl SyncMode {
    pub const ALL: [SyncMode; 2] = [SyncMode::Merge, SyncMode::Replace];

    pub fn as_str(&self) -> &'static str {
        match self {
            SyncMode::Merge => "MERGE",
            SyncMode::Replace => "REPLACE",
        }
    }
}

text_enum!(SyncMode, "sync mode");

/// Terminal status of a sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SyncStatus {
    Success,
    Failed,
}

impl SyncStatus {
    pub const ALL: [SyncStatus; 2] = [SyncStatus::Success, SyncStatus::Failed];

    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Success => "SUCCESS",
            SyncStatus::Failed => "FAILED",
        }
    }
}

text_enum!(SyncStatus, "sync status");

/// Classification of a compatibility-breaking change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BreakingChangeType {
    RemovedEndpoint,
}

impl BreakingChangeType {
    pub const ALL: [BreakingChangeType; 1] = [BreakingChangeType::RemovedEndpoint];

    pub fn as_str(&self) -> &'static str {
        match self {
            BreakingChangeType::RemovedEndpoint => "REMOVED_ENDPOINT",
        }
    }
}

text_enum!(BreakingChangeType, "breaking change type");

/// The `(method, path)` pair that identifies one endpoint of a contract.
///
/// Paths compare case-sensitively and without normalisation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EndpointIdentity {
    pub method: HttpMethod,
    pub path: String,
}

impl EndpointIdentity {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
        }
    }
}

impl fmt::Display for EndpointIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

/// One endpoint, either stored under a contract or freshly parsed from a
/// description. Parsed records carry no `id` and no `created_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub method: HttpMethod,
    pub path: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub deprecated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl EndpointRecord {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            id: None,
            method,
            path: path.into(),
            description: None,
            deprecated: false,
            created_at: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_deprecated(mut self, deprecated: bool) -> Self {
        self.deprecated = deprecated;
        self
    }

    pub fn identity(&self) -> EndpointIdentity {
        EndpointIdentity::new(self.method, self.path.clone())
    }

    /// Observable attributes that differ from `other`, in a fixed order.
    pub fn changed_fields(&self, other: &EndpointRecord) -> Vec<EndpointField> {
        let mut fields = Vec::new();
        if self.description != other.description {
            fields.push(EndpointField::Description);
        }
        if self.deprecated != other.deprecated {
            fields.push(EndpointField::Deprecated);
        }
        fields
    }
}

/// Observable endpoint attribute compared during a diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointField {
    Description,
    Deprecated,
}

impl EndpointField {
    pub fn as_str(&self) -> &'static str {
        match self {
            EndpointField::Description => "description",
            EndpointField::Deprecated => "deprecated",
        }
    }
}

impl fmt::Display for EndpointField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A compatibility-breaking change detected by a reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakingChange {
    #[serde(rename = "type")]
    pub kind: BreakingChangeType,
    pub method: HttpMethod,
    pub path: String,
    pub details: String,
}

/// Counts and classifications produced by one reconciliation policy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationResult {
    pub added_count: u32,
    pub updated_count: u32,
    pub deleted_count: u32,
    pub breaks_detected: bool,
    pub breaking_changes: Vec<BreakingChange>,
}

impl ReconciliationResult {
    /// True when at least one endpoint was added, updated or deleted.
    pub fn has_changes(&self) -> bool {
        self.added_count > 0 || self.updated_count > 0 || self.deleted_count > 0
    }
}

/// Builds an identity-keyed view of `records`.
///
/// Fails with [`SyncError::DuplicateIdentity`] on the first repeated identity.
pub fn index_by_identity(
    records: &[EndpointRecord],
) -> Result<HashMap<EndpointIdentity, &EndpointRecord>> {
    let mut map = HashMap::with_capacity(records.len());
    for record in records {
        if map.insert(record.identity(), record).is_some() {
            return Err(SyncError::DuplicateIdentity {
                method: record.method.to_string(),
                path: record.path.clone(),
            });
        }
    }
    Ok(map)
}

/// Drops every record whose identity already appeared earlier in the list.
///
/// Returns the kept records in input order plus the identities that were
/// dropped, one entry per dropped record.
pub fn dedupe_keep_first(
    records: Vec<EndpointRecord>,
) -> (Vec<EndpointRecord>, Vec<EndpointIdentity>) {
    let mut seen = HashSet::with_capacity(records.len());
    let mut kept = Vec::with_capacity(records.len());
    let mut dropped = Vec::new();
    for record in records {
        let identity = record.identity();
        if seen.insert(identity.clone()) {
            kept.push(record);
        } else {
            dropped.push(identity);
        }
    }
    (kept, dropped)
}
