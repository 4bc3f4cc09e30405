//! Endpoint reconciliation engine.
//!
//! A fetched OpenAPI snapshot is diffed against a contract's stored
//! endpoints ([`diff`]), a MERGE or REPLACE policy turns the diff into
//! mutations ([`policy`]), and every attempt leaves one audit record
//! ([`recorder`]) plus, when something changed, a changelog entry
//! ([`changelog`]). [`SyncService`] drives the whole pipeline for one
//! contract or for the fleet.

pub mod changelog;
pub mod diff;
pub mod error;
pub mod model;
pub mod policy;
pub mod recorder;
pub mod scheduler;
pub mod service;

pub use diff::{ChangedEndpoint, DiffResult};
pub use error::{Result, SyncError};
pub use model::{
    BreakingChange, BreakingChangeType, EndpointIdentity, EndpointRecord, HttpMethod,
    ReconciliationResult, SyncMode, SyncStatus,
};
pub use policy::{MergePolicy, ReconciliationPlan, ReconciliationPolicy, ReplacePolicy};
pub use recorder::SyncRunSummary;
pub use scheduler::RefreshScheduler;
pub use service::{ImportResult, RefreshFailure, RefreshSummary, SyncService};
