//! Test harness for isolated reconciliation tests.
//!
//! The `SyncHarness` struct owns an in-memory database, a `ScriptedSource`
//! and a `SyncService` over both, plus shortcuts for seeding contracts and
//! endpoints and for reading back what a reconciliation persisted.

#![allow(dead_code)]

use std::sync::Arc;

use contracthawk::db::changelog_repo::{self, ChangelogRow};
use contracthawk::db::contract_repo::{self, NewContract};
use contracthawk::db::{endpoint_repo, Database};
use contracthawk::sync::{EndpointRecord, HttpMethod, SyncRunSummary, SyncService};

use super::scripted_source::ScriptedSource;

/// Shorthand for an endpoint with no description that is not deprecated.
pub fn endpoint(method: HttpMethod, path: &str) -> EndpointRecord {
    EndpointRecord::new(method, path)
}

pub struct SyncHarness {
    pub db: Database,
    pub source: Arc<ScriptedSource>,
    pub service: SyncService,
}

impl SyncHarness {
    pub fn new() -> Self {
        Self::with_source(ScriptedSource::new())
    }

    pub fn with_source(source: ScriptedSource) -> Self {
        let db = Database::open_in_memory().expect("Failed to create test database");
        let source = Arc::new(source);
        let service = SyncService::new(db.clone(), source.clone());
        Self {
            db,
            source,
            service,
        }
    }

    /// Rebuilds the service with a different refresh concurrency.
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.service =
            SyncService::new(self.db.clone(), self.source.clone()).with_concurrency(concurrency);
        self
    }

    /// Stores a contract whose OpenAPI URL is `https://specs.test/<name>.json`.
    pub fn add_contract(&self, name: &str) -> String {
        self.add_contract_with_url(name, Some(&Self::url_for(name)))
    }

    pub fn add_contract_with_url(&self, name: &str, url: Option<&str>) -> String {
        let mut contract = NewContract::new(name, "platform");
        if let Some(url) = url {
            contract = contract.open_api_url(url);
        }
        self.db
            .with_conn(|conn| Ok(contract_repo::insert(conn, &contract)?.id))
            .expect("Failed to insert contract")
    }

    pub fn url_for(name: &str) -> String {
        format!("https://specs.test/{}.json", name)
    }

    /// Scripts the source for the contract named `name`.
    pub fn serve(&self, name: &str, endpoints: Vec<EndpointRecord>) {
        self.source.serve(&Self::url_for(name), endpoints);
    }

    /// Stores endpoints directly, bypassing reconciliation.
    pub fn seed_endpoints(&self, contract_id: &str, endpoints: &[EndpointRecord]) {
        self.db
            .with_conn(|conn| {
                for record in endpoints {
                    endpoint_repo::insert(conn, contract_id, record)?;
                }
                Ok(())
            })
            .expect("Failed to seed endpoints");
    }

    pub fn endpoints(&self, contract_id: &str) -> Vec<EndpointRecord> {
        self.db
            .with_conn(|conn| endpoint_repo::list_by_contract(conn, contract_id))
            .expect("Failed to list endpoints")
    }

    pub fn changelog(&self, contract_id: &str) -> Vec<ChangelogRow> {
        self.db
            .with_conn(|conn| changelog_repo::list_by_contract(conn, contract_id))
            .expect("Failed to list changelog")
    }

    pub fn runs(&self, contract_id: &str) -> Vec<SyncRunSummary> {
        self.service
            .list_sync_runs(contract_id)
            .expect("Failed to list sync runs")
    }
}
