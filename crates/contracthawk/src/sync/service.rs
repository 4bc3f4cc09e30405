//! Reconciliation entry points: apply, preview, fleet refresh and run history.
//!
//! [`SyncService`] ties the pure pieces of the engine (diff, policies,
//! recorder, changelog) to storage and to a [`DescriptionSource`]. One apply
//! is one transaction: endpoint mutations, the SUCCESS sync run, its breaking
//! changes and the changelog entry commit together. When anything fails the
//! transaction rolls back and a FAILED run is written on its own.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use futures_util::stream::{self, StreamExt};
use log::{debug, error, info, warn};
use serde::Serialize;
use tracing::Instrument;

use super::changelog;
use super::diff::{diff, DiffResult};
use super::error::{Result, SyncError};
use super::model::{
    dedupe_keep_first, BreakingChange, EndpointRecord, ReconciliationResult, SyncMode,
};
use super::recorder::{self, SyncRunSummary};
use crate::config::Config;
use crate::db::contract_repo::{self, ContractRow};
use crate::db::{changelog_repo, endpoint_repo, sync_run_repo, Database};
use crate::error::ConfigError;
use crate::sanitize::{redact_url, truncate_chars, REFRESH_FAILURE_REASON_MAX_CHARS};
use crate::source::{DescriptionSource, HttpDescriptionSource};

/// Default number of contracts reconciled at the same time by [`SyncService::refresh_all`].
pub const DEFAULT_REFRESH_CONCURRENCY: usize = 4;

/// Outcome of a successful apply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResult {
    pub sync_run_id: String,
    pub added_count: u32,
    pub updated_count: u32,
    pub deleted_count: u32,
    pub breaks_detected: bool,
    pub breaking_changes: Vec<BreakingChange>,
}

impl ImportResult {
    fn new(sync_run_id: String, result: ReconciliationResult) -> Self {
        Self {
            sync_run_id,
            added_count: result.added_count,
            updated_count: result.updated_count,
            deleted_count: result.deleted_count,
            breaks_detected: result.breaks_detected,
            breaking_changes: result.breaking_changes,
        }
    }
}

/// One contract that failed during a fleet refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshFailure {
    pub api_id: String,
    pub api_name: String,
    /// Error text, at most 200 characters.
    pub reason: String,
}

/// Fleet-level result of [`SyncService::refresh_all`].
///
/// `succeeded + failed == total_apis` always holds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshSummary {
    pub total_apis: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub failures: Vec<RefreshFailure>,
}

type ContractLock = Arc<tokio::sync::Mutex<()>>;

/// Per-contract async locks. At most one apply runs per contract.
///
/// An entry lives only while some apply holds or waits on it.
#[derive(Default)]
struct ContractLocks {
    locks: Mutex<HashMap<String, ContractLock>>,
}

impl ContractLocks {
    fn get(&self, contract_id: &str) -> ContractLease<'_> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        let lock = Arc::clone(locks.entry(contract_id.to_string()).or_default());
        ContractLease {
            locks: self,
            contract_id: contract_id.to_string(),
            lock: Some(lock),
        }
    }

    /// Drops `lock` and removes the entry if the map now holds the only clone.
    fn release(&self, contract_id: &str, lock: ContractLock) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // Clones are only created and dropped under the map lock.
        drop(lock);
        if locks
            .get(contract_id)
            .is_some_and(|entry| Arc::strong_count(entry) == 1)
        {
            locks.remove(contract_id);
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// One caller's handle on a contract lock. Dropping the last handle removes the entry.
struct ContractLease<'a> {
    locks: &'a ContractLocks,
    contract_id: String,
    lock: Option<ContractLock>,
}

impl ContractLease<'_> {
    async fn lock(&self) -> Option<tokio::sync::MutexGuard<'_, ()>> {
        match &self.lock {
            Some(lock) => Some(lock.lock().await),
            None => None,
        }
    }
}

impl Drop for ContractLease<'_> {
    fn drop(&mut self) {
        if let Some(lock) = self.lock.take() {
            self.locks.release(&self.contract_id, lock);
        }
    }
}

/// Reconciles stored API contracts against their published OpenAPI descriptions.
pub struct SyncService {
    db: Database,
    source: Arc<dyn DescriptionSource>,
    locks: ContractLocks,
    concurrency: usize,
}

impl SyncService {
    pub fn new(db: Database, source: Arc<dyn DescriptionSource>) -> Self {
        Self {
            db,
            source,
            locks: ContractLocks::default(),
            concurrency: DEFAULT_REFRESH_CONCURRENCY,
        }
    }

    /// Opens the configured database and an HTTP source with the configured timeout.
    pub fn from_config(config: &Config) -> crate::Result<Self> {
        let path = config.database.resolved_path().ok_or_else(|| ConfigError::Validation {
            message: "database.path is not set and no home directory was found".to_string(),
        })?;
        let db = Database::open(&path)?;
        let source = HttpDescriptionSource::from_config(&config.fetch)?;
        Ok(Self::new(db, Arc::new(source)).with_concurrency(config.refresh.concurrency))
    }

    /// Sets how many contracts `refresh_all` reconciles at once. Zero is treated as one.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Fetches the contract's description and reconciles its endpoints under `mode`.
    ///
    /// Exactly one sync run is recorded per call once the contract is known to
    /// have an OpenAPI URL. A missing URL fails with `InvalidSource` and
    /// records nothing. Any later failure records a FAILED run and is
    /// returned wrapped in [`SyncError::RunFailed`].
    pub async fn apply_reconciliation(
        &self,
        contract_id: &str,
        mode: SyncMode,
    ) -> Result<ImportResult> {
        let span =
            tracing::info_span!("apply_reconciliation", contract_id = %contract_id, mode = %mode);
        self.apply_locked(contract_id, mode).instrument(span).await
    }

    /// Fetches, parses and diffs without touching storage.
    ///
    /// Failures propagate directly and no sync run is written.
    pub async fn preview_diff(&self, contract_id: &str) -> Result<DiffResult> {
        let span = tracing::info_span!("preview_diff", contract_id = %contract_id);
        self.preview(contract_id).instrument(span).await
    }

    /// Applies `default_mode` to every contract with an OpenAPI URL.
    ///
    /// A failing contract never stops the others. Failures are listed in
    /// contract name order.
    pub async fn refresh_all(&self, default_mode: SyncMode) -> Result<RefreshSummary> {
        let span = tracing::info_span!("refresh_all", mode = %default_mode);
        self.refresh(default_mode).instrument(span).await
    }

    /// Sync runs of a contract, most recent first, each with its breaking changes.
    pub fn list_sync_runs(&self, contract_id: &str) -> Result<Vec<SyncRunSummary>> {
        self.db.with_conn(|conn| {
            if !contract_repo::exists(conn, contract_id)? {
                return Ok(None);
            }
            let runs = sync_run_repo::list_by_contract(conn, contract_id)?;
            let summaries = runs
                .into_iter()
                .map(|run| recorder::summarize(conn, run))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(Some(summaries))
        })?
        .ok_or_else(|| SyncError::contract_not_found(contract_id))
    }

    /// A single sync run with its breaking changes.
    pub fn get_sync_run(&self, sync_run_id: &str) -> Result<SyncRunSummary> {
        self.db
            .with_conn(|conn| {
                sync_run_repo::find_by_id(conn, sync_run_id)?
                    .map(|run| recorder::summarize(conn, run))
                    .transpose()
            })?
            .ok_or_else(|| SyncError::NotFound {
                kind: "Sync run",
                id: sync_run_id.to_string(),
            })
    }

    async fn apply_locked(&self, contract_id: &str, mode: SyncMode) -> Result<ImportResult> {
        let lease = self.locks.get(contract_id);
        let _guard = lease.lock().await;

        let contract = self.load_contract(contract_id)?;
        let source_url = require_source_url(&contract)?;

        match self.reconcile(&contract, &source_url, mode).await {
            Ok(outcome) => {
                info!(
                    "Synced API '{}' ({}): added {}, updated {}, deleted {}{}",
                    contract.name,
                    mode,
                    outcome.added_count,
                    outcome.updated_count,
                    outcome.deleted_count,
                    if outcome.breaks_detected { ", breaking changes detected" } else { "" }
                );
                Ok(outcome)
            }
            Err(err) => Err(self.record_failure(&contract, mode, err)),
        }
    }

    async fn preview(&self, contract_id: &str) -> Result<DiffResult> {
        let contract = self.load_contract(contract_id)?;
        let source_url = require_source_url(&contract)?;
        let incoming = self.fetch_snapshot(&contract, &source_url).await?;
        let current = self
            .db
            .with_conn(|conn| endpoint_repo::list_by_contract(conn, &contract.id))?;
        let result = diff(&current, &incoming)?;
        debug!(
            "Preview for API '{}': {} added, {} removed, {} changed",
            contract.name,
            result.added.len(),
            result.removed.len(),
            result.changed.len()
        );
        Ok(result)
    }

    async fn refresh(&self, default_mode: SyncMode) -> Result<RefreshSummary> {
        let contracts = self.db.with_conn(contract_repo::list_with_open_api_url)?;
        let total_apis = contracts.len();
        info!(
            "Refreshing {} API(s) with OpenAPI URLs ({} mode, {} at a time)",
            total_apis, default_mode, self.concurrency
        );

        let outcomes: Vec<(ContractRow, Result<ImportResult>)> = stream::iter(contracts)
            .map(|contract| self.refresh_one(contract, default_mode))
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut summary = RefreshSummary {
            total_apis,
            ..RefreshSummary::default()
        };
        for (contract, outcome) in outcomes {
            match outcome {
                Ok(_) => summary.succeeded += 1,
                Err(err) => {
                    let reason =
                        truncate_chars(&err.to_string(), REFRESH_FAILURE_REASON_MAX_CHARS);
                    warn!("Refresh of API '{}' failed: {}", contract.name, reason);
                    summary.failed += 1;
                    summary.failures.push(RefreshFailure {
                        api_id: contract.id,
                        api_name: contract.name,
                        reason,
                    });
                }
            }
        }

        info!(
            "Refresh finished: {} total, {} succeeded, {} failed",
            summary.total_apis, summary.succeeded, summary.failed
        );
        Ok(summary)
    }

    async fn refresh_one(
        &self,
        contract: ContractRow,
        mode: SyncMode,
    ) -> (ContractRow, Result<ImportResult>) {
        let outcome = self.apply_reconciliation(&contract.id, mode).await;
        (contract, outcome)
    }

    fn load_contract(&self, contract_id: &str) -> Result<ContractRow> {
        self.db
            .with_conn(|conn| contract_repo::find_by_id(conn, contract_id))?
            .ok_or_else(|| SyncError::contract_not_found(contract_id))
    }

    /// Fetches and parses the snapshot, dropping repeated identities.
    async fn fetch_snapshot(
        &self,
        contract: &ContractRow,
        source_url: &str,
    ) -> Result<Vec<EndpointRecord>> {
        let fetched = self.source.fetch_and_parse(source_url).await?;
        let (snapshot, dropped) = dedupe_keep_first(fetched);
        for identity in dropped {
            warn!(
                "OpenAPI description for API '{}' at {} lists {} more than once; keeping the first",
                contract.name,
                redact_url(source_url),
                identity
            );
        }
        Ok(snapshot)
    }

    async fn reconcile(
        &self,
        contract: &ContractRow,
        source_url: &str,
        mode: SyncMode,
    ) -> Result<ImportResult> {
        let incoming = self.fetch_snapshot(contract, source_url).await?;

        self.db.with_transaction(|tx| -> Result<ImportResult> {
            let current = endpoint_repo::list_by_contract(tx, &contract.id)?;
            let changes = diff(&current, &incoming)?;
            let plan = mode.policy().plan(&changes);
            plan.apply(tx, &contract.id)?;

            let result = plan.result();
            let run = recorder::success_run(&contract.id, mode, &result);
            recorder::record(tx, &run, &result.breaking_changes)?;
            if let Some(entry) = changelog::build_entry(&contract.id, &result, &run.run_at) {
                changelog_repo::insert(tx, &entry)?;
            }
            Ok(ImportResult::new(run.id, result))
        })
    }

    /// Records a FAILED run for `err` and wraps it. If the run itself cannot
    /// be written the original error is returned unwrapped.
    fn record_failure(&self, contract: &ContractRow, mode: SyncMode, err: SyncError) -> SyncError {
        let message = err.to_string();
        error!("Sync of API '{}' ({}) failed: {}", contract.name, mode, message);

        let run = recorder::failure_run(&contract.id, mode, &message);
        match self.db.with_conn(|conn| recorder::record(conn, &run, &[])) {
            Ok(()) => SyncError::RunFailed {
                sync_run_id: run.id,
                source: Box::new(err),
            },
            Err(db_err) => {
                error!(
                    "Failed to record FAILED sync run for API '{}': {}",
                    contract.name, db_err
                );
                err
            }
        }
    }
}

fn require_source_url(contract: &ContractRow) -> Result<String> {
    contract
        .open_api_url()
        .map(str::to_string)
        .ok_or_else(|| SyncError::InvalidSource("API has no OpenAPI URL configured".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::contract_repo::NewContract;
    use crate::source::SourceError;
    use crate::sync::model::{HttpMethod, SyncStatus};
    use async_trait::async_trait;

    /// Returns the same snapshot (or error) for every URL.
    struct FixedSource(std::result::Result<Vec<EndpointRecord>, SourceError>);

    #[async_trait]
    impl DescriptionSource for FixedSource {
        async fn fetch_and_parse(
            &self,
            _source_url: &str,
        ) -> std::result::Result<Vec<EndpointRecord>, SourceError> {
            self.0.clone()
        }
    }

    fn service(source: FixedSource) -> (SyncService, String) {
        let db = Database::open_in_memory().unwrap();
        let id = db
            .with_conn(|conn| {
                Ok(contract_repo::insert(
                    conn,
                    &NewContract::new("Users", "identity")
                        .open_api_url("https://specs.test/users.json"),
                )?
                .id)
            })
            .unwrap();
        (SyncService::new(db, Arc::new(source)), id)
    }

    #[tokio::test]
    async fn test_apply_records_success_run_and_changelog() {
        let (svc, id) = service(FixedSource(Ok(vec![
            EndpointRecord::new(HttpMethod::Get, "/users"),
            EndpointRecord::new(HttpMethod::Post, "/users"),
        ])));

        let outcome = svc.apply_reconciliation(&id, SyncMode::Merge).await.unwrap();
        assert_eq!(outcome.added_count, 2);
        assert!(!outcome.breaks_detected);

        let run = svc.get_sync_run(&outcome.sync_run_id).unwrap();
        assert_eq!(run.status, SyncStatus::Success);
        assert_eq!(run.added_count, 2);

        let entries = svc
            .database()
            .with_conn(|conn| changelog_repo::list_by_contract(conn, &id))
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].summary, "+2");
        assert_eq!(entries[0].released_at, run.run_at);
    }

    #[tokio::test]
    async fn test_duplicate_identities_in_snapshot_keep_first() {
        let (svc, id) = service(FixedSource(Ok(vec![
            EndpointRecord::new(HttpMethod::Get, "/users").with_description("first"),
            EndpointRecord::new(HttpMethod::Get, "/users").with_description("second"),
        ])));

        let outcome = svc.apply_reconciliation(&id, SyncMode::Replace).await.unwrap();
        assert_eq!(outcome.added_count, 1);

        let stored = svc
            .database()
            .with_conn(|conn| endpoint_repo::list_by_contract(conn, &id))
            .unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].description.as_deref(), Some("first"));
    }

    #[tokio::test]
    async fn test_failed_fetch_records_failed_run() {
        let (svc, id) = service(FixedSource(Err(SourceError::Network(
            "connection refused".into(),
        ))));

        let err = svc.apply_reconciliation(&id, SyncMode::Merge).await.unwrap_err();
        let run_id = err.sync_run_id().unwrap().to_string();
        assert!(matches!(err.root(), SyncError::FetchFailure(_)));

        let run = svc.get_sync_run(&run_id).unwrap();
        assert_eq!(run.status, SyncStatus::Failed);
        assert_eq!(run.added_count, 0);
        assert!(run.error_message.unwrap().contains("connection refused"));
    }

    #[tokio::test]
    async fn test_missing_url_records_nothing() {
        let (svc, id) = service(FixedSource(Ok(Vec::new())));
        svc.database()
            .with_conn(|conn| contract_repo::set_open_api_url(conn, &id, Some("   ")))
            .unwrap();

        let err = svc.apply_reconciliation(&id, SyncMode::Merge).await.unwrap_err();
        assert!(matches!(err, SyncError::InvalidSource(_)));
        assert!(svc.list_sync_runs(&id).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_contract_is_not_found() {
        let (svc, _) = service(FixedSource(Ok(Vec::new())));
        assert!(matches!(
            svc.apply_reconciliation("missing", SyncMode::Merge).await,
            Err(SyncError::NotFound { .. })
        ));
        assert!(matches!(svc.preview_diff("missing").await, Err(SyncError::NotFound { .. })));
        assert!(matches!(svc.list_sync_runs("missing"), Err(SyncError::NotFound { .. })));
        assert!(matches!(svc.get_sync_run("missing"), Err(SyncError::NotFound { .. })));
    }

    #[test]
    fn test_contract_locks_are_shared_per_id() {
        let locks = ContractLocks::default();
        let first = locks.get("a");
        let second = locks.get("a");
        let other = locks.get("b");
        let lock_of = |lease: &ContractLease<'_>| lease.lock.clone().unwrap();
        assert!(Arc::ptr_eq(&lock_of(&first), &lock_of(&second)));
        assert!(!Arc::ptr_eq(&lock_of(&first), &lock_of(&other)));
        assert_eq!(locks.len(), 2);

        drop(first);
        assert_eq!(locks.len(), 2);
        drop(second);
        drop(other);
        assert_eq!(locks.len(), 0);
    }

    #[tokio::test]
    async fn test_lock_map_stays_empty_after_applies() {
        let (svc, id) = service(FixedSource(Ok(vec![EndpointRecord::new(
            HttpMethod::Get,
            "/users",
        )])));

        for i in 0..1000 {
            let result = svc
                .apply_reconciliation(&format!("unknown-{}", i), SyncMode::Merge)
                .await;
            assert!(matches!(result, Err(SyncError::NotFound { .. })));
        }
        assert_eq!(svc.locks.len(), 0);

        svc.apply_reconciliation(&id, SyncMode::Merge).await.unwrap();
        assert_eq!(svc.locks.len(), 0);
    }

    #[test]
    fn test_from_config_opens_file_database() {
        let temp = tempfile::TempDir::new().unwrap();
        let mut config = Config::default();
        config.database.path = Some(temp.path().join("nested").join("registry.db"));
        config.refresh.concurrency = 2;

        let svc = SyncService::from_config(&config).unwrap();
        assert_eq!(svc.concurrency, 2);
        assert!(temp.path().join("nested").join("registry.db").exists());
    }

    #[test]
    fn test_concurrency_floor_is_one() {
        let (svc, _) = service(FixedSource(Ok(Vec::new())));
        assert_eq!(svc.with_concurrency(0).concurrency, 1);
    }
}
