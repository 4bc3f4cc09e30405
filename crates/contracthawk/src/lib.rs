pub mod config;
pub mod db;
pub mod error;
pub mod sanitize;
pub mod source;
pub mod sync;
pub mod telemetry;

pub use config::{load_config, Config};
pub use db::{Database, DatabaseError};
pub use error::{ConfigError, ContractHawkError, Result};
pub use source::{DescriptionSource, HttpDescriptionSource, SourceError};
pub use sync::{
    DiffResult, ImportResult, RefreshFailure, RefreshScheduler, RefreshSummary, SyncError,
    SyncMode, SyncRunSummary, SyncService,
};
pub use telemetry::init_logging;
