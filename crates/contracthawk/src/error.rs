use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ContractHawkError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Sync error: {0}")]
    Sync(#[from] crate::sync::SyncError),

    #[error("Source error: {0}")]
    Source(#[from] crate::source::SourceError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] crate::telemetry::TelemetryError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },
}

pub type Result<T> = std::result::Result<T, ContractHawkError>;
