//! Fetching and parsing of external interface descriptions.
//!
//! The reconciliation engine only sees the [`DescriptionSource`] trait;
//! [`HttpDescriptionSource`] is the production implementation.

use async_trait::async_trait;
use reqwest::Url;
use thiserror::Error;

use crate::sync::model::EndpointRecord;

pub mod http;
pub mod openapi;

pub use http::HttpDescriptionSource;

/// Why a description could not be turned into an endpoint list.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("{0}")]
    InvalidSource(String),

    #[error("{0}")]
    Network(String),

    #[error("request timed out after {0} ms")]
    Timeout(u64),

    #[error("{url} returned HTTP {status}")]
    HttpStatus { status: u16, url: String },

    #[error("{0}")]
    Parse(String),
}

/// Produces the canonical endpoint list published at a URL.
#[async_trait]
pub trait DescriptionSource: Send + Sync {
    async fn fetch_and_parse(&self, source_url: &str) -> Result<Vec<EndpointRecord>, SourceError>;
}

/// Checks that `source_url` is an absolute http or https URL.
pub fn validate_source_url(source_url: &str) -> Result<Url, SourceError> {
    let url = Url::parse(source_url.trim()).map_err(|e| {
        SourceError::InvalidSource(format!("OpenAPI URL '{}' is not valid: {}", source_url, e))
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(SourceError::InvalidSource(format!(
            "OpenAPI URL must be http or https, got '{}'",
            other
        ))),
    }
}
