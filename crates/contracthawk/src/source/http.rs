//! HTTP fetching of OpenAPI descriptions.

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::header::ACCEPT;
use reqwest::{Client, Url};
use tracing::Instrument;

use super::{openapi, validate_source_url, DescriptionSource, SourceError};
use crate::config::FetchConfig;
use crate::sanitize::redact_url;
use crate::sync::model::EndpointRecord;

const ACCEPT_DESCRIPTION: &str = "application/json, application/yaml";

/// Fetches descriptions over http(s) with a hard per-request timeout.
#[derive(Debug, Clone)]
pub struct HttpDescriptionSource {
    client: Client,
    timeout: Duration,
}

impl HttpDescriptionSource {
    /// Creates a source whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SourceError::Network(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client, timeout })
    }

    pub fn from_config(config: &FetchConfig) -> Result<Self, SourceError> {
        Self::new(Duration::from_secs(config.timeout_secs))
    }

    fn classify(&self, err: reqwest::Error) -> SourceError {
        if err.is_timeout() {
            SourceError::Timeout(self.timeout.as_millis() as u64)
        } else {
            SourceError::Network(err.to_string())
        }
    }

    async fn fetch(&self, url: Url) -> Result<String, SourceError> {
        let redacted = redact_url(url.as_str());
        debug!("Fetching OpenAPI description from {}", redacted);

        let response = self
            .client
            .get(url)
            .header(ACCEPT, ACCEPT_DESCRIPTION)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            warn!("OpenAPI fetch from {} returned HTTP {}", redacted, status);
            return Err(SourceError::HttpStatus {
                status: status.as_u16(),
                url: redacted,
            });
        }

        response.text().await.map_err(|e| self.classify(e))
    }
}

#[async_trait]
impl DescriptionSource for HttpDescriptionSource {
    async fn fetch_and_parse(&self, source_url: &str) -> Result<Vec<EndpointRecord>, SourceError> {
        let url = validate_source_url(source_url)?;
        let span = tracing::info_span!("fetch_description", url = %redact_url(url.as_str()));
        let body = self.fetch(url).instrument(span).await?;
        openapi::parse_document(&body)
    }
}
