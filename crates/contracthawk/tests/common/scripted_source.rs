//! Description source returning canned responses per URL.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use contracthawk::source::{DescriptionSource, SourceError};
use contracthawk::sync::EndpointRecord;

type Response = Result<Vec<EndpointRecord>, SourceError>;

/// Serves whatever was scripted for a URL, optionally after a delay.
///
/// URLs without a script fail with a network error, like an unreachable host.
#[derive(Default)]
pub struct ScriptedSource {
    responses: Mutex<HashMap<String, Response>>,
    calls: Mutex<Vec<String>>,
    delay: Option<Duration>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every fetch sleeps for `delay` before answering.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    /// Answer `url` with `endpoints`.
    pub fn serve(&self, url: &str, endpoints: Vec<EndpointRecord>) {
        self.responses
            .lock()
            .unwrap()
            .insert(url.to_string(), Ok(endpoints));
    }

    /// Answer `url` with `error`.
    pub fn fail(&self, url: &str, error: SourceError) {
        self.responses
            .lock()
            .unwrap()
            .insert(url.to_string(), Err(error));
    }

    /// URLs fetched so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl DescriptionSource for ScriptedSource {
    async fn fetch_and_parse(&self, source_url: &str) -> Response {
        self.calls.lock().unwrap().push(source_url.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.responses
            .lock()
            .unwrap()
            .get(source_url)
            .cloned()
            .unwrap_or_else(|| {
                Err(SourceError::Network(format!(
                    "no response scripted for {}",
                    source_url
                )))
            })
    }
}
