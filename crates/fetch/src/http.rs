//! HTTP implementation of the upstream fetch collaborator.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::error::{Error, ErrorKind, Result};
use crate::Fetcher;

/// Fetches raw records from the scraper's HTTP endpoint.
///
/// The per-request timeout is baked into the client, so every call through
/// this fetcher is time-bounded regardless of how the upstream misbehaves.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    base_url: String,
}

impl HttpFetcher {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::from(ErrorKind::Unavailable(e.to_string())))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn classify(id: u64, err: reqwest::Error) -> Error {
        let kind = if err.is_timeout() {
            ErrorKind::Timeout
        } else if let Some(status) = err.status() {
            match status.as_u16() {
                404 => ErrorKind::Missing(id),
                429 => ErrorKind::Throttled,
                _ => ErrorKind::Unavailable(status.to_string()),
            }
        } else {
            ErrorKind::Unavailable(err.to_string())
        };
        Error::from(kind)
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    #[instrument(skip(self))]
    async fn fetch(&self, id: u64) -> Result<Value> {
        let url = format!("{}/anime/{id}", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Self::classify(id, e))?
            .error_for_status()
            .map_err(|e| Self::classify(id, e))?;
        debug!(%url, "upstream responded");
        response
            .json::<Value>()
            .await
            .map_err(|e| Error::from(ErrorKind::Malformed(e.to_string())))
    }
}
