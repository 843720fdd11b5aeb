//! HTTP client for the song service, the owner of song metadata records.

use crate::models::metadata::MetadataRecord;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error};

/// A failed call to the song service.
///
/// Non-2xx responses carry the upstream status and body; transport failures
/// (connect errors, timeouts) carry neither.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("song service call failed (status: {status:?}, body: {body:?})")]
pub struct RegistryError {
    pub status: Option<u16>,
    pub body: Option<String>,
}

impl RegistryError {
    fn transport(err: reqwest::Error) -> Self {
        error!("song service request failed: {}", err);
        Self {
            status: err.status().map(|s| s.as_u16()),
            body: None,
        }
    }
}

/// Remote registry of song metadata, keyed by resource id.
#[async_trait]
pub trait MetadataRegistry: Send + Sync {
    /// Store `record` remotely.
    async fn register(&self, record: &MetadataRecord) -> Result<(), RegistryError>;

    /// Remove the records for `ids`.
    async fn deregister(&self, ids: &[i64]) -> Result<(), RegistryError>;
}

/// `MetadataRegistry` backed by the song service REST API.
pub struct SongServiceClient {
    client: reqwest::Client,
    base_url: String,
}

impl SongServiceClient {
    /// Create a new client.
    ///
    /// # Arguments
    /// * `base_url` - Base URL of the song service (e.g., "http://localhost:8081")
    /// * `timeout` - Per-request timeout
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("building song service HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn check(response: reqwest::Response) -> Result<(), RegistryError> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.ok().filter(|b| !b.is_empty());
        error!("song service responded with {}: {:?}", status, body);
        Err(RegistryError {
            status: Some(status.as_u16()),
            body,
        })
    }
}

#[async_trait]
impl MetadataRegistry for SongServiceClient {
    async fn register(&self, record: &MetadataRecord) -> Result<(), RegistryError> {
        let url = format!("{}/songs", self.base_url);
        debug!("POST {} for resource {}", url, record.id);
        let response = self
            .client
            .post(&url)
            .json(record)
            .send()
            .await
            .map_err(RegistryError::transport)?;
        Self::check(response).await
    }

    async fn deregister(&self, ids: &[i64]) -> Result<(), RegistryError> {
        let url = format!("{}/songs", self.base_url);
        let csv = ids
            .iter()
            .map(i64::to_string)
            .collect::<Vec<_>>()
            .join(",");
        debug!("DELETE {}?id={}", url, csv);
        let response = self
            .client
            .delete(&url)
            .query(&[("id", csv.as_str())])
            .send()
            .await
            .map_err(RegistryError::transport)?;
        Self::check(response).await
    }
}
