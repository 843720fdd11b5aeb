//! Stub collaborators for exercising `ResourceService` without a song service.

use crate::{
    db::test_support::memory_pool,
    models::metadata::{ExtractedMetadata, MetadataRecord},
    services::{
        metadata_extractor::{ExtractionError, MetadataExtractor},
        resource_service::ResourceService,
        song_client::{MetadataRegistry, RegistryError},
    },
};
use async_trait::async_trait;
use sqlx::SqlitePool;
use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

/// Bytes that sniff as `audio/mpeg` (ID3v2 header) followed by `body`.
pub fn mp3_like(body: &[u8]) -> Vec<u8> {
    let mut bytes = b"ID3\x04\x00\x00\x00\x00\x00\x00".to_vec();
    bytes.extend_from_slice(body);
    bytes
}

/// Returns fixed metadata, or fails when `fail` is set.
pub struct StubExtractor {
    pub fail: bool,
}

impl MetadataExtractor for StubExtractor {
    fn extract(&self, _bytes: &[u8]) -> Result<ExtractedMetadata, ExtractionError> {
        if self.fail {
            return Err(ExtractionError::Duration("corrupt frame stream".into()));
        }
        Ok(ExtractedMetadata {
            name: Some("Song".into()),
            artist: Some("Artist".into()),
            album: Some("Album".into()),
            duration_secs: 125.0,
            year: Some("1999".into()),
        })
    }
}

/// Records every call; optionally fails or stalls.
#[derive(Default)]
pub struct RecordingRegistry {
    pub registered: Mutex<Vec<MetadataRecord>>,
    pub deregistered: Mutex<Vec<Vec<i64>>>,
    pub failure: Option<RegistryError>,
    pub delay: Option<Duration>,
}

impl RecordingRegistry {
    pub fn failing(status: Option<u16>, body: Option<&str>) -> Self {
        Self {
            failure: Some(RegistryError {
                status,
                body: body.map(str::to_owned),
            }),
            ..Default::default()
        }
    }

    pub fn stalling(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Default::default()
        }
    }

    async fn respond(&self) -> Result<(), RegistryError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.failure {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl MetadataRegistry for RecordingRegistry {
    async fn register(&self, record: &MetadataRecord) -> Result<(), RegistryError> {
        self.registered.lock().unwrap().push(record.clone());
        self.respond().await
    }

    async fn deregister(&self, ids: &[i64]) -> Result<(), RegistryError> {
        self.deregistered.lock().unwrap().push(ids.to_vec());
        self.respond().await
    }
}

pub async fn service_with(
    registry: Arc<RecordingRegistry>,
    extractor: impl MetadataExtractor + 'static,
    transaction_timeout: Duration,
) -> ResourceService {
    service_on(memory_pool().await, registry, extractor, transaction_timeout)
}

pub fn service_on(
    pool: SqlitePool,
    registry: Arc<RecordingRegistry>,
    extractor: impl MetadataExtractor + 'static,
    transaction_timeout: Duration,
) -> ResourceService {
    ResourceService::new(
        Arc::new(pool),
        registry,
        Arc::new(extractor),
        transaction_timeout,
    )
}

pub async fn count_resources(service: &ResourceService) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM resources")
        .fetch_one(&*service.db)
        .await
        .unwrap()
}
