//! src/services/resource_service.rs
//!
//! ResourceService — the create/get/delete lifecycle of audio resources. It
//! sequences format validation, local persistence, metadata extraction and the
//! song service call, and owns what happens to local state when the remote
//! call fails.
//!
//! Consistency model: each mutating operation runs in one local transaction
//! that also encloses the remote call. A remote failure, an extraction failure
//! or a timeout rolls the local mutations back. There is no compensation of
//! the remote side, so delivery to the song service is not exactly-once: if
//! the song service applies a request but the response is lost (or the local
//! commit fails afterwards), local and remote state diverge.

use crate::{
    models::{metadata::MetadataRecord, resource::{RESOURCE_CONTENT_TYPE, Resource}},
    services::{
        format::detect_content_type,
        metadata_extractor::{ExtractionError, MetadataExtractor},
        resource_repository::ResourceRepository,
        song_client::{MetadataRegistry, RegistryError},
    },
    validation::parse_id_list,
};
use sqlx::{Sqlite, SqlitePool, Transaction};
use std::{collections::BTreeSet, sync::Arc, time::Duration};
use thiserror::Error;
use tokio::time::timeout;
use tracing::{error, info, warn};

/// Default bound for a transactional scope, remote round trip included.
pub const DEFAULT_TRANSACTION_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("uploaded file's format is not mp3 (detected `{detected}`)")]
    InvalidFormat { detected: String },
    #[error("invalid parameter `{field}`: {reason}")]
    InvalidParameter { field: String, reason: String },
    #[error("resource with ID={0} not found")]
    NotFound(i64),
    #[error("song service call failed with status {status:?}")]
    ExternalService {
        status: Option<u16>,
        body: Option<String>,
    },
    #[error("could not extract metadata: {0}")]
    Extraction(#[from] ExtractionError),
    #[error("transaction exceeded {0:?} and was rolled back")]
    TransactionTimeout(Duration),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl ResourceError {
    pub fn invalid_parameter(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl From<RegistryError> for ResourceError {
    fn from(err: RegistryError) -> Self {
        Self::ExternalService {
            status: err.status,
            body: err.body,
        }
    }
}

pub type ResourceResult<T> = Result<T, ResourceError>;

/// ResourceService provides the three resource operations:
/// - Create (validate, store, extract metadata, register with the song service)
/// - Get (read the stored payload)
/// - Delete (remove stored payloads, deregister from the song service)
///
/// Requests are independent units of work; the database transaction is the
/// only isolation mechanism.
#[derive(Clone)]
pub struct ResourceService {
    /// Shared SQLite connection pool.
    pub db: Arc<SqlitePool>,
    registry: Arc<dyn MetadataRegistry>,
    extractor: Arc<dyn MetadataExtractor>,
    transaction_timeout: Duration,
}

impl ResourceService {
    pub fn new(
        db: Arc<SqlitePool>,
        registry: Arc<dyn MetadataRegistry>,
        extractor: Arc<dyn MetadataExtractor>,
        transaction_timeout: Duration,
    ) -> Self {
        Self {
            db,
            registry,
            extractor,
            transaction_timeout,
        }
    }

    /// Store an uploaded MP3 and register its metadata.
    ///
    /// The row is written before the song service is called, and the call
    /// happens inside the same transaction: a failed registration rolls the
    /// row back. Under a song service outage this costs a write and a rollback
    /// per request instead of calling the song service first.
    pub async fn create(&self, payload: &[u8]) -> ResourceResult<i64> {
        let detected = detect_content_type(payload);
        if detected != RESOURCE_CONTENT_TYPE {
            warn!("Rejecting upload with content type {}", detected);
            return Err(ResourceError::InvalidFormat {
                detected: detected.to_string(),
            });
        }

        let mut tx = self.begin_write().await?;
        let outcome = timeout(self.transaction_timeout, self.create_in(&mut tx, payload)).await;
        self.finish(tx, outcome, "create").await
    }

    async fn create_in(
        &self,
        tx: &mut Transaction<'static, Sqlite>,
        payload: &[u8],
    ) -> ResourceResult<i64> {
        info!("Creating resource...");
        let id = ResourceRepository::save(&mut **tx, payload).await?;

        info!("Saved resource {} and parsing metadata...", id);
        let metadata = self.extractor.extract(payload).map_err(|err| {
            error!("Metadata extraction failed for resource {}: {}", id, err);
            err
        })?;
        let record = MetadataRecord::new(id, metadata);

        info!("Registering resource {} with song service...", id);
        self.registry.register(&record).await?;

        Ok(id)
    }

    /// Fetch a stored resource. Reads never touch the song service.
    pub async fn get(&self, id: i64) -> ResourceResult<Resource> {
        info!("Retrieving resource {}...", id);
        let mut conn = self.db.acquire().await?;
        ResourceRepository::find_by_id(&mut conn, id)
            .await?
            .ok_or(ResourceError::NotFound(id))
    }

    /// Delete the resources named in `ids_csv` and deregister them remotely.
    ///
    /// Ids that do not exist are ignored. The input is validated as a whole
    /// before the store is touched. Returns the ids that were deleted, in
    /// ascending order.
    ///
    /// Local deletes happen first and the song service call runs inside the
    /// same transaction, so a failed deregistration restores the rows. While
    /// the song service is down, deletes keep rolling back.
    pub async fn delete(&self, ids_csv: &str) -> ResourceResult<Vec<i64>> {
        let candidates = parse_id_list("id", ids_csv)?;

        let mut tx = self.begin_write().await?;
        let outcome = timeout(self.transaction_timeout, self.delete_in(&mut tx, &candidates)).await;
        self.finish(tx, outcome, "delete").await
    }

    async fn delete_in(
        &self,
        tx: &mut Transaction<'static, Sqlite>,
        candidates: &BTreeSet<i64>,
    ) -> ResourceResult<Vec<i64>> {
        let existing = ResourceRepository::filter_existing_ids(&mut **tx, candidates).await?;
        if existing.is_empty() {
            info!("None of the requested resources exist, nothing to delete");
            return Ok(existing);
        }

        info!("Deleting resource(s) {:?}...", existing);
        for id in &existing {
            ResourceRepository::delete_by_id(&mut **tx, *id).await?;
        }

        info!("Removing resource(s) {:?} from song service...", existing);
        self.registry.deregister(&existing).await?;

        Ok(existing)
    }

    /// Open a transaction that takes the SQLite write lock up front.
    ///
    /// A deferred transaction that reads and then writes cannot upgrade while
    /// another writer holds the lock and fails with SQLITE_BUSY. Taking the
    /// lock at BEGIN makes an overlapping delete wait on the busy timeout and
    /// then see the rows already gone.
    async fn begin_write(&self) -> ResourceResult<Transaction<'static, Sqlite>> {
        Ok(self.db.begin_with("BEGIN IMMEDIATE").await?)
    }

    /// Commit on success; roll back on an error or when the scope timed out.
    async fn finish<T>(
        &self,
        tx: Transaction<'static, Sqlite>,
        outcome: Result<ResourceResult<T>, tokio::time::error::Elapsed>,
        operation: &str,
    ) -> ResourceResult<T> {
        let err = match outcome {
            Ok(Ok(value)) => {
                tx.commit().await?;
                return Ok(value);
            }
            Ok(Err(err)) => err,
            Err(_) => {
                error!(
                    "{} exceeded transaction timeout of {:?}",
                    operation, self.transaction_timeout
                );
                ResourceError::TransactionTimeout(self.transaction_timeout)
            }
        };

        match tx.rollback().await {
            Ok(()) => warn!("{} failed, local changes rolled back: {}", operation, err),
            Err(rollback_err) => error!(
                "{} failed ({}) and rollback also failed: {}",
                operation, err, rollback_err
            ),
        }
        Err(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::services::{
        metadata_extractor::Mp3MetadataExtractor,
        test_support::{
            RecordingRegistry, StubExtractor, count_resources, mp3_like, service_on, service_with,
        },
    };

    fn ok_extractor() -> StubExtractor {
        StubExtractor { fail: false }
    }

    async fn service_for(registry: &Arc<RecordingRegistry>) -> ResourceService {
        service_with(registry.clone(), ok_extractor(), DEFAULT_TRANSACTION_TIMEOUT).await
    }

    async fn seed(service: &ResourceService, count: usize) -> Vec<i64> {
        let mut conn = service.db.acquire().await.unwrap();
        let mut ids = Vec::new();
        for n in 0..count {
            let payload = mp3_like(format!("seed-{}", n).as_bytes());
            ids.push(ResourceRepository::save(&mut conn, &payload).await.unwrap());
        }
        ids
    }

    async fn exists(service: &ResourceService, id: i64) -> bool {
        service.get(id).await.is_ok()
    }

    #[tokio::test]
    async fn create_then_get_returns_identical_bytes() {
        let registry = Arc::new(RecordingRegistry::default());
        let service = service_for(&registry).await;
        let payload = mp3_like(b"some audio frames");

        let id = service.create(&payload).await.unwrap();

        let stored = service.get(id).await.unwrap();
        assert_eq!(stored.data, payload);

        let registered = registry.registered.lock().unwrap();
        assert_eq!(registered.len(), 1);
        assert_eq!(registered[0].id, id.to_string());
        assert_eq!(registered[0].name.as_deref(), Some("Song"));
        assert_eq!(registered[0].duration, "02:05");
    }

    #[tokio::test]
    async fn non_mp3_upload_is_rejected_without_side_effects() {
        let registry = Arc::new(RecordingRegistry::default());
        let service = service_for(&registry).await;

        let err = service.create(b"plain text, not audio").await.unwrap_err();

        match err {
            ResourceError::InvalidFormat { detected } => {
                assert_eq!(detected, "application/octet-stream")
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(count_resources(&service).await, 0);
        assert!(registry.registered.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_registration_rolls_back_the_row() {
        let registry = Arc::new(RecordingRegistry::failing(Some(503), Some("down")));
        let service = service_for(&registry).await;

        let err = service.create(&mp3_like(b"audio")).await.unwrap_err();

        match err {
            ResourceError::ExternalService { status, body } => {
                assert_eq!(status, Some(503));
                assert_eq!(body.as_deref(), Some("down"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(registry.registered.lock().unwrap().len(), 1);
        assert_eq!(count_resources(&service).await, 0);
    }

    #[tokio::test]
    async fn transport_failure_on_registration_rolls_back_the_row() {
        let registry = Arc::new(RecordingRegistry::failing(None, None));
        let service = service_with(registry, ok_extractor(), DEFAULT_TRANSACTION_TIMEOUT).await;

        let err = service.create(&mp3_like(b"audio")).await.unwrap_err();

        assert!(matches!(
            err,
            ResourceError::ExternalService {
                status: None,
                body: None
            }
        ));
        assert_eq!(count_resources(&service).await, 0);
    }

    #[tokio::test]
    async fn extraction_failure_rolls_back_and_skips_registration() {
        let registry = Arc::new(RecordingRegistry::default());
        let service = service_with(
            registry.clone(),
            StubExtractor { fail: true },
            DEFAULT_TRANSACTION_TIMEOUT,
        )
        .await;

        let err = service.create(&mp3_like(b"audio")).await.unwrap_err();

        assert!(matches!(err, ResourceError::Extraction(_)));
        assert_eq!(count_resources(&service).await, 0);
        assert!(registry.registered.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn slow_registration_times_out_and_rolls_back() {
        let registry = Arc::new(RecordingRegistry::stalling(Duration::from_millis(500)));
        let timeout = Duration::from_millis(50);
        let service = service_with(registry, ok_extractor(), timeout).await;

        let err = service.create(&mp3_like(b"audio")).await.unwrap_err();

        assert!(matches!(err, ResourceError::TransactionTimeout(limit) if limit == timeout));
        assert_eq!(count_resources(&service).await, 0);
    }

    #[tokio::test]
    async fn tag_without_audio_frames_is_rejected_before_registration() {
        let registry = Arc::new(RecordingRegistry::default());
        let service = service_with(
            registry.clone(),
            Mp3MetadataExtractor,
            DEFAULT_TRANSACTION_TIMEOUT,
        )
        .await;

        let err = service.create(&mp3_like(b"")).await.unwrap_err();

        assert!(matches!(err, ResourceError::Extraction(_)), "{:?}", err);
        assert_eq!(count_resources(&service).await, 0);
        assert!(registry.registered.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn get_unknown_id_is_not_found() {
        let service = service_with(
            Arc::new(RecordingRegistry::default()),
            ok_extractor(),
            DEFAULT_TRANSACTION_TIMEOUT,
        )
        .await;

        assert!(matches!(service.get(12).await, Err(ResourceError::NotFound(12))));
    }

    #[tokio::test]
    async fn delete_removes_existing_and_ignores_unknown_ids() {
        let registry = Arc::new(RecordingRegistry::default());
        let service = service_for(&registry).await;
        let ids = seed(&service, 8).await;
        assert_eq!(ids[2], 3);
        assert_eq!(ids[6], 7);

        let deleted = service.delete("3,7,99").await.unwrap();

        assert_eq!(deleted, vec![3, 7]);
        assert!(!exists(&service, 3).await);
        assert!(!exists(&service, 7).await);
        assert_eq!(count_resources(&service).await, 6);
        assert_eq!(*registry.deregistered.lock().unwrap(), vec![vec![3, 7]]);
    }

    #[tokio::test]
    async fn delete_with_malformed_ids_touches_nothing() {
        let registry = Arc::new(RecordingRegistry::default());
        let service = service_for(&registry).await;
        seed(&service, 3).await;

        let err = service.delete("abc,3").await.unwrap_err();

        match err {
            ResourceError::InvalidParameter { field, .. } => assert_eq!(field, "id"),
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(exists(&service, 3).await);
        assert!(registry.deregistered.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_of_nothing_skips_the_song_service() {
        let registry = Arc::new(RecordingRegistry::failing(Some(500), None));
        let service = service_for(&registry).await;

        let deleted = service.delete("41,42").await.unwrap();

        assert!(deleted.is_empty());
        assert!(registry.deregistered.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_deregistration_restores_deleted_rows() {
        let registry = Arc::new(RecordingRegistry::failing(Some(500), Some("boom")));
        let service = service_for(&registry).await;
        seed(&service, 7).await;

        let err = service.delete("3,7").await.unwrap_err();

        assert!(matches!(
            err,
            ResourceError::ExternalService {
                status: Some(500),
                ..
            }
        ));
        assert!(exists(&service, 3).await);
        assert!(exists(&service, 7).await);
        assert_eq!(count_resources(&service).await, 7);
        assert_eq!(*registry.deregistered.lock().unwrap(), vec![vec![3, 7]]);
    }

    #[tokio::test]
    async fn second_delete_of_same_id_finds_nothing() {
        let registry = Arc::new(RecordingRegistry::default());
        let service = service_for(&registry).await;
        seed(&service, 2).await;

        assert_eq!(service.delete("2,2").await.unwrap(), vec![2]);
        assert!(service.delete("2").await.unwrap().is_empty());
        assert_eq!(registry.deregistered.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn slow_deregistration_times_out_and_restores_rows() {
        let registry = Arc::new(RecordingRegistry::stalling(Duration::from_millis(500)));
        let timeout = Duration::from_millis(50);
        let service = service_with(registry.clone(), ok_extractor(), timeout).await;
        seed(&service, 2).await;

        let err = service.delete("1,2").await.unwrap_err();

        assert!(matches!(err, ResourceError::TransactionTimeout(limit) if limit == timeout));
        assert!(exists(&service, 1).await);
        assert!(exists(&service, 2).await);
        assert_eq!(count_resources(&service).await, 2);
        assert_eq!(*registry.deregistered.lock().unwrap(), vec![vec![1, 2]]);
    }

    async fn file_backed_service(
        dir: &tempfile::TempDir,
        registry: Arc<RecordingRegistry>,
    ) -> ResourceService {
        let url = format!("sqlite://{}", dir.path().join("resources.db").display());
        let pool = db::connect(&url).await.unwrap();
        db::run_migrations(&pool).await.unwrap();
        service_on(pool, registry, ok_extractor(), DEFAULT_TRANSACTION_TIMEOUT)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn overlapping_deletes_of_same_id_serialize() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Arc::new(RecordingRegistry::stalling(Duration::from_millis(300)));
        let service = file_backed_service(&dir, registry.clone()).await;
        seed(&service, 1).await;

        let (first, second) = tokio::join!(service.delete("1"), async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            service.delete("1").await
        });

        assert_eq!(first.unwrap(), vec![1]);
        assert_eq!(second.unwrap(), Vec::<i64>::new());
        assert_eq!(count_resources(&service).await, 0);
        assert_eq!(*registry.deregistered.lock().unwrap(), vec![vec![1]]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn overlapping_creates_both_commit() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Arc::new(RecordingRegistry::stalling(Duration::from_millis(200)));
        let service = file_backed_service(&dir, registry.clone()).await;

        let first_payload = mp3_like(b"one");
        let (first, second) = tokio::join!(service.create(&first_payload), async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            service.create(&mp3_like(b"two")).await
        });

        let mut ids = vec![first.unwrap(), second.unwrap()];
        ids.sort();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(count_resources(&service).await, 2);
        assert_eq!(registry.registered.lock().unwrap().len(), 2);
    }
}
