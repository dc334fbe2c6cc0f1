//! Upload, list, fetch and delete, coordinating the blob store with the
//! catalog.
//!
//! Ordering rules:
//! - upload writes the blob before appending metadata, so a crash in between
//!   leaves an orphaned blob rather than a dangling record;
//! - delete removes metadata before the blob, and a failed blob delete does
//!   not undo the metadata removal.
//!
//! Orphans from either path are reclaimed by [`FileService::sweep_orphans`].

use std::collections::HashSet;
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::ids::{candidate_id, IdGenerator, Reservation};
use crate::object_store::{ObjectStore, ObjectStoreError};
use crate::storage::models::{FileRecord, FileSummary};
use crate::storage::{Catalog, CatalogError};

/// Content type used when a blob has no catalog record.
pub const FALLBACK_MIME_TYPE: &str = "application/octet-stream";

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Failed to store file: {0}")]
    BlobWrite(#[source] ObjectStoreError),
    #[error("Failed to read file: {0}")]
    BlobRead(#[source] ObjectStoreError),
    #[error("Failed to update catalog: {0}")]
    StorageWrite(#[from] CatalogError),
}

/// Blob bytes plus the display headers known for them.
#[derive(Debug, Clone)]
pub struct FetchedFile {
    pub data: Bytes,
    pub mime_type: String,
    /// `None` when the blob exists but the catalog has no record of it.
    pub original_name: Option<String>,
}

/// Outcome of a delete whose catalog removal succeeded.
#[derive(Debug, Clone)]
pub struct DeletedFile {
    pub record: FileRecord,
    /// `false` when the blob could not be removed and is now an orphan.
    pub blob_deleted: bool,
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct SweepReport {
    pub orphans_removed: u64,
    pub orphans_failed: u64,
    /// Records whose blob is missing. Reported only, never removed.
    pub dangling: Vec<String>,
}

#[derive(Clone)]
pub struct FileService {
    catalog: Arc<Catalog>,
    object_store: Arc<dyn ObjectStore>,
    ids: IdGenerator,
}

impl FileService {
    pub fn new(catalog: Arc<Catalog>, object_store: Arc<dyn ObjectStore>) -> Self {
        Self {
            catalog,
            object_store,
            ids: IdGenerator::new(),
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Store `data` and record it in the catalog.
    pub async fn upload(
        &self,
        data: Bytes,
        original_name: &str,
        mime_type: &str,
    ) -> Result<FileRecord, ServiceError> {
        self.upload_at(Utc::now(), data, original_name, mime_type).await
    }

    /// [`Self::upload`] with the id derived from `at` instead of the clock.
    pub async fn upload_at(
        &self,
        at: DateTime<Utc>,
        data: Bytes,
        original_name: &str,
        mime_type: &str,
    ) -> Result<FileRecord, ServiceError> {
        let reservation = self.reserve_id(at, original_name).await?;
        let id = reservation.id().to_string();
        let size = data.len() as u64;

        // Phase 1: blob
        self.object_store
            .put(&id, data)
            .await
            .map_err(ServiceError::BlobWrite)?;

        // Phase 2: metadata
        let record = FileRecord::new(
            id.clone(),
            original_name.to_string(),
            size,
            mime_type.to_string(),
        );
        let record = match self.catalog.append(record) {
            Ok(record) => record,
            Err(e) => {
                // Best-effort cleanup; a leftover blob is reclaimed by the sweep
                if let Err(cleanup) = self.object_store.delete(&id).await {
                    tracing::warn!(file_id = %id, error = %cleanup, "Failed to remove blob after catalog error");
                }
                return Err(e.into());
            }
        };
        drop(reservation);

        tracing::info!(file_id = %record.id, size = record.size, "Uploaded file");
        Ok(record)
    }

    /// Listing projection in insertion order.
    pub fn list(&self) -> Vec<FileSummary> {
        self.catalog.list().iter().map(FileRecord::summary).collect()
    }

    /// Blob bytes for `id`. Metadata is optional; a blob without a record is
    /// still served with a generic content type. `Ok(None)` when no blob
    /// exists.
    pub async fn fetch(&self, id: &str) -> Result<Option<FetchedFile>, ServiceError> {
        let record = self.catalog.find_by_id(id);

        let data = match self.object_store.get(id).await {
            Ok(data) => data,
            Err(ObjectStoreError::NotFound(_) | ObjectStoreError::InvalidKey(_)) => {
                if record.is_some() {
                    tracing::warn!(file_id = %id, "Catalog record has no blob");
                }
                return Ok(None);
            }
            Err(e) => return Err(ServiceError::BlobRead(e)),
        };

        if record.is_none() {
            tracing::debug!(file_id = %id, "Serving blob without catalog record");
        }

        Ok(Some(match record {
            Some(record) => FetchedFile {
                data,
                mime_type: record.mime_type,
                original_name: Some(record.original_name),
            },
            None => FetchedFile {
                data,
                mime_type: FALLBACK_MIME_TYPE.to_string(),
                original_name: None,
            },
        }))
    }

    /// Remove `id` from the catalog, then its blob. `Ok(None)` for unknown
    /// ids. Blob removal failures are logged and reported in the result.
    pub async fn delete(&self, id: &str) -> Result<Option<DeletedFile>, ServiceError> {
        let Some(record) = self.catalog.remove_by_id(id)? else {
            return Ok(None);
        };

        let blob_deleted = match self.object_store.delete(id).await {
            Ok(()) => true,
            Err(ObjectStoreError::NotFound(_)) => {
                tracing::warn!(file_id = %id, "Deleted record had no blob");
                true
            }
            Err(e) => {
                tracing::error!(file_id = %id, error = %e, "Failed to delete blob; left as orphan");
                false
            }
        };

        tracing::info!(file_id = %id, blob_deleted, "Deleted file");
        Ok(Some(DeletedFile {
            record,
            blob_deleted,
        }))
    }

    /// Remove blobs that have no catalog record and are not claimed by an
    /// in-flight upload, and report records whose blob is missing.
    pub async fn sweep_orphans(&self) -> Result<SweepReport, ServiceError> {
        // Records present before the listing have their blob written already
        let snapshot = self.catalog.list();
        let keys = self
            .object_store
            .list_keys()
            .await
            .map_err(ServiceError::BlobRead)?;
        let mut report = SweepReport::default();

        for key in &keys {
            // Reservation is checked first: an upload appends its record
            // before releasing the id, so one of the two always holds.
            if self.ids.is_reserved(key) || self.catalog.contains(key) {
                continue;
            }
            match self.object_store.delete(key).await {
                Ok(()) => {
                    tracing::info!(file_id = %key, "Removed orphaned blob");
                    report.orphans_removed += 1;
                }
                Err(ObjectStoreError::NotFound(_)) => {}
                Err(e) => {
                    tracing::warn!(file_id = %key, error = %e, "Failed to remove orphaned blob");
                    report.orphans_failed += 1;
                }
            }
        }

        let present: HashSet<&str> = keys.iter().map(String::as_str).collect();
        report.dangling = snapshot
            .iter()
            .filter(|r| !present.contains(r.id.as_str()))
            .map(|r| r.id.clone())
            .collect();
        for id in &report.dangling {
            tracing::warn!(file_id = %id, "Catalog record has no blob");
        }

        Ok(report)
    }

    /// Claim the first free candidate id for `original_name`.
    async fn reserve_id(
        &self,
        at: DateTime<Utc>,
        original_name: &str,
    ) -> Result<Reservation, ServiceError> {
        let mut attempt = 0;
        loop {
            let candidate = candidate_id(at, original_name, attempt);
            attempt += 1;

            let Some(reservation) = self
                .ids
                .try_reserve(&candidate, |id| self.catalog.contains(id))
            else {
                continue;
            };

            // Never overwrite an existing blob, orphaned or not
            match self.object_store.exists(&candidate).await {
                Ok(false) => return Ok(reservation),
                Ok(true) => continue,
                Err(e) => return Err(ServiceError::BlobWrite(e)),
            }
        }
    }
}
