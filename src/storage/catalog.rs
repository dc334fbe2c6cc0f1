use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use thiserror::Error;

use super::backend::CatalogBackend;
use super::models::FileRecord;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("File id already in catalog: {0}")]
    DuplicateId(String),
}

/// Immutable view of the catalog at one point in time.
pub type Snapshot = Arc<Vec<FileRecord>>;

/// Ordered, durable collection of [`FileRecord`]s.
///
/// Readers clone the current [`Snapshot`] and never wait on a flush.
/// Mutations are serialized by `write_lock`: each one builds the next
/// snapshot, persists it through the backend and only then publishes it, so
/// a failed flush leaves both memory and disk at the pre-call state.
pub struct Catalog {
    backend: Box<dyn CatalogBackend>,
    current: RwLock<Snapshot>,
    write_lock: Mutex<()>,
}

impl Catalog {
    /// Load the catalog from its backend.
    pub fn open(backend: impl CatalogBackend + 'static) -> Result<Self, CatalogError> {
        let records = backend.load()?;
        tracing::debug!(records = records.len(), "Catalog loaded");
        Ok(Self {
            backend: Box::new(backend),
            current: RwLock::new(Arc::new(records)),
            write_lock: Mutex::new(()),
        })
    }

    /// All records in insertion order.
    pub fn list(&self) -> Snapshot {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn len(&self) -> usize {
        self.list().len()
    }

    pub fn is_empty(&self) -> bool {
        self.list().is_empty()
    }

    pub fn find_by_id(&self, id: &str) -> Option<FileRecord> {
        self.list().iter().find(|r| r.id == id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.list().iter().any(|r| r.id == id)
    }

    /// Append a record and flush. The catalog assigns `uploaded_at`, never
    /// earlier than the previous record's, and returns the stored record.
    pub fn append(&self, mut record: FileRecord) -> Result<FileRecord, CatalogError> {
        let _guard = self.lock_writes();
        let current = self.list();

        if current.iter().any(|r| r.id == record.id) {
            return Err(CatalogError::DuplicateId(record.id));
        }

        let now = chrono::Utc::now();
        record.uploaded_at = match current.last() {
            Some(last) if last.uploaded_at > now => last.uploaded_at,
            _ => now,
        };

        let mut next = Vec::with_capacity(current.len() + 1);
        next.extend(current.iter().cloned());
        next.push(record.clone());

        self.publish(next)?;
        tracing::debug!(file_id = %record.id, "Appended catalog record");
        Ok(record)
    }

    /// Remove a record and flush. `Ok(None)` when the id is unknown, in which
    /// case nothing is written.
    pub fn remove_by_id(&self, id: &str) -> Result<Option<FileRecord>, CatalogError> {
        let _guard = self.lock_writes();
        let current = self.list();

        let Some(index) = current.iter().position(|r| r.id == id) else {
            return Ok(None);
        };

        let mut next: Vec<FileRecord> = current.as_ref().clone();
        let removed = next.remove(index);

        self.publish(next)?;
        tracing::debug!(file_id = %id, "Removed catalog record");
        Ok(Some(removed))
    }

    /// Persist `next` and make it the visible snapshot. Caller holds the
    /// write lock.
    fn publish(&self, next: Vec<FileRecord>) -> Result<(), CatalogError> {
        self.backend.save(&next)?;
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(next);
        Ok(())
    }

    fn lock_writes(&self) -> MutexGuard<'_, ()> {
        // The guarded state is only replaced wholesale, so a poisoned lock
        // never hides a half-applied mutation.
        self.write_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
