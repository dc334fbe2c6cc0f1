use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{TimeZone, Utc};
use file_vault::object_store::{LocalStore, ObjectStore, ObjectStoreError};
use file_vault::service::{FileService, ServiceError, FALLBACK_MIME_TYPE};
use file_vault::storage::models::FileRecord;
use file_vault::storage::{Catalog, CatalogBackend, CatalogError, JsonFile};

struct Harness {
    dir: tempfile::TempDir,
    service: FileService,
    store: Arc<LocalStore>,
}

fn harness() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let catalog = Catalog::open(JsonFile::open(dir.path().join("data")).unwrap()).unwrap();
    let store = Arc::new(LocalStore::new(dir.path().join("uploads")).unwrap());
    let service = FileService::new(Arc::new(catalog), Arc::clone(&store) as Arc<dyn ObjectStore>);
    Harness {
        dir,
        service,
        store,
    }
}

fn is_generated_id(id: &str, name: &str) -> bool {
    match id.split_once('-') {
        Some((millis, rest)) => {
            !millis.is_empty() && millis.chars().all(|c| c.is_ascii_digit()) && rest == name
        }
        None => false,
    }
}

#[tokio::test]
async fn test_upload_list_delete_scenario() {
    let h = harness();

    let record = h
        .service
        .upload(Bytes::from_static(b"hello"), "a.txt", "text/plain")
        .await
        .unwrap();
    assert!(is_generated_id(&record.id, "a.txt"), "unexpected id {}", record.id);
    assert_eq!(record.size, 5);
    assert_eq!(record.original_name, "a.txt");
    assert_eq!(record.mime_type, "text/plain");

    let listed = h.service.list();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, record.id);
    assert_eq!(listed[0].size, 5);

    let deleted = h.service.delete(&record.id).await.unwrap().expect("deleted");
    assert_eq!(deleted.record, record);
    assert!(deleted.blob_deleted);

    assert!(h.service.fetch(&record.id).await.unwrap().is_none());
    assert!(!h.store.exists(&record.id).await.unwrap());
}

#[tokio::test]
async fn test_fetch_round_trip() {
    let h = harness();
    let data: Vec<u8> = (0..=255u8).cycle().take(10_000).collect();

    let record = h
        .service
        .upload(Bytes::from(data.clone()), "blob.bin", "application/x-test")
        .await
        .unwrap();

    let fetched = h.service.fetch(&record.id).await.unwrap().expect("fetched");
    assert_eq!(fetched.data.as_ref(), data.as_slice());
    assert_eq!(fetched.mime_type, "application/x-test");
    assert_eq!(fetched.original_name.as_deref(), Some("blob.bin"));
}

#[tokio::test]
async fn test_upload_sanitizes_whitespace() {
    let h = harness();
    let record = h
        .service
        .upload(Bytes::from_static(b"x"), "my  holiday\tphoto.jpg", "image/jpeg")
        .await
        .unwrap();

    assert!(is_generated_id(&record.id, "my_holiday_photo.jpg"));
    assert_eq!(record.original_name, "my  holiday\tphoto.jpg");
    assert_eq!(record.path, format!("/uploads/{}", record.id));
}

#[tokio::test]
async fn test_same_millisecond_uploads_get_distinct_ids() {
    let h = harness();
    let at = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();

    let (first, second) = tokio::join!(
        h.service
            .upload_at(at, Bytes::from_static(b"one"), "x file.txt", "text/plain"),
        h.service
            .upload_at(at, Bytes::from_static(b"two"), "x file.txt", "text/plain"),
    );
    let first = first.unwrap();
    let second = second.unwrap();

    assert_ne!(first.id, second.id);
    let ids: HashSet<&str> = [first.id.as_str(), second.id.as_str()].into();
    assert!(ids.contains("1700000000000-x_file.txt"));
    assert!(ids.contains("1700000000000-1-x_file.txt"));
    assert_eq!(h.service.list().len(), 2);

    // Neither blob overwrote the other
    let a = h.service.fetch(&first.id).await.unwrap().unwrap();
    let b = h.service.fetch(&second.id).await.unwrap().unwrap();
    assert_ne!(a.data, b.data);
}

#[tokio::test]
async fn test_upload_long_filename() {
    let h = harness();
    let name = format!("{}.pdf", "quarterly report ".repeat(13));
    assert!(name.len() > 220);

    let record = h
        .service
        .upload(Bytes::from_static(b"long"), &name, "application/pdf")
        .await
        .unwrap();

    assert!(record.id.len() <= 255);
    assert!(record.id.ends_with(".pdf"));
    assert_eq!(record.original_name, name);
    let fetched = h.service.fetch(&record.id).await.unwrap().expect("fetched");
    assert_eq!(fetched.data, Bytes::from_static(b"long"));
}

#[tokio::test]
async fn test_upload_does_not_overwrite_orphaned_blob() {
    let h = harness();
    let at = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
    h.store
        .put("1700000000000-a.txt", Bytes::from_static(b"orphan"))
        .await
        .unwrap();

    let record = h
        .service
        .upload_at(at, Bytes::from_static(b"fresh"), "a.txt", "text/plain")
        .await
        .unwrap();

    assert_eq!(record.id, "1700000000000-1-a.txt");
    assert_eq!(
        h.store.get("1700000000000-a.txt").await.unwrap(),
        Bytes::from_static(b"orphan")
    );
}

#[tokio::test]
async fn test_concurrent_uploads_are_all_listed() {
    let h = harness();
    let service = h.service.clone();

    let tasks: Vec<_> = (0..16)
        .map(|i| {
            let service = service.clone();
            tokio::spawn(async move {
                service
                    .upload(Bytes::from(format!("file {i}")), "same name.txt", "text/plain")
                    .await
                    .unwrap()
            })
        })
        .collect();

    let mut ids = HashSet::new();
    for task in tasks {
        ids.insert(task.await.unwrap().id);
    }

    assert_eq!(ids.len(), 16);
    let listed: HashSet<String> = h.service.list().into_iter().map(|f| f.id).collect();
    assert_eq!(listed, ids);
}

#[tokio::test]
async fn test_list_after_uploads_and_deletes() {
    let h = harness();
    let mut records = Vec::new();
    for i in 0..6 {
        records.push(
            h.service
                .upload(Bytes::from(vec![0u8; i]), &format!("f{i}.bin"), "application/octet-stream")
                .await
                .unwrap(),
        );
    }
    for record in records.iter().step_by(2) {
        h.service.delete(&record.id).await.unwrap().unwrap();
    }

    let listed: Vec<String> = h.service.list().into_iter().map(|f| f.id).collect();
    let expected: Vec<String> = records.iter().skip(1).step_by(2).map(|r| r.id.clone()).collect();
    assert_eq!(listed, expected);
}

#[tokio::test]
async fn test_delete_unknown_id() {
    let h = harness();
    h.service
        .upload(Bytes::from_static(b"x"), "a.txt", "text/plain")
        .await
        .unwrap();

    assert!(h.service.delete("123-missing.txt").await.unwrap().is_none());
    assert_eq!(h.service.list().len(), 1);
}

#[tokio::test]
async fn test_fetch_blob_without_record_uses_fallback() {
    let h = harness();
    h.store
        .put("99-stray.txt", Bytes::from_static(b"stray"))
        .await
        .unwrap();

    let fetched = h.service.fetch("99-stray.txt").await.unwrap().expect("blob");
    assert_eq!(fetched.data, Bytes::from_static(b"stray"));
    assert_eq!(fetched.mime_type, FALLBACK_MIME_TYPE);
    assert!(fetched.original_name.is_none());
}

#[tokio::test]
async fn test_fetch_rejects_path_traversal() {
    let h = harness();
    h.service
        .upload(Bytes::from_static(b"x"), "a.txt", "text/plain")
        .await
        .unwrap();

    assert!(h.service.fetch("../data/files.json").await.unwrap().is_none());
}

#[tokio::test]
async fn test_upload_survives_restart() {
    let h = harness();
    let record = h
        .service
        .upload(Bytes::from_static(b"persist"), "p.txt", "text/plain")
        .await
        .unwrap();

    let catalog = Catalog::open(JsonFile::open(h.dir.path().join("data")).unwrap()).unwrap();
    let restarted = FileService::new(Arc::new(catalog), Arc::clone(&h.store) as Arc<dyn ObjectStore>);

    let fetched = restarted.fetch(&record.id).await.unwrap().unwrap();
    assert_eq!(fetched.data, Bytes::from_static(b"persist"));
    assert_eq!(fetched.original_name.as_deref(), Some("p.txt"));
}

#[tokio::test]
async fn test_sweep_removes_orphans_and_reports_dangling() {
    let h = harness();
    let kept = h
        .service
        .upload(Bytes::from_static(b"keep"), "keep.txt", "text/plain")
        .await
        .unwrap();
    let dangling = h
        .service
        .upload(Bytes::from_static(b"gone"), "gone.txt", "text/plain")
        .await
        .unwrap();
    h.store.delete(&dangling.id).await.unwrap();
    h.store
        .put("5-orphan.txt", Bytes::from_static(b"orphan"))
        .await
        .unwrap();

    let report = h.service.sweep_orphans().await.unwrap();

    assert_eq!(report.orphans_removed, 1);
    assert_eq!(report.dangling, vec![dangling.id.clone()]);
    assert!(!h.store.exists("5-orphan.txt").await.unwrap());
    assert!(h.store.exists(&kept.id).await.unwrap());
    // Dangling records are reported, not removed
    assert_eq!(h.service.list().len(), 2);
}

#[tokio::test]
async fn test_restart_discards_interrupted_blob_writes() {
    let h = harness();
    let record = h
        .service
        .upload(Bytes::from_static(b"x"), "a.txt", "text/plain")
        .await
        .unwrap();
    let uploads = h.dir.path().join("uploads");
    let staging = uploads.join(format!(".{}.0000.part", record.id));
    std::fs::write(&staging, b"half").unwrap();

    let catalog = Catalog::open(JsonFile::open(h.dir.path().join("data")).unwrap()).unwrap();
    let store = Arc::new(LocalStore::new(&uploads).unwrap());
    let restarted = FileService::new(Arc::new(catalog), store as Arc<dyn ObjectStore>);
    let report = restarted.sweep_orphans().await.unwrap();

    assert!(!staging.exists());
    assert_eq!(report.orphans_removed, 0);
    assert!(report.dangling.is_empty());
    let entries: Vec<_> = std::fs::read_dir(&uploads).unwrap().collect();
    assert_eq!(entries.len(), 1);
}

/// Blob store that can fail writes or deletes.
struct FailingStore {
    inner: LocalStore,
    fail_put: bool,
    fail_delete: bool,
}

#[async_trait]
impl ObjectStore for FailingStore {
    async fn put(&self, key: &str, data: Bytes) -> Result<(), ObjectStoreError> {
        if self.fail_put {
            return Err(ObjectStoreError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "disk full",
            )));
        }
        self.inner.put(key, data).await
    }

    async fn get(&self, key: &str) -> Result<Bytes, ObjectStoreError> {
        self.inner.get(key).await
    }

    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError> {
        if self.fail_delete {
            return Err(ObjectStoreError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "read-only",
            )));
        }
        self.inner.delete(key).await
    }

    async fn exists(&self, key: &str) -> Result<bool, ObjectStoreError> {
        self.inner.exists(key).await
    }

    async fn list_keys(&self) -> Result<Vec<String>, ObjectStoreError> {
        self.inner.list_keys().await
    }
}

fn failing_service(dir: &tempfile::TempDir, fail_put: bool, fail_delete: bool) -> FileService {
    let catalog = Catalog::open(JsonFile::open(dir.path().join("data")).unwrap()).unwrap();
    let store = FailingStore {
        inner: LocalStore::new(dir.path().join("uploads")).unwrap(),
        fail_put,
        fail_delete,
    };
    FileService::new(Arc::new(catalog), Arc::new(store))
}

#[tokio::test]
async fn test_blob_write_failure_skips_catalog() {
    let dir = tempfile::tempdir().unwrap();
    let service = failing_service(&dir, true, false);

    let result = service
        .upload(Bytes::from_static(b"x"), "a.txt", "text/plain")
        .await;

    assert!(matches!(result, Err(ServiceError::BlobWrite(_))));
    assert!(service.list().is_empty());
    assert!(!dir.path().join("data").join("files.json").exists());
}

#[tokio::test]
async fn test_blob_delete_failure_still_removes_record() {
    let dir = tempfile::tempdir().unwrap();
    let service = failing_service(&dir, false, true);
    let record = service
        .upload(Bytes::from_static(b"x"), "a.txt", "text/plain")
        .await
        .unwrap();

    let deleted = service.delete(&record.id).await.unwrap().expect("deleted");

    assert_eq!(deleted.record.id, record.id);
    assert!(!deleted.blob_deleted);
    assert!(service.list().is_empty());
    // The blob is left behind as an orphan
    assert!(dir.path().join("uploads").join(&record.id).exists());
}

/// Catalog backend whose writes always fail.
struct ReadOnlyCatalog;

impl CatalogBackend for ReadOnlyCatalog {
    fn load(&self) -> Result<Vec<FileRecord>, CatalogError> {
        Ok(Vec::new())
    }

    fn save(&self, _records: &[FileRecord]) -> Result<(), CatalogError> {
        Err(CatalogError::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "read-only filesystem",
        )))
    }
}

#[tokio::test]
async fn test_catalog_failure_removes_uploaded_blob() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(LocalStore::new(dir.path().join("uploads")).unwrap());
    let catalog = Catalog::open(ReadOnlyCatalog).unwrap();
    let service = FileService::new(Arc::new(catalog), Arc::clone(&store) as Arc<dyn ObjectStore>);
    let at = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();

    let result = service
        .upload_at(at, Bytes::from_static(b"x"), "a.txt", "text/plain")
        .await;

    assert!(matches!(result, Err(ServiceError::StorageWrite(_))));
    assert!(service.list().is_empty());
    assert!(!store.exists("1700000000000-a.txt").await.unwrap());
    assert!(store.list_keys().await.unwrap().is_empty());
    assert!(service.fetch("1700000000000-a.txt").await.unwrap().is_none());
}
