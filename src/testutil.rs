//! Shared test helpers for handler tests.

use std::sync::Arc;

use crate::config::{Config, NodeConfig, StorageConfig};
use crate::object_store::LocalStore;
use crate::service::FileService;
use crate::storage::{Catalog, JsonFile};
use crate::AppState;

/// Create a test AppState with the catalog under `<temp>/data` and blobs
/// under `<temp>/files`.
pub fn test_state(temp_dir: &tempfile::TempDir) -> Arc<AppState> {
    let data_dir = temp_dir.path().join("data");
    let files_dir = temp_dir.path().join("files");

    let config = Config {
        node: NodeConfig {
            bind_address: "127.0.0.1:0".to_string(),
            data_dir: data_dir.to_string_lossy().to_string(),
            public_dir: None,
        },
        storage: StorageConfig {
            uploads_dir: files_dir.to_string_lossy().to_string(),
        },
        max_upload_size: 10 * 1024 * 1024, // 10MB for tests
        sweep_on_startup: false,
    };

    let backend = JsonFile::open(&data_dir).expect("Failed to open test catalog");
    let catalog = Catalog::open(backend).expect("Failed to load test catalog");
    let object_store = LocalStore::new(&files_dir).expect("Failed to create test object store");

    Arc::new(AppState {
        config,
        files: FileService::new(Arc::new(catalog), Arc::new(object_store)),
    })
}
