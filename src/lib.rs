//! file-vault - A small file storage service
//!
//! This crate provides file upload, listing, retrieval and deletion with:
//! - A swappable blob store (local filesystem)
//! - A JSON metadata catalog that is flushed atomically after every mutation
//! - Snapshot reads and serialized writes over the catalog
//! - A REST API with multipart upload support

pub mod api;
pub mod config;
pub mod ids;
pub mod object_store;
pub mod service;
pub mod storage;
#[cfg(test)]
pub mod testutil;

use config::Config;
use service::FileService;

/// Shared application state
pub struct AppState {
    pub config: Config,
    pub files: FileService,
}
