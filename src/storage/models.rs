use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata for one stored file, as persisted in the catalog document.
///
/// Field names match the on-disk `files.json` layout so existing catalogs
/// load unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    /// Generated storage name; also the blob key and the public handle.
    pub id: String,
    pub original_name: String,
    pub size: u64,
    #[serde(rename = "mimetype", alias = "mimeType")]
    pub mime_type: String,
    /// Public URL path the blob is served under.
    pub path: String,
    /// Assigned by the catalog on append.
    #[serde(rename = "uploadDate")]
    pub uploaded_at: DateTime<Utc>,
}

impl FileRecord {
    /// Build a record for a blob stored under `id`.
    /// `uploaded_at` is provisional until the catalog stamps it.
    pub fn new(id: String, original_name: String, size: u64, mime_type: String) -> Self {
        let path = format!("/uploads/{id}");
        Self {
            id,
            original_name,
            size,
            mime_type,
            path,
            uploaded_at: Utc::now(),
        }
    }

    pub fn summary(&self) -> FileSummary {
        FileSummary {
            id: self.id.clone(),
            original_name: self.original_name.clone(),
            size: self.size,
        }
    }
}

/// Listing projection of a [`FileRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSummary {
    pub id: String,
    pub original_name: String,
    pub size: u64,
}
