use axum::extract::{Multipart, Path, State};
use axum::Json;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::api::response::{ApiError, AppQuery, JSend, JSendPaginated, Pagination};
use crate::service::FALLBACK_MIME_TYPE;
use crate::storage::models::{FileRecord, FileSummary};
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResponse {
    pub deleted: String,
    pub record: FileRecord,
    /// False when the blob could not be removed; the file is still gone from
    /// the catalog.
    pub blob_deleted: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListFilesParams {
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub offset: u32,
}

struct UploadPart {
    data: Bytes,
    file_name: String,
    content_type: Option<String>,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/upload
pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<JSend<FileRecord>>, ApiError> {
    let mut upload: Option<UploadPart> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart data: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| ApiError::bad_request("file part must carry a filename"))?;
        let content_type = field.content_type().map(str::to_string);

        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(format!("Failed to read file: {e}")))?;

        if data.len() as u64 > state.config.max_upload_size {
            return Err(ApiError::payload_too_large(format!(
                "File exceeds maximum upload size of {} bytes",
                state.config.max_upload_size
            )));
        }

        upload = Some(UploadPart {
            data,
            file_name,
            content_type,
        });
        break;
    }

    let upload = upload.ok_or_else(|| ApiError::bad_request("file field is required"))?;
    if upload.file_name.trim().is_empty() {
        return Err(ApiError::bad_request("filename must not be empty"));
    }

    let mime_type = resolve_mime_type(upload.content_type, &upload.file_name);
    let record = state
        .files
        .upload(upload.data, &upload.file_name, &mime_type)
        .await?;

    Ok(JSend::success(record))
}

/// GET /api/files
pub async fn list_files(
    State(state): State<Arc<AppState>>,
    AppQuery(params): AppQuery<ListFilesParams>,
) -> Result<Json<JSendPaginated<FileSummary>>, ApiError> {
    if params.limit == Some(0) {
        return Err(ApiError::bad_request("limit must be greater than 0"));
    }

    let files = state.files.list();
    let total = files.len() as u64;
    let items: Vec<FileSummary> = files
        .into_iter()
        .skip(params.offset as usize)
        .take(params.limit.map_or(usize::MAX, |l| l as usize))
        .collect();

    Ok(JSend::page(
        items,
        Pagination {
            limit: params.limit,
            offset: params.offset,
            total,
        },
    ))
}

/// DELETE /api/upload/:id
pub async fn delete_file(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<JSend<DeleteResponse>>, ApiError> {
    let deleted = state
        .files
        .delete(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("File not found"))?;

    Ok(JSend::success(DeleteResponse {
        deleted: id,
        record: deleted.record,
        blob_deleted: deleted.blob_deleted,
    }))
}

// ============================================================================
// Helpers
// ============================================================================

/// Declared part type, else a guess from the filename, else the fallback.
fn resolve_mime_type(declared: Option<String>, file_name: &str) -> String {
    declared
        .filter(|ct| !ct.is_empty() && ct != FALLBACK_MIME_TYPE)
        .or_else(|| mime_guess::from_path(file_name).first().map(|m| m.to_string()))
        .unwrap_or_else(|| FALLBACK_MIME_TYPE.to_string())
}
