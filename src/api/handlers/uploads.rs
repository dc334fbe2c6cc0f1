use axum::extract::{Path, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use std::sync::Arc;

use crate::api::response::ApiError;
use crate::service::{FetchedFile, FALLBACK_MIME_TYPE};
use crate::AppState;

/// Serve file content with catalog headers when known.
/// Route: GET /uploads/:id
pub async fn serve_upload(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let file = fetch(&state, &id).await?;
    let mut response = (StatusCode::OK, file.data).into_response();
    let headers = response.headers_mut();

    headers.insert(
        header::CONTENT_TYPE,
        file.mime_type
            .parse()
            .unwrap_or(HeaderValue::from_static(FALLBACK_MIME_TYPE)),
    );

    if let Some(name) = file.original_name {
        if let Some(value) = content_disposition(&name) {
            headers.insert(header::CONTENT_DISPOSITION, value);
        }
    }

    // Blobs never change once written; a reused id always means a new upload
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("public, max-age=3600"),
    );

    Ok(response)
}

/// Serve raw file content, typed by the id's extension only.
/// Route: GET /api/view/:id
pub async fn view_upload(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let file = fetch(&state, &id).await?;
    let mime = mime_guess::from_path(&id).first_or_octet_stream();

    let mut response = (StatusCode::OK, file.data).into_response();
    if let Ok(value) = HeaderValue::from_str(mime.as_ref()) {
        response.headers_mut().insert(header::CONTENT_TYPE, value);
    }
    Ok(response)
}

async fn fetch(state: &AppState, id: &str) -> Result<FetchedFile, ApiError> {
    state
        .files
        .fetch(id)
        .await?
        .ok_or_else(|| ApiError::not_found("File not found"))
}

/// `inline; filename="<ascii>"; filename*=UTF-8''<percent-encoded>` (RFC 6266).
/// Control characters are dropped; the quoted fallback also loses quotes and
/// backslashes, and non-ASCII characters become `_`.
fn content_disposition(original_name: &str) -> Option<HeaderValue> {
    let name: String = original_name.chars().filter(|c| !c.is_control()).collect();
    let fallback: String = name
        .chars()
        .filter(|c| *c != '"' && *c != '\\')
        .map(|c| if c.is_ascii() { c } else { '_' })
        .collect();
    let encoded = urlencoding::encode(&name);
    HeaderValue::from_str(&format!(
        "inline; filename=\"{fallback}\"; filename*=UTF-8''{encoded}"
    ))
    .ok()
}
