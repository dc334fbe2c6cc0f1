//! JSend response envelopes.
//!
//! - success: `{"status": "success", "data": ...}`
//! - fail (4xx): `{"status": "fail", "data": {"message": ...}}`
//! - error (5xx): `{"status": "error", "message": ...}`

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::service::ServiceError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JSendStatus {
    Error,
    Fail,
    Success,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JSend<T> {
    pub data: T,
    pub status: JSendStatus,
}

impl<T: Serialize> JSend<T> {
    pub fn success(data: T) -> Json<JSend<T>> {
        Json(JSend {
            data,
            status: JSendStatus::Success,
        })
    }
}

/// Success envelope for list endpoints.
pub type JSendPaginated<T> = JSend<Page<T>>;

#[derive(Debug, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Pagination {
    /// `None` means unbounded.
    pub limit: Option<u32>,
    pub offset: u32,
    pub total: u64,
}

impl<T: Serialize> JSend<Page<T>> {
    pub fn page(items: Vec<T>, pagination: Pagination) -> Json<JSendPaginated<T>> {
        JSend::success(Page { items, pagination })
    }
}

/// Handler error rendered as a JSend fail (4xx) or error (5xx).
#[derive(Debug)]
pub enum ApiError {
    Fail(StatusCode, String),
    Error(StatusCode, String),
}

#[derive(Serialize)]
struct FailBody<'a> {
    data: Message<'a>,
    status: JSendStatus,
}

#[derive(Serialize)]
struct Message<'a> {
    message: &'a str,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    message: &'a str,
    status: JSendStatus,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Fail(code, message) => {
                let body = FailBody {
                    data: Message { message: &message },
                    status: JSendStatus::Fail,
                };
                (code, Json(body)).into_response()
            }
            ApiError::Error(code, message) => {
                let body = ErrorBody {
                    message: &message,
                    status: JSendStatus::Error,
                };
                (code, Json(body)).into_response()
            }
        }
    }
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::Fail(StatusCode::BAD_REQUEST, message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::Fail(StatusCode::NOT_FOUND, message.into())
    }

    pub fn payload_too_large(message: impl Into<String>) -> Self {
        ApiError::Fail(StatusCode::PAYLOAD_TOO_LARGE, message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::Error(StatusCode::INTERNAL_SERVER_ERROR, message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Fail(code, _) | ApiError::Error(code, _) => *code,
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(e: ServiceError) -> Self {
        tracing::error!(error = %e, "Storage operation failed");
        ApiError::internal(e.to_string())
    }
}

/// `axum::extract::Query` replacement backed by `serde_qs` that rejects with
/// a JSend fail.
pub struct AppQuery<T>(pub T);

#[axum::async_trait]
impl<S, T> FromRequestParts<S> for AppQuery<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, ApiError> {
        let query = parts.uri.query().unwrap_or_default();
        serde_qs::from_str(query).map(AppQuery).map_err(|e| {
            let detail = e
                .to_string()
                .replace("u32", "non-negative integer")
                .replace("u64", "non-negative integer");
            ApiError::bad_request(format!("Invalid query parameter: {detail}"))
        })
    }
}
