//! Response bodies for the word list API.
//!
//! Success is `{ "data": T, "meta": {..} }`. Failures are [`ApiError`], which
//! renders `{ "error": { "code", "message" }, "meta": {..} }` with the code and
//! status taken from the pool or sanitizer error behind it.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use serde::Serialize;
use thiserror::Error;

use crate::pool::WordListError;
use crate::sanitizer::SanitizationError;
use crate::types::WordListCategory;

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub timestamp: String,
    pub version: &'static str,
}

impl ResponseMeta {
    fn now() -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Response {
        Self::with_status(StatusCode::OK, data)
    }

    pub fn with_status(status: StatusCode, data: T) -> Response {
        let body = Self {
            data,
            meta: ResponseMeta::now(),
        };
        (status, axum::Json(body)).into_response()
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Everything a handler can refuse a request with
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    InvalidRequest(String),

    #[error("{0}")]
    UnknownCategory(String),

    #[error("No {category} word list has been initialized for tenant '{tenant_id}'")]
    WordListNotFound {
        tenant_id: String,
        category: WordListCategory,
    },

    #[error(transparent)]
    Sanitization(#[from] SanitizationError),

    #[error(transparent)]
    Pool(#[from] WordListError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) | Self::UnknownCategory(_) => StatusCode::BAD_REQUEST,
            Self::WordListNotFound { .. } => StatusCode::NOT_FOUND,
            Self::Sanitization(SanitizationError::InputTooLarge { .. })
            | Self::Pool(WordListError::Sanitization(SanitizationError::InputTooLarge { .. })) => {
                StatusCode::PAYLOAD_TOO_LARGE
            }
            Self::Pool(WordListError::PoolClosed | WordListError::PoolSaturated { .. }) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Self::Pool(WordListError::MatchTimeout { .. }) => StatusCode::GATEWAY_TIMEOUT,
            Self::Pool(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "INVALID_REQUEST",
            Self::UnknownCategory(_) => "UNKNOWN_CATEGORY",
            Self::WordListNotFound { .. } => "WORD_LIST_NOT_FOUND",
            Self::Sanitization(e) => e.code(),
            Self::Pool(e) => e.code(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: ErrorDetail,
    meta: ResponseMeta,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code(),
                message: self.to_string(),
            },
            meta: ResponseMeta::now(),
        };
        (status, axum::Json(body)).into_response()
    }
}
