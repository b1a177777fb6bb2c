//! API route handlers
//!
//! Handlers return [`ApiResponse`] bodies on success and [`ApiError`] on refusal.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::envelope::{ApiError, ApiResponse};
use crate::pool::{InitializeReport, PoolStats, WordListError, WordListService};
use crate::types::WordListCategory;

/// Shared state for API handlers
pub type ApiState = Arc<WordListService>;

// ============================================================================
// Request / response types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub pool: PoolStats,
}

#[derive(Debug, Deserialize)]
pub struct InitializeRequest {
    #[serde(rename = "tenantID")]
    pub tenant_id: String,
    pub locale: String,
    pub category: WordListCategory,
    #[serde(default)]
    pub phrases: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct InitializeResponse {
    pub initialized: bool,
    #[serde(flatten)]
    pub report: InitializeReport,
}

#[derive(Debug, Deserialize)]
pub struct ProcessRequest {
    #[serde(rename = "tenantID")]
    pub tenant_id: String,
    pub category: WordListCategory,
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct SanitizeRequest {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct SanitizeResponse {
    pub sanitized: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/v1/health
pub async fn get_health(State(service): State<ApiState>) -> Result<Response, ApiError> {
    let pool = service.stats();
    if pool.closed {
        return Err(WordListError::PoolClosed.into());
    }
    Ok(ApiResponse::ok(HealthResponse { status: "ok", pool }))
}

/// POST /api/v1/wordlists
pub async fn initialize_word_list(
    State(service): State<ApiState>,
    Json(req): Json<InitializeRequest>,
) -> Result<Response, ApiError> {
    if req.tenant_id.trim().is_empty() {
        return Err(ApiError::InvalidRequest("tenantID must not be empty".to_string()));
    }
    if service.is_closed() {
        return Err(WordListError::PoolClosed.into());
    }

    let report = service
        .initialize_detailed(&req.tenant_id, &req.locale, req.category, req.phrases)
        .await;
    let initialized = report.is_consistent();
    let status = if initialized {
        StatusCode::OK
    } else {
        StatusCode::ACCEPTED
    };
    Ok(ApiResponse::with_status(status, InitializeResponse { initialized, report }))
}

/// GET /api/v1/wordlists/:tenant/:category
pub async fn get_replication_status(
    State(service): State<ApiState>,
    Path((tenant_id, category)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let category: WordListCategory = category.parse().map_err(ApiError::UnknownCategory)?;
    service
        .replication_status(&tenant_id, category)
        .map(ApiResponse::ok)
        .ok_or_else(|| ApiError::WordListNotFound {
            tenant_id,
            category,
        })
}

/// POST /api/v1/process
///
/// Always 200: evaluation failures are reported in-band as `timedOut: true`.
pub async fn process_text(
    State(service): State<ApiState>,
    Json(req): Json<ProcessRequest>,
) -> Response {
    let result = service.process(&req.tenant_id, req.category, &req.text).await;
    debug!(tenant_id = %req.tenant_id, category = %req.category, matched = result.is_matched, "Processed text");
    ApiResponse::ok(result)
}

/// POST /api/v1/sanitize
pub async fn sanitize_text(
    State(service): State<ApiState>,
    Json(req): Json<SanitizeRequest>,
) -> Result<Response, ApiError> {
    let sanitized = service.sanitizer().sanitize(&req.text)?;
    Ok(ApiResponse::ok(SanitizeResponse { sanitized }))
}
