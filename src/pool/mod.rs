//! Worker Pool
//!
//! Fixed pool of matching workers behind one coordinator:
//!
//! - `initialize` broadcasts a word list to every worker and reports which
//!   workers acknowledged it
//! - `process` sanitizes text, routes it to one worker by round robin and
//!   fails open on any error or timeout
//! - every worker result is correlated back to its caller by request id

mod coordinator;
mod correlator;
mod replication;

pub use coordinator::WordListService;
pub use correlator::{CorrelationError, PendingRequest, RequestCorrelator};
pub use replication::{ReplicationStatus, ReplicationTracker};

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::config::ConfigError;
use crate::sanitizer::SanitizationError;
use crate::types::{RequestId, WorkerError};

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum WordListError {
    #[error("Worker {worker} rejected word list: {error}")]
    WorkerInitialization { worker: usize, error: WorkerError },

    #[error("Worker {0} is unavailable")]
    WorkerUnavailable(usize),

    #[error("Worker {worker} failed to evaluate text: {error}")]
    WorkerFailed { worker: usize, error: WorkerError },

    #[error("Worker {0} returned no match data")]
    EmptyResult(usize),

    #[error("Request {id} timed out after {timeout:?}")]
    MatchTimeout { id: RequestId, timeout: Duration },

    #[error("Sanitization failed: {0}")]
    Sanitization(#[from] SanitizationError),

    #[error("Request id collision: {0}")]
    IdCollision(RequestId),

    #[error("Pool saturated: {pending} pending requests (limit {limit})")]
    PoolSaturated { pending: usize, limit: usize },

    #[error("Worker pool is shut down")]
    PoolClosed,

    #[error("Failed to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl WordListError {
    /// Stable machine-readable code, used in logs and API error bodies
    pub fn code(&self) -> &'static str {
        match self {
            Self::WorkerInitialization { .. } => "WORKER_INITIALIZATION_FAILED",
            Self::WorkerUnavailable(_) => "WORKER_UNAVAILABLE",
            Self::WorkerFailed { .. } => "WORKER_FAILED",
            Self::EmptyResult(_) => "EMPTY_RESULT",
            Self::MatchTimeout { .. } => "MATCH_TIMEOUT",
            Self::Sanitization(e) => e.code(),
            Self::IdCollision(_) => "ID_COLLISION",
            Self::PoolSaturated { .. } => "POOL_SATURATED",
            Self::PoolClosed => "POOL_CLOSED",
            Self::Spawn(_) => "WORKER_SPAWN_FAILED",
            Self::Config(_) => "INVALID_CONFIG",
        }
    }
}

impl From<CorrelationError> for WordListError {
    fn from(err: CorrelationError) -> Self {
        match err {
            CorrelationError::IdCollision(id) => Self::IdCollision(id),
            CorrelationError::Timeout { id, timeout } => Self::MatchTimeout { id, timeout },
            CorrelationError::Dropped(_) => Self::PoolClosed,
        }
    }
}

// ============================================================================
// Reports
// ============================================================================

/// One worker that did not acknowledge a broadcast
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializationFailure {
    pub worker: usize,
    pub request_id: RequestId,
    pub reason: String,
}

/// Outcome of broadcasting one word list to the pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeReport {
    /// Epoch assigned to this broadcast
    pub version: u64,
    pub acknowledged: usize,
    pub failures: Vec<InitializationFailure>,
}

impl InitializeReport {
    /// True when every worker acknowledged
    pub fn is_consistent(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Point-in-time pool saturation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolStats {
    pub size: usize,
    pub pending: usize,
    pub dispatched_per_worker: Vec<u64>,
    pub closed: bool,
}
