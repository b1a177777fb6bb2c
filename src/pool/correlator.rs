//! Request Correlator - matches worker results to the callers awaiting them
//!
//! Every outstanding request owns one entry in a concurrent map of
//! `id → oneshot::Sender`. The result listener removes the entry and fires the
//! sender; the awaiting [`PendingRequest`] removes it on timeout or drop. Either
//! way the entry is consumed exactly once.

use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::debug;
use uuid::Uuid;

use crate::types::{RequestId, WorkerResult};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CorrelationError {
    #[error("Request id collision: {0}")]
    IdCollision(RequestId),

    #[error("Request {id} timed out after {timeout:?}")]
    Timeout { id: RequestId, timeout: Duration },

    #[error("Request {0} was dropped before a result arrived")]
    Dropped(RequestId),
}

/// Table of outstanding requests keyed by correlation id
#[derive(Debug, Default)]
pub struct RequestCorrelator {
    pending: DashMap<RequestId, oneshot::Sender<WorkerResult>>,
}

impl RequestCorrelator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh random 128-bit correlation id
    pub fn generate_id() -> RequestId {
        Uuid::new_v4()
    }

    /// Record `id` as outstanding. An id that is already pending is rejected.
    pub fn register(self: &Arc<Self>, id: RequestId) -> Result<PendingRequest, CorrelationError> {
        match self.pending.entry(id) {
            Entry::Occupied(_) => Err(CorrelationError::IdCollision(id)),
            Entry::Vacant(slot) => {
                let (tx, rx) = oneshot::channel();
                slot.insert(tx);
                Ok(PendingRequest {
                    id,
                    rx,
                    correlator: Arc::clone(self),
                })
            }
        }
    }

    /// Deliver a worker result to its waiter. Returns false when nobody was
    /// waiting (unknown id, late arrival after timeout, or a dropped waiter).
    pub fn resolve(&self, result: WorkerResult) -> bool {
        let id = result.id;
        match self.pending.remove(&id) {
            Some((_, tx)) => {
                if tx.send(result).is_err() {
                    debug!(request_id = %id, "Waiter gone before result delivery");
                    return false;
                }
                true
            }
            None => {
                debug!(request_id = %id, tenant_id = %result.tenant_id, "Discarding result for unknown request");
                false
            }
        }
    }

    /// Forget `id` without delivering anything.
    pub fn cancel(&self, id: &RequestId) -> bool {
        self.pending.remove(id).is_some()
    }

    /// Drop every outstanding entry. Waiters observe [`CorrelationError::Dropped`].
    pub fn fail_all(&self) -> usize {
        let count = self.pending.len();
        self.pending.clear();
        count
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, id: &RequestId) -> bool {
        self.pending.contains_key(id)
    }
}

/// Caller side of one outstanding request. Dropping it removes the entry.
#[derive(Debug)]
pub struct PendingRequest {
    id: RequestId,
    rx: oneshot::Receiver<WorkerResult>,
    correlator: Arc<RequestCorrelator>,
}

impl PendingRequest {
    pub fn id(&self) -> RequestId {
        self.id
    }

    /// Wait at most `timeout` for the correlated result.
    pub async fn wait(mut self, timeout: Duration) -> Result<WorkerResult, CorrelationError> {
        match tokio::time::timeout(timeout, &mut self.rx).await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(_)) => Err(CorrelationError::Dropped(self.id)),
            Err(_) => {
                debug!(request_id = %self.id, ?timeout, "Request timed out");
                Err(CorrelationError::Timeout {
                    id: self.id,
                    timeout,
                })
            }
        }
    }
}

impl Drop for PendingRequest {
    fn drop(&mut self) {
        self.correlator.pending.remove(&self.id);
    }
}

// ============================================================================
// Tests
// ============================================================================
