//! Worker Pool Coordinator - owns the workers and routes requests to them

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::{
    InitializationFailure, InitializeReport, PoolStats, ReplicationStatus, ReplicationTracker,
    RequestCorrelator, WordListError,
};
use crate::config::ServiceConfig;
use crate::sanitizer::Sanitizer;
use crate::types::{
    error_code, InitializationPayload, MatchResult, ProcessPayload, WordListCategory, WorkerError,
    WorkerMessage, WorkerResult,
};
use crate::worker::{MatchEngine, PhraseMatcher, WorkerHandle};

/// Word list matching service: a fixed pool of workers each holding a full
/// replica of every tenant's word lists.
///
/// Must be constructed inside a Tokio runtime (one result listener task is
/// spawned per worker).
pub struct WordListService {
    workers: Vec<WorkerHandle>,
    correlator: Arc<RequestCorrelator>,
    replication: ReplicationTracker,
    sanitizer: Sanitizer,
    next_worker: AtomicUsize,
    request_timeout: Duration,
    max_pending: usize,
    closed: AtomicBool,
    listeners: Mutex<Vec<JoinHandle<()>>>,
}

impl WordListService {
    /// Spawn `config.pool.size` workers running the phrase matcher.
    pub fn new(config: &ServiceConfig) -> Result<Self, WordListError> {
        let size_limit = config.matching.regex_size_limit_bytes;
        Self::with_engines(config, |_| PhraseMatcher::new(size_limit))
    }

    /// Spawn one worker per pool slot, each owning the engine built for its index.
    pub fn with_engines<E, F>(config: &ServiceConfig, mut make_engine: F) -> Result<Self, WordListError>
    where
        E: MatchEngine,
        F: FnMut(usize) -> E,
    {
        config.validate()?;

        let size = config.pool.size;
        let correlator = Arc::new(RequestCorrelator::new());
        let mut workers = Vec::with_capacity(size);
        let mut listeners = Vec::with_capacity(size);

        for index in 0..size {
            let (results_tx, mut results_rx) = mpsc::unbounded_channel::<WorkerResult>();
            let worker = WorkerHandle::spawn(index, make_engine(index), results_tx)
                .map_err(WordListError::Spawn)?;

            let correlator = Arc::clone(&correlator);
            listeners.push(tokio::spawn(async move {
                while let Some(result) = results_rx.recv().await {
                    correlator.resolve(result);
                }
                debug!(worker = index, "Result listener stopped");
            }));
            workers.push(worker);
        }

        info!(
            workers = size,
            timeout_ms = config.pool.request_timeout_ms,
            max_pending = config.pool.max_pending_requests,
            "Word list pool started"
        );

        Ok(Self {
            workers,
            correlator,
            replication: ReplicationTracker::new(size),
            sanitizer: Sanitizer::new(&config.sanitizer),
            next_worker: AtomicUsize::new(0),
            request_timeout: config.pool.request_timeout(),
            max_pending: config.pool.max_pending_requests,
            closed: AtomicBool::new(false),
            listeners: Mutex::new(listeners),
        })
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    pub fn sanitizer(&self) -> &Sanitizer {
        &self.sanitizer
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Next worker in round-robin order
    fn select_worker(&self) -> &WorkerHandle {
        let idx = self.next_worker.fetch_add(1, Ordering::Relaxed) % self.workers.len();
        &self.workers[idx]
    }

    async fn send_and_wait(
        &self,
        worker: &WorkerHandle,
        message: WorkerMessage,
    ) -> Result<WorkerResult, WordListError> {
        if self.is_closed() {
            return Err(WordListError::PoolClosed);
        }

        let pending = self.correlator.register(message.id)?;
        if worker.send(message).is_err() {
            return Err(WordListError::WorkerUnavailable(worker.index()));
        }
        Ok(pending.wait(self.request_timeout).await?)
    }

    // ========================================================================
    // Initialization
    // ========================================================================

    /// Broadcast a word list to every worker. True iff all of them acknowledged.
    pub async fn initialize(
        &self,
        tenant_id: &str,
        locale: &str,
        category: WordListCategory,
        phrases: Vec<String>,
    ) -> bool {
        self.initialize_detailed(tenant_id, locale, category, phrases)
            .await
            .is_consistent()
    }

    /// Broadcast a word list to every worker and report per-worker outcomes.
    ///
    /// Failures do not stop delivery to other workers and are not rolled
    /// back. Each one is logged once.
    pub async fn initialize_detailed(
        &self,
        tenant_id: &str,
        locale: &str,
        category: WordListCategory,
        phrases: Vec<String>,
    ) -> InitializeReport {
        let version = self.replication.begin(tenant_id, locale, category);
        let payload = InitializationPayload {
            tenant_id: tenant_id.to_string(),
            locale: locale.to_string(),
            category,
            phrases,
            version,
        };

        let deliveries = self.workers.iter().map(|worker| {
            let message = WorkerMessage::initialize(RequestCorrelator::generate_id(), payload.clone());
            let request_id = message.id;
            async move {
                let outcome = self
                    .send_and_wait(worker, message)
                    .await
                    .and_then(|result| acknowledged_version(worker.index(), result));
                (worker.index(), request_id, outcome)
            }
        });

        let mut report = InitializeReport {
            version,
            acknowledged: 0,
            failures: Vec::new(),
        };

        for (worker, request_id, outcome) in join_all(deliveries).await {
            match outcome {
                Ok(held) => {
                    self.replication.acknowledge(tenant_id, category, worker, held);
                    report.acknowledged += 1;
                }
                Err(e) => {
                    error!(
                        tenant_id,
                        request_id = %request_id,
                        worker,
                        category = %category,
                        version,
                        code = e.code(),
                        error = %e,
                        "Unable to initialize word list"
                    );
                    report.failures.push(InitializationFailure {
                        worker,
                        request_id,
                        reason: e.to_string(),
                    });
                }
            }
        }

        if report.is_consistent() {
            info!(tenant_id, category = %category, locale, version, "Word list replicated to all workers");
        } else {
            warn!(
                tenant_id,
                category = %category,
                version,
                failed = report.failures.len(),
                "Word list may be inconsistent across workers"
            );
        }
        report
    }

    // ========================================================================
    // Matching
    // ========================================================================

    /// Evaluate `text` against the tenant's word list for `category`.
    ///
    /// Never fails: any error or timeout yields [`MatchResult::fail_open`].
    pub async fn process(&self, tenant_id: &str, category: WordListCategory, text: &str) -> MatchResult {
        match self.try_process(tenant_id, category, text).await {
            Ok(result) => result,
            Err(e) => {
                warn!(
                    tenant_id,
                    category = %category,
                    code = e.code(),
                    error = %e,
                    "Match evaluation failed, failing open"
                );
                MatchResult::fail_open()
            }
        }
    }

    /// [`process`](Self::process) without the fail-open fallback.
    pub async fn try_process(
        &self,
        tenant_id: &str,
        category: WordListCategory,
        text: &str,
    ) -> Result<MatchResult, WordListError> {
        if self.is_closed() {
            return Err(WordListError::PoolClosed);
        }

        let sanitized = self.sanitizer.sanitize(text)?;

        if self.max_pending > 0 {
            let pending = self.correlator.pending_count();
            if pending >= self.max_pending {
                return Err(WordListError::PoolSaturated {
                    pending,
                    limit: self.max_pending,
                });
            }
        }

        let worker = self.select_worker();
        let message = WorkerMessage::process(
            RequestCorrelator::generate_id(),
            ProcessPayload {
                tenant_id: tenant_id.to_string(),
                category,
                test_string: sanitized,
            },
        );

        let result = self.send_and_wait(worker, message).await?;
        if result.is_failure() {
            return Err(WordListError::WorkerFailed {
                worker: worker.index(),
                error: result.err.unwrap_or_else(unspecified_failure),
            });
        }
        result.data.ok_or(WordListError::EmptyResult(worker.index()))
    }

    // ========================================================================
    // Introspection and lifecycle
    // ========================================================================

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            size: self.workers.len(),
            pending: self.correlator.pending_count(),
            dispatched_per_worker: self.workers.iter().map(WorkerHandle::dispatched).collect(),
            closed: self.is_closed(),
        }
    }

    pub fn replication_status(
        &self,
        tenant_id: &str,
        category: WordListCategory,
    ) -> Option<ReplicationStatus> {
        self.replication.status(tenant_id, category)
    }

    /// Stop all workers. Requests still pending resolve fail-open.
    pub async fn shutdown(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        info!(workers = self.workers.len(), "Shutting down word list pool");

        for worker in &self.workers {
            worker.close();
        }

        let dropped = self.correlator.fail_all();
        if dropped > 0 {
            warn!(pending = dropped, "Released pending requests during shutdown");
        }

        let threads: Vec<_> = self.workers.iter().filter_map(WorkerHandle::take_thread).collect();
        let joined = tokio::task::spawn_blocking(move || {
            threads
                .into_iter()
                .map(std::thread::JoinHandle::join)
                .filter(Result::is_err)
                .count()
        })
        .await;
        match joined {
            Ok(0) => {}
            Ok(panicked) => error!(panicked, "Worker threads exited abnormally"),
            Err(e) => error!(error = %e, "Failed to join worker threads"),
        }

        let listeners = std::mem::take(&mut *self.listeners.lock().unwrap_or_else(|e| e.into_inner()));
        for listener in listeners {
            let _ = listener.await;
        }

        info!("Word list pool stopped");
    }
}

impl Drop for WordListService {
    fn drop(&mut self) {
        for worker in &self.workers {
            worker.close();
        }
    }
}

/// Epoch held by a worker after an initialization result
fn acknowledged_version(worker: usize, result: WorkerResult) -> Result<u64, WordListError> {
    if result.is_failure() {
        return Err(WordListError::WorkerInitialization {
            worker,
            error: result.err.unwrap_or_else(unspecified_failure),
        });
    }
    result
        .version
        .ok_or(WordListError::EmptyResult(worker))
}

fn unspecified_failure() -> WorkerError {
    WorkerError::new(error_code::INTERNAL, "worker reported failure without detail")
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn config(size: usize) -> ServiceConfig {
        let mut config = ServiceConfig::default();
        config.pool.size = size;
        config.pool.request_timeout_ms = 2_000;
        config
    }

    #[tokio::test]
    async fn test_scenario_initialize_then_process() {
        let service = WordListService::new(&config(3)).unwrap();
        assert!(
            service
                .initialize("tenantA", "en", WordListCategory::Banned, vec!["damn".to_string()])
                .await
        );

        let result = service
            .process("tenantA", WordListCategory::Banned, "you <i>damn</i> fool")
            .await;
        assert_eq!(result, MatchResult::from_matches(vec!["damn".to_string()]));

        service.shutdown().await;
    }

    #[tokio::test]
    async fn test_round_robin_visits_each_worker_once() {
        let service = WordListService::new(&config(4)).unwrap();
        for _ in 0..4 {
            service.process("t", WordListCategory::Suspect, "hello").await;
        }
        assert_eq!(service.stats().dispatched_per_worker, vec![1, 1, 1, 1]);
        service.shutdown().await;
    }

    #[tokio::test]
    async fn test_epochs_and_replication_status() {
        let service = WordListService::new(&config(2)).unwrap();
        let first = service
            .initialize_detailed("t", "en", WordListCategory::Banned, vec!["a".to_string()])
            .await;
        let second = service
            .initialize_detailed("t", "en", WordListCategory::Banned, vec!["b".to_string()])
            .await;
        assert_eq!((first.version, second.version), (1, 2));
        assert_eq!(second.acknowledged, 2);

        let status = service.replication_status("t", WordListCategory::Banned).unwrap();
        assert!(status.is_consistent());
        assert_eq!(status.worker_versions, vec![Some(2), Some(2)]);
        service.shutdown().await;
    }

    #[tokio::test]
    async fn test_closed_pool_fails_open() {
        let service = WordListService::new(&config(1)).unwrap();
        service.shutdown().await;
        service.shutdown().await;

        assert!(service.stats().closed);
        assert_eq!(
            service.process("t", WordListCategory::Banned, "x").await,
            MatchResult::fail_open()
        );
        assert!(matches!(
            service.try_process("t", WordListCategory::Banned, "x").await,
            Err(WordListError::PoolClosed)
        ));
        assert!(!service.initialize("t", "en", WordListCategory::Banned, vec![]).await);
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let mut bad = config(1);
        bad.pool.size = 0;
        assert!(matches!(
            WordListService::new(&bad),
            Err(WordListError::Config(_))
        ));
    }
}
