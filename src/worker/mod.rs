//! Matching Workers
//!
//! Each pool slot is a dedicated OS thread that exclusively owns a
//! [`MatchEngine`] and its replicated phrase state. The only link to the rest
//! of the service is a pair of channels: [`WorkerMessage`]s in, one
//! [`WorkerResult`] out per message, in arrival order.
//!
//! A panic inside the engine is caught and reported as an `INTERNAL` worker
//! error for that message; the thread keeps serving.

mod matcher;

pub use matcher::{CompiledWordList, PhraseMatcher};

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use arc_swap::ArcSwapOption;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::types::{
    error_code, InitializationPayload, MatchResult, MessagePayload, ProcessPayload, WorkerError,
    WorkerMessage, WorkerResult,
};

/// Matching capability hosted by a worker thread.
///
/// Implementations own all of their state; nothing is shared with the
/// coordinator or other workers.
pub trait MatchEngine: Send + 'static {
    /// Replace the phrase set for (tenant, category). Returns the epoch held
    /// for that key afterwards.
    fn initialize(&mut self, payload: InitializationPayload) -> Result<u64, WorkerError>;

    /// Evaluate sanitized markup against the phrase set for (tenant, category).
    fn process(&mut self, payload: &ProcessPayload) -> Result<MatchResult, WorkerError>;
}

/// Coordinator-side handle to one worker thread
pub struct WorkerHandle {
    index: usize,
    tx: ArcSwapOption<mpsc::UnboundedSender<WorkerMessage>>,
    thread: Mutex<Option<JoinHandle<()>>>,
    dispatched: AtomicU64,
}

impl WorkerHandle {
    /// Spawn a worker thread owning `engine`. Every reply is sent on `results`.
    pub fn spawn<E: MatchEngine>(
        index: usize,
        engine: E,
        results: mpsc::UnboundedSender<WorkerResult>,
    ) -> std::io::Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();

        let thread = std::thread::Builder::new()
            .name(format!("wordlist-worker-{index}"))
            .spawn(move || run_worker(index, engine, rx, results))?;

        Ok(Self {
            index,
            tx: ArcSwapOption::from(Some(Arc::new(tx))),
            thread: Mutex::new(Some(thread)),
            dispatched: AtomicU64::new(0),
        })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Messages handed to this worker so far
    pub fn dispatched(&self) -> u64 {
        self.dispatched.load(Ordering::Relaxed)
    }

    /// Queue a message. Gives the message back if the worker is gone.
    pub fn send(&self, message: WorkerMessage) -> Result<(), WorkerMessage> {
        let guard = self.tx.load();
        let Some(tx) = guard.as_ref() else {
            return Err(message);
        };
        tx.send(message).map_err(|e| e.0)?;
        self.dispatched.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Close the inbound channel. The thread exits after its current message.
    pub fn close(&self) {
        self.tx.store(None);
    }

    /// Take the thread handle for joining; `None` once taken.
    pub fn take_thread(&self) -> Option<JoinHandle<()>> {
        self.thread
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
    }
}

fn run_worker<E: MatchEngine>(
    index: usize,
    mut engine: E,
    mut rx: mpsc::UnboundedReceiver<WorkerMessage>,
    results: mpsc::UnboundedSender<WorkerResult>,
) {
    debug!(worker = index, "Worker started");

    while let Some(message) = rx.blocking_recv() {
        let result = handle_message(index, &mut engine, message);
        if results.send(result).is_err() {
            debug!(worker = index, "Result listener gone, stopping");
            break;
        }
    }

    info!(worker = index, "Worker stopped");
}

fn handle_message<E: MatchEngine>(index: usize, engine: &mut E, message: WorkerMessage) -> WorkerResult {
    let id = message.id;
    let tenant_id = message.tenant_id().to_string();
    let message_type = message.message_type();

    let outcome = catch_unwind(AssertUnwindSafe(|| match message.payload {
        MessagePayload::Initialize(payload) => engine
            .initialize(payload)
            .map(|version| WorkerResult::success(id, tenant_id.as_str()).with_version(version)),
        MessagePayload::Process(payload) => engine
            .process(&payload)
            .map(|data| WorkerResult::success(id, tenant_id.as_str()).with_data(data)),
    }));

    match outcome {
        Ok(Ok(result)) => result,
        Ok(Err(err)) => {
            debug!(worker = index, request_id = %id, %message_type, error = %err, "Engine returned error");
            WorkerResult::failure(id, tenant_id, err)
        }
        Err(_) => {
            error!(worker = index, request_id = %id, %message_type, "Engine panicked");
            WorkerResult::failure(
                id,
                tenant_id,
                WorkerError::new(error_code::INTERNAL, "matching engine panicked"),
            )
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
