//! Word List Matching Service
//!
//! Evaluates comment text against per-tenant phrase lists ("banned" /
//! "suspect" words) and returns match evidence to a moderation pipeline.
//!
//! ## Architecture
//!
//! - **Sanitizer**: normalises rich-text markup into canonical matchable text
//! - **Workers**: dedicated threads, each holding a full replica of every word list
//! - **Correlator**: matches worker results to waiting callers by request id
//! - **Pool coordinator**: broadcast initialization, round-robin matching,
//!   fail-open on error or timeout
//! - **API**: JSON endpoints over the pool

pub mod api;
pub mod config;
pub mod pool;
pub mod sanitizer;
pub mod types;
pub mod worker;

// Re-export configuration
pub use config::ServiceConfig;

// Re-export the service surface
pub use pool::{InitializeReport, PoolStats, ReplicationStatus, WordListError, WordListService};
pub use sanitizer::{SanitizationError, Sanitizer};
pub use types::{MatchResult, WordListCategory};
pub use worker::{MatchEngine, PhraseMatcher};
