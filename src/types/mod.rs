//! Shared data structures for the word list matching service
//!
//! Message envelopes exchanged between the pool coordinator and its workers,
//! the match evidence returned to callers, and word list categories.

mod message;

pub use message::*;
