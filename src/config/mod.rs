//! Service Configuration Module
//!
//! Pool sizing, request bounds, matching limits, sanitizer policy and the
//! HTTP bind address, loaded from TOML.
//!
//! ## Loading Order
//!
//! 1. `WORDLIST_CONFIG` environment variable (path to TOML file)
//! 2. `wordlist_config.toml` in the current working directory
//! 3. Built-in defaults from [`defaults`]
//!
//! The loaded config is passed by reference
//! to [`WordListService::new`](crate::pool::WordListService::new).

mod service_config;
pub mod defaults;

pub use service_config::*;
