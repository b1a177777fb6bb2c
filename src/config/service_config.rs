//! Service Configuration - pool, matching, sanitizer and server settings
//!
//! Every section implements `Default` with the values in [`super::defaults`],
//! so an empty or partial TOML file is always a complete configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use super::defaults;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "WORDLIST_CONFIG";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "wordlist_config.toml";

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for a word list service deployment.
///
/// Load with `ServiceConfig::load()` which searches:
/// 1. `$WORDLIST_CONFIG` env var
/// 2. `./wordlist_config.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Worker pool sizing and request bounds
    #[serde(default)]
    pub pool: PoolConfig,

    /// Phrase matching limits
    #[serde(default)]
    pub matching: MatchingConfig,

    /// Rich-text normalisation policy
    #[serde(default)]
    pub sanitizer: SanitizerConfig,

    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,
}

impl ServiceConfig {
    /// Load configuration using the standard search order:
    /// 1. `$WORDLIST_CONFIG` environment variable
    /// 2. `./wordlist_config.toml` in the current working directory
    /// 3. Built-in defaults
    pub fn load() -> Self {
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), pool_size = config.pool.size, "Loaded config from WORDLIST_CONFIG");
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from WORDLIST_CONFIG, falling back");
                    }
                }
            } else {
                warn!(path = %path, "WORDLIST_CONFIG points to non-existent file, falling back");
            }
        }

        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!(pool_size = config.pool.size, "Loaded config from ./wordlist_config.toml");
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./wordlist_config.toml, using defaults");
                }
            }
        }

        info!("No wordlist_config.toml found, using built-in defaults");
        Self::default()
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        let config: Self = toml::from_str(&contents)
            .map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the current configuration to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Validate the configuration, collecting every problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        let p = &self.pool;
        if p.size == 0 {
            errors.push("pool.size must be > 0".to_string());
        } else if p.size > defaults::MAX_POOL_SIZE {
            errors.push(format!(
                "pool.size ({}) must be <= {}",
                p.size,
                defaults::MAX_POOL_SIZE
            ));
        }
        if p.request_timeout_ms == 0 {
            errors.push("pool.request_timeout_ms must be > 0".to_string());
        }

        if self.matching.regex_size_limit_bytes == 0 {
            errors.push("matching.regex_size_limit_bytes must be > 0".to_string());
        }

        let s = &self.sanitizer;
        if s.max_input_bytes == 0 {
            errors.push("sanitizer.max_input_bytes must be > 0".to_string());
        }
        for tag in &s.allowed_tags {
            if !is_valid_tag_name(tag) {
                errors.push(format!("sanitizer.allowed_tags: '{tag}' is not a valid tag name"));
            }
            if s.forbidden_tags.iter().any(|f| f.eq_ignore_ascii_case(tag)) {
                errors.push(format!(
                    "sanitizer: '{tag}' cannot be both allowed and forbidden"
                ));
            }
        }
        for tag in &s.forbidden_tags {
            if !is_valid_tag_name(tag) {
                errors.push(format!("sanitizer.forbidden_tags: '{tag}' is not a valid tag name"));
            }
        }

        if self.server.addr.trim().is_empty() {
            errors.push("server.addr must not be empty".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

fn is_valid_tag_name(tag: &str) -> bool {
    let mut chars = tag.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '-')
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config I/O error ({}): {}", .0.display(), .1)]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Config parse error ({}): {}", .0.display(), .1)]
    Parse(PathBuf, #[source] toml::de::Error),

    #[error("Config serialization error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Config validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),
}

// ============================================================================
// Pool
// ============================================================================

/// Worker pool settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Number of matching workers (each holds a full replica of every list)
    pub size: usize,
    /// Bound on every correlated wait (ms)
    pub request_timeout_ms: u64,
    /// Cap on outstanding requests; 0 means unbounded
    pub max_pending_requests: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            size: defaults::POOL_SIZE,
            request_timeout_ms: defaults::REQUEST_TIMEOUT_MS,
            max_pending_requests: defaults::MAX_PENDING_REQUESTS,
        }
    }
}

impl PoolConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

// ============================================================================
// Matching
// ============================================================================

/// Phrase matching settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Compiled regex size limit per phrase set
    pub regex_size_limit_bytes: usize,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            regex_size_limit_bytes: defaults::REGEX_SIZE_LIMIT_BYTES,
        }
    }
}

// ============================================================================
// Sanitizer
// ============================================================================

/// Rich-text sanitizer policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SanitizerConfig {
    /// Tags kept (in canonical form) in sanitized output
    pub allowed_tags: Vec<String>,
    /// Tags dropped together with their content
    pub forbidden_tags: Vec<String>,
    /// Inputs larger than this are rejected
    pub max_input_bytes: usize,
}

impl Default for SanitizerConfig {
    fn default() -> Self {
        Self {
            allowed_tags: defaults::ALLOWED_TAGS.iter().map(|s| s.to_string()).collect(),
            forbidden_tags: defaults::FORBIDDEN_TAGS.iter().map(|s| s.to_string()).collect(),
            max_input_bytes: defaults::MAX_INPUT_BYTES,
        }
    }
}

// ============================================================================
// Server
// ============================================================================

/// HTTP server settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: defaults::SERVER_ADDR.to_string(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
