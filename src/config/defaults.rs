//! System-wide default constants.
//!
//! Centralises the tunables used when no config file is present.
//! Grouped by subsystem for easy discovery.

// ============================================================================
// Worker Pool
// ============================================================================

/// Number of matching workers spawned when the pool size is not configured.
pub const POOL_SIZE: usize = 3;

/// Upper bound on pool size accepted by validation.
pub const MAX_POOL_SIZE: usize = 256;

/// Maximum time to wait for a worker to answer a single request (ms).
pub const REQUEST_TIMEOUT_MS: u64 = 5_000;

/// Cap on outstanding requests across the pool. 0 disables the cap.
pub const MAX_PENDING_REQUESTS: usize = 0;

// ============================================================================
// Matching
// ============================================================================

/// Compiled regex size limit per (tenant, category) phrase set (bytes).
///
/// Large tenant lists compile to large alternations; the regex crate default
/// (10 MiB) is too small for lists in the tens of thousands.
pub const REGEX_SIZE_LIMIT_BYTES: usize = 64 * 1024 * 1024;

// ============================================================================
// Sanitizer
// ============================================================================

/// Largest comment body accepted by the sanitizer (bytes).
pub const MAX_INPUT_BYTES: usize = 1_000_000;

/// Rich-text constructs preserved in canonical output.
pub const ALLOWED_TAGS: &[&str] = &[
    "a", "b", "blockquote", "br", "code", "del", "div", "em", "i", "li", "ol", "p", "pre", "s",
    "span", "strike", "strong", "sub", "sup", "u", "ul",
];

/// Tags removed together with everything inside them.
pub const FORBIDDEN_TAGS: &[&str] = &[
    "script", "style", "iframe", "object", "embed", "template", "noscript", "textarea", "select",
    "svg", "math", "head", "title",
];

// ============================================================================
// HTTP Server
// ============================================================================

/// Default HTTP bind address.
pub const SERVER_ADDR: &str = "0.0.0.0:8080";

/// Largest HTTP request body accepted (bytes). Word list uploads can be much
/// larger than a single comment.
pub const MAX_REQUEST_BODY_BYTES: usize = 16 * 1024 * 1024;
