//! Worker message protocol: envelopes, payloads and results
//!
//! Every request crossing the coordinator/worker boundary is wrapped in a
//! [`WorkerMessage`] whose `id` is the sole correlation key. Workers answer
//! with exactly one [`WorkerResult`] carrying the same `id`.
//!
//! Wire shape (JSON):
//!
//! ```text
//! { "id": "…", "type": "Initialize" | "Process", "data": { … } }
//! { "id": "…", "tenantID": "…", "ok": true, "err"?: {…}, "data"?: {…} }
//! ```

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Correlation key for one outstanding request.
pub type RequestId = Uuid;

// ============================================================================
// Category
// ============================================================================

/// Moderation meaning of a phrase list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WordListCategory {
    /// Block-worthy phrases
    Banned,
    /// Flag-for-review phrases
    Suspect,
}

impl std::fmt::Display for WordListCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WordListCategory::Banned => write!(f, "BANNED"),
            WordListCategory::Suspect => write!(f, "SUSPECT"),
        }
    }
}

impl std::str::FromStr for WordListCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "banned" => Ok(WordListCategory::Banned),
            "suspect" => Ok(WordListCategory::Suspect),
            other => Err(format!(
                "unknown word list category '{other}' (expected BANNED or SUSPECT)"
            )),
        }
    }
}

// ============================================================================
// Requests
// ============================================================================

/// Discriminant of a [`WorkerMessage`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageType {
    Initialize,
    Process,
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageType::Initialize => write!(f, "Initialize"),
            MessageType::Process => write!(f, "Process"),
        }
    }
}

/// Replace a worker's phrase set for (tenant, category)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitializationPayload {
    #[serde(rename = "tenantID")]
    pub tenant_id: String,
    pub locale: String,
    pub category: WordListCategory,
    pub phrases: Vec<String>,
    /// Broadcast epoch assigned by the coordinator. Workers never apply an
    /// epoch older than the one they already hold.
    #[serde(default)]
    pub version: u64,
}

/// Evaluate sanitized text against a tenant's phrase set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessPayload {
    #[serde(rename = "tenantID")]
    pub tenant_id: String,
    pub category: WordListCategory,
    #[serde(rename = "testString")]
    pub test_string: String,
}

/// Typed payload, serialized adjacently as `type` + `data`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum MessagePayload {
    Initialize(InitializationPayload),
    Process(ProcessPayload),
}

/// Envelope sent from the coordinator to a single worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerMessage {
    pub id: RequestId,
    #[serde(flatten)]
    pub payload: MessagePayload,
}

impl WorkerMessage {
    pub fn initialize(id: RequestId, payload: InitializationPayload) -> Self {
        Self {
            id,
            payload: MessagePayload::Initialize(payload),
        }
    }

    pub fn process(id: RequestId, payload: ProcessPayload) -> Self {
        Self {
            id,
            payload: MessagePayload::Process(payload),
        }
    }

    pub fn message_type(&self) -> MessageType {
        match self.payload {
            MessagePayload::Initialize(_) => MessageType::Initialize,
            MessagePayload::Process(_) => MessageType::Process,
        }
    }

    pub fn tenant_id(&self) -> &str {
        match &self.payload {
            MessagePayload::Initialize(p) => &p.tenant_id,
            MessagePayload::Process(p) => &p.tenant_id,
        }
    }
}

// ============================================================================
// Results
// ============================================================================

/// Match evidence for one piece of text.
///
/// `timed_out = true` means the text could not be evaluated. It is never a
/// statement that the text is clean.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    pub is_matched: bool,
    pub matches: Vec<String>,
    pub timed_out: bool,
}

impl MatchResult {
    /// Evaluated, nothing found
    pub fn no_match() -> Self {
        Self::default()
    }

    /// Evaluated, `matches` found (may be empty)
    pub fn from_matches(matches: Vec<String>) -> Self {
        Self {
            is_matched: !matches.is_empty(),
            matches,
            timed_out: false,
        }
    }

    /// Could not evaluate; advisory evidence is unavailable
    pub fn fail_open() -> Self {
        Self {
            is_matched: false,
            matches: Vec::new(),
            timed_out: true,
        }
    }
}

/// Error reported by a worker inside its result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerError {
    pub message: String,
    pub code: String,
}

/// Worker error codes
pub mod error_code {
    pub const INVALID_PHRASES: &str = "INVALID_PHRASES";
    pub const INTERNAL: &str = "INTERNAL";
}

impl WorkerError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: code.to_string(),
        }
    }
}

impl std::fmt::Display for WorkerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

/// Reply from a worker, correlated by `id`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerResult {
    pub id: RequestId,
    #[serde(rename = "tenantID")]
    pub tenant_id: String,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub err: Option<WorkerError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<MatchResult>,
    /// Epoch the worker holds for the addressed (tenant, category) after
    /// handling the message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
}

impl WorkerResult {
    pub fn success(id: RequestId, tenant_id: impl Into<String>) -> Self {
        Self {
            id,
            tenant_id: tenant_id.into(),
            ok: true,
            err: None,
            data: None,
            version: None,
        }
    }

    pub fn failure(id: RequestId, tenant_id: impl Into<String>, err: WorkerError) -> Self {
        Self {
            id,
            tenant_id: tenant_id.into(),
            ok: false,
            err: Some(err),
            data: None,
            version: None,
        }
    }

    pub fn with_data(mut self, data: MatchResult) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_version(mut self, version: u64) -> Self {
        self.version = Some(version);
        self
    }

    /// A result counts as failed if either flag says so
    pub fn is_failure(&self) -> bool {
        !self.ok || self.err.is_some()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_wire_shape() {
        let id = Uuid::new_v4();
        let msg = WorkerMessage::process(
            id,
            ProcessPayload {
                tenant_id: "tenantA".to_string(),
                category: WordListCategory::Banned,
                test_string: "hello".to_string(),
            },
        );

        let v = serde_json::to_value(&msg).unwrap();
        assert_eq!(v["id"], id.to_string());
        assert_eq!(v["type"], "Process");
        assert_eq!(v["data"]["tenantID"], "tenantA");
        assert_eq!(v["data"]["category"], "BANNED");
        assert_eq!(v["data"]["testString"], "hello");
    }

    #[test]
    fn test_envelope_parses_from_json() {
        let json = r#"{
            "id": "6f1c1c1e-7a35-4a4e-9d57-2b1f4f0d8f10",
            "type": "Initialize",
            "data": {
                "tenantID": "t1",
                "locale": "en-US",
                "category": "SUSPECT",
                "phrases": ["heck"]
            }
        }"#;
        let msg: WorkerMessage = serde_json::from_str(json).unwrap();
        assert_eq!(msg.message_type(), MessageType::Initialize);
        assert_eq!(msg.tenant_id(), "t1");
        match msg.payload {
            MessagePayload::Initialize(p) => {
                assert_eq!(p.category, WordListCategory::Suspect);
                assert_eq!(p.version, 0, "missing version defaults to 0");
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn test_match_result_camel_case() {
        let v = serde_json::to_value(MatchResult::fail_open()).unwrap();
        assert_eq!(v["isMatched"], false);
        assert_eq!(v["timedOut"], true);
        assert!(v["matches"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_worker_result_omits_empty_fields() {
        let r = WorkerResult::success(Uuid::new_v4(), "t1");
        let v = serde_json::to_value(&r).unwrap();
        assert!(v.get("err").is_none());
        assert!(v.get("data").is_none());
        assert!(!r.is_failure());

        let failed = WorkerResult {
            ok: true,
            err: Some(WorkerError::new(error_code::INTERNAL, "boom")),
            ..r
        };
        assert!(failed.is_failure(), "an err field marks failure even when ok is set");
    }

    #[test]
    fn test_category_from_str() {
        assert_eq!("banned".parse::<WordListCategory>(), Ok(WordListCategory::Banned));
        assert_eq!(" SUSPECT ".parse::<WordListCategory>(), Ok(WordListCategory::Suspect));
        assert!("spam".parse::<WordListCategory>().is_err());
    }
}
