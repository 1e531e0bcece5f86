use crate::error::{FailureKind, InferenceError, InferenceResult};
use crate::models::ModelDescriptor;
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::fmt;

/// Request ID for tracking
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestId(String);

impl RequestId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A completed generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generation {
    pub text: String,
    pub token_count: u64,
    pub duration_ms: u64,
    pub model_used: String,
}

/// A generation that did not complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub message: String,
    pub kind: FailureKind,
}

impl From<InferenceError> for Failure {
    fn from(err: InferenceError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Terminal outcome of a `generate` or `chat` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationResult {
    Success(Generation),
    Failure(Failure),
}

impl GenerationResult {
    pub fn is_success(&self) -> bool {
        matches!(self, GenerationResult::Success(_))
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            GenerationResult::Success(g) => Some(&g.text),
            GenerationResult::Failure(_) => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            GenerationResult::Success(_) => None,
            GenerationResult::Failure(f) => Some(&f.message),
        }
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            GenerationResult::Success(_) => None,
            GenerationResult::Failure(f) => Some(f.kind),
        }
    }

    pub fn into_result(self) -> Result<Generation, Failure> {
        match self {
            GenerationResult::Success(g) => Ok(g),
            GenerationResult::Failure(f) => Err(f),
        }
    }
}

impl From<InferenceResult<Generation>> for GenerationResult {
    fn from(result: InferenceResult<Generation>) -> Self {
        match result {
            Ok(generation) => GenerationResult::Success(generation),
            Err(err) => GenerationResult::Failure(err.into()),
        }
    }
}

#[derive(Serialize)]
struct Envelope<'a> {
    success: bool,
    text: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    kind: Option<FailureKind>,
}

// Flat `{success, text, ...}` shape the host programs print and return.
impl Serialize for GenerationResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let envelope = match self {
            GenerationResult::Success(g) => Envelope {
                success: true,
                text: Some(&g.text),
                tokens: Some(g.token_count),
                duration_ms: Some(g.duration_ms),
                model: Some(&g.model_used),
                error: None,
                kind: None,
            },
            GenerationResult::Failure(f) => Envelope {
                success: false,
                text: None,
                tokens: None,
                duration_ms: None,
                model: None,
                error: Some(&f.message),
                kind: Some(f.kind),
            },
        };
        envelope.serialize(serializer)
    }
}

/// Snapshot of the inference server as seen by one listing call.
#[derive(Debug, Clone, Serialize)]
pub struct ServerStatus {
    pub connected: bool,
    pub url: String,
    pub default_model: String,
    pub models_count: usize,
    pub models: Vec<ModelDescriptor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub checked_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::time::Duration;

    #[test]
    fn success_serializes_flat() {
        let result = GenerationResult::Success(Generation {
            text: "hi".into(),
            token_count: 5,
            duration_ms: 2,
            model_used: "llama3.1:8b".into(),
        });
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({
                "success": true,
                "text": "hi",
                "tokens": 5,
                "duration_ms": 2,
                "model": "llama3.1:8b"
            })
        );
    }

    #[test]
    fn failure_serializes_with_null_text() {
        let result: GenerationResult =
            Err::<Generation, _>(InferenceError::Timeout(Duration::from_secs(1))).into();
        assert!(!result.is_success());
        assert_eq!(result.text(), None);
        assert_eq!(result.failure_kind(), Some(FailureKind::Timeout));
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({
                "success": false,
                "text": null,
                "error": "request timed out after 1s",
                "kind": "timeout"
            })
        );
    }

    #[test]
    fn request_ids_are_unique() {
        assert_ne!(RequestId::new(), RequestId::new());
        assert_eq!(RequestId::new().as_str().len(), 36);
    }
}
