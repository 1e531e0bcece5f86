use crate::error::{InferenceError, InferenceResult};
use serde::{Deserialize, Serialize};

pub const DEFAULT_TEMPERATURE: f64 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 150;
pub const DEFAULT_TOP_P: f64 = 0.9;

/// Conversation role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Per-call generation options. Unset fields fall back to the defaults above.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationOptions {
    pub model: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    pub top_p: Option<f64>,
    pub stop_sequences: Option<Vec<String>>,
}

impl GenerationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_top_p(mut self, top_p: f64) -> Self {
        self.top_p = Some(top_p);
        self
    }

    pub fn with_stop_sequences(mut self, stop: Vec<String>) -> Self {
        self.stop_sequences = Some(stop);
        self
    }

    /// Model to use, falling back to `default_model`.
    pub fn resolve_model<'a>(&'a self, default_model: &'a str) -> &'a str {
        self.model
            .as_deref()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or(default_model)
    }

    /// Validate ranges and produce the wire-level sampling parameters.
    pub fn sampling(&self) -> InferenceResult<SamplingOptions> {
        let temperature = self.temperature.unwrap_or(DEFAULT_TEMPERATURE);
        if !(0.0..=2.0).contains(&temperature) {
            return Err(InferenceError::InvalidRequest(format!(
                "temperature must be within [0, 2], got {}",
                temperature
            )));
        }
        let top_p = self.top_p.unwrap_or(DEFAULT_TOP_P);
        if !(0.0..=1.0).contains(&top_p) {
            return Err(InferenceError::InvalidRequest(format!(
                "top_p must be within [0, 1], got {}",
                top_p
            )));
        }
        let num_predict = self.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS);
        if num_predict == 0 {
            return Err(InferenceError::InvalidRequest(
                "max_tokens must be positive".into(),
            ));
        }
        Ok(SamplingOptions {
            temperature,
            num_predict,
            top_p,
            stop: self.stop_sequences.clone().unwrap_or_default(),
        })
    }
}

/// `options` object of a generate request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingOptions {
    pub temperature: f64,
    pub num_predict: u32,
    pub top_p: f64,
    pub stop: Vec<String>,
}

/// Body of `POST /api/generate`
#[derive(Debug, Clone, Serialize)]
pub struct GenerateRequest<'a> {
    pub model: &'a str,
    pub prompt: &'a str,
    pub stream: bool,
    pub options: SamplingOptions,
}

/// Success body of `POST /api/generate`
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateResponse {
    pub response: String,
    #[serde(default)]
    pub eval_count: Option<u64>,
    /// Nanoseconds
    #[serde(default)]
    pub total_duration: Option<u64>,
}

/// Body of `POST /api/show`
#[derive(Debug, Clone, Serialize)]
pub struct ShowRequest<'a> {
    pub name: &'a str,
}

/// Body of `GET /api/tags`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TagsResponse {
    #[serde(default)]
    pub models: Option<Vec<ModelDescriptor>>,
}

/// Model metadata as reported by the server's listing endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub name: String,
    #[serde(rename = "size", default)]
    pub size_bytes: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ModelDescriptor {
    pub fn size_gib(&self) -> f64 {
        self.size_bytes as f64 / (1024.0 * 1024.0 * 1024.0)
    }

    /// Size for listings, e.g. `4.58 GiB`.
    pub fn display_size(&self) -> String {
        format!("{:.2} GiB", self.size_gib())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn unset_options_resolve_to_defaults() {
        let sampling = GenerationOptions::default().sampling().unwrap();
        assert_eq!(
            sampling,
            SamplingOptions {
                temperature: 0.7,
                num_predict: 150,
                top_p: 0.9,
                stop: vec![],
            }
        );
    }

    #[test]
    fn model_falls_back_to_default_when_blank() {
        assert_eq!(GenerationOptions::new().resolve_model("base"), "base");
        assert_eq!(
            GenerationOptions::new().with_model("").resolve_model("base"),
            "base"
        );
        assert_eq!(
            GenerationOptions::new().with_model("other").resolve_model("base"),
            "other"
        );
    }

    #[test]
    fn out_of_range_sampling_is_rejected() {
        assert!(GenerationOptions::new().with_temperature(2.5).sampling().is_err());
        assert!(GenerationOptions::new().with_temperature(f64::NAN).sampling().is_err());
        assert!(GenerationOptions::new().with_top_p(1.1).sampling().is_err());
        assert!(GenerationOptions::new().with_max_tokens(0).sampling().is_err());
        assert!(GenerationOptions::new()
            .with_temperature(2.0)
            .with_top_p(0.0)
            .sampling()
            .is_ok());
    }

    #[test]
    fn generate_request_matches_wire_contract() {
        let options = GenerationOptions::new()
            .with_temperature(0.3)
            .with_max_tokens(400)
            .with_stop_sequences(vec!["\n\n".into()]);
        let request = GenerateRequest {
            model: "llama3.1:8b",
            prompt: "hola",
            stream: false,
            options: options.sampling().unwrap(),
        };

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "model": "llama3.1:8b",
                "prompt": "hola",
                "stream": false,
                "options": {
                    "temperature": 0.3,
                    "num_predict": 400,
                    "top_p": 0.9,
                    "stop": ["\n\n"]
                }
            })
        );
    }

    #[test]
    fn tags_without_models_key_is_empty() {
        let tags: TagsResponse = serde_json::from_str("{}").unwrap();
        assert!(tags.models.unwrap_or_default().is_empty());
    }

    #[test]
    fn descriptor_keeps_optional_metadata() {
        let descriptor: ModelDescriptor = serde_json::from_value(json!({
            "name": "llama3.1:8b",
            "size": 4_920_753_328u64,
            "digest": "46e0c10c039e",
            "details": {"family": "llama"}
        }))
        .unwrap();

        assert_eq!(descriptor.size_bytes, 4_920_753_328);
        assert_eq!(descriptor.digest.as_deref(), Some("46e0c10c039e"));
        assert!((descriptor.size_gib() - 4.58).abs() < 0.01);
        assert_eq!(descriptor.display_size(), "4.58 GiB");
        assert_eq!(
            serde_json::to_value(&descriptor).unwrap()["size"],
            json!(4_920_753_328u64)
        );
    }
}
