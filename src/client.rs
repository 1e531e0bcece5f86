use crate::config::ClientConfig;
use crate::error::{InferenceError, InferenceResult};
use crate::models::{
    ConversationTurn, GenerateRequest, GenerateResponse, GenerationOptions, ModelDescriptor,
    ShowRequest, TagsResponse,
};
use crate::prompt::flatten_turns;
use crate::types::{Generation, GenerationResult, RequestId, ServerStatus};
use chrono::Utc;
use metrics::{counter, histogram};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use url::Url;

const NANOS_PER_MILLI: u64 = 1_000_000;
/// Longest slice of an error body kept in a failure message.
const MAX_ERROR_BODY_CHARS: usize = 512;

/// Client for one Ollama-compatible inference server.
///
/// Every call is a single request/response cycle bounded by a timeout. Calls
/// never retry, and every failure is reported as a value: `generate` and
/// `chat` return a [`GenerationResult`], the metadata calls an
/// [`InferenceResult`].
#[derive(Debug, Clone)]
pub struct InferenceClient {
    config: ClientConfig,
    base_url: Url,
    http: Client,
}

impl InferenceClient {
    pub fn new(config: ClientConfig) -> InferenceResult<Self> {
        config.validate()?;
        let base_url = config.base_url()?;
        let http = Client::builder().build().map_err(|e| {
            InferenceError::Configuration(format!("failed to build HTTP client: {}", e))
        })?;
        Ok(Self {
            config,
            base_url,
            http,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    /// Generate a completion for `prompt`.
    ///
    /// An empty prompt is rejected without contacting the server.
    pub async fn generate(&self, prompt: &str, options: &GenerationOptions) -> GenerationResult {
        let request_id = RequestId::new();
        let start = Instant::now();
        let result = self.try_generate(&request_id, prompt, options).await;
        record("generate", start, result.is_ok());
        match &result {
            Ok(generation) => {
                counter!("inference_generated_tokens_total", generation.token_count, "model" => generation.model_used.clone());
                debug!(%request_id, tokens = generation.token_count, duration_ms = generation.duration_ms, "generation completed");
            }
            Err(e) => warn!(%request_id, error = %e, "generation failed"),
        }
        result.into()
    }

    /// Flatten `turns` into a prompt and generate once, overriding only the model.
    pub async fn chat(&self, turns: &[ConversationTurn], model: Option<&str>) -> GenerationResult {
        let options = GenerationOptions {
            model: model.map(str::to_string),
            ..GenerationOptions::default()
        };
        self.chat_with_options(turns, &options).await
    }

    pub async fn chat_with_options(
        &self,
        turns: &[ConversationTurn],
        options: &GenerationOptions,
    ) -> GenerationResult {
        if turns.is_empty() {
            let err = InferenceError::InvalidRequest("empty conversation".into());
            return Err::<Generation, _>(err).into();
        }
        let prompt = flatten_turns(turns, self.config.role_labels());
        self.generate(&prompt, options).await
    }

    /// Models installed on the server. A missing `models` list is an empty success.
    pub async fn list_models(&self) -> InferenceResult<Vec<ModelDescriptor>> {
        let start = Instant::now();
        let timeout = self.config.metadata_timeout();
        let url = self.base_url.join("api/tags")?;
        let result: InferenceResult<TagsResponse> =
            self.send_json(self.http.get(url), timeout).await;
        record("tags", start, result.is_ok());
        match result {
            Ok(tags) => Ok(tags.models.unwrap_or_default()),
            Err(e) => {
                warn!(error = %e, "listing models failed");
                Err(e)
            }
        }
    }

    /// True iff the listing endpoint answers with a 2xx status in time.
    pub async fn check_health(&self) -> bool {
        let timeout = self.config.metadata_timeout();
        let url = match self.base_url.join("api/tags") {
            Ok(url) => url,
            Err(_) => return false,
        };
        match self.http.get(url).timeout(timeout).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!(error = %e, "inference server unavailable");
                false
            }
        }
    }

    /// Raw descriptive record the server keeps for `model_name`.
    pub async fn model_info(&self, model_name: &str) -> InferenceResult<serde_json::Value> {
        if model_name.trim().is_empty() {
            return Err(InferenceError::InvalidRequest("empty model name".into()));
        }
        let start = Instant::now();
        let timeout = self.config.metadata_timeout();
        let url = self.base_url.join("api/show")?;
        let request = self.http.post(url).json(&ShowRequest { name: model_name });
        let result = self.send_json(request, timeout).await;
        record("show", start, result.is_ok());
        result
    }

    pub async fn has_model(&self, model_name: &str) -> bool {
        match self.list_models().await {
            Ok(models) => models.iter().any(|m| m.name == model_name),
            Err(_) => false,
        }
    }

    pub async fn status(&self) -> ServerStatus {
        let listing = self.list_models().await;
        let (connected, models, error) = match listing {
            Ok(models) => (true, models, None),
            Err(e) => (false, Vec::new(), Some(e.to_string())),
        };
        ServerStatus {
            connected,
            url: self.base_url().to_string(),
            default_model: self.config.default_model().to_string(),
            models_count: models.len(),
            models,
            error,
            checked_at: Utc::now(),
        }
    }

    async fn try_generate(
        &self,
        request_id: &RequestId,
        prompt: &str,
        options: &GenerationOptions,
    ) -> InferenceResult<Generation> {
        if prompt.trim().is_empty() {
            return Err(InferenceError::InvalidRequest("empty prompt".into()));
        }
        let model = options.resolve_model(self.config.default_model());
        let body = GenerateRequest {
            model,
            prompt,
            stream: false,
            options: options.sampling()?,
        };
        debug!(%request_id, model, prompt_chars = prompt.len(), "sending generate request");

        let url = self.base_url.join("api/generate")?;
        let response: GenerateResponse = self
            .send_json(self.http.post(url).json(&body), self.config.timeout())
            .await?;

        Ok(Generation {
            text: response.response.trim().to_string(),
            token_count: response.eval_count.unwrap_or(0),
            duration_ms: response.total_duration.unwrap_or(0) / NANOS_PER_MILLI,
            model_used: model.to_string(),
        })
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        timeout: Duration,
    ) -> InferenceResult<T> {
        let response = request
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| InferenceError::from_transport(e, timeout))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| InferenceError::from_transport(e, timeout))?;
        if !status.is_success() {
            return Err(InferenceError::UnexpectedStatus(status, truncate_body(body)));
        }
        Ok(serde_json::from_str(&body)?)
    }
}

fn truncate_body(body: String) -> String {
    match body.char_indices().nth(MAX_ERROR_BODY_CHARS) {
        Some((cut, _)) => format!("{}...", &body[..cut]),
        None => body,
    }
}

fn record(endpoint: &'static str, start: Instant, ok: bool) {
    let result = if ok { "success" } else { "error" };
    histogram!("inference_request_latency_seconds", start.elapsed().as_secs_f64(), "endpoint" => endpoint);
    counter!("inference_requests_total", 1, "endpoint" => endpoint, "result" => result);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;
    use pretty_assertions::assert_eq;

    fn offline_client() -> InferenceClient {
        InferenceClient::new(ClientConfig::new("127.0.0.1", 9).with_timeout_ms(200)).unwrap()
    }

    #[test]
    fn long_error_bodies_are_truncated() {
        assert_eq!(truncate_body("model not found".into()), "model not found");

        let truncated = truncate_body("é".repeat(2_000));
        assert_eq!(truncated.chars().count(), MAX_ERROR_BODY_CHARS + 3);
        assert!(truncated.ends_with("..."));
    }

    #[test]
    fn rejects_invalid_config() {
        assert!(InferenceClient::new(ClientConfig::new("localhost", 0)).is_err());
    }

    #[test]
    fn base_url_has_no_trailing_slash() {
        assert_eq!(offline_client().base_url(), "http://127.0.0.1:9");
    }

    #[test]
    fn empty_prompt_is_rejected_locally() {
        let client = offline_client();
        let result = tokio_test::block_on(client.generate("   ", &GenerationOptions::default()));
        assert_eq!(result.failure_kind(), Some(FailureKind::InvalidRequest));
        assert_eq!(result.error_message(), Some("invalid request: empty prompt"));
    }

    #[test]
    fn empty_conversation_is_rejected_locally() {
        let client = offline_client();
        let result = tokio_test::block_on(client.chat(&[], None));
        assert_eq!(result.error_message(), Some("invalid request: empty conversation"));
    }

    #[test]
    fn invalid_sampling_is_rejected_locally() {
        let client = offline_client();
        let options = GenerationOptions::new().with_temperature(3.0);
        let result = tokio_test::block_on(client.generate("hi", &options));
        assert_eq!(result.failure_kind(), Some(FailureKind::InvalidRequest));
    }

    #[test]
    fn empty_model_name_is_rejected_locally() {
        let client = offline_client();
        let err = tokio_test::block_on(client.model_info("")).unwrap_err();
        assert_eq!(err.kind(), FailureKind::InvalidRequest);
    }
}
