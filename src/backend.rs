use crate::client::InferenceClient;
use crate::error::InferenceResult;
use crate::models::{ConversationTurn, GenerationOptions, ModelDescriptor};
use crate::types::GenerationResult;
use async_trait::async_trait;

/// The operations a host program needs from an inference server.
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    fn default_model(&self) -> &str;
    fn base_url(&self) -> &str;
    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> GenerationResult;
    async fn chat(&self, turns: &[ConversationTurn], model: Option<&str>) -> GenerationResult;
    async fn list_models(&self) -> InferenceResult<Vec<ModelDescriptor>>;
}

#[async_trait]
impl InferenceBackend for InferenceClient {
    fn default_model(&self) -> &str {
        self.config().default_model()
    }

    fn base_url(&self) -> &str {
        InferenceClient::base_url(self)
    }

    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> GenerationResult {
        InferenceClient::generate(self, prompt, options).await
    }

    async fn chat(&self, turns: &[ConversationTurn], model: Option<&str>) -> GenerationResult {
        InferenceClient::chat(self, turns, model).await
    }

    async fn list_models(&self) -> InferenceResult<Vec<ModelDescriptor>> {
        InferenceClient::list_models(self).await
    }
}
