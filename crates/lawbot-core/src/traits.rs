use async_trait::async_trait;

use crate::error::ProviderError;

/// Turns text into fixed-size vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Stable identifier for the provider/model (e.g., `hash:d256`).
    fn embedder_id(&self) -> &str;
    fn dim(&self) -> usize;
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError>;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        self.embed_batch(&[text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| ProviderError::Parse("embedder returned no vector".to_string()))
    }
}

/// Single-prompt text completion.
#[async_trait]
pub trait Completer: Send + Sync {
    fn model_id(&self) -> &str;
    async fn complete(&self, prompt: &str) -> Result<String, ProviderError>;
}
