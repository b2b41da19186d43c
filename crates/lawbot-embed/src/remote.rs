use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, warn};

use lawbot_core::config::{ApiKey, EmbeddingSettings};
use lawbot_core::retry::RetryPolicy;
use lawbot_core::traits::Embedder;
use lawbot_core::{Error, ProviderError, Result};

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

/// Embedder backed by an OpenAI-compatible `/embeddings` endpoint.
#[derive(Clone)]
pub struct RemoteEmbedder {
    http_client: Client,
    api_key: ApiKey,
    base_url: String,
    model: String,
    dim: usize,
    batch_size: usize,
    retry: RetryPolicy,
    id: String,
}

impl RemoteEmbedder {
    pub fn new(settings: &EmbeddingSettings, api_key: ApiKey) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(settings.timeout())
            .build()
            .map_err(|e| Error::Configuration(format!("embedding HTTP client: {e}")))?;
        Ok(Self {
            http_client,
            api_key,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            dim: settings.dim,
            batch_size: settings.batch_size.max(1),
            retry: settings.retry_policy(),
            id: format!("openai:{}:d{}", settings.model, settings.dim),
        })
    }

    async fn request(&self, batch: &[String]) -> std::result::Result<Vec<Vec<f32>>, ProviderError> {
        let endpoint = format!("{}/embeddings", self.base_url);
        let start = Instant::now();
        let response = self
            .http_client
            .post(&endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key.expose()))
            .json(&EmbeddingRequest { model: &self.model, input: batch })
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, timeout = e.is_timeout(), connect = e.is_connect(), "embedding request failed");
                ProviderError::Network(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, error = %body, "embedding API error");
            return Err(ProviderError::Api { status: status.as_u16(), body });
        }

        let parsed: EmbeddingResponse = response.json().await.map_err(|e| ProviderError::Parse(e.to_string()))?;
        let vectors = collect_vectors(parsed, batch.len(), self.dim)?;
        debug!(model = %self.model, inputs = batch.len(), duration_ms = start.elapsed().as_millis(), "embedding batch");
        Ok(vectors)
    }
}

/// Order vectors by input index and check count and dimension.
fn collect_vectors(
    mut response: EmbeddingResponse,
    expected: usize,
    dim: usize,
) -> std::result::Result<Vec<Vec<f32>>, ProviderError> {
    if response.data.len() != expected {
        return Err(ProviderError::Parse(format!(
            "expected {expected} embeddings, got {}",
            response.data.len()
        )));
    }
    response.data.sort_by_key(|d| d.index);
    response
        .data
        .into_iter()
        .map(|d| {
            if d.embedding.len() == dim {
                Ok(d.embedding)
            } else {
                Err(ProviderError::Parse(format!("expected dimension {dim}, got {}", d.embedding.len())))
            }
        })
        .collect()
}

#[async_trait]
impl Embedder for RemoteEmbedder {
    fn embedder_id(&self) -> &str {
        &self.id
    }

    fn dim(&self) -> usize {
        self.dim
    }

    async fn embed_batch(&self, texts: &[String]) -> std::result::Result<Vec<Vec<f32>>, ProviderError> {
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            out.extend(self.retry.run("embeddings", || self.request(batch)).await?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(json: &str) -> EmbeddingResponse {
        serde_json::from_str(json).expect("valid response json")
    }

    #[test]
    fn vectors_are_reordered_by_index() {
        let r = response(r#"{"data":[{"index":1,"embedding":[0.0,1.0]},{"index":0,"embedding":[1.0,0.0]}],"model":"m"}"#);
        let v = collect_vectors(r, 2, 2).expect("two vectors");
        assert_eq!(v, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn wrong_count_or_dimension_is_a_parse_error() {
        let r = response(r#"{"data":[{"index":0,"embedding":[1.0,0.0]}]}"#);
        assert!(matches!(collect_vectors(r, 2, 2), Err(ProviderError::Parse(_))));
        let r = response(r#"{"data":[{"index":0,"embedding":[1.0,0.0,0.5]}]}"#);
        assert!(matches!(collect_vectors(r, 1, 2), Err(ProviderError::Parse(_))));
    }

    #[test]
    fn request_serializes_batch_input() {
        let input = vec!["甲".to_string(), "乙".to_string()];
        let body = serde_json::to_value(EmbeddingRequest { model: "text-embedding-3-small", input: &input }).expect("json");
        assert_eq!(body["input"][1], "乙");
        assert_eq!(body["model"], "text-embedding-3-small");
    }

    #[test]
    fn id_names_model_and_dimension() {
        let e = RemoteEmbedder::new(&EmbeddingSettings::default(), ApiKey::new("sk-test")).expect("client");
        assert_eq!(e.embedder_id(), "openai:text-embedding-3-small:d1536");
        assert_eq!(e.dim(), 1536);
    }
}
