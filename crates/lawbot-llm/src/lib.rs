#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

//! OpenAI-compatible chat completions behind the `Completer` trait.
//!
//! Each prompt is sent as a single user message. Transient failures (network,
//! 429, 5xx) are retried with backoff; anything else is returned at once.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, warn};

use lawbot_core::config::{ApiKey, LlmSettings};
use lawbot_core::retry::RetryPolicy;
use lawbot_core::traits::Completer;
use lawbot_core::{Error, ProviderError, Result};

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [Message<'a>; 1],
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Clone)]
pub struct ChatCompleter {
    http_client: Client,
    api_key: ApiKey,
    base_url: String,
    model: String,
    temperature: f32,
    retry: RetryPolicy,
}

impl ChatCompleter {
    pub fn new(settings: &LlmSettings, api_key: ApiKey) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(settings.timeout())
            .build()
            .map_err(|e| Error::Configuration(format!("completion HTTP client: {e}")))?;
        Ok(Self {
            http_client,
            api_key,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            temperature: settings.temperature,
            retry: settings.retry_policy(),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn request_body<'a>(&'a self, prompt: &'a str) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: [Message { role: "user", content: prompt }],
            temperature: self.temperature,
        }
    }

    async fn request(&self, prompt: &str) -> std::result::Result<String, ProviderError> {
        let endpoint = format!("{}/chat/completions", self.base_url);
        let start = Instant::now();
        let response = self
            .http_client
            .post(&endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key.expose()))
            .json(&self.request_body(prompt))
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, timeout = e.is_timeout(), connect = e.is_connect(), "completion request failed");
                ProviderError::Network(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, error = %body, "completion API error");
            return Err(ProviderError::Api { status: status.as_u16(), body });
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| ProviderError::Parse(e.to_string()))?;
        let content = first_content(parsed)?;
        debug!(model = %self.model, duration_ms = start.elapsed().as_millis(), "chat completion");
        Ok(content)
    }
}

fn first_content(response: ChatResponse) -> std::result::Result<String, ProviderError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| ProviderError::Parse("completion response has no message content".into()))
}

#[async_trait]
impl Completer for ChatCompleter {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> std::result::Result<String, ProviderError> {
        self.retry.run("chat completion", || self.request(prompt)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lawbot_core::retry::with_timeout;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn completer() -> ChatCompleter {
        ChatCompleter::new(&LlmSettings::default(), ApiKey::new("sk-test")).expect("client")
    }

    #[test]
    fn body_is_single_user_message() {
        let c = completer();
        let body = serde_json::to_value(c.request_body("甲殺乙，請問甲之罪責？")).expect("json");
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "甲殺乙，請問甲之罪責？");
        assert!((body["temperature"].as_f64().expect("number") - 0.1).abs() < 1e-6);
    }

    #[test]
    fn takes_first_choice_content() {
        let r: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"role":"assistant","content":"刑法第271條"}},{"message":{"content":"x"}}]}"#)
                .expect("json");
        assert_eq!(first_content(r).expect("content"), "刑法第271條");
    }

    #[test]
    fn missing_content_is_parse_error() {
        let empty: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).expect("json");
        assert!(matches!(first_content(empty), Err(ProviderError::Parse(_))));
        let null: ChatResponse = serde_json::from_str(r#"{"choices":[{"message":{"content":null}}]}"#).expect("json");
        assert!(matches!(first_content(null), Err(ProviderError::Parse(_))));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_network_error() {
        let settings = LlmSettings { base_url: "http://127.0.0.1:9".to_string(), timeout_secs: 2, ..LlmSettings::default() };
        let c = ChatCompleter::new(&settings, ApiKey::new("sk-test")).expect("client").with_retry(RetryPolicy::none());
        assert!(matches!(c.complete("hi").await, Err(ProviderError::Network(_))));
    }

    #[tokio::test]
    async fn stalled_server_is_retried_within_the_call_budget() {
        // accepts connections and never writes a byte back
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        let accepted = Arc::new(AtomicUsize::new(0));
        let counter = accepted.clone();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                held.push(socket);
            }
        });

        let settings = LlmSettings { base_url: format!("http://{addr}"), timeout_secs: 1, max_retries: 1, ..LlmSettings::default() };
        let policy = RetryPolicy { max_retries: 1, base_delay: Duration::from_millis(200) };
        let c = ChatCompleter::new(&settings, ApiKey::new("sk-test")).expect("client").with_retry(policy);
        let err = with_timeout("classification", policy.budget(settings.timeout()), async {
            c.complete("hi").await.map_err(Error::CompletionProvider)
        })
        .await
        .expect_err("server never answers");

        assert!(matches!(err, Error::CompletionProvider(ProviderError::Network(_))), "got {err}");
        assert_eq!(accepted.load(Ordering::SeqCst), 2, "one attempt plus one retry");
    }
}
