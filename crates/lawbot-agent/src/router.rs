use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use lawbot_core::retry::with_timeout;
use lawbot_core::traits::Completer;
use lawbot_core::types::{TopicDecision, TopicLabel};
use lawbot_core::{Error, Result};

use crate::prompts::router_prompt;

#[derive(Debug, Deserialize)]
struct RouterOutput {
    #[serde(default)]
    reasoning: Option<String>,
    topic: String,
}

/// Maps a free-text question onto one label of the closed topic set with a
/// single completion call.
pub struct TopicRouter {
    completer: Arc<dyn Completer>,
    timeout: Duration,
}

impl TopicRouter {
    pub fn new(completer: Arc<dyn Completer>, timeout: Duration) -> Self {
        Self { completer, timeout }
    }

    pub async fn classify(&self, query: &str) -> Result<TopicDecision> {
        let start = Instant::now();
        let prompt = router_prompt(query);
        let raw = with_timeout("classification", self.timeout, async {
            self.completer.complete(&prompt).await.map_err(Error::CompletionProvider)
        })
        .await?;
        debug!(raw = %raw, "router output");
        let decision = parse_decision(&raw)?;
        info!(topic = %decision.label, elapsed_ms = start.elapsed().as_millis(), "query classified");
        Ok(decision)
    }
}

/// Validate a router reply against the closed label set.
///
/// Accepts the requested JSON object (optionally inside markdown fences or
/// surrounded by stray text) or a bare label. The label must match exactly
/// once whitespace and ASCII quotes are trimmed; anything else is a
/// `Classification` error.
pub fn parse_decision(raw: &str) -> Result<TopicDecision> {
    let cleaned = raw
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    let json_str = match (cleaned.find('{'), cleaned.rfind('}')) {
        (Some(start), Some(end)) if end > start => Some(&cleaned[start..=end]),
        _ => None,
    };

    let (topic, rationale) = match json_str.and_then(|s| serde_json::from_str::<RouterOutput>(s).ok()) {
        Some(output) => (output.topic, output.reasoning),
        None => (cleaned.to_string(), None),
    };

    let label = normalize_label(&topic)
        .parse::<TopicLabel>()
        .map_err(|_| Error::Classification { output: raw.trim().to_string() })?;
    let rationale = rationale.map(|r| r.trim().to_string()).filter(|r| !r.is_empty());
    Ok(TopicDecision { label, rationale })
}

fn normalize_label(s: &str) -> &str {
    s.trim().trim_matches(|c: char| c == '"' || c == '\'').trim()
}
