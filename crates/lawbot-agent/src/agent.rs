use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use lawbot_core::config::Settings;
use lawbot_core::retry::with_timeout;
use lawbot_core::traits::Completer;
use lawbot_core::types::{QueryResult, TopicDecision};
use lawbot_core::{Error, Result};
use lawbot_vector::CorpusIndexer;

use crate::prompts::{answer_prompt, compose_context, REFUSAL};
use crate::router::TopicRouter;

/// Classify, retrieve, answer.
///
/// Every collaborator comes in through the constructor; the agent owns no
/// global state besides the indexer's per-collection locks.
pub struct LawAgent {
    settings: Settings,
    router: TopicRouter,
    completer: Arc<dyn Completer>,
    indexer: Arc<CorpusIndexer>,
    llm_timeout: Duration,
    embed_timeout: Duration,
    search_timeout: Duration,
}

impl LawAgent {
    pub fn new(settings: Settings, completer: Arc<dyn Completer>, indexer: Arc<CorpusIndexer>) -> Self {
        let llm_timeout = settings.llm.call_budget();
        let embed_timeout = settings.embedding.call_budget();
        let search_timeout = settings.retrieval.search_timeout();
        Self {
            router: TopicRouter::new(completer.clone(), llm_timeout),
            settings,
            completer,
            indexer,
            llm_timeout,
            embed_timeout,
            search_timeout,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub async fn classify(&self, query: &str) -> Result<TopicDecision> {
        self.router.classify(query).await
    }

    /// Run the whole pipeline for `query`. Failures are attached to the
    /// result together with whatever was produced before them.
    pub async fn answer(&self, query: &str) -> QueryResult {
        let start = Instant::now();
        let mut result = QueryResult::new(query);
        match self.run(query, &mut result).await {
            Ok(()) => info!(
                topic = ?result.topic.map(|t| t.as_str()),
                retrieved = result.retrieved.len(),
                elapsed_ms = start.elapsed().as_millis(),
                "query answered"
            ),
            Err(e) => {
                if e.is_validation() {
                    info!(error = %e, topic = ?result.topic.map(|t| t.as_str()), "query rejected");
                } else {
                    warn!(error = %e, topic = ?result.topic.map(|t| t.as_str()), "query failed");
                }
                result.error = Some(e);
            }
        }
        result
    }

    async fn run(&self, query: &str, result: &mut QueryResult) -> Result<()> {
        let decision = self.router.classify(query).await?;
        let label = decision.label;
        result.topic = Some(label);
        result.rationale = decision.rationale;
        if label.is_non_legal() {
            result.answer = Some(REFUSAL.to_string());
            return Ok(());
        }

        let corpus_file = self
            .settings
            .corpus_file_for(label)
            .ok_or_else(|| Error::UnmappedTopic(label.as_str().to_string()))?;
        result.corpus_file = Some(corpus_file.clone());

        let collection = self.indexer.load_or_build(&corpus_file).await?;
        result.collection = Some(collection.name().to_string());

        let embedder = self.indexer.embedder();
        let query_vector = with_timeout("embedding", self.embed_timeout, async {
            embedder.embed(query).await.map_err(Error::EmbeddingProvider)
        })
        .await?;
        result.retrieved =
            with_timeout("vector search", self.search_timeout, collection.search(&query_vector, self.settings.retrieval.top_k))
                .await?;

        let (context, sources) = compose_context(&result.retrieved, self.settings.retrieval.context_max_chars);
        result.sources = sources;
        let prompt = answer_prompt(&context, query);
        let answer = with_timeout("completion", self.llm_timeout, async {
            self.completer.complete(&prompt).await.map_err(Error::CompletionProvider)
        })
        .await?;
        result.answer = Some(answer);
        Ok(())
    }
}
