use async_trait::async_trait;
use std::collections::VecDeque;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

use lawbot_agent::prompts::REFUSAL;
use lawbot_agent::{LawAgent, TopicRouter};
use lawbot_core::config::Settings;
use lawbot_core::traits::{Completer, Embedder};
use lawbot_core::types::TopicLabel;
use lawbot_core::{Error, ProviderError};
use lawbot_embed::HashEmbedder;
use lawbot_vector::CorpusIndexer;

const HOMICIDE_CORPUS: &str = "刑法分則第一章 侵害生命法益之犯罪\n\n\
1. 普通殺人罪\n甲因債務糾紛持刀刺殺乙，乙送醫不治死亡，請問甲之罪責？\n【答題架構】一、刑法第271條第1項普通殺人罪\n二、殺人故意\n【爭點記憶】殺人故意與傷害致死之區別\n\n\
2. 遺棄罪\n丙對於無自救力之母親不為扶養，請問丙之罪責？\n【答題架構】一、刑法第294條違背義務之遺棄罪";

const QA_CORPUS: &str = "1. 準強盜罪\n竊盜或搶奪，因防護贓物、脫免逮捕或湮滅罪證，而當場施以強暴脅迫者，以強盜論。";

/// Replays canned replies in order and records every prompt.
struct ScriptedCompleter {
    replies: Mutex<VecDeque<Result<String, ProviderError>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedCompleter {
    fn new(replies: Vec<Result<String, ProviderError>>) -> Arc<Self> {
        Arc::new(Self { replies: Mutex::new(replies.into()), prompts: Mutex::new(Vec::new()) })
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Completer for ScriptedCompleter {
    fn model_id(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError::Parse("script exhausted".into())))
    }
}

struct SlowCompleter;

#[async_trait]
impl Completer for SlowCompleter {
    fn model_id(&self) -> &str {
        "slow"
    }

    async fn complete(&self, _prompt: &str) -> Result<String, ProviderError> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok("others".into())
    }
}

struct CountingEmbedder {
    inner: HashEmbedder,
    calls: AtomicUsize,
}

#[async_trait]
impl Embedder for CountingEmbedder {
    fn embedder_id(&self) -> &str {
        self.inner.embedder_id()
    }
    fn dim(&self) -> usize {
        self.inner.dim()
    }
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.embed_batch(texts).await
    }
}

struct Fixture {
    _tmp: TempDir,
    settings: Settings,
    embedder: Arc<CountingEmbedder>,
}

impl Fixture {
    fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let data = tmp.path().join("data");
        fs::create_dir_all(&data).unwrap();
        fs::write(data.join("specific_offences_ch1.txt"), HOMICIDE_CORPUS).unwrap();
        fs::write(data.join("qa.txt"), QA_CORPUS).unwrap();

        let mut settings = Settings::default();
        settings.data.corpus_dir = data.to_string_lossy().into_owned();
        settings.data.collections_dir = tmp.path().join("collections").to_string_lossy().into_owned();
        settings.embedding.dim = 64;
        settings.chunking.chunk_size = 60;
        settings.chunking.chunk_overlap = 10;
        settings.retrieval.top_k = 3;
        settings.llm.timeout_secs = 5;

        let embedder = Arc::new(CountingEmbedder { inner: HashEmbedder::new(64), calls: AtomicUsize::new(0) });
        Self { _tmp: tmp, settings, embedder }
    }

    fn agent(&self, completer: Arc<dyn Completer>) -> LawAgent {
        let indexer = CorpusIndexer::from_settings(&self.settings, self.embedder.clone());
        LawAgent::new(self.settings.clone(), completer, Arc::new(indexer))
    }

    fn collections_dir(&self) -> &Path {
        Path::new(&self.settings.data.collections_dir)
    }
}

fn router_reply(topic: TopicLabel, reasoning: &str) -> Result<String, ProviderError> {
    Ok(format!(r#"{{"reasoning": "{reasoning}", "topic": "{}"}}"#, topic.as_str()))
}

#[tokio::test]
async fn homicide_question_is_answered_from_the_life_corpus() {
    let fx = Fixture::new();
    let completer = ScriptedCompleter::new(vec![
        router_reply(TopicLabel::LifeOffenses, "涉及故意殺人行為，侵害生命法益"),
        Ok("依刑法第271條第1項，甲成立普通殺人罪。".into()),
    ]);
    let agent = fx.agent(completer.clone());

    let result = agent.answer("某人故意殺害他人，應該如何論處？").await;
    assert!(result.is_ok(), "unexpected error: {:?}", result.error);
    assert_eq!(result.topic, Some(TopicLabel::LifeOffenses));
    assert_eq!(result.rationale.as_deref(), Some("涉及故意殺人行為，侵害生命法益"));
    assert!(result.corpus_file.as_ref().unwrap().ends_with("specific_offences_ch1.txt"));
    assert!(result.collection.as_ref().unwrap().starts_with("specific-offences-ch1-"));
    assert!(!result.retrieved.is_empty() && result.retrieved.len() <= 3);
    assert!(!result.sources.is_empty());
    assert_eq!(result.sources[0], result.retrieved[0]);
    assert!(result.answer.as_ref().unwrap().contains("第271條"));

    let prompts = completer.prompts();
    assert_eq!(prompts.len(), 2);
    assert!(prompts[0].contains("某人故意殺害他人"));
    assert!(prompts[1].contains("問題：某人故意殺害他人，應該如何論處？"));
    assert!(prompts[1].contains(&result.sources[0].chunk.content));
}

#[tokio::test]
async fn non_legal_query_is_refused_without_retrieval() {
    let fx = Fixture::new();
    let completer = ScriptedCompleter::new(vec![router_reply(TopicLabel::NonLegal, "只是聊天")]);
    let agent = fx.agent(completer.clone());

    let result = agent.answer("今天天氣如何").await;
    assert!(result.is_ok());
    assert_eq!(result.topic, Some(TopicLabel::NonLegal));
    assert_eq!(result.answer.as_deref(), Some(REFUSAL));
    assert!(result.retrieved.is_empty());
    assert!(result.corpus_file.is_none());
    assert_eq!(fx.embedder.calls.load(Ordering::SeqCst), 0);
    assert_eq!(completer.prompts().len(), 1);
    assert!(!fx.collections_dir().exists());
}

#[tokio::test]
async fn unknown_label_is_a_classification_error() {
    let fx = Fixture::new();
    let completer = ScriptedCompleter::new(vec![Ok("殺人罪".into())]);
    let result = fx.agent(completer).answer("某人故意殺害他人").await;
    assert!(matches!(result.error, Some(Error::Classification { ref output }) if output == "殺人罪"));
    assert_eq!(result.topic, None);
    assert!(result.answer.is_none());
}

#[tokio::test]
async fn unmapped_topic_keeps_the_chosen_label() {
    let mut fx = Fixture::new();
    fx.settings.topics.remove(TopicLabel::PrivacyOffenses.config_key());
    let completer = ScriptedCompleter::new(vec![router_reply(TopicLabel::PrivacyOffenses, "竊錄他人對話")]);
    let result = fx.agent(completer).answer("偷錄同事的談話").await;
    assert!(matches!(result.error, Some(Error::UnmappedTopic(_))));
    assert_eq!(result.topic, Some(TopicLabel::PrivacyOffenses));
    assert_eq!(fx.embedder.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn missing_corpus_file_is_reported_on_the_result() {
    let mut fx = Fixture::new();
    fx.settings.topics.insert(TopicLabel::HealthOffenses.config_key().into(), "missing.txt".into());
    let completer = ScriptedCompleter::new(vec![router_reply(TopicLabel::HealthOffenses, "傷害")]);
    let result = fx.agent(completer).answer("用拳頭毆打他人造成受傷").await;
    assert!(matches!(result.error, Some(Error::CorpusMissing(_))));
    assert!(result.corpus_file.as_ref().unwrap().ends_with("missing.txt"));
    assert!(result.collection.is_none());
}

#[tokio::test]
async fn completion_failure_keeps_retrieved_chunks() {
    let fx = Fixture::new();
    let completer = ScriptedCompleter::new(vec![
        router_reply(TopicLabel::GeneralLegal, "一般法律諮詢"),
        Err(ProviderError::Api { status: 500, body: "upstream error".into() }),
    ]);
    let result = fx.agent(completer).answer("什麼是準強盜罪？").await;
    assert!(matches!(result.error, Some(Error::CompletionProvider(ProviderError::Api { status: 500, .. }))));
    assert_eq!(result.topic, Some(TopicLabel::GeneralLegal));
    assert!(result.collection.is_some());
    assert!(!result.retrieved.is_empty());
    assert!(result.answer.is_none());
}

#[tokio::test]
async fn collection_is_built_once_and_reused() {
    let mut fx = Fixture::new();
    let completer = ScriptedCompleter::new(vec![
        router_reply(TopicLabel::PropertyOffenses, "竊盜"),
        Ok("第一次回答".into()),
        router_reply(TopicLabel::GeneralLegal, "準強盜罪"),
        Ok("第二次回答".into()),
    ]);
    fx.settings.topics.insert(TopicLabel::PropertyOffenses.config_key().into(), "qa.txt".into());
    let agent = fx.agent(completer);

    let first = agent.answer("竊取他人財物").await;
    assert!(first.is_ok(), "{:?}", first.error);
    let calls_after_first = fx.embedder.calls.load(Ordering::SeqCst);

    let second = agent.answer("竊取他人財物").await;
    assert!(second.is_ok(), "{:?}", second.error);
    assert_eq!(first.collection, second.collection);
    // only the query embedding on the second call
    assert_eq!(fx.embedder.calls.load(Ordering::SeqCst), calls_after_first + 1);
}

#[tokio::test]
async fn classify_reports_rationale() {
    let completer = ScriptedCompleter::new(vec![router_reply(TopicLabel::ReputationOffenses, "公然侮辱")]);
    let router = TopicRouter::new(completer, Duration::from_secs(1));
    let decision = router.classify("在網路上公然辱罵他人").await.unwrap();
    assert_eq!(decision.label, TopicLabel::ReputationOffenses);
    assert_eq!(decision.rationale.as_deref(), Some("公然侮辱"));
}

#[tokio::test]
async fn slow_classifier_times_out() {
    let router = TopicRouter::new(Arc::new(SlowCompleter), Duration::from_millis(50));
    assert!(matches!(
        router.classify("某人故意殺害他人").await,
        Err(Error::Timeout { operation: "classification", .. })
    ));
}
