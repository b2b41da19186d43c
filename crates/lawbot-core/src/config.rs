//! Layered configuration and path helpers.
//!
//! Uses Figment to merge built-in defaults, `config.toml`, `config.<env>.toml`
//! and `APP_*` env vars (`__` separates nested keys). Provides helpers to
//! expand `~` and `${VAR}` and to resolve relative paths against a base dir.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::chunker::ChunkingConfig;
use crate::error::{Error, Result};
use crate::retry::RetryPolicy;
use crate::types::TopicLabel;

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        Self::load_for_env(&env_name)
    }

    pub fn load_for_env(env_name: &str) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Settings::default())).merge(Toml::file("config.toml"));
        match env_name {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));
        Ok(Self { figment })
    }

    pub fn from_figment(figment: Figment) -> Self {
        Self { figment }
    }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::Configuration(format!("Failed to get '{key}': {e}")))
    }

    /// Extract and validate the full typed settings tree.
    pub fn settings(&self) -> Result<Settings> {
        let settings: Settings = self
            .figment
            .extract()
            .map_err(|e| Error::Configuration(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub data: DataSettings,
    pub chunking: ChunkingConfig,
    pub extract: ExtractSettings,
    pub retrieval: RetrievalSettings,
    pub llm: LlmSettings,
    pub embedding: EmbeddingSettings,
    /// Topic config key (see `TopicLabel::config_key`) -> corpus file name
    pub topics: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    pub corpus_dir: String,
    pub collections_dir: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractSettings {
    pub min_paragraph_chars: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub top_k: usize,
    pub context_max_chars: usize,
    /// Deadline for one vector search against a loaded collection
    pub search_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub api_key_env: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub base_url: String,
    pub model: String,
    pub dim: usize,
    pub batch_size: usize,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub api_key_env: String,
}

impl Default for Settings {
    fn default() -> Self {
        let topics = [
            (TopicLabel::LifeOffenses, "specific_offences_ch1.txt"),
            (TopicLabel::HealthOffenses, "qa.txt"),
            (TopicLabel::LibertyOffenses, "qa.txt"),
            (TopicLabel::ReputationOffenses, "qa.txt"),
            (TopicLabel::PrivacyOffenses, "qa.txt"),
            (TopicLabel::PropertyOffenses, "specific_offences_ch6.txt"),
            (TopicLabel::GeneralLegal, "qa.txt"),
        ]
        .into_iter()
        .map(|(label, file)| (label.config_key().to_string(), file.to_string()))
        .collect();
        Self {
            data: DataSettings::default(),
            chunking: ChunkingConfig::default(),
            extract: ExtractSettings::default(),
            retrieval: RetrievalSettings::default(),
            llm: LlmSettings::default(),
            embedding: EmbeddingSettings::default(),
            topics,
        }
    }
}

impl Default for DataSettings {
    fn default() -> Self {
        Self { corpus_dir: "data".to_string(), collections_dir: "collections".to_string() }
    }
}

impl Default for ExtractSettings {
    fn default() -> Self {
        Self { min_paragraph_chars: 50 }
    }
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self { top_k: 3, context_max_chars: 6000, search_timeout_secs: 30 }
    }
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.1,
            timeout_secs: 60,
            max_retries: 2,
            api_key_env: "OPENAI_API_KEY".to_string(),
        }
    }
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "text-embedding-3-small".to_string(),
            dim: 1536,
            batch_size: 64,
            timeout_secs: 60,
            max_retries: 2,
            api_key_env: "OPENAI_API_KEY".to_string(),
        }
    }
}

impl RetrievalSettings {
    pub fn search_timeout(&self) -> Duration {
        Duration::from_secs(self.search_timeout_secs)
    }
}

impl LlmSettings {
    /// Per-request HTTP timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::with_max_retries(self.max_retries)
    }

    /// Deadline for one logical completion, retries included.
    pub fn call_budget(&self) -> Duration {
        self.retry_policy().budget(self.timeout())
    }
}

impl EmbeddingSettings {
    /// Per-request HTTP timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::with_max_retries(self.max_retries)
    }

    /// Deadline for one logical embedding batch, retries included.
    pub fn call_budget(&self) -> Duration {
        self.retry_policy().budget(self.timeout())
    }
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        if self.chunking.chunk_size == 0 {
            return Err(Error::Configuration("chunking.chunk_size must be positive".into()));
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(Error::Configuration(format!(
                "chunking.chunk_overlap ({}) must be smaller than chunking.chunk_size ({})",
                self.chunking.chunk_overlap, self.chunking.chunk_size
            )));
        }
        if self.retrieval.top_k == 0 {
            return Err(Error::Configuration("retrieval.top_k must be at least 1".into()));
        }
        if self.retrieval.search_timeout_secs == 0 {
            return Err(Error::Configuration("retrieval.search_timeout_secs must be positive".into()));
        }
        if self.embedding.batch_size == 0 {
            return Err(Error::Configuration("embedding.batch_size must be positive".into()));
        }
        for key in self.topics.keys() {
            if !TopicLabel::ALL.iter().any(|l| l.config_key() == key) {
                return Err(Error::Configuration(format!("unknown topic key '{key}' under [topics]")));
            }
        }
        Ok(())
    }

    pub fn corpus_dir(&self) -> PathBuf {
        expand_path(&self.data.corpus_dir)
    }

    pub fn collections_dir(&self) -> PathBuf {
        expand_path(&self.data.collections_dir)
    }

    /// Corpus file routed to `label`, resolved against `data.corpus_dir`.
    pub fn corpus_file_for(&self, label: TopicLabel) -> Option<PathBuf> {
        self.topics
            .get(label.config_key())
            .filter(|file| !file.trim().is_empty())
            .map(|file| resolve_with_base(&self.corpus_dir(), file))
    }
}

/// A provider credential. Never printed.
#[derive(Clone)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Read a credential once at startup; absence is fatal.
    pub fn from_env(var: &str) -> Result<Self> {
        match env::var(var) {
            Ok(v) if !v.trim().is_empty() => Ok(Self(v.trim().to_string())),
            _ => Err(Error::Configuration(format!(
                "{var} is not set; export it or add it to a .env file"
            ))),
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey([REDACTED])")
    }
}

/// Provider credentials, read once at process start.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub completion: ApiKey,
    /// `None` when embeddings are computed offline
    pub embedding: Option<ApiKey>,
}

impl Credentials {
    pub fn from_env(settings: &Settings, offline_embeddings: bool) -> Result<Self> {
        let completion = ApiKey::from_env(&settings.llm.api_key_env)?;
        let embedding = Self::embedding_from_env(settings, offline_embeddings)?;
        Ok(Self { completion, embedding })
    }

    /// The embedding credential alone, for processes that never call the
    /// completion API.
    pub fn embedding_from_env(settings: &Settings, offline_embeddings: bool) -> Result<Option<ApiKey>> {
        if offline_embeddings {
            return Ok(None);
        }
        ApiKey::from_env(&settings.embedding.api_key_env).map(Some)
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
