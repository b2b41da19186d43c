use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::{info, warn};

use lawbot_core::chunker::RecursiveSplitter;
use lawbot_core::config::Settings;
use lawbot_core::corpus::{doc_id, CorpusProcessor};
use lawbot_core::retry::with_timeout;
use lawbot_core::traits::Embedder;
use lawbot_core::types::TextSpan;
use lawbot_core::{Error, ProviderError, Result};

use crate::naming::collection_name;
use crate::search::Collection;
use crate::table::CollectionManifest;
use crate::writer::CollectionWriter;

const DEFAULT_EMBED_BATCH: usize = 64;

/// Builds and loads one collection per corpus file under a root directory.
///
/// Build and load of the same collection name are serialised by a
/// per-name async lock; different collections proceed independently.
pub struct CorpusIndexer {
    root: PathBuf,
    embedder: Arc<dyn Embedder>,
    processor: CorpusProcessor,
    splitter: RecursiveSplitter,
    embed_timeout: Duration,
    batch_size: usize,
    show_progress: bool,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl CorpusIndexer {
    pub fn new(root: impl Into<PathBuf>, embedder: Arc<dyn Embedder>, processor: CorpusProcessor, splitter: RecursiveSplitter) -> Self {
        Self {
            root: root.into(),
            embedder,
            processor,
            splitter,
            embed_timeout: Duration::from_secs(60),
            batch_size: DEFAULT_EMBED_BATCH,
            show_progress: false,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_settings(settings: &Settings, embedder: Arc<dyn Embedder>) -> Self {
        Self::new(
            settings.collections_dir(),
            embedder,
            CorpusProcessor::from_settings(settings),
            RecursiveSplitter::new(settings.chunking.clone()),
        )
        .with_embed_timeout(settings.embedding.call_budget())
        .with_batch_size(settings.embedding.batch_size)
    }

    /// Deadline for one `embed_batch` call, retries included.
    pub fn with_embed_timeout(mut self, timeout: Duration) -> Self {
        self.embed_timeout = timeout;
        self
    }

    /// Texts sent per `embed_batch` call.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    pub fn processor(&self) -> &CorpusProcessor {
        &self.processor
    }

    /// Collection name and directory for a corpus file.
    pub fn locate(&self, source: &Path) -> (String, PathBuf) {
        let name = collection_name(source);
        let dir = self.root.join(&name);
        (name, dir)
    }

    fn lock_for(&self, name: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(name.to_string()).or_default().clone()
    }

    /// Chunk, embed and persist `spans` as the collection for `source`,
    /// replacing any previous build. Nothing is written unless every chunk
    /// was embedded.
    pub async fn build(&self, source: &Path, spans: &[TextSpan]) -> Result<Collection> {
        let (name, _) = self.locate(source);
        let lock = self.lock_for(&name);
        let _guard = lock.lock().await;
        self.build_locked(source, &name, spans).await
    }

    pub async fn load(&self, source: &Path) -> Result<Collection> {
        let (name, dir) = self.locate(source);
        let lock = self.lock_for(&name);
        let _guard = lock.lock().await;
        Collection::open(&dir, &name).await
    }

    /// Load the collection for `source`, building it first when missing or
    /// when it was built with a different embedder.
    pub async fn load_or_build(&self, source: &Path) -> Result<Collection> {
        let (name, dir) = self.locate(source);
        let lock = self.lock_for(&name);
        let _guard = lock.lock().await;
        match Collection::open(&dir, &name).await {
            Ok(collection) if self.is_current(&collection) => return Ok(collection),
            Ok(collection) => warn!(
                collection = %name,
                built_with = %collection.manifest().embedder_id,
                current = %self.embedder.embedder_id(),
                "collection was built with another embedder, rebuilding"
            ),
            Err(Error::CollectionNotFound(_)) => info!(collection = %name, source = %source.display(), "collection not found, building"),
            Err(e) => return Err(e),
        }
        let spans = self.processor.process_file(source)?;
        self.build_locked(source, &name, &spans).await
    }

    /// Build unless a current collection already exists; `force` always rebuilds.
    pub async fn index_file(&self, source: &Path, force: bool) -> Result<Collection> {
        if !force {
            return self.load_or_build(source).await;
        }
        let (name, _) = self.locate(source);
        let lock = self.lock_for(&name);
        let _guard = lock.lock().await;
        let spans = self.processor.process_file(source)?;
        self.build_locked(source, &name, &spans).await
    }

    fn is_current(&self, collection: &Collection) -> bool {
        let m = collection.manifest();
        m.embedder_id == self.embedder.embedder_id() && m.dim == self.embedder.dim()
    }

    async fn build_locked(&self, source: &Path, name: &str, spans: &[TextSpan]) -> Result<Collection> {
        if spans.is_empty() {
            return Err(Error::EmptyCorpus(source.to_path_buf()));
        }
        let start = Instant::now();
        let doc_path = source.to_string_lossy();
        let chunks = self.splitter.chunk_spans(&doc_id(source), &doc_path, spans);
        if chunks.is_empty() {
            return Err(Error::EmptyCorpus(source.to_path_buf()));
        }
        info!(collection = name, spans = spans.len(), chunks = chunks.len(), "building collection");

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let vectors = self.embed_all(&texts).await?;

        let manifest = CollectionManifest {
            name: name.to_string(),
            source_path: doc_path.to_string(),
            embedder_id: self.embedder.embedder_id().to_string(),
            dim: self.embedder.dim(),
            chunk_count: chunks.len(),
            built_at: Utc::now(),
        };
        let dir = CollectionWriter::new(&self.root, name).write(&chunks, &vectors, &manifest).await?;
        info!(collection = name, chunks = chunks.len(), elapsed_ms = start.elapsed().as_millis(), "collection built");
        Collection::open(&dir, name).await
    }

    async fn embed_all(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let pb = self.progress_bar(texts.len());
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let embedded = with_timeout("embedding", self.embed_timeout, async {
                self.embedder.embed_batch(batch).await.map_err(Error::EmbeddingProvider)
            })
            .await?;
            if embedded.len() != batch.len() || embedded.iter().any(|v| v.len() != self.embedder.dim()) {
                return Err(Error::EmbeddingProvider(ProviderError::Parse(format!(
                    "embedder returned {} vectors for {} texts or a wrong dimension",
                    embedded.len(),
                    batch.len()
                ))));
            }
            vectors.extend(embedded);
            pb.set_position(vectors.len() as u64);
        }
        pb.finish_and_clear();
        Ok(vectors)
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len as u64);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%) {msg}")
            .map(|s| s.progress_chars("#>-"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        pb.set_style(style);
        pb.set_message("embedding");
        pb
    }
}
