//! Startup wiring and terminal rendering shared by the lawbot binaries.

use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use lawbot_agent::LawAgent;
use lawbot_core::config::{Config, Credentials, Settings};
use lawbot_core::types::{QueryResult, SearchHit};
use lawbot_embed::{get_default_embedder, use_fake_embeddings};
use lawbot_llm::ChatCompleter;
use lawbot_vector::CorpusIndexer;

pub const PREVIEW_CHARS: usize = 300;

/// Load `.env`, install the log subscriber and read validated settings.
pub fn bootstrap() -> anyhow::Result<Settings> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();
    let config = Config::load().map_err(|e| {
        eprintln!("Error loading config: {}", e);
        e
    })?;
    Ok(config.settings()?)
}

/// Full pipeline: completion and embedding credentials are both required
/// (the embedding one unless offline embeddings are selected).
pub fn build_agent(settings: &Settings) -> anyhow::Result<LawAgent> {
    let credentials = Credentials::from_env(settings, use_fake_embeddings())?;
    let embedder = get_default_embedder(&settings.embedding, credentials.embedding.clone())?;
    let completer = ChatCompleter::new(&settings.llm, credentials.completion.clone())?;
    let indexer = CorpusIndexer::from_settings(settings, embedder).with_progress(true);
    Ok(LawAgent::new(settings.clone(), Arc::new(completer), Arc::new(indexer)))
}

/// Indexing and search only need an embedder, so only the embedding
/// credential is read.
pub fn build_indexer(settings: &Settings) -> anyhow::Result<CorpusIndexer> {
    let key = Credentials::embedding_from_env(settings, use_fake_embeddings())?;
    let embedder = get_default_embedder(&settings.embedding, key)?;
    Ok(CorpusIndexer::from_settings(settings, embedder).with_progress(true))
}

/// First `max_chars` characters of `text` and whether anything was cut.
pub fn preview(text: &str, max_chars: usize) -> (&str, bool) {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => (&text[..idx], true),
        None => (text, false),
    }
}

pub fn display_result(result: &QueryResult) {
    println!("\n{}", "=".repeat(80));
    println!("🤖 法律機器人查詢結果");
    println!("{}", "=".repeat(80));
    println!("📝 使用者問題: {}", result.query);
    if let Some(topic) = result.topic {
        println!("🎯 選擇主題: {}", topic);
    }
    if let Some(rationale) = &result.rationale {
        println!("💭 判斷理由: {}", rationale);
    }
    if let Some(file) = &result.corpus_file {
        let name = file.file_name().map_or_else(|| file.display().to_string(), |n| n.to_string_lossy().to_string());
        println!("📁 使用資料庫: {}", name);
    }
    if let Some(error) = &result.error {
        println!("❌ 錯誤: {}", error);
        return;
    }
    if !result.retrieved.is_empty() {
        println!("🔍 檢索片段數: {}", result.retrieved.len());
    }
    if let Some(answer) = &result.answer {
        println!("\n💡 AI 回答:");
        println!("{}", "-".repeat(50));
        println!("{}", answer);
        println!("{}", "-".repeat(50));
    }
    if !result.sources.is_empty() {
        println!("\n📚 參考資料來源:");
        for (i, hit) in result.sources.iter().enumerate() {
            println!("{}. {} - {}", i + 1, hit.chunk.title, hit.chunk.section_kind);
        }
    }
}

pub fn display_detailed_retrieval(result: &QueryResult) {
    if result.retrieved.is_empty() {
        println!("沒有檢索到相關文件");
        return;
    }
    println!("\n{}", "=".repeat(80));
    println!("🔍 詳細檢索結果");
    println!("{}", "=".repeat(80));
    for (i, hit) in result.retrieved.iter().enumerate() {
        println!("\n片段 {}:", i + 1);
        display_hit(hit);
    }
}

pub fn display_hit(hit: &SearchHit) {
    let chunk = &hit.chunk;
    println!("分數: {:.4}", hit.score);
    println!("標題: {}", chunk.title);
    println!("章節: {}", chunk.section_kind);
    println!("題目編號: {}", chunk.question_number);
    println!("類型: {}", chunk.source_type);
    println!("內容長度: {} 字元", chunk.content.chars().count());
    println!("{}", "-".repeat(40));
    let (head, cut) = preview(&chunk.content, PREVIEW_CHARS);
    println!("{}", head);
    if cut {
        println!("...");
    }
    println!("{}", "-".repeat(40));
}
