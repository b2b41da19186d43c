use std::env;
use std::path::PathBuf;
use std::time::Instant;

use lawbot_cli::{bootstrap, build_indexer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = bootstrap()?;
    let args: Vec<String> = env::args().skip(1).collect();
    let mut force = false;
    let mut target = None;
    for arg in &args {
        match arg.as_str() {
            "--force" | "-f" => force = true,
            "--help" | "-h" => {
                eprintln!("Usage: lawbot-indexer [file.txt | directory] [--force]");
                std::process::exit(0);
            }
            _ if !arg.starts_with('-') => target = Some(PathBuf::from(arg)),
            _ => {
                eprintln!("Error: unknown flag {}", arg);
                std::process::exit(1);
            }
        }
    }
    let target = target.unwrap_or_else(|| settings.corpus_dir());

    let indexer = build_indexer(&settings)?;
    println!("LawBot Corpus Indexer\n=====================");
    println!("Source: {}", target.display());
    println!("Collections: {}", indexer.root().display());
    if force {
        println!("⚠️  Rebuilding existing collections (--force)");
    }

    let files = if target.is_dir() { indexer.processor().list_txt_files(&target) } else { vec![target.clone()] };
    if files.is_empty() {
        println!("No .txt files found under {}", target.display());
        return Ok(());
    }

    let start = Instant::now();
    let mut failed = 0usize;
    for file in &files {
        match indexer.index_file(file, force).await {
            Ok(collection) => {
                let count = collection.count().await?;
                println!("✅ {} -> {} ({} chunks)", file.display(), collection.name(), count);
            }
            Err(e) => {
                failed += 1;
                eprintln!("❌ {}: {}", file.display(), e);
            }
        }
    }
    println!("\n📊 Indexed {} of {} files in {:.1}s", files.len() - failed, files.len(), start.elapsed().as_secs_f64());
    println!("💡 To inspect a collection, use: cargo run --bin lawbot-search <file.txt> '<query>'");
    if failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}
