use std::env;
use std::path::PathBuf;

use lawbot_cli::{bootstrap, build_indexer, display_hit, preview, PREVIEW_CHARS};
use lawbot_core::retry::with_timeout;
use lawbot_core::Error;

fn usage(prog: &str) -> ! {
    eprintln!("Usage: {} <corpus.txt> [query] [-k N] [--dump N]", prog);
    eprintln!("Example: {} data/qa.txt '什麼是準強盜罪？' -k 5", prog);
    std::process::exit(1);
}

fn number_after(args: &[String], i: usize, flag: &str) -> usize {
    match args.get(i + 1).and_then(|v| v.parse::<usize>().ok()) {
        Some(n) => n,
        None => {
            eprintln!("Error: {} requires a number", flag);
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        usage(&args[0]);
    }
    let settings = bootstrap()?;

    let mut source: Option<PathBuf> = None;
    let mut query: Option<String> = None;
    let mut k = settings.retrieval.top_k;
    let mut dump = None;
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-k" | "--limit" => {
                k = number_after(&args, i, "-k");
                i += 1;
            }
            "--dump" => {
                dump = Some(number_after(&args, i, "--dump"));
                i += 1;
            }
            arg if !arg.starts_with('-') => {
                if source.is_none() {
                    source = Some(PathBuf::from(arg));
                } else {
                    query = Some(arg.to_string());
                }
            }
            _ => usage(&args[0]),
        }
        i += 1;
    }
    let Some(source) = source else { usage(&args[0]) };

    let indexer = build_indexer(&settings)?;
    let collection = indexer.load_or_build(&source).await?;
    let manifest = collection.manifest();
    println!("🔍 lawbot-search\n================");
    println!("Source: {}", source.display());
    println!("Collection: {} ({} chunks)", manifest.name, manifest.chunk_count);
    println!("Embedder: {} (dim {}), built {}", manifest.embedder_id, manifest.dim, manifest.built_at.to_rfc3339());

    if let Some(limit) = dump {
        println!("\n📦 First {} chunks:", limit);
        for chunk in collection.peek(limit).await? {
            let (head, cut) = preview(&chunk.content, PREVIEW_CHARS);
            println!("\n  [{}/{}] {} - {} (題目 {})", chunk.chunk_index + 1, chunk.total_chunks, chunk.title, chunk.section_kind, chunk.question_number);
            println!("     📝 {}{}", head, if cut { "..." } else { "" });
        }
    }

    if let Some(query) = query {
        let embedder = indexer.embedder();
        let vector = with_timeout("embedding", settings.embedding.call_budget(), async {
            embedder.embed(&query).await.map_err(Error::EmbeddingProvider)
        })
        .await?;
        let hits = with_timeout("vector search", settings.retrieval.search_timeout(), collection.search(&vector, k)).await?;
        println!("\n🔍 Found {} results for: \"{}\"", hits.len(), query);
        for (i, hit) in hits.iter().enumerate() {
            println!("\n  {}.", i + 1);
            display_hit(hit);
        }
    } else if dump.is_none() {
        println!("\n💡 Pass a query to search, or --dump N to list chunks");
    }
    Ok(())
}
