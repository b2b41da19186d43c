use std::path::{Path, PathBuf};

const MAX_SLUG_LEN: usize = 48;

/// Collection name for a corpus file: `<slug of stem>-<16 hex of path hash>`.
///
/// Depends only on the file's location, never on its content. The path is
/// canonicalized when it exists so `./data/qa.txt` and `data/qa.txt` agree.
pub fn collection_name(source: &Path) -> String {
    let stem = source.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default();
    let canonical = canonical_path(source);
    let hash = blake3::hash(canonical.to_string_lossy().as_bytes()).to_hex();
    format!("{}-{}", slug(&stem), &hash.as_str()[..16])
}

fn canonical_path(source: &Path) -> PathBuf {
    source
        .canonicalize()
        .or_else(|_| std::path::absolute(source))
        .unwrap_or_else(|_| source.to_path_buf())
}

fn slug(stem: &str) -> String {
    let mut out = String::with_capacity(stem.len());
    for c in stem.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }
    let trimmed: String = out.trim_matches('-').chars().take(MAX_SLUG_LEN).collect();
    if trimmed.is_empty() { "corpus".to_string() } else { trimmed }
}
