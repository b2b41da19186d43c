use encoding_rs::{Encoding, BIG5, GBK, UTF_8};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::Settings;
use crate::error::{Error, Result};
use crate::extract::SectionExtractor;
use crate::types::TextSpan;

/// Decoders tried in order. WHATWG Big5 includes the cp950 extensions and
/// the gb2312 label resolves to GBK.
pub fn corpus_encodings() -> [(&'static str, &'static Encoding); 3] {
    [("utf-8", UTF_8), ("big5", BIG5), ("gb2312", GBK)]
}

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Read a corpus file, trying each fallback encoding strictly.
pub fn read_corpus(path: &Path) -> Result<String> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(Error::CorpusMissing(path.to_path_buf())),
        Err(e) => return Err(e.into()),
    };
    decode(path, &bytes)
}

fn decode(path: &Path, bytes: &[u8]) -> Result<String> {
    let encodings = corpus_encodings();
    let mut tried = Vec::with_capacity(encodings.len());
    for (name, encoding) in encodings {
        let input = if encoding == UTF_8 { bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes) } else { bytes };
        if let Some(text) = encoding.decode_without_bom_handling_and_without_replacement(input) {
            debug!(path = %path.display(), encoding = name, "decoded corpus file");
            return Ok(text.into_owned());
        }
        debug!(path = %path.display(), encoding = name, "decode failed, trying next encoding");
        tried.push(name);
    }
    Err(Error::Decode { path: path.to_path_buf(), tried })
}

/// Reads corpus files and turns them into spans.
#[derive(Debug, Clone, Default)]
pub struct CorpusProcessor {
    extractor: SectionExtractor,
}

impl CorpusProcessor {
    pub fn new(extractor: SectionExtractor) -> Self {
        Self { extractor }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(SectionExtractor::new(settings.extract.min_paragraph_chars))
    }

    pub fn process_file(&self, path: &Path) -> Result<Vec<TextSpan>> {
        let text = read_corpus(path)?;
        let spans = self.extractor.extract(&text);
        info!(path = %path.display(), chars = text.chars().count(), spans = spans.len(), "extracted corpus file");
        Ok(spans)
    }

    pub fn list_txt_files(&self, root: &Path) -> Vec<PathBuf> {
        let mut txt_files: Vec<PathBuf> = walkdir::WalkDir::new(root)
            .into_iter()
            .filter_map(std::result::Result::ok)
            .filter(|e| e.file_type().is_file())
            .map(walkdir::DirEntry::into_path)
            .filter(|p| p.extension().and_then(|s| s.to_str()) == Some("txt"))
            .collect();
        txt_files.sort();
        txt_files
    }
}

/// Stable document id for a corpus file: its file stem.
pub fn doc_id(path: &Path) -> String {
    path.file_stem().map_or_else(|| "corpus".to_string(), |s| s.to_string_lossy().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_utf8_bom() {
        let text = decode(Path::new("x.txt"), "\u{feff}甲殺乙".as_bytes()).expect("utf-8");
        assert_eq!(text, "甲殺乙");
    }

    #[test]
    fn falls_back_to_big5() {
        let (bytes, _, had_errors) = BIG5.encode("刑法分則：殺人罪");
        assert!(!had_errors);
        assert!(std::str::from_utf8(&bytes).is_err());
        assert_eq!(decode(Path::new("x.txt"), &bytes).expect("big5"), "刑法分則：殺人罪");
    }

    #[test]
    fn doc_id_is_file_stem() {
        assert_eq!(doc_id(Path::new("/data/specific_offences_ch1.txt")), "specific_offences_ch1");
    }
}
