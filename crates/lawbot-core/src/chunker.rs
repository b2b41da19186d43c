//! Recursive separator-based chunking.
//!
//! Text is split on the first separator (in priority order) that occurs in
//! it; pieces still too long are split again with the remaining separators,
//! down to single characters. Short pieces are merged back into windows of
//! at most `chunk_size` characters that overlap by up to `chunk_overlap`.
//! Separators stay attached to the start of the piece that follows them.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::types::{Chunk, TextSpan};

/// Paragraph, line, sentence, clause, word, character.
pub const DEFAULT_SEPARATORS: [&str; 7] = ["\n\n", "\n", "。", "；", "，", " ", ""];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Max characters per chunk
    pub chunk_size: usize,
    /// Characters carried over from the previous chunk
    pub chunk_overlap: usize,
    pub separators: Vec<String>,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            separators: DEFAULT_SEPARATORS.iter().map(|s| (*s).to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RecursiveSplitter {
    config: ChunkingConfig,
}

impl RecursiveSplitter {
    pub fn new(config: ChunkingConfig) -> Self {
        Self { config }
    }

    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_with(text, &self.config.separators)
    }

    /// Chunk every span of one document, numbering chunks across the document.
    pub fn chunk_spans(&self, doc_id: &str, doc_path: &str, spans: &[TextSpan]) -> Vec<Chunk> {
        let mut chunks: Vec<Chunk> = Vec::new();
        for span in spans {
            for content in self.split_text(&span.content) {
                let chunk_index = chunks.len();
                chunks.push(Chunk {
                    id: format!("{doc_id}:{chunk_index}"),
                    doc_id: doc_id.to_string(),
                    doc_path: doc_path.to_string(),
                    title: span.title.clone(),
                    section_kind: span.section_kind,
                    question_number: span.question_number,
                    source_type: span.source_type,
                    content,
                    chunk_index,
                    total_chunks: 0,
                });
            }
        }
        let total_chunks = chunks.len();
        for chunk in &mut chunks {
            chunk.total_chunks = total_chunks;
        }
        chunks
    }

    fn split_with(&self, text: &str, separators: &[String]) -> Vec<String> {
        let mut separator = separators.last().map_or("", String::as_str);
        let mut remaining: &[String] = &[];
        for (i, sep) in separators.iter().enumerate() {
            if sep.is_empty() {
                separator = "";
                break;
            }
            if text.contains(sep.as_str()) {
                separator = sep.as_str();
                remaining = &separators[i + 1..];
                break;
            }
        }

        let mut out = Vec::new();
        let mut good: Vec<&str> = Vec::new();
        for piece in split_keeping_separator(text, separator) {
            if piece.chars().count() < self.config.chunk_size {
                good.push(piece);
                continue;
            }
            if !good.is_empty() {
                out.extend(self.merge(&good));
                good.clear();
            }
            if remaining.is_empty() {
                out.push(piece.to_string());
            } else {
                out.extend(self.split_with(piece, remaining));
            }
        }
        if !good.is_empty() {
            out.extend(self.merge(&good));
        }
        out
    }

    fn merge(&self, pieces: &[&str]) -> Vec<String> {
        let ChunkingConfig { chunk_size, chunk_overlap, .. } = self.config;
        let mut docs = Vec::new();
        let mut window: VecDeque<(&str, usize)> = VecDeque::new();
        let mut total = 0usize;
        for &piece in pieces {
            let len = piece.chars().count();
            if total + len > chunk_size && !window.is_empty() {
                push_joined(&mut docs, &window);
                while total > chunk_overlap || (total + len > chunk_size && total > 0) {
                    let Some((_, front_len)) = window.pop_front() else { break };
                    total -= front_len;
                }
            }
            window.push_back((piece, len));
            total += len;
        }
        push_joined(&mut docs, &window);
        docs
    }
}

fn push_joined(docs: &mut Vec<String>, window: &VecDeque<(&str, usize)>) {
    let joined: String = window.iter().map(|(piece, _)| *piece).collect();
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        docs.push(trimmed.to_string());
    }
}

/// Split `text` before every occurrence of `sep`; an empty separator splits
/// into characters. Pieces are contiguous slices of `text`.
fn split_keeping_separator<'a>(text: &'a str, sep: &str) -> Vec<&'a str> {
    if sep.is_empty() {
        return text.char_indices().map(|(i, c)| &text[i..i + c.len_utf8()]).collect();
    }
    let mut pieces = Vec::new();
    let mut last = 0;
    for (idx, _) in text.match_indices(sep) {
        if idx > last {
            pieces.push(&text[last..idx]);
        }
        last = idx;
    }
    if last < text.len() {
        pieces.push(&text[last..]);
    }
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;

    fn splitter(chunk_size: usize, chunk_overlap: usize) -> RecursiveSplitter {
        RecursiveSplitter::new(ChunkingConfig { chunk_size, chunk_overlap, ..ChunkingConfig::default() })
    }

    #[test]
    fn separator_attaches_to_following_piece() {
        assert_eq!(split_keeping_separator("a。b。c", "。"), vec!["a", "。b", "。c"]);
        assert_eq!(split_keeping_separator("\n\n\n\nx", "\n\n"), vec!["\n\n", "\n\nx"]);
        assert_eq!(split_keeping_separator("甲乙", ""), vec!["甲", "乙"]);
    }

    #[test]
    fn short_text_is_one_chunk() {
        assert_eq!(splitter(1000, 200).split_text("  甲殺乙。  "), vec!["甲殺乙。"]);
    }

    #[test]
    fn prefers_paragraph_boundaries() {
        let a = "甲".repeat(6);
        let b = "乙".repeat(6);
        let text = format!("{a}\n\n{b}");
        assert_eq!(splitter(10, 0).split_text(&text), vec![a, b]);
    }

    #[test]
    fn falls_back_to_sentence_then_characters() {
        let text = format!("{}。{}", "甲".repeat(4), "乙".repeat(12));
        let chunks = splitter(10, 0).split_text(&text);
        assert_eq!(chunks[0], "甲甲甲甲");
        assert!(chunks.iter().all(|c| c.chars().count() <= 10));
        let rebuilt: String = chunks.concat();
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn without_sentences_cuts_land_on_commas() {
        let text = format!("{}，{}，{}", "甲".repeat(6), "乙".repeat(6), "丙".repeat(6));
        let chunks = splitter(10, 0).split_text(&text);
        assert_eq!(chunks, vec!["甲".repeat(6), format!("，{}", "乙".repeat(6)), format!("，{}", "丙".repeat(6))]);
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn semicolon_outranks_comma() {
        let chunks = splitter(8, 0).split_text("甲甲甲，甲甲；乙乙，乙乙乙乙");
        assert_eq!(chunks, vec!["甲甲甲，甲甲", "；乙乙，乙乙乙乙"]);
    }

    #[test]
    fn windows_overlap() {
        let text = "一二三四五六七八九十".repeat(3);
        let chunks = splitter(10, 4).split_text(&text);
        assert!(chunks.len() > 3);
        for pair in chunks.windows(2) {
            let tail: String = pair[0].chars().rev().take(4).collect::<Vec<_>>().into_iter().rev().collect();
            assert!(pair[1].starts_with(&tail), "{:?} should start with {tail:?}", pair[1]);
        }
    }
}
