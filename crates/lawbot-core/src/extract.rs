//! Section extraction: splits a legal text into titled, tagged spans.
//!
//! Header patterns are tried in order and the first one with at least one
//! match decides the unit boundaries. Each unit is then searched for the
//! case facts, answer structure and key points sub-sections. Texts with no
//! header at all fall back to blank-line paragraphs.

use regex::Regex;
use std::ops::Range;
use std::sync::LazyLock;
use tracing::debug;

use crate::types::{SectionKind, SourceType, TextSpan};

/// Default unit delimiters, most specific first.
pub const DEFAULT_HEADER_PATTERNS: [&str; 4] = [
    r"\d+\.\s*\d+年?[^0-9]*?\d+",
    r"\d+\.\s*[^\n]*",
    r"【.*?】",
    r"第\d+題",
];

pub const DEFAULT_MIN_PARAGRAPH_CHARS: usize = 50;

const KEY_POINTS_MARKER: &str = "【爭點記憶】";

// The last pattern is lazy and only ever captures the leading party marker.
static FACT_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [r"(?s)甲.*?請問.*?罪責？", r"(?s)甲.*?試問.*?如何\?", r"(?s)甲.*?請.*?分析", r"(?s)甲.*?"]
        .iter()
        .map(|p| Regex::new(p).expect("built-in fact pattern"))
        .collect()
});

static STRUCTURE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)【答題架構】(.*?)(?:【爭點記憶】|$)").expect("built-in structure pattern"));

static NUMBERED_ITEM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+\.").expect("built-in numbered item pattern"));

static DEFAULT_HEADERS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    DEFAULT_HEADER_PATTERNS
        .iter()
        .map(|p| Regex::new(p).expect("built-in header pattern"))
        .collect()
});

#[derive(Debug, Clone)]
pub struct SectionExtractor {
    header_patterns: Vec<Regex>,
    min_paragraph_chars: usize,
}

impl Default for SectionExtractor {
    fn default() -> Self {
        Self { header_patterns: DEFAULT_HEADERS.clone(), min_paragraph_chars: DEFAULT_MIN_PARAGRAPH_CHARS }
    }
}

impl SectionExtractor {
    pub fn new(min_paragraph_chars: usize) -> Self {
        Self { min_paragraph_chars, ..Self::default() }
    }

    /// Replace the ordered header pattern list.
    pub fn with_header_patterns(mut self, patterns: &[&str]) -> Result<Self, regex::Error> {
        self.header_patterns = patterns.iter().map(|p| Regex::new(p)).collect::<Result<_, _>>()?;
        Ok(self)
    }

    pub fn extract(&self, text: &str) -> Vec<TextSpan> {
        if text.trim().is_empty() {
            return Vec::new();
        }
        match self.header_starts(text) {
            Some((pattern, starts)) => {
                debug!(pattern, matches = starts.len(), "header pattern matched");
                units(text, &starts)
                    .into_iter()
                    .flat_map(|(number, range)| unit_spans(text, number, range))
                    .collect()
            }
            None => {
                debug!("no header pattern matched, splitting by paragraph");
                self.paragraph_spans(text)
            }
        }
    }

    /// Start offsets of the first pattern that matches anywhere.
    fn header_starts<'a>(&'a self, text: &str) -> Option<(&'a str, Vec<usize>)> {
        self.header_patterns.iter().find_map(|re| {
            let starts: Vec<usize> = re.find_iter(text).map(|m| m.start()).collect();
            (!starts.is_empty()).then(|| (re.as_str(), starts))
        })
    }

    fn paragraph_spans(&self, text: &str) -> Vec<TextSpan> {
        let mut spans = Vec::new();
        let mut offset = 0;
        for (i, para) in text.split("\n\n").enumerate() {
            let range = offset..offset + para.len();
            offset = range.end + 2;
            let content = para.trim();
            if content.is_empty() || content.chars().count() < self.min_paragraph_chars {
                continue;
            }
            spans.push(TextSpan {
                content: content.to_string(),
                title: format!("段落 {}", i + 1),
                section_kind: SectionKind::FullText,
                question_number: i + 1,
                source_type: SourceType::Document,
                source_range: range,
            });
        }
        spans
    }
}

/// Unit ranges with their question numbers. Non-blank text before the first
/// header becomes unit 0.
fn units(text: &str, starts: &[usize]) -> Vec<(usize, Range<usize>)> {
    let mut out = Vec::with_capacity(starts.len() + 1);
    if let Some(&first) = starts.first() {
        if !text[..first].trim().is_empty() {
            out.push((0, 0..first));
        }
    }
    for (i, &start) in starts.iter().enumerate() {
        let end = starts.get(i + 1).copied().unwrap_or(text.len());
        out.push((i + 1, start..end));
    }
    out
}

fn unit_spans(text: &str, question_number: usize, range: Range<usize>) -> Vec<TextSpan> {
    let unit = text[range.clone()].trim();
    if unit.is_empty() {
        return Vec::new();
    }
    let title = unit.lines().next().unwrap_or_default().to_string();
    let mut sections = sub_sections(unit);
    if sections.is_empty() {
        sections.push((SectionKind::FullText, unit));
    }
    sections
        .into_iter()
        .map(|(section_kind, content)| TextSpan {
            content: content.to_string(),
            title: title.clone(),
            section_kind,
            question_number,
            source_type: SourceType::ExamQuestion,
            source_range: range.clone(),
        })
        .collect()
}

/// Named sub-sections of one unit, in fixed order. Overlaps between them are
/// kept as found.
fn sub_sections(unit: &str) -> Vec<(SectionKind, &str)> {
    let mut found = Vec::with_capacity(3);
    if let Some(m) = FACT_PATTERNS.iter().find_map(|re| re.find(unit)) {
        found.push((SectionKind::CaseFacts, m.as_str()));
    }
    if let Some(c) = STRUCTURE_PATTERN.captures(unit).and_then(|c| c.get(1)) {
        found.push((SectionKind::AnswerStructure, c.as_str()));
    }
    if let Some(points) = key_points(unit) {
        found.push((SectionKind::KeyPoints, points));
    }
    found.retain(|(_, content)| !content.trim().is_empty());
    found
}

/// Text after the key points marker up to the next numbered item.
fn key_points(unit: &str) -> Option<&str> {
    let start = unit.find(KEY_POINTS_MARKER)? + KEY_POINTS_MARKER.len();
    let rest = &unit[start..];
    let end = NUMBERED_ITEM.find(rest).map_or(rest.len(), |m| m.start());
    Some(&rest[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structure_stops_at_key_points() {
        let unit = "【答題架構】一、構成要件\n二、違法性【爭點記憶】故意之認定";
        let secs = sub_sections(unit);
        assert_eq!(secs, vec![
            (SectionKind::AnswerStructure, "一、構成要件\n二、違法性"),
            (SectionKind::KeyPoints, "故意之認定"),
        ]);
    }

    #[test]
    fn key_points_end_at_numbered_item() {
        assert_eq!(key_points("x【爭點記憶】殺人既遂 2.下一題"), Some("殺人既遂 "));
        assert_eq!(key_points("no marker"), None);
    }

    #[test]
    fn permissive_fact_pattern_captures_party_marker_only() {
        let secs = sub_sections("甲持刀刺乙");
        assert_eq!(secs, vec![(SectionKind::CaseFacts, "甲")]);
    }

    #[test]
    fn preamble_becomes_unit_zero() {
        let text = "前言說明\n第1題 甲殺乙\n第2題 丙竊盜";
        let starts: Vec<usize> = DEFAULT_HEADERS[3].find_iter(text).map(|m| m.start()).collect();
        let u = units(text, &starts);
        assert_eq!(u.len(), 3);
        assert_eq!(u[0], (0, 0..starts[0]));
        assert_eq!(u[2].1.end, text.len());
    }
}
