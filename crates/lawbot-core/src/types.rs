//! Domain types used by the extractor, the indexer and the agent.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::Error;

pub type ChunkId = String;

/// Which part of an exam-style answer a span holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    CaseFacts,
    AnswerStructure,
    KeyPoints,
    FullText,
}

impl SectionKind {
    /// Heading used in the corpus files and in rendered results.
    pub const fn label(self) -> &'static str {
        match self {
            SectionKind::CaseFacts => "案例事實",
            SectionKind::AnswerStructure => "答題架構",
            SectionKind::KeyPoints => "爭點記憶",
            SectionKind::FullText => "完整內容",
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            SectionKind::CaseFacts => "case_facts",
            SectionKind::AnswerStructure => "answer_structure",
            SectionKind::KeyPoints => "key_points",
            SectionKind::FullText => "full_text",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "case_facts" => Some(SectionKind::CaseFacts),
            "answer_structure" => Some(SectionKind::AnswerStructure),
            "key_points" => Some(SectionKind::KeyPoints),
            "full_text" => Some(SectionKind::FullText),
            _ => None,
        }
    }
}

impl fmt::Display for SectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Origin of a span: a header-delimited exam question or a plain paragraph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    ExamQuestion,
    Document,
}

impl SourceType {
    pub const fn label(self) -> &'static str {
        match self {
            SourceType::ExamQuestion => "法律考古題",
            SourceType::Document => "法律文件",
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            SourceType::ExamQuestion => "exam_question",
            SourceType::Document => "document",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "exam_question" => Some(SourceType::ExamQuestion),
            "document" => Some(SourceType::Document),
            _ => None,
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A titled, tagged segment of one source document.
///
/// `source_range` is the byte range of the unit the span was cut from, so
/// the ranges of consecutive spans tile the parsed text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSpan {
    pub content: String,
    pub title: String,
    pub section_kind: SectionKind,
    pub question_number: usize,
    pub source_type: SourceType,
    pub source_range: Range<usize>,
}

/// A bounded slice of a span's content; the unit that gets embedded.
///
/// - `id`: `<doc_id>:<chunk_index>`, unique inside a collection
/// - `doc_id`: file stem of the corpus file
/// - `doc_path`: path of the corpus file as indexed
/// - `title`/`section_kind`/`question_number`/`source_type`: copied from the parent span
/// - `chunk_index`/`total_chunks`: position within the collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub doc_id: String,
    pub doc_path: String,
    pub title: String,
    pub section_kind: SectionKind,
    pub question_number: usize,
    pub source_type: SourceType,
    pub content: String,
    pub chunk_index: usize,
    pub total_chunks: usize,
}

/// A chunk returned by similarity search. Higher `score` is better.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub chunk: Chunk,
    pub score: f32,
}

/// The closed set of routing labels.
///
/// Six legal categories of the special part of the Criminal Code, plus two
/// sentinels: `GeneralLegal` routes to the general knowledge base and
/// `NonLegal` short-circuits the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TopicLabel {
    LifeOffenses,
    HealthOffenses,
    LibertyOffenses,
    ReputationOffenses,
    PrivacyOffenses,
    PropertyOffenses,
    GeneralLegal,
    NonLegal,
}

impl TopicLabel {
    pub const ALL: [TopicLabel; 8] = [
        TopicLabel::LifeOffenses,
        TopicLabel::HealthOffenses,
        TopicLabel::LibertyOffenses,
        TopicLabel::ReputationOffenses,
        TopicLabel::PrivacyOffenses,
        TopicLabel::PropertyOffenses,
        TopicLabel::GeneralLegal,
        TopicLabel::NonLegal,
    ];

    /// The exact string the classifier must produce.
    pub const fn as_str(self) -> &'static str {
        match self {
            TopicLabel::LifeOffenses => "侵害生命法益之犯罪",
            TopicLabel::HealthOffenses => "侵害健康法益之犯罪",
            TopicLabel::LibertyOffenses => "侵害自由法益犯罪",
            TopicLabel::ReputationOffenses => "侵害名譽及信用犯罪",
            TopicLabel::PrivacyOffenses => "侵害秘密犯罪",
            TopicLabel::PropertyOffenses => "侵害個別財產法益之犯罪",
            TopicLabel::GeneralLegal => "rag",
            TopicLabel::NonLegal => "others",
        }
    }

    /// Key under `[topics]` in the configuration files.
    pub const fn config_key(self) -> &'static str {
        match self {
            TopicLabel::LifeOffenses => "life",
            TopicLabel::HealthOffenses => "health",
            TopicLabel::LibertyOffenses => "liberty",
            TopicLabel::ReputationOffenses => "reputation",
            TopicLabel::PrivacyOffenses => "privacy",
            TopicLabel::PropertyOffenses => "property",
            TopicLabel::GeneralLegal => "general",
            TopicLabel::NonLegal => "non_legal",
        }
    }

    pub const fn description(self) -> &'static str {
        match self {
            TopicLabel::LifeOffenses => "包含殺人罪章（普通殺人罪、殺直系血親尊親屬罪、義憤殺人罪、生母殺嬰罪、加工自殺罪）、遺棄罪章（單純遺棄罪、違背義務之遺棄罪）、墮胎罪章（自行或聽從墮胎罪、加工墮胎罪、圖利加工墮胎罪、未受囑託或未得承諾之墮胎罪、公然介紹墮胎罪）",
            TopicLabel::HealthOffenses => "包含傷害罪章（普通傷害罪及加重結果犯、重傷罪、義憤傷害罪、傷害直系血親尊親屬罪、加暴行於直系血親尊親屬、加工自傷罪、聚眾鬥毆罪、過失傷害罪、妨害幼童自然發育罪）",
            TopicLabel::LibertyOffenses => "包含妨害自由罪章（剝奪他人行動自由罪、強制罪、恐嚇危害安全罪、侵入住居罪、違法搜索罪）和妨害性自主罪章（強制性交罪、強制猥褻罪、趁機性交猥褻罪、與幼童性交猥褻罪、利用權勢性交猥褻罪、詐術性交罪）",
            TopicLabel::ReputationOffenses => "包含公然侮辱罪、誹謗罪、善意發表言論不罰、妨害信用罪等相關犯罪類型",
            TopicLabel::PrivacyOffenses => "包含妨害書信秘密罪、窺視竊聽竊錄罪、便利窺視竊聽竊錄及散布竊錄內容罪等侵害隱私秘密之犯罪",
            TopicLabel::PropertyOffenses => "包含竊盜罪章（普通竊盜罪與竊佔罪、加重竊盜罪）、搶奪強盜及海盜罪章（普通搶奪罪、普通強盜罪、準強盜罪、強盜結合罪）、恐嚇及擄人勒贖罪章（恐嚇取財得利罪、擄人勒贖罪）、侵占罪章（普通侵占罪、公務公益侵占罪、業務侵占罪、侵占脫離物罪）",
            TopicLabel::GeneralLegal => "一般法律諮詢，不涉及具體刑法分則內容，使用一般法律知識庫搜尋",
            TopicLabel::NonLegal => "使用者只是想要聊天，並非法律問題",
        }
    }

    pub const fn is_non_legal(self) -> bool {
        matches!(self, TopicLabel::NonLegal)
    }
}

impl fmt::Display for TopicLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TopicLabel {
    type Err = Error;

    /// Exact match only; near misses are a classification error.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TopicLabel::ALL
            .into_iter()
            .find(|label| label.as_str() == s)
            .ok_or_else(|| Error::Classification { output: s.to_string() })
    }
}

/// Output of the topic router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicDecision {
    pub label: TopicLabel,
    pub rationale: Option<String>,
}

/// Everything one `answer` call produced, including how far it got.
///
/// `error` is set when a step failed; the fields filled before the failure
/// stay populated so callers can render a partial result.
#[derive(Debug)]
pub struct QueryResult {
    pub query: String,
    pub topic: Option<TopicLabel>,
    pub rationale: Option<String>,
    pub corpus_file: Option<PathBuf>,
    pub collection: Option<String>,
    pub retrieved: Vec<SearchHit>,
    /// Retrieved chunks that fit into the answer prompt, in rank order
    pub sources: Vec<SearchHit>,
    pub answer: Option<String>,
    pub error: Option<Error>,
}

impl QueryResult {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            topic: None,
            rationale: None,
            corpus_file: None,
            collection: None,
            retrieved: Vec::new(),
            sources: Vec::new(),
            answer: None,
            error: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}
