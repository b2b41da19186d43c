//! Fixed prompt templates for topic routing and answer synthesis.

use lawbot_core::types::{SearchHit, TopicLabel};

/// Reply for queries routed to the non-legal sentinel.
pub const REFUSAL: &str = "抱歉，我是法律專業助手，只能回答法律相關問題。請提出刑法相關的問題。";

const ROUTER_ROLE: &str = "你是一個專精台灣刑法分則的法律助手，能夠根據使用者的法律問題或案例，準確判斷所涉及的犯罪類型並選擇最相關的刑法分則主題。你具備深厚的刑法知識，熟悉各種犯罪的構成要件和分類體系。";

const ROUTER_TASK: &str = "根據使用者的刑法問題或案例描述，從台灣刑法分則的六大犯罪類型中選擇最相關的主題。請仔細分析問題所涉及的法益侵害類型和具體犯罪行為。";

const ROUTER_CRITERIA: &str = "選擇標準：
1. 優先考慮問題中明確提及的犯罪行為
2. 分析所侵害的法益類型（生命、健康、自由、名譽信用、秘密、財產）
3. 考慮犯罪的主要特徵和構成要件

特殊情況處理：
- 如果使用者問題是一般法律諮詢但不涉及具體刑法分則內容，請輸出 'rag' 以啟用一般法律知識庫搜尋
- 如果使用者只是想要聊天而非法律問題，請輸出 'others'
- 如果涉及多個犯罪類型，請選擇最主要或最嚴重的犯罪類型";

/// Worked routing examples: (query, analysis, label).
pub const ROUTER_DEMOS: [(&str, &str, TopicLabel); 5] = [
    ("某人故意殺害他人", "涉及故意殺人行為，侵害他人生命法益", TopicLabel::LifeOffenses),
    ("甲男強制乙女發生性關係", "涉及強制性交行為，侵害性自主權（自由法益）", TopicLabel::LibertyOffenses),
    ("竊取他人財物", "涉及竊盜行為，侵害他人財產法益", TopicLabel::PropertyOffenses),
    ("在網路上公然辱罵他人", "涉及公然侮辱行為，侵害他人名譽", TopicLabel::ReputationOffenses),
    ("用拳頭毆打他人造成受傷", "涉及傷害行為，侵害他人身體健康法益", TopicLabel::HealthOffenses),
];

const ANSWER_PREAMBLE: &str = "你是一位專業的法律學者，專精於刑法。請根據以下相關的法律資料回答問題。";

const ANSWER_INSTRUCTIONS: &str = "請提供詳細且準確的法律分析，包括：
1. 相關法條
2. 構成要件分析
3. 學說和實務見解
4. 具體的法律適用

回答：";

/// Classification prompt for `query`. The model is asked for a JSON object
/// `{"reasoning": ..., "topic": ...}` whose topic is one of the closed labels.
pub fn router_prompt(query: &str) -> String {
    let mut parts = Vec::with_capacity(8);
    parts.push(format!("<role>\n{ROUTER_ROLE}\n</role>"));
    parts.push(format!("<task>\n{ROUTER_TASK}\n</task>"));

    let labels = TopicLabel::ALL
        .iter()
        .map(|label| format!("- {}：{}", label.as_str(), label.description()))
        .collect::<Vec<_>>()
        .join("\n");
    parts.push(format!("<topics>\n{labels}\n</topics>"));

    parts.push(format!(
        "<output_format>\n請選擇一個最相關的主題，以 JSON 物件輸出：{{\"reasoning\": \"一句話說明判斷理由\", \"topic\": \"主題名稱\"}}\ntopic 必須與上列主題名稱完全相同，例如：'{}'\n\n{ROUTER_CRITERIA}\n</output_format>",
        TopicLabel::LifeOffenses.as_str()
    ));

    let demos = ROUTER_DEMOS
        .iter()
        .enumerate()
        .map(|(i, (q, analysis, label))| {
            format!("範例{}：\n使用者問題：「{q}」\n分析：{analysis}\n答案：{}", i + 1, label.as_str())
        })
        .collect::<Vec<_>>()
        .join("\n\n");
    parts.push(format!("<examples>\n{demos}\n</examples>"));

    parts.push(format!("使用者問題：「{query}」\n只輸出 JSON 物件，不要輸出其他內容。\nJSON:"));
    parts.join("\n\n")
}

/// Retrieved context and question are inserted verbatim; braces inside
/// either are never treated as placeholders.
pub fn answer_prompt(context: &str, question: &str) -> String {
    format!("{ANSWER_PREAMBLE}\n\n相關資料：\n{context}\n\n問題：{question}\n\n{ANSWER_INSTRUCTIONS}")
}

/// Join retrieved chunks in rank order until adding the next one would push
/// the context past `max_chars` characters. The first hit is always kept.
/// Returns the context and the hits it contains.
pub fn compose_context(hits: &[SearchHit], max_chars: usize) -> (String, Vec<SearchHit>) {
    const SEPARATOR: &str = "\n\n";
    let mut context = String::new();
    let mut used_chars = 0usize;
    let mut sources = Vec::new();
    for hit in hits {
        let len = hit.chunk.content.chars().count();
        let extra = if sources.is_empty() { len } else { len + SEPARATOR.len() };
        if !sources.is_empty() && used_chars + extra > max_chars {
            break;
        }
        if !sources.is_empty() {
            context.push_str(SEPARATOR);
        }
        context.push_str(&hit.chunk.content);
        used_chars += extra;
        sources.push(hit.clone());
    }
    (context, sources)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lawbot_core::types::{Chunk, SectionKind, SourceType};

    fn hit(i: usize, content: &str, score: f32) -> SearchHit {
        SearchHit {
            chunk: Chunk {
                id: format!("qa:{i}"),
                doc_id: "qa".into(),
                doc_path: "qa.txt".into(),
                title: format!("{}. 題目", i + 1),
                section_kind: SectionKind::FullText,
                question_number: i + 1,
                source_type: SourceType::ExamQuestion,
                content: content.into(),
                chunk_index: i,
                total_chunks: 3,
            },
            score,
        }
    }

    #[test]
    fn router_prompt_lists_every_label_and_demo() {
        let prompt = router_prompt("某人故意殺害他人，應該如何論處？");
        for label in TopicLabel::ALL {
            assert!(prompt.contains(label.as_str()), "missing {label:?}");
        }
        for (q, _, _) in ROUTER_DEMOS {
            assert!(prompt.contains(q));
        }
        assert!(prompt.contains("\"reasoning\""));
        assert!(prompt.ends_with("JSON:"));
        assert!(prompt.contains("使用者問題：「某人故意殺害他人，應該如何論處？」"));
    }

    #[test]
    fn answer_prompt_fills_both_slots() {
        let prompt = answer_prompt("刑法第271條", "殺人罪的構成要件？");
        assert!(prompt.contains("相關資料：\n刑法第271條\n"));
        assert!(prompt.contains("問題：殺人罪的構成要件？"));
        assert!(!prompt.contains("{context}"));
        assert!(prompt.ends_with("回答："));
    }

    #[test]
    fn braces_in_context_are_left_alone() {
        let context = "範本寫法：{question} 與 {context}";
        let prompt = answer_prompt(context, "什麼是準強盜罪？");
        assert!(prompt.contains("相關資料：\n範本寫法：{question} 與 {context}\n"));
        assert_eq!(prompt.matches("什麼是準強盜罪？").count(), 1);
    }

    #[test]
    fn context_keeps_rank_order_within_budget() {
        let hits = vec![hit(0, "甲甲甲甲", 0.9), hit(1, "乙乙乙", 0.8), hit(2, "丙丙丙丙丙", 0.7)];
        let (context, sources) = compose_context(&hits, 9);
        assert_eq!(context, "甲甲甲甲\n\n乙乙乙");
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].chunk.id, "qa:0");
    }

    #[test]
    fn first_hit_survives_a_tiny_budget() {
        let hits = vec![hit(0, "很長的一段法律資料", 0.9), hit(1, "短", 0.8)];
        let (context, sources) = compose_context(&hits, 1);
        assert_eq!(context, "很長的一段法律資料");
        assert_eq!(sources.len(), 1);
    }

    #[test]
    fn no_hits_give_empty_context() {
        let (context, sources) = compose_context(&[], 100);
        assert!(context.is_empty());
        assert!(sources.is_empty());
    }
}
