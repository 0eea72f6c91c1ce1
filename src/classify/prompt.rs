//! Prompt construction.
//!
//! A prompt is one request per document: instructions, the category
//! schema, the expected response shape, and then the document content.
//! Only the content is ever shortened to fit the character budget.

use crate::config::PromptSettings;
use crate::model::{
    CategorySchema, ExtractionMode, ExtractionResult, ExtractionWarning, WarningKind,
};

const STANDARD_INSTRUCTIONS: &str = "あなたは優秀な文書分析AIアシスタントです。\
与えられたビジネス文書やプレゼンテーション資料を分析し、重要な知見を以下のカテゴリーに分類して抽出してください。\n\
文書から読み取れる内容を積極的に抽出し、各カテゴリーに分類してください。\
「情報が見つかりません」ではなく、具体的な内容を記述してください。\n\
各カテゴリーで1-5項目を目標に、日本語で明確かつ簡潔に記述してください。";

const DETAILED_INSTRUCTIONS: &str = "あなたは優秀な文書分析AIアシスタントです。\
与えられたビジネス文書の構造化された情報を分析し、重要な知見を以下のカテゴリーに分類して詳細に抽出してください。\n\
見出し、本文、表、脚注をすべて活用し、できるだけ詳細で具体的な内容を抽出してください。\
各項目にはページ番号も含めてください。\n\
各カテゴリーで3-10項目を目標に、日本語で明確かつ詳細に記述してください。";

const STRICT_INSTRUCTIONS: &str = "前回の回答は解析できませんでした。\
説明文やコードブロックを付けず、下記のキーを持つJSONオブジェクトだけを返してください。\
各キーの値は文字列の配列です。";

const HEADERS_BANNER: &str = "=== 見出し・タイトル ===";
const TABLES_BANNER: &str = "=== 表・データ ===";
const FOOTNOTES_BANNER: &str = "=== 脚注・補足情報 ===";

/// A finished prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub text: String,
    /// Whether document content was cut to fit the budget
    pub truncated: bool,
    pub warnings: Vec<ExtractionWarning>,
}

/// Builds model requests from an extraction result.
pub struct PromptBuilder<'a> {
    schema: &'a CategorySchema,
    prompts: &'a PromptSettings,
    max_chars: usize,
}

impl<'a> PromptBuilder<'a> {
    pub fn new(schema: &'a CategorySchema, prompts: &'a PromptSettings, max_chars: usize) -> Self {
        Self {
            schema,
            prompts,
            max_chars,
        }
    }

    /// Build the prompt for a document.
    pub fn build(&self, extraction: &ExtractionResult, mode: ExtractionMode) -> Prompt {
        let instructions = match mode {
            ExtractionMode::Standard => self.prompts.standard_instructions.as_deref(),
            ExtractionMode::Detailed => self.prompts.detailed_instructions.as_deref(),
        }
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(match mode {
            ExtractionMode::Standard => STANDARD_INSTRUCTIONS,
            ExtractionMode::Detailed => DETAILED_INSTRUCTIONS,
        });

        let head = format!(
            "{}\n\n{}\n{}\n{}",
            instructions,
            self.schema_block(mode),
            self.format_block(mode),
            document_header(extraction)
        );

        let mut content = String::new();
        if mode == ExtractionMode::Detailed {
            let appendix = structured_appendix(extraction);
            if !appendix.is_empty() {
                content.push_str(&appendix);
                content.push('\n');
            }
        }
        content.push_str("## 文書内容\n");
        content.push_str(extraction.body_text());

        self.assemble(head, content, extraction)
    }

    /// A shorter prompt for the single retry after an unusable response:
    /// a strict instruction, the key list, and half the content budget.
    pub fn build_strict(&self, extraction: &ExtractionResult, mode: ExtractionMode) -> Prompt {
        let head = format!(
            "{}\n\n{}\n{}",
            STRICT_INSTRUCTIONS,
            self.format_block(mode),
            document_header(extraction)
        );
        let content = format!("## 文書内容\n{}", extraction.body_text());
        let strict = PromptBuilder {
            max_chars: self.max_chars / 2,
            ..*self
        };
        strict.assemble(head, content, extraction)
    }

    fn assemble(&self, head: String, content: String, extraction: &ExtractionResult) -> Prompt {
        let budget = self.max_chars.saturating_sub(head.chars().count() + 1);
        let content_chars = content.chars().count();
        let mut warnings = Vec::new();

        let (content, truncated) = if content_chars > budget {
            let cut = truncate_chars(&content, budget);
            log::warn!(
                "{}: prompt content cut from {} to {} characters",
                extraction.source_name(),
                content_chars,
                budget
            );
            warnings.push(ExtractionWarning::new(
                WarningKind::Truncation,
                format!(
                    "document content cut from {} to {} characters",
                    content_chars, budget
                ),
            ));
            (cut, true)
        } else {
            (content.as_str(), false)
        };

        Prompt {
            text: format!("{}\n{}", head, content),
            truncated,
            warnings,
        }
    }

    /// Numbered category list with descriptions.
    fn schema_block(&self, mode: ExtractionMode) -> String {
        let mut block = String::from("## 抽出カテゴリー\n");
        for (i, category) in self.schema.active(mode).enumerate() {
            block.push_str(&format!(
                "{}. {} ({}): {}\n",
                i + 1,
                category.key,
                category.label,
                category.description
            ));
        }
        block
    }

    /// The JSON shape the response must follow.
    fn format_block(&self, mode: ExtractionMode) -> String {
        let keys = self.schema.keys(mode);
        let body = keys
            .iter()
            .map(|k| format!("  \"{}\": [\"...\"]", k))
            .collect::<Vec<_>>()
            .join(",\n");
        format!(
            "## 回答フォーマット\n次のキーを持つJSONオブジェクトで回答してください。\
             該当する内容がないカテゴリーは空の配列にしてください。\n{{\n{}\n}}\n",
            body
        )
    }
}

fn document_header(extraction: &ExtractionResult) -> String {
    let mut header = format!("## 文書情報\nファイル名: {}\n", extraction.source_name());
    if let Some(title) = extraction.title() {
        header.push_str(&format!("タイトル: {}\n", title));
    }
    if let Some(author) = extraction.author() {
        header.push_str(&format!("著者: {}\n", author));
    }
    header.push_str(&format!("ページ数: {}\n", extraction.page_count()));
    header
}

/// Headers, tables and footnotes listed by page under section banners.
/// Empty sections are left out.
pub fn structured_appendix(extraction: &ExtractionResult) -> String {
    let mut parts: Vec<String> = Vec::new();

    if !extraction.headers().is_empty() {
        parts.push(HEADERS_BANNER.to_string());
        for h in extraction.headers() {
            parts.push(format!("ページ{} (レベル{}): {}", h.page_number, h.level, h.text));
        }
        parts.push(String::new());
    }

    if !extraction.tables().is_empty() {
        parts.push(TABLES_BANNER.to_string());
        for t in extraction.tables() {
            parts.push(format!("ページ{}:", t.page_number));
            parts.push(t.render_compact());
            parts.push(String::new());
        }
    }

    if !extraction.footnotes().is_empty() {
        parts.push(FOOTNOTES_BANNER.to_string());
        for f in extraction.footnotes() {
            parts.push(format!("ページ{}: {}", f.page_number, f.text));
        }
        parts.push(String::new());
    }

    parts.join("\n")
}

/// The first `max` characters of `s`.
fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Footnote, Header, Table};

    fn extraction(body: &str) -> ExtractionResult {
        ExtractionResult {
            source_name: "report.pdf".into(),
            title: Some("市場レポート".into()),
            author: None,
            headers: vec![Header {
                text: "1. Introduction".into(),
                level: 1,
                font_size: 18.0,
                page_number: 1,
                spans: vec![],
            }],
            tables: vec![Table {
                page_number: 2,
                rows: vec![vec!["Region".into(), "Sales".into()]],
            }],
            footnotes: vec![Footnote {
                text: "1. See appendix".into(),
                marker_text: Some("1.".into()),
                page_number: 3,
                spans: vec![],
            }],
            body_text: body.into(),
            page_count: 3,
            total_pages: 3,
            warnings: vec![],
        }
    }

    #[test]
    fn test_standard_prompt_sections() {
        let schema = CategorySchema::default();
        let prompts = PromptSettings::default();
        let builder = PromptBuilder::new(&schema, &prompts, 30_000);
        let prompt = builder.build(&extraction("[[page 1]]\nhello"), ExtractionMode::Standard);

        assert!(!prompt.truncated);
        assert!(prompt.text.starts_with("あなたは優秀な文書分析AIアシスタントです。"));
        assert!(prompt.text.contains("1. concepts (概念・理論)"));
        assert!(prompt.text.contains("\"best_practices\": [\"...\"]"));
        assert!(!prompt.text.contains("detailed_info"));
        assert!(!prompt.text.contains(HEADERS_BANNER));
        assert!(prompt.text.contains("タイトル: 市場レポート"));
        assert!(prompt.text.ends_with("[[page 1]]\nhello"));
    }

    #[test]
    fn test_detailed_prompt_has_appendix() {
        let schema = CategorySchema::default();
        let prompts = PromptSettings::default();
        let builder = PromptBuilder::new(&schema, &prompts, 30_000);
        let prompt = builder.build(&extraction("[[page 1]]\nhello"), ExtractionMode::Detailed);

        assert!(prompt.text.contains("\"detailed_info\": [\"...\"]"));
        assert!(prompt.text.contains("=== 見出し・タイトル ===\nページ1 (レベル1): 1. Introduction"));
        assert!(prompt.text.contains("=== 表・データ ===\nページ2:\nRegion | Sales"));
        assert!(prompt.text.contains("=== 脚注・補足情報 ===\nページ3: 1. See appendix"));
    }

    #[test]
    fn test_custom_instructions_keep_schema() {
        let schema = CategorySchema::default();
        let prompts = PromptSettings {
            standard_instructions: Some("Summarize for engineers.".into()),
            ..Default::default()
        };
        let builder = PromptBuilder::new(&schema, &prompts, 30_000);
        let prompt = builder.build(&extraction("body"), ExtractionMode::Standard);
        assert!(prompt.text.starts_with("Summarize for engineers."));
        assert!(prompt.text.contains("## 抽出カテゴリー"));
        assert!(prompt.text.contains("## 回答フォーマット"));
    }

    #[test]
    fn test_truncation_cuts_content_only() {
        let schema = CategorySchema::default();
        let prompts = PromptSettings::default();
        let body = "あ".repeat(5000);
        let builder = PromptBuilder::new(&schema, &prompts, 2000);
        let prompt = builder.build(&extraction(&body), ExtractionMode::Standard);

        assert!(prompt.truncated);
        assert_eq!(prompt.warnings.len(), 1);
        assert_eq!(prompt.warnings[0].kind, WarningKind::Truncation);
        assert!(prompt.text.chars().count() <= 2000);
        assert!(prompt.text.contains("## 回答フォーマット"));
        assert!(prompt.text.contains("6. best_practices"));
    }

    #[test]
    fn test_strict_prompt_is_shorter() {
        let schema = CategorySchema::default();
        let prompts = PromptSettings::default();
        let builder = PromptBuilder::new(&schema, &prompts, 30_000);
        let ex = extraction("body text");
        let normal = builder.build(&ex, ExtractionMode::Standard);
        let strict = builder.build_strict(&ex, ExtractionMode::Standard);
        assert!(strict.text.starts_with(STRICT_INSTRUCTIONS));
        assert!(strict.text.len() < normal.text.len());
        assert!(strict.text.contains("\"concepts\""));
    }

    #[test]
    fn test_truncate_chars_boundary() {
        assert_eq!(truncate_chars("日本語", 2), "日本");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("abc", 0), "");
    }
}
