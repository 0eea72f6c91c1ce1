//! Mapping untrusted model output onto the category schema.
//!
//! The raw response goes down a ladder of parsers, each a pure function:
//! strict JSON, repaired JSON (largest balanced object, or a truncated
//! object closed off), then a line-based reading of headings and bullets.
//! Whatever comes out is checked against the schema, and in detailed mode
//! the structural elements are appended to `detailed_info`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::model::{
    CategorizedKnowledge, CategorySchema, ClassificationStatus, ExtractionMode, ExtractionResult,
    ExtractionWarning, KnowledgeMetadata, WarningKind, DETAILED_INFO,
};

/// Upper bound on candidate substrings tried during repair.
const MAX_REPAIR_ATTEMPTS: usize = 64;
/// Characters of a response shown in debug logs.
const LOG_PREVIEW_CHARS: usize = 200;

const PLACEHOLDERS: &[&str] = &["n/a", "na", "none", "null", "nil", "なし", "該当なし", "不明", "..."];
const PLACEHOLDER_PREFIXES: &[&str] = &["情報は見つかりません", "情報が見つかりません"];

/// Result of parsing a raw response as a JSON object.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    /// The response was a JSON object, possibly inside a code fence.
    Valid(Map<String, Value>),
    /// A JSON object was recovered from surrounding text or truncation.
    Repaired(Map<String, Value>),
    Unparseable,
}

/// Which rung of the ladder produced the categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Json,
    RepairedJson,
    Lines,
}

/// A reconciled record plus what happened on the way.
#[derive(Debug, Clone)]
pub struct Reconciliation {
    pub knowledge: CategorizedKnowledge,
    pub source: ResponseSource,
    /// Categories filled from the model's answer, before structural
    /// synthesis
    pub model_populated: usize,
    pub warnings: Vec<ExtractionWarning>,
}

impl Reconciliation {
    /// Whether the model contributed nothing usable.
    pub fn is_failed(&self) -> bool {
        self.knowledge.status() == ClassificationStatus::Failed
    }
}

/// Strip a surrounding Markdown code fence, if any.
pub fn strip_code_fence(raw: &str) -> &str {
    let Some(open) = raw.find("```") else {
        return raw;
    };
    let after = &raw[open + 3..];
    let body_start = after.find('\n').map(|i| i + 1).unwrap_or(after.len());
    let body = &after[body_start..];
    match body.find("```") {
        Some(close) => &body[..close],
        None => body,
    }
}

/// Parse the response as a JSON object, as-is.
pub fn parse_strict(raw: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(strip_code_fence(raw).trim()) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// Recover a JSON object from a response that does not parse as a whole.
///
/// Balanced `{...}` substrings are tried largest first, and an object cut
/// off mid-way is closed at its last complete value. When the first `{`
/// is never closed, the cut-off object is the answer and its nested
/// objects are only a fallback.
pub fn repair(raw: &str) -> Option<Map<String, Value>> {
    let mut candidates = balanced_objects(raw);
    let outer_closed = raw
        .find('{')
        .is_some_and(|first| candidates.iter().any(|(start, _)| *start == first));
    if !outer_closed {
        if let Some(map) = close_truncated(raw) {
            return Some(map);
        }
    }

    candidates.sort_by_key(|(start, end)| std::cmp::Reverse(end - start));
    for (start, end) in candidates.into_iter().take(MAX_REPAIR_ATTEMPTS) {
        if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(&raw[start..end]) {
            return Some(map);
        }
    }
    if outer_closed {
        close_truncated(raw)
    } else {
        None
    }
}

/// Run the JSON rungs of the ladder.
pub fn parse_response(raw: &str) -> ParseOutcome {
    if let Some(map) = parse_strict(raw) {
        return ParseOutcome::Valid(map);
    }
    match repair(raw) {
        Some(map) => ParseOutcome::Repaired(map),
        None => ParseOutcome::Unparseable,
    }
}

/// Byte ranges of every balanced `{...}` in `text`, skipping braces
/// inside JSON strings.
fn balanced_objects(text: &str) -> Vec<(usize, usize)> {
    let mut ranges = Vec::new();
    let mut starts: Vec<usize> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' if !starts.is_empty() => in_string = true,
            '{' => starts.push(i),
            '}' => {
                if let Some(start) = starts.pop() {
                    ranges.push((start, i + 1));
                }
            }
            _ => {}
        }
    }
    ranges
}

/// Close an object whose text ends before its closing brace.
fn close_truncated(raw: &str) -> Option<Map<String, Value>> {
    let text = &raw[raw.find('{')?..];
    let mut pending: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;
    // (cut position, closers needed there)
    let mut cuts: Vec<(usize, String)> = Vec::new();

    for (i, c) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
                cuts.push((i + 1, pending.iter().rev().collect()));
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => pending.push('}'),
            '[' => pending.push(']'),
            '}' | ']' => {
                if pending.pop() != Some(c) {
                    return None;
                }
                if pending.is_empty() {
                    break;
                }
                cuts.push((i + 1, pending.iter().rev().collect()));
            }
            _ => {}
        }
    }

    cuts.iter()
        .rev()
        .take(MAX_REPAIR_ATTEMPTS)
        .find_map(|(cut, closers)| {
            match serde_json::from_str::<Value>(&format!("{}{}", &text[..*cut], closers)) {
                Ok(Value::Object(map)) => Some(map),
                _ => None,
            }
        })
}

/// Read categories from free text: a heading line naming a category
/// starts a section, and bulleted or numbered lines under it are items.
/// Lines outside any section are dropped.
pub fn parse_lines(
    raw: &str,
    schema: &CategorySchema,
    mode: ExtractionMode,
) -> BTreeMap<String, Vec<String>> {
    let mut found: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut current: Option<String> = None;

    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some((key, rest)) = heading_category(line, schema, mode) {
            if let Some(item) = rest.filter(|r| !r.is_empty()) {
                found.entry(key.clone()).or_default().push(item);
            }
            current = Some(key);
            continue;
        }
        let Some(key) = &current else {
            continue;
        };
        if let Some(item) = list_item(line) {
            found.entry(key.clone()).or_default().push(item.to_string());
        }
    }
    found
}

/// If `line` is a category heading, its key and any text after a colon.
fn heading_category(
    line: &str,
    schema: &CategorySchema,
    mode: ExtractionMode,
) -> Option<(String, Option<String>)> {
    if ["- ", "• ", "* ", "・"].iter().any(|b| line.starts_with(b)) {
        return None;
    }
    let mut s = line.trim_start_matches('#').trim();
    s = s.trim_start_matches("**").trim_end_matches("**").trim();
    s = s.trim_start_matches('【').trim();
    s = strip_numbering(s).unwrap_or(s);
    s = s.trim_start_matches("**").trim();

    let (name, rest) = match s.find([':', '：']) {
        Some(pos) => {
            let sep_len = s[pos..].chars().next().map(char::len_utf8).unwrap_or(1);
            (&s[..pos], Some(s[pos + sep_len..].trim().to_string()))
        }
        None => (s, None),
    };
    let name = name.trim_end_matches("**").trim_end_matches('】').trim();
    schema
        .resolve(name, mode)
        .map(|c| (c.key.clone(), rest))
}

/// Text of a bulleted (`-`, `•`, `*`, `・`) or numbered (`1.`) line.
fn list_item(line: &str) -> Option<&str> {
    for bullet in ["- ", "• ", "* ", "・"] {
        if let Some(rest) = line.strip_prefix(bullet) {
            return Some(rest.trim());
        }
    }
    strip_numbering(line).map(str::trim)
}

/// `"12. rest"` or `"12) rest"` to `"rest"`.
fn strip_numbering(s: &str) -> Option<&str> {
    let digits = s.len() - s.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    if digits == 0 {
        return None;
    }
    let rest = &s[digits..];
    rest.strip_prefix(". ")
        .or_else(|| rest.strip_prefix(") "))
        .or_else(|| rest.strip_prefix('.'))
}

/// Whether a line-parsed item carries no information.
pub fn is_placeholder(item: &str) -> bool {
    let t = item.trim();
    if t.chars().count() < 2 {
        return true;
    }
    let lowered = t.to_lowercase();
    PLACEHOLDERS.contains(&lowered.as_str()) || is_not_found_notice(t)
}

/// Whether an item is the model saying it found nothing for a category.
pub fn is_not_found_notice(item: &str) -> bool {
    let t = item.trim();
    PLACEHOLDER_PREFIXES.iter().any(|p| t.starts_with(p))
        || (t.starts_with("この文書からは") && t.contains("特定できませんでした"))
}

/// Flatten a JSON value into item strings.
fn value_items(value: &Value) -> Vec<String> {
    match value {
        Value::Null => Vec::new(),
        Value::String(s) => s
            .lines()
            .map(|l| list_item(l.trim()).unwrap_or(l.trim()).to_string())
            .filter(|l| !l.is_empty())
            .collect(),
        Value::Array(items) => items
            .iter()
            .flat_map(|item| match item {
                Value::String(s) => vec![s.clone()],
                other => value_items(other),
            })
            .collect(),
        Value::Object(map) => {
            let text = map
                .iter()
                .map(|(k, v)| format!("{}: {}", k, scalar_text(v)))
                .collect::<Vec<_>>()
                .join("; ");
            vec![text]
        }
        other => vec![scalar_text(other)],
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(scalar_text).collect::<Vec<_>>().join(", "),
        other => other.to_string(),
    }
}

/// Maps model responses onto the schema.
pub struct ResponseReconciler<'a> {
    schema: &'a CategorySchema,
}

impl<'a> ResponseReconciler<'a> {
    pub fn new(schema: &'a CategorySchema) -> Self {
        Self { schema }
    }

    /// Reconcile a response, stamped with the current time.
    pub fn reconcile(
        &self,
        raw: &str,
        extraction: &ExtractionResult,
        mode: ExtractionMode,
    ) -> Reconciliation {
        self.reconcile_at(raw, extraction, mode, Utc::now())
    }

    /// Reconcile a response with a fixed timestamp. The same input always
    /// gives the same record.
    pub fn reconcile_at(
        &self,
        raw: &str,
        extraction: &ExtractionResult,
        mode: ExtractionMode,
        timestamp: DateTime<Utc>,
    ) -> Reconciliation {
        log::debug!(
            "{}: model response ({} chars): {}",
            extraction.source_name(),
            raw.chars().count(),
            raw.chars().take(LOG_PREVIEW_CHARS).collect::<String>()
        );

        let mut warnings = Vec::new();
        let (found, source) = match parse_response(raw) {
            ParseOutcome::Valid(map) => {
                (self.validate(map, mode, &mut warnings), ResponseSource::Json)
            }
            ParseOutcome::Repaired(map) => {
                warnings.push(ExtractionWarning::new(
                    WarningKind::ResponseFormat,
                    "response was not a clean JSON object; recovered an embedded one",
                ));
                (
                    self.validate(map, mode, &mut warnings),
                    ResponseSource::RepairedJson,
                )
            }
            ParseOutcome::Unparseable => {
                warnings.push(ExtractionWarning::new(
                    WarningKind::ResponseFormat,
                    "response contained no JSON object; read headings and bullets instead",
                ));
                (parse_lines(raw, self.schema, mode), ResponseSource::Lines)
            }
        };

        // Line-parsed items go through the full placeholder filter; JSON
        // items are kept verbatim apart from "nothing found" notices.
        let mut categories: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut notices = 0;
        for key in self.schema.keys(mode) {
            let mut items = found.get(key).cloned().unwrap_or_default();
            if source == ResponseSource::Lines {
                items.retain(|i| !is_placeholder(i));
            } else {
                let before = items.len();
                items.retain(|i| !is_not_found_notice(i));
                notices += before - items.len();
            }
            categories.insert(key.to_string(), items);
        }
        if notices > 0 {
            warnings.push(ExtractionWarning::new(
                WarningKind::ResponseFormat,
                format!("dropped {} \"nothing found\" placeholder item(s)", notices),
            ));
        }
        let model_populated = categories.values().filter(|v| !v.is_empty()).count();

        let status = if model_populated == 0 {
            ClassificationStatus::Failed
        } else if source != ResponseSource::Json || !warnings.is_empty() {
            ClassificationStatus::Degraded
        } else {
            ClassificationStatus::Complete
        };

        for w in &warnings {
            log::warn!("{}: {}", extraction.source_name(), w);
        }

        let knowledge = self.finish(categories, extraction, mode, status, timestamp);
        Reconciliation {
            knowledge,
            source,
            model_populated,
            warnings,
        }
    }

    /// A record with every category empty apart from structural detail,
    /// for a document whose classification failed.
    pub fn structural_only(
        &self,
        extraction: &ExtractionResult,
        mode: ExtractionMode,
        timestamp: DateTime<Utc>,
    ) -> CategorizedKnowledge {
        let categories = self
            .schema
            .keys(mode)
            .into_iter()
            .map(|k| (k.to_string(), Vec::new()))
            .collect();
        self.finish(
            categories,
            extraction,
            mode,
            ClassificationStatus::Failed,
            timestamp,
        )
    }

    fn finish(
        &self,
        mut categories: BTreeMap<String, Vec<String>>,
        extraction: &ExtractionResult,
        mode: ExtractionMode,
        status: ClassificationStatus,
        timestamp: DateTime<Utc>,
    ) -> CategorizedKnowledge {
        if mode == ExtractionMode::Detailed {
            categories
                .entry(DETAILED_INFO.to_string())
                .or_default()
                .extend(synthesize_detail(extraction));
        }

        CategorizedKnowledge::new(
            categories,
            KnowledgeMetadata {
                extraction_method: mode,
                pages_processed: extraction.page_count(),
                headers_found: extraction.headers_found(),
                tables_found: extraction.tables_found(),
                footnotes_found: extraction.footnotes_found(),
                timestamp,
                source_file_name: extraction.source_name().to_string(),
                classification: status,
            },
        )
    }

    /// Resolve response keys to schema keys. Unknown keys are dropped and
    /// missing keys reported; both add a warning.
    fn validate(
        &self,
        map: Map<String, Value>,
        mode: ExtractionMode,
        warnings: &mut Vec<ExtractionWarning>,
    ) -> BTreeMap<String, Vec<String>> {
        let map = self.unwrap_envelope(map, mode);
        let mut found: BTreeMap<String, Vec<String>> = BTreeMap::new();

        for (name, value) in &map {
            match self.schema.resolve(name, mode) {
                Some(category) => found
                    .entry(category.key.clone())
                    .or_default()
                    .extend(value_items(value)),
                None => warnings.push(ExtractionWarning::new(
                    WarningKind::SchemaViolation,
                    format!("dropped unknown category '{}'", name),
                )),
            }
        }

        let missing: Vec<&str> = self
            .schema
            .keys(mode)
            .into_iter()
            .filter(|k| !found.contains_key(*k))
            .collect();
        if !missing.is_empty() {
            warnings.push(ExtractionWarning::new(
                WarningKind::SchemaViolation,
                format!("missing categories filled empty: {}", missing.join(", ")),
            ));
        }
        found
    }

    /// `{"categories": {...}}` and similar single-key wrappers.
    fn unwrap_envelope(&self, map: Map<String, Value>, mode: ExtractionMode) -> Map<String, Value> {
        let any_known = map.keys().any(|k| self.schema.resolve(k, mode).is_some());
        if !any_known && map.len() == 1 {
            if let Some((_, Value::Object(inner))) = map.iter().next() {
                return inner.clone();
            }
        }
        map
    }
}

/// Structural elements as `detailed_info` items.
pub fn synthesize_detail(extraction: &ExtractionResult) -> Vec<String> {
    let headers = extraction
        .headers()
        .iter()
        .map(|h| format!("見出し: {} (ページ{})", h.text.trim(), h.page_number));
    let tables = extraction.tables().iter().filter_map(|t| {
        let summary = t.summary(3);
        (!summary.is_empty()).then(|| format!("表の内容: {} (ページ{})", summary, t.page_number))
    });
    let footnotes = extraction
        .footnotes()
        .iter()
        .map(|f| format!("脚注: {} (ページ{})", f.text.trim(), f.page_number));
    headers.chain(tables).chain(footnotes).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Footnote, Header, Table};
    use chrono::TimeZone;

    fn extraction() -> ExtractionResult {
        ExtractionResult {
            source_name: "report.pdf".into(),
            title: None,
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
                rows: vec![
                    vec!["Region".into(), "Sales".into()],
                    vec!["North".into(), "120".into()],
                ],
            }],
            footnotes: vec![Footnote {
                text: "1. See appendix".into(),
                marker_text: Some("1.".into()),
                page_number: 3,
                spans: vec![],
            }],
            body_text: "[[page 1]]\n1. Introduction".into(),
            page_count: 3,
            total_pages: 3,
            warnings: vec![],
        }
    }

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap()
    }

    const FULL: &str = r#"{
        "concepts": ["Market share drives pricing power"],
        "methodology": ["Survey 200 firms", "Interview executives"],
        "case_studies": [],
        "data_points": ["Revenue grew 12% in 2023"],
        "risks": ["Currency exposure"],
        "best_practices": ["Review pricing quarterly"]
    }"#;

    #[test]
    fn test_valid_round_trip() {
        let schema = CategorySchema::default();
        let r = ResponseReconciler::new(&schema).reconcile_at(
            FULL,
            &extraction(),
            ExtractionMode::Standard,
            ts(),
        );
        let k = &r.knowledge;
        assert_eq!(r.source, ResponseSource::Json);
        assert_eq!(k.status(), ClassificationStatus::Complete);
        assert!(r.warnings.is_empty());
        assert_eq!(k.categories().len(), 6);
        assert!(!k.categories().contains_key(DETAILED_INFO));
        assert_eq!(
            k.get("methodology"),
            &["Survey 200 firms".to_string(), "Interview executives".to_string()]
        );
        assert!(k.get("case_studies").is_empty());
        assert_eq!(k.metadata().pages_processed, 3);
        assert_eq!(k.metadata().timestamp, ts());
    }

    #[test]
    fn test_valid_round_trip_keeps_short_items() {
        let raw = r#"{"concepts": ["None"], "methodology": ["A"], "case_studies": [],
            "data_points": ["7", "N/A"], "risks": ["..."], "best_practices": ["Review"]}"#;
        let schema = CategorySchema::default();
        let r = ResponseReconciler::new(&schema).reconcile_at(
            raw,
            &extraction(),
            ExtractionMode::Standard,
            ts(),
        );
        let k = &r.knowledge;
        assert_eq!(k.status(), ClassificationStatus::Complete);
        assert!(r.warnings.is_empty());
        assert_eq!(k.get("concepts"), &["None".to_string()]);
        assert_eq!(k.get("methodology"), &["A".to_string()]);
        assert_eq!(k.get("data_points"), &["7".to_string(), "N/A".to_string()]);
        assert_eq!(k.get("risks"), &["...".to_string()]);
    }

    #[test]
    fn test_not_found_notice_in_json_degrades() {
        let raw = r#"{"concepts": ["Flywheel", "情報は見つかりません"], "methodology": [],
            "case_studies": [], "data_points": [], "risks": [], "best_practices": []}"#;
        let schema = CategorySchema::default();
        let r = ResponseReconciler::new(&schema).reconcile_at(
            raw,
            &extraction(),
            ExtractionMode::Standard,
            ts(),
        );
        assert_eq!(r.knowledge.get("concepts"), &["Flywheel".to_string()]);
        assert_eq!(r.knowledge.status(), ClassificationStatus::Degraded);
        assert_eq!(r.warnings.len(), 1);
        assert_eq!(r.warnings[0].kind, WarningKind::ResponseFormat);
    }

    #[test]
    fn test_empty_json_answer_fails() {
        let schema = CategorySchema::default();
        let reconciler = ResponseReconciler::new(&schema);
        for raw in [
            r#"{"concepts": [], "methodology": [], "case_studies": [],
                "data_points": [], "risks": [], "best_practices": []}"#,
            r#"{"concepts": ["情報は見つかりません"], "methodology": [], "case_studies": [],
                "data_points": [], "risks": [], "best_practices": []}"#,
        ] {
            let r = reconciler.reconcile_at(raw, &extraction(), ExtractionMode::Standard, ts());
            assert_eq!(r.source, ResponseSource::Json);
            assert_eq!(r.model_populated, 0);
            assert!(r.is_failed());
        }
    }

    #[test]
    fn test_code_fence_is_valid() {
        let raw = format!("```json\n{}\n```", FULL);
        assert!(matches!(parse_response(&raw), ParseOutcome::Valid(_)));
    }

    #[test]
    fn test_embedded_json_repaired() {
        let raw = format!("Here is the analysis you asked for:\n{}\nLet me know!", FULL);
        let outcome = parse_response(&raw);
        let ParseOutcome::Repaired(map) = outcome else {
            panic!("expected repaired, got {:?}", outcome);
        };
        assert_eq!(map.len(), 6);

        let schema = CategorySchema::default();
        let r = ResponseReconciler::new(&schema).reconcile_at(
            &raw,
            &extraction(),
            ExtractionMode::Standard,
            ts(),
        );
        assert_eq!(r.source, ResponseSource::RepairedJson);
        assert_eq!(r.knowledge.status(), ClassificationStatus::Degraded);
        assert_eq!(r.model_populated, 5);
    }

    #[test]
    fn test_largest_balanced_object_wins() {
        let raw = r#"note {"x": 1} then {"concepts": ["nested {brace} text"], "risks": []}"#;
        let map = repair(raw).unwrap();
        assert!(map.contains_key("concepts"));
    }

    #[test]
    fn test_truncated_json_closed() {
        let raw = r#"{"concepts": ["Pricing power", "Network effects"], "risks": ["Currency exp"#;
        let map = repair(raw).unwrap();
        assert_eq!(
            map.get("concepts"),
            Some(&serde_json::json!(["Pricing power", "Network effects"]))
        );
    }

    #[test]
    fn test_truncated_outer_object_beats_nested_item() {
        let raw = r#"{"concepts": ["Pricing power"], "data_points": [{"metric": "revenue", "value": "12%"}], "risks": ["Currency exp"#;
        let map = repair(raw).unwrap();
        assert!(map.contains_key("concepts"));
        assert!(!map.contains_key("metric"));

        let schema = CategorySchema::default();
        let r = ResponseReconciler::new(&schema).reconcile_at(
            raw,
            &extraction(),
            ExtractionMode::Standard,
            ts(),
        );
        assert_eq!(r.source, ResponseSource::RepairedJson);
        assert_eq!(r.knowledge.get("concepts"), &["Pricing power".to_string()]);
        assert_eq!(
            r.knowledge.get("data_points"),
            &["metric: revenue; value: 12%".to_string()]
        );
        assert_eq!(r.knowledge.status(), ClassificationStatus::Degraded);
    }

    #[test]
    fn test_line_fallback() {
        let raw = "\
## 1. 概念・理論
- 市場シェアが価格決定力を左右する
- ネットワーク効果

**注意点・リスク**
* 為替リスク
stray sentence without a bullet
Best Practices: 四半期ごとに価格を見直す
";
        let schema = CategorySchema::default();
        let r = ResponseReconciler::new(&schema).reconcile_at(
            raw,
            &extraction(),
            ExtractionMode::Standard,
            ts(),
        );
        let k = &r.knowledge;
        assert_eq!(r.source, ResponseSource::Lines);
        assert_eq!(k.status(), ClassificationStatus::Degraded);
        assert_eq!(k.get("concepts").len(), 2);
        assert_eq!(k.get("risks"), &["為替リスク".to_string()]);
        assert_eq!(k.get("best_practices"), &["四半期ごとに価格を見直す".to_string()]);
        assert_eq!(k.categories().len(), 6);
    }

    #[test]
    fn test_garbage_fails_with_all_keys() {
        let schema = CategorySchema::default();
        let r = ResponseReconciler::new(&schema).reconcile_at(
            "The model is overloaded, try again {",
            &extraction(),
            ExtractionMode::Standard,
            ts(),
        );
        assert!(r.is_failed());
        assert_eq!(r.model_populated, 0);
        assert_eq!(r.knowledge.categories().len(), 6);
        assert_eq!(r.knowledge.total_items(), 0);
    }

    #[test]
    fn test_unknown_keys_dropped_missing_filled() {
        let schema = CategorySchema::default();
        let raw = r#"{"concepts": ["Flywheel model"], "misc": ["drop me"], "概念・理論": ["Moats"]}"#;
        let r = ResponseReconciler::new(&schema).reconcile_at(
            raw,
            &extraction(),
            ExtractionMode::Standard,
            ts(),
        );
        let k = &r.knowledge;
        assert_eq!(k.get("concepts").len(), 2);
        assert!(!k.categories().contains_key("misc"));
        assert_eq!(k.categories().len(), 6);
        assert_eq!(k.status(), ClassificationStatus::Degraded);
        assert!(r
            .warnings
            .iter()
            .all(|w| w.kind == WarningKind::SchemaViolation));
        assert_eq!(r.warnings.len(), 2);
    }

    #[test]
    fn test_placeholders_filtered() {
        assert!(is_placeholder("N/A"));
        assert!(is_placeholder("情報は見つかりませんでした"));
        assert!(is_placeholder("x"));
        assert!(is_placeholder(" none "));
        assert!(is_placeholder("この文書からはデータに関する明確な情報を特定できませんでした。"));
        assert!(!is_placeholder("12% growth"));
        assert!(is_not_found_notice("情報は見つかりませんでした"));
        assert!(!is_not_found_notice("N/A"));
    }

    #[test]
    fn test_detailed_info_appends_structure() {
        let schema = CategorySchema::default();
        let raw = r#"{"concepts": ["Flywheel"], "detailed_info": ["Model noted appendix B"]}"#;
        let r = ResponseReconciler::new(&schema).reconcile_at(
            raw,
            &extraction(),
            ExtractionMode::Detailed,
            ts(),
        );
        assert_eq!(
            r.knowledge.get(DETAILED_INFO),
            &[
                "Model noted appendix B".to_string(),
                "見出し: 1. Introduction (ページ1)".to_string(),
                "表の内容: Region | Sales; North | 120 (ページ2)".to_string(),
                "脚注: 1. See appendix (ページ3)".to_string(),
            ]
        );
        assert_eq!(r.knowledge.categories().len(), 7);
    }

    #[test]
    fn test_standard_mode_drops_detailed_info() {
        let schema = CategorySchema::default();
        let raw = r#"{"concepts": ["Flywheel"], "detailed_info": ["ignored"]}"#;
        let r = ResponseReconciler::new(&schema).reconcile_at(
            raw,
            &extraction(),
            ExtractionMode::Standard,
            ts(),
        );
        assert!(!r.knowledge.categories().contains_key(DETAILED_INFO));
    }

    #[test]
    fn test_envelope_unwrapped() {
        let schema = CategorySchema::default();
        let raw = r#"{"categories": {"risks": ["Regulatory change"]}}"#;
        let r = ResponseReconciler::new(&schema).reconcile_at(
            raw,
            &extraction(),
            ExtractionMode::Standard,
            ts(),
        );
        assert_eq!(r.knowledge.get("risks"), &["Regulatory change".to_string()]);
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let schema = CategorySchema::default();
        let reconciler = ResponseReconciler::new(&schema);
        let ex = extraction();
        for raw in [FULL, "junk", "- a\n- b", r#"{"risks": ["cut"#] {
            let a = reconciler.reconcile_at(raw, &ex, ExtractionMode::Detailed, ts());
            let b = reconciler.reconcile_at(raw, &ex, ExtractionMode::Detailed, ts());
            assert_eq!(a.knowledge, b.knowledge);
            let c = reconciler.reconcile(raw, &ex, ExtractionMode::Detailed);
            assert!(a.knowledge.same_content(&c.knowledge));
        }
    }

    #[test]
    fn test_structural_only_record() {
        let schema = CategorySchema::default();
        let k = ResponseReconciler::new(&schema).structural_only(
            &extraction(),
            ExtractionMode::Detailed,
            ts(),
        );
        assert_eq!(k.status(), ClassificationStatus::Failed);
        assert_eq!(k.get(DETAILED_INFO).len(), 3);
        assert!(k.get("concepts").is_empty());
    }
}
