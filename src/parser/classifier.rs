//! Structural classification of text spans.
//!
//! Every span is labelled Header, Footnote, TableCell or Body. Labels
//! depend only on the span itself and on [`DocumentThresholds`], which are
//! computed once per document before any page is classified.

use std::collections::BTreeSet;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;

use crate::config::ExtractionSettings;
use crate::error::{Error, Result};
use crate::model::{
    Body, ExtractionWarning, Footnote, Header, StructuralElement, Table, TableCell, TextSpan,
    WarningKind,
};

use super::collector::is_spaceless_script_char;
use super::table_detector::{DetectedRegion, TableDetection};

/// Fallback median when a document has no text at all.
const DEFAULT_BODY_SIZE: f32 = 12.0;
/// Spans whose top edges differ by less than this share of the font size
/// sit on the same line.
const LINE_TOLERANCE: f32 = 0.4;

const HEADER_PATTERNS: &[&str] = &[
    r"^\d+\.(\d+\.?)*\s+\S",
    r"^Chapter\s+\d+",
    r"^第\d+章",
    r"^[A-Z][A-Z\s]+$",
    r"^[一二三四五六七八九十]+、",
    r"^[①②③④⑤⑥⑦⑧⑨⑩]",
];

const FOOTNOTE_MARKER: &str = r"^(\d+[).．.]|\*+|†|脚注\d+|注\d+)";

/// Label assigned to a single span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanLabel {
    Header,
    Footnote,
    Body,
}

/// Thresholds computed once per document.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentThresholds {
    /// Median font size over every span in the document
    pub median_font_size: f32,
    /// Header font sizes at 0.1pt precision, largest first
    header_buckets: Vec<i32>,
}

impl DocumentThresholds {
    fn bucket(font_size: f32) -> i32 {
        (font_size * 10.0).round() as i32
    }

    /// Header font sizes, largest first.
    pub fn header_sizes(&self) -> Vec<f32> {
        self.header_buckets.iter().map(|b| *b as f32 / 10.0).collect()
    }

    /// Level of a header with this font size: 1 for the largest header
    /// size in the document.
    pub fn header_level(&self, font_size: f32) -> u8 {
        let bucket = Self::bucket(font_size);
        let rank = self
            .header_buckets
            .iter()
            .position(|b| *b <= bucket)
            .unwrap_or(self.header_buckets.len().saturating_sub(1));
        (rank + 1).min(u8::MAX as usize) as u8
    }
}

/// Spans of one page after table regions have been taken out.
#[derive(Debug, Clone)]
pub struct PagePartition {
    pub page_number: u32,
    /// Spans outside any accepted table region
    pub spans: Vec<TextSpan>,
    /// Cells of each accepted table region
    pub tables: Vec<Vec<TableCell>>,
    /// Regions that failed grid validation, as body blocks
    pub demoted: Vec<Body>,
    pub warnings: Vec<ExtractionWarning>,
}

impl PagePartition {
    fn all_spans(&self) -> impl Iterator<Item = &TextSpan> {
        self.spans
            .iter()
            .chain(self.tables.iter().flatten().flat_map(|c| c.spans.iter()))
            .chain(self.demoted.iter().flat_map(|b| b.spans.iter()))
    }
}

/// Classified elements of one page, in reading order.
#[derive(Debug, Clone)]
pub struct ClassifiedPage {
    pub page_number: u32,
    pub elements: Vec<StructuralElement>,
    pub warnings: Vec<ExtractionWarning>,
}

/// Labels spans using font size, position and text patterns.
pub struct StructuralClassifier {
    header_font_size_threshold: f32,
    footnote_position_threshold: f32,
    tables_enabled: bool,
    header_patterns: Vec<Regex>,
    footnote_marker: Regex,
}

impl StructuralClassifier {
    pub fn new(settings: &ExtractionSettings) -> Result<Self> {
        let compile =
            |p: &str| Regex::new(p).map_err(|e| Error::Config(format!("pattern {}: {}", p, e)));
        Ok(Self {
            header_font_size_threshold: settings.header_font_size_threshold,
            footnote_position_threshold: settings.footnote_position_threshold,
            tables_enabled: settings.table_extraction_enabled,
            header_patterns: HEADER_PATTERNS
                .iter()
                .map(|p| compile(p))
                .collect::<Result<_>>()?,
            footnote_marker: compile(FOOTNOTE_MARKER)?,
        })
    }

    /// Take table regions out of a page's spans.
    ///
    /// Regions the detector reports are validated as grids; a region that
    /// fails validation becomes one body block, and a detector failure
    /// leaves every span for normal classification. Both record a warning.
    pub fn partition_tables(
        &self,
        page_number: u32,
        spans: Vec<TextSpan>,
        detector: &dyn TableDetection,
    ) -> PagePartition {
        let mut partition = PagePartition {
            page_number,
            spans: Vec::new(),
            tables: Vec::new(),
            demoted: Vec::new(),
            warnings: Vec::new(),
        };

        let regions = if self.tables_enabled {
            match detector.detect_tables(page_number, &spans) {
                Ok(regions) => regions,
                Err(e) => {
                    log::warn!("Page {}: table detection failed: {}", page_number, e);
                    partition.warnings.push(
                        ExtractionWarning::new(
                            WarningKind::TableGrid,
                            format!("table detection failed: {}", e),
                        )
                        .on_page(page_number),
                    );
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        let mut slots: Vec<Option<TextSpan>> = spans.into_iter().map(Some).collect();
        for region in regions {
            let region_index = partition.tables.len();
            let (cells, conflict) = take_region(page_number, region_index, region, &mut slots);

            let checked = match conflict {
                Some(reason) => Err(Error::TableGrid {
                    page: page_number,
                    reason,
                }),
                None => Table::from_cells(page_number, &cells).map(|_| ()),
            };

            match checked {
                Ok(()) => partition.tables.push(cells),
                Err(e) => {
                    log::warn!("Page {}: demoting table region to body text: {}", page_number, e);
                    partition.warnings.push(
                        ExtractionWarning::new(WarningKind::TableGrid, e.to_string())
                            .on_page(page_number),
                    );
                    let spans: Vec<TextSpan> =
                        cells.into_iter().flat_map(|c| c.spans).collect();
                    if !spans.is_empty() {
                        partition.demoted.push(Body {
                            text: lines_text(&spans),
                            page_number,
                            spans,
                        });
                    }
                }
            }
        }

        partition.spans = slots.into_iter().flatten().collect();
        partition
    }

    /// Compute the document-wide thresholds from every page.
    pub fn thresholds(&self, pages: &[PagePartition]) -> DocumentThresholds {
        let mut sizes: Vec<f32> = pages
            .iter()
            .flat_map(PagePartition::all_spans)
            .map(|s| s.font_size)
            .collect();
        sizes.sort_by(f32::total_cmp);

        let median_font_size = match sizes.len() {
            0 => DEFAULT_BODY_SIZE,
            n if n % 2 == 1 => sizes[n / 2],
            n => (sizes[n / 2 - 1] + sizes[n / 2]) / 2.0,
        };

        let buckets: BTreeSet<i32> = pages
            .iter()
            .flat_map(|p| p.spans.iter())
            .filter(|s| self.label(s, median_font_size) == SpanLabel::Header)
            .map(|s| DocumentThresholds::bucket(s.font_size))
            .collect();

        DocumentThresholds {
            median_font_size,
            header_buckets: buckets.into_iter().rev().collect(),
        }
    }

    /// Label one span.
    ///
    /// A span low on the page in a below-median font is a footnote. Any
    /// other span with a header signal is a header, even when it sits in
    /// the footnote zone. Remaining low spans that open with a footnote
    /// marker are footnotes.
    pub fn label(&self, span: &TextSpan, median_font_size: f32) -> SpanLabel {
        let raw = span.trimmed();
        let normalized: String = raw.nfkc().collect();
        let low = span.bbox.y0 >= self.footnote_position_threshold;

        if low && span.font_size < median_font_size {
            return SpanLabel::Footnote;
        }
        if span.font_size >= self.header_font_size_threshold
            || self.matches_header_pattern(raw, &normalized)
            || (span.font_flags.is_bold() && span.font_size > median_font_size)
        {
            return SpanLabel::Header;
        }
        if low && self.footnote_marker.is_match(&normalized) {
            return SpanLabel::Footnote;
        }
        SpanLabel::Body
    }

    fn matches_header_pattern(&self, raw: &str, normalized: &str) -> bool {
        self.header_patterns.iter().enumerate().any(|(i, p)| {
            let hit = p.is_match(raw) || p.is_match(normalized);
            // The all-caps pattern needs a few letters to avoid acronyms.
            if hit && HEADER_PATTERNS[i] == r"^[A-Z][A-Z\s]+$" {
                return normalized.chars().filter(|c| c.is_ascii_alphabetic()).count() >= 4;
            }
            hit
        })
    }

    /// Leading footnote marker of a text, if any.
    pub fn footnote_marker(&self, text: &str) -> Option<String> {
        let normalized: String = text.trim().nfkc().collect();
        self.footnote_marker
            .find(&normalized)
            .map(|m| m.as_str().to_string())
    }

    /// Classify one page into elements in reading order.
    pub fn classify_page(
        &self,
        partition: PagePartition,
        thresholds: &DocumentThresholds,
    ) -> ClassifiedPage {
        let page_number = partition.page_number;
        // (top, left, elements) for ordering
        let mut blocks: Vec<(f32, f32, Vec<StructuralElement>)> = Vec::new();

        for cells in partition.tables {
            let (top, left) = top_left(cells.iter().flat_map(|c| c.spans.iter()));
            blocks.push((
                top,
                left,
                cells.into_iter().map(StructuralElement::TableCell).collect(),
            ));
        }
        for body in partition.demoted {
            let (top, left) = top_left(body.spans.iter());
            blocks.push((top, left, vec![StructuralElement::Body(body)]));
        }

        for line in group_lines(partition.spans) {
            let mut run: Vec<TextSpan> = Vec::new();
            let mut run_label: Option<SpanLabel> = None;
            for span in line {
                let label = self.label(&span, thresholds.median_font_size);
                if run_label.is_some_and(|l| l != label) {
                    let (top, left) = top_left(run.iter());
                    let element =
                        self.build_element(run_label, std::mem::take(&mut run), thresholds, page_number);
                    blocks.push((top, left, element.into_iter().collect()));
                }
                run_label = Some(label);
                run.push(span);
            }
            if !run.is_empty() {
                let (top, left) = top_left(run.iter());
                let element = self.build_element(run_label, run, thresholds, page_number);
                blocks.push((top, left, element.into_iter().collect()));
            }
        }

        blocks.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));

        let mut elements: Vec<StructuralElement> = Vec::new();
        for element in blocks.into_iter().flat_map(|(_, _, e)| e) {
            // Unmarked footnote lines continue the footnote above them.
            if let StructuralElement::Footnote(next) = &element {
                if next.marker_text.is_none() {
                    if let Some(StructuralElement::Footnote(prev)) = elements.last_mut() {
                        prev.text = join_lines(&prev.text, &next.text);
                        prev.spans.extend(next.spans.iter().cloned());
                        continue;
                    }
                }
            }
            elements.push(element);
        }

        log::debug!(
            "Page {}: classified {} elements",
            page_number,
            elements.len()
        );

        ClassifiedPage {
            page_number,
            elements,
            warnings: partition.warnings,
        }
    }

    fn build_element(
        &self,
        label: Option<SpanLabel>,
        spans: Vec<TextSpan>,
        thresholds: &DocumentThresholds,
        page_number: u32,
    ) -> Option<StructuralElement> {
        let text = join_span_texts(&spans).trim().to_string();
        if text.is_empty() {
            return None;
        }
        let element = match label? {
            SpanLabel::Header => {
                let font_size = spans.iter().map(|s| s.font_size).fold(0.0, f32::max);
                StructuralElement::Header(Header {
                    level: thresholds.header_level(font_size),
                    text,
                    font_size,
                    page_number,
                    spans,
                })
            }
            SpanLabel::Footnote => StructuralElement::Footnote(Footnote {
                marker_text: self.footnote_marker(&text),
                text,
                page_number,
                spans,
            }),
            SpanLabel::Body => StructuralElement::Body(Body {
                text,
                page_number,
                spans,
            }),
        };
        Some(element)
    }

    /// Classify a whole document: partition every page, compute the
    /// thresholds once, then classify each page.
    pub fn classify_document(
        &self,
        pages: Vec<(u32, Vec<TextSpan>)>,
        detector: &dyn TableDetection,
    ) -> Vec<ClassifiedPage> {
        let partitions: Vec<PagePartition> = pages
            .into_iter()
            .map(|(page, spans)| self.partition_tables(page, spans, detector))
            .collect();
        let thresholds = self.thresholds(&partitions);
        partitions
            .into_iter()
            .map(|p| self.classify_page(p, &thresholds))
            .collect()
    }
}

/// Move a region's spans out of `slots` into table cells. Returns the
/// cells and a description of the first index conflict, if any.
fn take_region(
    page_number: u32,
    region_index: usize,
    region: DetectedRegion,
    slots: &mut [Option<TextSpan>],
) -> (Vec<TableCell>, Option<String>) {
    let mut conflict = None;
    let mut cells = Vec::with_capacity(region.cells.len());

    for placement in region.cells {
        let mut spans = Vec::with_capacity(placement.span_indices.len());
        for i in placement.span_indices {
            match slots.get_mut(i).map(Option::take) {
                Some(Some(span)) => spans.push(span),
                Some(None) => {
                    conflict.get_or_insert_with(|| format!("span {} claimed by two cells", i));
                }
                None => {
                    conflict.get_or_insert_with(|| format!("span index {} out of range", i));
                }
            }
        }
        spans.sort_by(|a, b| a.bbox.x0.total_cmp(&b.bbox.x0));
        cells.push(TableCell {
            text: join_span_texts(&spans).trim().to_string(),
            row_index: placement.row,
            col_index: placement.col,
            region: region_index,
            page_number,
            spans,
        });
    }
    (cells, conflict)
}

fn top_left<'a>(spans: impl Iterator<Item = &'a TextSpan>) -> (f32, f32) {
    spans.fold((f32::INFINITY, f32::INFINITY), |(top, left), s| {
        (top.min(s.bbox.y0), left.min(s.bbox.x0))
    })
}

/// Group spans into visual lines, top to bottom, each sorted left to right.
pub(crate) fn group_lines(mut spans: Vec<TextSpan>) -> Vec<Vec<TextSpan>> {
    spans.sort_by(|a, b| {
        a.bbox
            .y0
            .total_cmp(&b.bbox.y0)
            .then(a.bbox.x0.total_cmp(&b.bbox.x0))
    });

    let mut lines: Vec<Vec<TextSpan>> = Vec::new();
    let mut line_top: Option<f32> = None;
    for span in spans {
        let tolerance = span.font_size * LINE_TOLERANCE;
        match (line_top, lines.last_mut()) {
            (Some(top), Some(line)) if (span.bbox.y0 - top).abs() <= tolerance => line.push(span),
            _ => {
                line_top = Some(span.bbox.y0);
                lines.push(vec![span]);
            }
        }
    }
    for line in &mut lines {
        line.sort_by(|a, b| a.bbox.x0.total_cmp(&b.bbox.x0));
    }
    lines
}

/// Text of spans in reading order, one line per visual line.
pub(crate) fn lines_text(spans: &[TextSpan]) -> String {
    group_lines(spans.to_vec())
        .iter()
        .map(|line| join_span_texts(line).trim().to_string())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Combine spans on one line, inserting a space where the horizontal gap
/// suggests one. No space is inserted between CJK characters.
pub(crate) fn join_span_texts(spans: &[TextSpan]) -> String {
    let mut result = String::new();
    for (i, span) in spans.iter().enumerate() {
        if i > 0 {
            let prev = &spans[i - 1];
            let gap = span.bbox.x0 - prev.bbox.x1;
            let chars = span.text.chars().count();
            let avg_char_width = if chars > 0 && span.bbox.width() > 0.0 {
                span.bbox.width() / chars as f32
            } else {
                span.font_size * 0.5
            };

            let both_cjk = prev.text.chars().last().is_some_and(is_spaceless_script_char)
                && span.text.chars().next().is_some_and(is_spaceless_script_char);
            let has_space = prev.text.ends_with([' ', '\u{00A0}'])
                || span.text.starts_with([' ', '\u{00A0}']);

            if gap > avg_char_width * 0.2 && !both_cjk && !has_space {
                result.push(' ');
            }
        }
        result.push_str(&span.text);
    }
    result
}

/// Join two lines of running text, without a space between CJK text.
fn join_lines(first: &str, second: &str) -> String {
    let cjk = first.chars().last().is_some_and(is_spaceless_script_char)
        && second.chars().next().is_some_and(is_spaceless_script_char);
    if cjk {
        format!("{}{}", first, second)
    } else {
        format!("{} {}", first, second)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BoundingBox, FontFlags};
    use crate::parser::table_detector::{AlignmentTableDetector, CellPlacement};

    fn span(text: &str, size: f32, x: f32, y: f32) -> TextSpan {
        TextSpan::new(
            text,
            size,
            FontFlags::empty(),
            BoundingBox::new(x, y, x + text.chars().count() as f32 * size * 0.5, y + size),
            1,
        )
    }

    fn bold(mut s: TextSpan) -> TextSpan {
        s.font_flags = FontFlags::BOLD;
        s
    }

    fn classifier() -> StructuralClassifier {
        StructuralClassifier::new(&ExtractionSettings::default()).unwrap()
    }

    struct FailingDetector;
    impl TableDetection for FailingDetector {
        fn detect_tables(&self, page: u32, _spans: &[TextSpan]) -> Result<Vec<DetectedRegion>> {
            Err(Error::TableGrid {
                page,
                reason: "facility crashed".into(),
            })
        }
    }

    struct RaggedDetector;
    impl TableDetection for RaggedDetector {
        fn detect_tables(&self, _page: u32, _spans: &[TextSpan]) -> Result<Vec<DetectedRegion>> {
            Ok(vec![DetectedRegion {
                cells: vec![
                    CellPlacement {
                        row: 0,
                        col: 0,
                        span_indices: vec![0],
                    },
                    CellPlacement {
                        row: 0,
                        col: 1,
                        span_indices: vec![1],
                    },
                    CellPlacement {
                        row: 1,
                        col: 0,
                        span_indices: vec![2],
                    },
                ],
            }])
        }
    }

    #[test]
    fn test_header_by_size_pattern_and_bold() {
        let c = classifier();
        let median = 12.0;
        assert_eq!(c.label(&span("Overview", 18.0, 72.0, 80.0), median), SpanLabel::Header);
        assert_eq!(
            c.label(&span("1. Introduction", 12.0, 72.0, 80.0), median),
            SpanLabel::Header
        );
        assert_eq!(c.label(&span("第3章 市場分析", 12.0, 72.0, 80.0), median), SpanLabel::Header);
        assert_eq!(c.label(&span("Chapter 4 Results", 12.0, 72.0, 80.0), median), SpanLabel::Header);
        assert_eq!(c.label(&span("KEY FINDINGS", 12.0, 72.0, 80.0), median), SpanLabel::Header);
        assert_eq!(c.label(&span("①概要", 12.0, 72.0, 80.0), median), SpanLabel::Header);
        assert_eq!(c.label(&span("１. 全角の見出し", 12.0, 72.0, 80.0), median), SpanLabel::Header);
        assert_eq!(
            c.label(&bold(span("Bold lead", 13.0, 72.0, 80.0)), median),
            SpanLabel::Header
        );

        assert_eq!(c.label(&span("USA", 12.0, 72.0, 80.0), median), SpanLabel::Body);
        assert_eq!(
            c.label(&span("2023 revenue grew", 12.0, 72.0, 80.0), median),
            SpanLabel::Body
        );
        assert_eq!(
            c.label(&bold(span("Bold body", 12.0, 72.0, 80.0)), median),
            SpanLabel::Body
        );
    }

    #[test]
    fn test_footnote_detection() {
        let c = classifier();
        let median = 12.0;
        assert_eq!(
            c.label(&span("1. See appendix", 8.0, 72.0, 720.0), median),
            SpanLabel::Footnote
        );
        assert_eq!(c.label(&span("small print", 9.0, 72.0, 705.0), median), SpanLabel::Footnote);
        assert_eq!(c.label(&span("注1 出典", 12.0, 72.0, 720.0), median), SpanLabel::Footnote);
        assert_eq!(c.label(&span("* estimate", 12.0, 72.0, 720.0), median), SpanLabel::Footnote);
        // Same text high on the page is not a footnote
        assert_eq!(c.label(&span("small print", 9.0, 72.0, 300.0), median), SpanLabel::Body);
        // Low but neither small nor marked
        assert_eq!(c.label(&span("regular text", 12.0, 72.0, 720.0), median), SpanLabel::Body);
    }

    #[test]
    fn test_header_wins_over_footnote_zone() {
        let c = classifier();
        assert_eq!(
            c.label(&span("Closing Remarks", 20.0, 72.0, 740.0), 12.0),
            SpanLabel::Header
        );
    }

    #[test]
    fn test_footnote_marker_text() {
        let c = classifier();
        assert_eq!(c.footnote_marker("1) Source: survey"), Some("1)".to_string()));
        assert_eq!(c.footnote_marker("２．全角"), Some("2.".to_string()));
        assert_eq!(c.footnote_marker("** note"), Some("**".to_string()));
        assert_eq!(c.footnote_marker("脚注3 補足"), Some("脚注3".to_string()));
        assert_eq!(c.footnote_marker("plain"), None);
    }

    #[test]
    fn test_header_levels_follow_size() {
        let c = classifier();
        let spans = vec![
            span("Title", 24.0, 72.0, 40.0),
            span("Section", 18.0, 72.0, 100.0),
            span("Subsection", 14.0, 72.0, 160.0),
            span("body one", 11.0, 72.0, 200.0),
            span("body two", 11.0, 72.0, 220.0),
            span("body three", 11.0, 72.0, 240.0),
        ];
        let pages = c.classify_document(vec![(1, spans)], &AlignmentTableDetector::new());
        let levels: Vec<(String, u8)> = pages[0]
            .elements
            .iter()
            .filter_map(|e| match e {
                StructuralElement::Header(h) => Some((h.text.clone(), h.level)),
                _ => None,
            })
            .collect();
        assert_eq!(
            levels,
            vec![
                ("Title".to_string(), 1),
                ("Section".to_string(), 2),
                ("Subsection".to_string(), 3)
            ]
        );
    }

    #[test]
    fn test_thresholds_median() {
        let c = classifier();
        let partition = |spans| c.partition_tables(1, spans, &AlignmentTableDetector::new());
        let pages = vec![partition(vec![
            span("a", 10.0, 0.0, 0.0),
            span("b", 12.0, 0.0, 20.0),
            span("c", 14.0, 0.0, 40.0),
            span("d", 30.0, 0.0, 60.0),
        ])];
        let t = c.thresholds(&pages);
        assert_eq!(t.median_font_size, 13.0);
        assert_eq!(t.header_sizes(), vec![30.0, 14.0]);
        assert_eq!(t.header_level(30.0), 1);
        assert_eq!(t.header_level(14.0), 2);

        let empty = c.thresholds(&[]);
        assert_eq!(empty.median_font_size, DEFAULT_BODY_SIZE);
    }

    #[test]
    fn test_spans_on_one_line_merge() {
        let c = classifier();
        let spans = vec![
            span("world", 12.0, 110.0, 300.0),
            span("Hello", 12.0, 72.0, 300.5),
            span("日本", 12.0, 72.0, 330.0),
            span("語", 12.0, 96.0, 330.0),
        ];
        let pages = c.classify_document(vec![(1, spans)], &AlignmentTableDetector::new());
        let texts: Vec<&str> = pages[0].elements.iter().map(|e| e.text()).collect();
        assert_eq!(texts, vec!["Hello world", "日本語"]);
    }

    #[test]
    fn test_footnote_continuation_lines_merge() {
        let c = classifier();
        let spans = vec![
            span("Body text line", 12.0, 72.0, 300.0),
            span("Body text line", 12.0, 72.0, 320.0),
            span("1) Source: annual survey,", 8.0, 72.0, 720.0),
            span("published 2023.", 8.0, 72.0, 730.0),
        ];
        let pages = c.classify_document(vec![(1, spans)], &AlignmentTableDetector::new());
        let footnotes: Vec<&Footnote> = pages[0]
            .elements
            .iter()
            .filter_map(|e| match e {
                StructuralElement::Footnote(f) => Some(f),
                _ => None,
            })
            .collect();
        assert_eq!(footnotes.len(), 1);
        assert_eq!(footnotes[0].text, "1) Source: annual survey, published 2023.");
        assert_eq!(footnotes[0].marker_text.as_deref(), Some("1)"));
        assert_eq!(footnotes[0].spans.len(), 2);
    }

    #[test]
    fn test_table_cells_become_elements() {
        let c = classifier();
        let spans = vec![
            span("Region", 12.0, 72.0, 200.0),
            span("Sales", 12.0, 200.0, 200.0),
            span("North", 12.0, 72.0, 220.0),
            span("120", 12.0, 200.0, 220.0),
            span("South", 12.0, 72.0, 240.0),
            span("95", 12.0, 200.0, 240.0),
        ];
        let pages = c.classify_document(vec![(2, spans)], &AlignmentTableDetector::new());
        let cells: Vec<&TableCell> = pages[0]
            .elements
            .iter()
            .filter_map(|e| match e {
                StructuralElement::TableCell(c) => Some(c),
                _ => None,
            })
            .collect();
        assert_eq!(cells.len(), 6);
        assert_eq!(cells[0].text, "Region");
        assert_eq!((cells[5].row_index, cells[5].col_index), (2, 1));
        assert!(pages[0].warnings.is_empty());
    }

    #[test]
    fn test_ragged_region_demoted_to_body() {
        let c = classifier();
        let spans = vec![
            span("A", 12.0, 72.0, 200.0),
            span("B", 12.0, 200.0, 200.0),
            span("C", 12.0, 72.0, 220.0),
            span("tail", 12.0, 72.0, 260.0),
        ];
        let page = &c.classify_document(vec![(1, spans)], &RaggedDetector)[0];
        assert_eq!(page.warnings.len(), 1);
        assert_eq!(page.warnings[0].kind, WarningKind::TableGrid);
        let texts: Vec<&str> = page.elements.iter().map(|e| e.text()).collect();
        assert_eq!(texts, vec!["A B\nC", "tail"]);
        assert!(page
            .elements
            .iter()
            .all(|e| matches!(e, StructuralElement::Body(_))));
    }

    #[test]
    fn test_detector_failure_keeps_spans() {
        let c = classifier();
        let spans = vec![span("A", 12.0, 72.0, 200.0), span("B", 12.0, 72.0, 220.0)];
        let page = &c.classify_document(vec![(3, spans)], &FailingDetector)[0];
        assert_eq!(page.warnings.len(), 1);
        assert_eq!(page.warnings[0].page, Some(3));
        assert_eq!(page.elements.len(), 2);
    }

    #[test]
    fn test_tables_disabled_skips_detector() {
        let settings = ExtractionSettings {
            table_extraction_enabled: false,
            ..Default::default()
        };
        let c = StructuralClassifier::new(&settings).unwrap();
        let partition = c.partition_tables(1, vec![span("A", 12.0, 0.0, 0.0)], &FailingDetector);
        assert!(partition.warnings.is_empty());
        assert_eq!(partition.spans.len(), 1);
    }

    #[test]
    fn test_classification_is_order_independent() {
        let c = classifier();
        let a = vec![
            span("Heading", 16.0, 72.0, 50.0),
            span("text", 12.0, 72.0, 100.0),
            span("note", 8.0, 72.0, 710.0),
        ];
        let mut b = a.clone();
        b.reverse();
        let pa = c.classify_document(vec![(1, a)], &AlignmentTableDetector::new());
        let pb = c.classify_document(vec![(1, b)], &AlignmentTableDetector::new());
        assert_eq!(pa[0].elements, pb[0].elements);
    }
}
