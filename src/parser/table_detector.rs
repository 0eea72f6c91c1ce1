//! Table detection using text position analysis (stream mode).
//!
//! Tables are found from text alignment alone, without ruling lines:
//! spans are grouped into rows, left edges that repeat across rows become
//! column boundaries, and runs of rows that line up with those boundaries
//! become table regions.

use std::collections::{HashMap, HashSet};

use crate::error::Result;
use crate::model::TextSpan;

/// One cell of a detected region: its grid position and the spans in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellPlacement {
    pub row: usize,
    pub col: usize,
    /// Indices into the span slice passed to the detector
    pub span_indices: Vec<usize>,
}

/// A table region reported by a detector.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetectedRegion {
    pub cells: Vec<CellPlacement>,
}

impl DetectedRegion {
    /// All span indices covered by this region.
    pub fn span_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.cells.iter().flat_map(|c| c.span_indices.iter().copied())
    }
}

/// A table-detection facility.
///
/// Implementations may fail or report grids that are not rectangular; the
/// structural classifier demotes such regions to body text.
pub trait TableDetection: Send + Sync {
    /// Detect table regions among the spans of one page.
    fn detect_tables(&self, page_number: u32, spans: &[TextSpan]) -> Result<Vec<DetectedRegion>>;
}

/// Table detector configuration.
#[derive(Debug, Clone)]
pub struct TableDetectorConfig {
    /// Minimum number of rows to consider as table
    pub min_rows: usize,
    /// Minimum number of columns to consider as table
    pub min_columns: usize,
    /// Maximum number of columns (above this, likely word-level splitting)
    pub max_columns: usize,
    /// Y tolerance for grouping spans into rows (fraction of font size)
    pub y_tolerance_factor: f32,
    /// Minimum column alignment ratio (0.0-1.0)
    pub min_alignment_ratio: f32,
    /// Minimum gap between columns (points)
    pub min_column_gap: f32,
}

impl Default for TableDetectorConfig {
    fn default() -> Self {
        Self {
            min_rows: 2,
            min_columns: 2,
            max_columns: 6,
            y_tolerance_factor: 0.4,
            min_alignment_ratio: 0.3,
            min_column_gap: 15.0,
        }
    }
}

/// Spans sharing a row, by index, sorted left to right.
#[derive(Debug, Clone)]
struct RowData {
    indices: Vec<usize>,
}

const BUCKET_SIZE: f32 = 5.0;
const ALIGN_TOLERANCE: f32 = 5.0;

/// Alignment-based detector used by default.
#[derive(Debug, Clone, Default)]
pub struct AlignmentTableDetector {
    config: TableDetectorConfig,
}

impl AlignmentTableDetector {
    /// Create a new table detector with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new table detector with custom configuration.
    pub fn with_config(config: TableDetectorConfig) -> Self {
        Self { config }
    }

    /// Group spans into rows by their top edge, top of page first.
    fn group_into_rows(&self, spans: &[TextSpan]) -> Vec<RowData> {
        let mut order: Vec<usize> = (0..spans.len()).collect();
        order.sort_by(|&a, &b| {
            spans[a]
                .bbox
                .y0
                .total_cmp(&spans[b].bbox.y0)
                .then(spans[a].bbox.x0.total_cmp(&spans[b].bbox.x0))
        });

        let mut rows: Vec<RowData> = Vec::new();
        let mut current: Vec<usize> = Vec::new();
        let mut current_y: Option<f32> = None;

        for idx in order {
            let span = &spans[idx];
            let tolerance = span.font_size * self.config.y_tolerance_factor;
            match current_y {
                Some(y) if (span.bbox.y0 - y).abs() <= tolerance => current.push(idx),
                _ => {
                    if !current.is_empty() {
                        rows.push(self.finish_row(spans, std::mem::take(&mut current)));
                    }
                    current_y = Some(span.bbox.y0);
                    current.push(idx);
                }
            }
        }
        if !current.is_empty() {
            rows.push(self.finish_row(spans, current));
        }
        rows
    }

    fn finish_row(&self, spans: &[TextSpan], mut indices: Vec<usize>) -> RowData {
        indices.sort_by(|&a, &b| spans[a].bbox.x0.total_cmp(&spans[b].bbox.x0));
        RowData { indices }
    }

    /// Detect column boundaries from left edges that repeat across rows.
    fn detect_columns(&self, spans: &[TextSpan], rows: &[&RowData]) -> Vec<f32> {
        let multi_span_rows: Vec<&RowData> = rows
            .iter()
            .copied()
            .filter(|r| r.indices.len() >= 2)
            .collect();

        let basis: &[&RowData] = if multi_span_rows.len() >= self.config.min_rows {
            &multi_span_rows
        } else {
            rows
        };
        if basis.is_empty() {
            return vec![];
        }

        // Each bucket counted once per row
        let mut edge_counts: HashMap<i32, usize> = HashMap::new();
        for row in basis {
            let buckets: HashSet<i32> = row
                .indices
                .iter()
                .map(|&i| (spans[i].bbox.x0 / BUCKET_SIZE).round() as i32)
                .collect();
            for bucket in buckets {
                *edge_counts.entry(bucket).or_insert(0) += 1;
            }
        }

        let min_occurrences =
            ((basis.len() as f32 * self.config.min_alignment_ratio) as usize).max(2);

        let mut edges: Vec<f32> = edge_counts
            .iter()
            .filter(|(_, count)| **count >= min_occurrences)
            .map(|(bucket, _)| *bucket as f32 * BUCKET_SIZE)
            .collect();
        edges.sort_by(f32::total_cmp);

        let mut merged: Vec<f32> = Vec::new();
        for edge in edges {
            match merged.last() {
                Some(&last) if edge - last < self.config.min_column_gap => {}
                _ => merged.push(edge),
            }
        }

        log::trace!("TableDetector: column edges {:?}", merged);
        merged
    }

    /// Share of a row's spans that sit on a column edge. Rows with fewer
    /// spans than the minimum column count never qualify.
    fn alignment_score(&self, spans: &[TextSpan], row: &RowData, columns: &[f32]) -> f32 {
        if row.indices.len() < self.config.min_columns || columns.is_empty() {
            return 0.0;
        }
        let aligned = row
            .indices
            .iter()
            .filter(|&&i| {
                columns
                    .iter()
                    .any(|col| (spans[i].bbox.x0 - col).abs() <= ALIGN_TOLERANCE)
            })
            .count();
        aligned as f32 / row.indices.len() as f32
    }

    /// Contiguous row ranges that line up with the columns.
    fn find_table_regions(
        &self,
        spans: &[TextSpan],
        rows: &[RowData],
        columns: &[f32],
    ) -> Vec<(usize, usize)> {
        if columns.len() < self.config.min_columns {
            return vec![];
        }

        let mut regions = Vec::new();
        let mut start: Option<usize> = None;

        for (i, row) in rows.iter().enumerate() {
            if self.alignment_score(spans, row, columns) >= self.config.min_alignment_ratio {
                start.get_or_insert(i);
            } else if let Some(s) = start.take() {
                if i - s >= self.config.min_rows {
                    regions.push((s, i - 1));
                }
            }
        }
        if let Some(s) = start {
            if rows.len() - s >= self.config.min_rows {
                regions.push((s, rows.len() - 1));
            }
        }
        regions
    }

    /// Which column a left edge belongs to.
    fn find_column(&self, x: f32, columns: &[f32]) -> usize {
        for (i, &col_start) in columns.iter().enumerate() {
            let col_end = columns.get(i + 1).copied().unwrap_or(f32::INFINITY);
            if x >= col_start - 10.0 && x < col_end - 10.0 {
                return i;
            }
        }

        columns
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| (x - **a).abs().total_cmp(&(x - **b).abs()))
            .map(|(i, _)| i)
            .unwrap_or(0)
    }

    /// Numbered or bulleted lists split into marker and text spans look
    /// like two-column tables.
    fn is_list_pattern(&self, spans: &[TextSpan], rows: &[RowData], columns: &[f32]) -> bool {
        if columns.len() < 2 || rows.is_empty() {
            return false;
        }

        let mut bullet_count = 0;
        let mut number_count = 0;
        for row in rows {
            if let Some(&first) = row.indices.first() {
                let text = spans[first].trimmed();
                if is_bullet_marker(text) {
                    bullet_count += 1;
                } else if is_number_marker(text) {
                    number_count += 1;
                }
            }
        }

        let bullet_ratio = bullet_count as f32 / rows.len() as f32;
        let total_ratio = (bullet_count + number_count) as f32 / rows.len() as f32;

        bullet_ratio >= 0.5 || (columns.len() == 2 && total_ratio >= 0.5)
    }

    /// Lay a region's rows out on a full grid, empty cells included.
    fn to_region(&self, spans: &[TextSpan], rows: &[RowData], columns: &[f32]) -> DetectedRegion {
        let mut cells = Vec::with_capacity(rows.len() * columns.len());
        for (row_idx, row) in rows.iter().enumerate() {
            let mut per_col: Vec<Vec<usize>> = vec![Vec::new(); columns.len()];
            for &i in &row.indices {
                let col = self.find_column(spans[i].bbox.x0, columns);
                per_col[col].push(i);
            }
            for (col_idx, span_indices) in per_col.into_iter().enumerate() {
                cells.push(CellPlacement {
                    row: row_idx,
                    col: col_idx,
                    span_indices,
                });
            }
        }
        DetectedRegion { cells }
    }
}

impl TableDetection for AlignmentTableDetector {
    fn detect_tables(&self, page_number: u32, spans: &[TextSpan]) -> Result<Vec<DetectedRegion>> {
        if spans.len() < self.config.min_rows * self.config.min_columns {
            return Ok(vec![]);
        }

        let rows = self.group_into_rows(spans);
        if rows.len() < self.config.min_rows {
            return Ok(vec![]);
        }

        let all_rows: Vec<&RowData> = rows.iter().collect();
        let columns = self.detect_columns(spans, &all_rows);
        let mut regions = Vec::new();

        for (start, end) in self.find_table_regions(spans, &rows, &columns) {
            let region_rows = &rows[start..=end];
            let region_ref: Vec<&RowData> = region_rows.iter().collect();
            let region_columns = self.detect_columns(spans, &region_ref);

            if region_columns.len() < self.config.min_columns {
                continue;
            }
            if region_columns.len() > self.config.max_columns {
                log::debug!(
                    "Page {}: skipping region with {} columns",
                    page_number,
                    region_columns.len()
                );
                continue;
            }
            if self.is_list_pattern(spans, region_rows, &region_columns) {
                log::debug!("Page {}: skipping list-shaped region", page_number);
                continue;
            }
            regions.push(self.to_region(spans, region_rows, &region_columns));
        }

        log::debug!("Page {}: detected {} table regions", page_number, regions.len());
        Ok(regions)
    }
}

/// Check if text is a bullet marker (•, -, etc.).
fn is_bullet_marker(text: &str) -> bool {
    matches!(
        text.trim(),
        "-" | "–" | "—" | "•" | "·" | "*" | "○" | "▪" | "◦" | "▸" | "►" | "■" | "●" | "※" | "□" | "◆" | "◇" | "▶" | "➤"
    )
}

/// Check if text is a number-style list marker (1., 2), a., etc.).
fn is_number_marker(text: &str) -> bool {
    let cleaned: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    if cleaned.is_empty() {
        return false;
    }

    if let Some(pos) = cleaned.find(|c: char| !c.is_ascii_digit()) {
        let (prefix, suffix) = cleaned.split_at(pos);
        if !prefix.is_empty() && (suffix == "." || suffix == ")") {
            return true;
        }
    }

    if cleaned.parse::<u32>().is_ok() {
        return true;
    }

    let chars: Vec<char> = cleaned.chars().collect();
    chars.len() == 2 && chars[0].is_alphabetic() && (chars[1] == '.' || chars[1] == ')')
}
