//! Document assembly.

use std::collections::BTreeMap;

use crate::model::{
    page_marker, ExtractionResult, ExtractionWarning, StructuralElement, Table, TableCell,
    WarningKind,
};

use super::classifier::ClassifiedPage;

enum PageOutcome {
    Classified(ClassifiedPage),
    Failed(String),
}

/// Merges classified pages into one [`ExtractionResult`].
///
/// Pages may be added in any order; they are assembled by page number.
pub struct DocumentAssembler {
    source_name: String,
    title: Option<String>,
    author: Option<String>,
    pages: BTreeMap<u32, PageOutcome>,
}

impl DocumentAssembler {
    pub fn new(source_name: impl Into<String>) -> Self {
        Self {
            source_name: source_name.into(),
            title: None,
            author: None,
            pages: BTreeMap::new(),
        }
    }

    /// Set title and author from the document information dictionary.
    pub fn set_metadata(&mut self, title: Option<String>, author: Option<String>) {
        self.title = title.filter(|t| !t.trim().is_empty());
        self.author = author.filter(|a| !a.trim().is_empty());
    }

    pub fn add_page(&mut self, page: ClassifiedPage) {
        self.pages
            .insert(page.page_number, PageOutcome::Classified(page));
    }

    /// Record a page that could not be decoded.
    pub fn add_failed_page(&mut self, page_number: u32, reason: impl Into<String>) {
        self.pages
            .insert(page_number, PageOutcome::Failed(reason.into()));
    }

    pub fn finish(self) -> ExtractionResult {
        let total_pages = self.pages.len() as u32;
        let mut result = ExtractionResult {
            source_name: self.source_name,
            title: self.title,
            author: self.author,
            headers: Vec::new(),
            tables: Vec::new(),
            footnotes: Vec::new(),
            body_text: String::new(),
            page_count: 0,
            total_pages,
            warnings: Vec::new(),
        };

        for (page_number, outcome) in self.pages {
            match outcome {
                PageOutcome::Failed(reason) => {
                    result.warnings.push(
                        ExtractionWarning::new(WarningKind::PageDecode, reason)
                            .on_page(page_number),
                    );
                }
                PageOutcome::Classified(page) => {
                    result.page_count += 1;
                    result.warnings.extend(page.warnings);
                    let lines = assemble_page(page_number, page.elements, &mut result);
                    if !result.body_text.is_empty() {
                        result.body_text.push('\n');
                    }
                    result.body_text.push_str(&page_marker(page_number));
                    for line in lines {
                        result.body_text.push('\n');
                        result.body_text.push_str(&line);
                    }
                }
            }
        }

        log::info!(
            "{}: assembled {}/{} pages, {} headers, {} tables, {} footnotes",
            result.source_name,
            result.page_count,
            result.total_pages,
            result.headers.len(),
            result.tables.len(),
            result.footnotes.len()
        );
        result
    }
}

/// Sort one page's elements into the result; returns the page's body lines.
fn assemble_page(
    page_number: u32,
    elements: Vec<StructuralElement>,
    result: &mut ExtractionResult,
) -> Vec<String> {
    let mut lines = Vec::new();
    let mut cells: Vec<TableCell> = Vec::new();

    for element in elements {
        if let StructuralElement::TableCell(cell) = element {
            if cells.first().is_some_and(|c| c.region != cell.region) {
                flush_table(page_number, &mut cells, &mut lines, result);
            }
            cells.push(cell);
            continue;
        }
        flush_table(page_number, &mut cells, &mut lines, result);

        match element {
            StructuralElement::Header(header) => {
                lines.push(header.text.clone());
                result.headers.push(header);
            }
            StructuralElement::Footnote(footnote) => {
                lines.push(footnote.text.clone());
                result.footnotes.push(footnote);
            }
            StructuralElement::Body(body) => lines.push(body.text),
            StructuralElement::TableCell(_) => {}
        }
    }
    flush_table(page_number, &mut cells, &mut lines, result);
    lines
}

fn flush_table(
    page_number: u32,
    cells: &mut Vec<TableCell>,
    lines: &mut Vec<String>,
    result: &mut ExtractionResult,
) {
    if cells.is_empty() {
        return;
    }
    let cells = std::mem::take(cells);
    match Table::from_cells(page_number, &cells) {
        Ok(table) => {
            lines.push(table.render_compact());
            result.tables.push(table);
        }
        Err(e) => {
            log::warn!("Page {}: table kept as text: {}", page_number, e);
            result.warnings.push(
                ExtractionWarning::new(WarningKind::TableGrid, e.to_string()).on_page(page_number),
            );
            let text = cells
                .iter()
                .map(|c| c.text.as_str())
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
                .join(" ");
            if !text.is_empty() {
                lines.push(text);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Body, Header};

    fn header(text: &str, page: u32) -> StructuralElement {
        StructuralElement::Header(Header {
            text: text.into(),
            level: 1,
            font_size: 18.0,
            page_number: page,
            spans: vec![],
        })
    }

    fn body(text: &str, page: u32) -> StructuralElement {
        StructuralElement::Body(Body {
            text: text.into(),
            page_number: page,
            spans: vec![],
        })
    }

    fn cell(text: &str, row: usize, col: usize, region: usize, page: u32) -> StructuralElement {
        StructuralElement::TableCell(TableCell {
            text: text.into(),
            row_index: row,
            col_index: col,
            region,
            page_number: page,
            spans: vec![],
        })
    }

    fn page(page_number: u32, elements: Vec<StructuralElement>) -> ClassifiedPage {
        ClassifiedPage {
            page_number,
            elements,
            warnings: vec![],
        }
    }

    #[test]
    fn test_assemble_orders_pages() {
        let mut assembler = DocumentAssembler::new("report.pdf");
        assembler.add_page(page(2, vec![body("second page", 2)]));
        assembler.add_page(page(1, vec![header("Intro", 1), body("first page", 1)]));
        let result = assembler.finish();

        assert_eq!(result.page_count(), 2);
        assert_eq!(result.headers_found(), 1);
        assert_eq!(
            result.body_text(),
            "[[page 1]]\nIntro\nfirst page\n[[page 2]]\nsecond page"
        );
    }

    #[test]
    fn test_failed_page_not_counted() {
        let mut assembler = DocumentAssembler::new("doc.pdf");
        assembler.add_page(page(1, vec![body("ok", 1)]));
        assembler.add_failed_page(2, "bad stream");
        assembler.add_page(page(3, vec![body("ok", 3)]));
        let result = assembler.finish();

        assert_eq!(result.page_count(), 2);
        assert_eq!(result.total_pages(), 3);
        assert_eq!(result.warnings().len(), 1);
        assert_eq!(result.warnings()[0].kind, WarningKind::PageDecode);
        assert_eq!(result.warnings()[0].page, Some(2));
        let pages: Vec<u32> = result.body_pages().iter().map(|(p, _)| *p).collect();
        assert_eq!(pages, vec![1, 3]);
    }

    #[test]
    fn test_tables_grouped_by_region() {
        let mut assembler = DocumentAssembler::new("doc.pdf");
        assembler.add_page(page(
            1,
            vec![
                cell("a", 0, 0, 0, 1),
                cell("b", 0, 1, 0, 1),
                body("between", 1),
                cell("x", 0, 0, 1, 1),
                cell("y", 1, 0, 1, 1),
            ],
        ));
        let result = assembler.finish();
        assert_eq!(result.tables_found(), 2);
        assert_eq!(result.tables()[0].rows, vec![vec!["a", "b"]]);
        assert_eq!(result.body_text(), "[[page 1]]\na | b\nbetween\nx\ny");
    }

    #[test]
    fn test_bad_grid_kept_as_text() {
        let mut assembler = DocumentAssembler::new("doc.pdf");
        assembler.add_page(page(1, vec![cell("a", 0, 0, 0, 1), cell("c", 2, 0, 0, 1)]));
        let result = assembler.finish();
        assert_eq!(result.tables_found(), 0);
        assert_eq!(result.warnings()[0].kind, WarningKind::TableGrid);
        assert!(result.body_text().contains("a c"));
    }

    #[test]
    fn test_metadata_blank_values_dropped() {
        let mut assembler = DocumentAssembler::new("doc.pdf");
        assembler.set_metadata(Some("Annual Report".into()), Some("  ".into()));
        let result = assembler.finish();
        assert_eq!(result.title(), Some("Annual Report"));
        assert_eq!(result.author(), None);
        assert!(result.is_empty());
    }
}
