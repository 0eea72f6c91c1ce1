//! Document-level structural extraction output.

use serde::Serialize;

use super::{ExtractionWarning, Footnote, Header, Table};

const PAGE_MARKER_OPEN: &str = "[[page ";
const PAGE_MARKER_CLOSE: &str = "]]";

/// The line placed before each page's body text.
pub fn page_marker(page_number: u32) -> String {
    format!("{}{}{}", PAGE_MARKER_OPEN, page_number, PAGE_MARKER_CLOSE)
}

/// Parse a page marker line back into its page number.
pub fn parse_page_marker(line: &str) -> Option<u32> {
    line.trim()
        .strip_prefix(PAGE_MARKER_OPEN)?
        .strip_suffix(PAGE_MARKER_CLOSE)?
        .parse()
        .ok()
}

/// Everything the structural stage learned about one document.
///
/// Built once by [`DocumentAssembler`](crate::parser::DocumentAssembler)
/// and read-only afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionResult {
    pub(crate) source_name: String,
    pub(crate) title: Option<String>,
    pub(crate) author: Option<String>,
    pub(crate) headers: Vec<Header>,
    pub(crate) tables: Vec<Table>,
    pub(crate) footnotes: Vec<Footnote>,
    pub(crate) body_text: String,
    pub(crate) page_count: u32,
    pub(crate) total_pages: u32,
    pub(crate) warnings: Vec<ExtractionWarning>,
}

impl ExtractionResult {
    /// File name (or other label) of the source document.
    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    /// Title from the document information dictionary.
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Author from the document information dictionary.
    pub fn author(&self) -> Option<&str> {
        self.author.as_deref()
    }

    /// Headers in page order, then reading order.
    pub fn headers(&self) -> &[Header] {
        &self.headers
    }

    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    pub fn footnotes(&self) -> &[Footnote] {
        &self.footnotes
    }

    /// Body text of all pages, each page preceded by a page marker line.
    pub fn body_text(&self) -> &str {
        &self.body_text
    }

    /// Split the body text back into `(page_number, text)` pairs.
    pub fn body_pages(&self) -> Vec<(u32, String)> {
        let mut pages: Vec<(u32, String)> = Vec::new();
        for line in self.body_text.lines() {
            if let Some(page) = parse_page_marker(line) {
                pages.push((page, String::new()));
                continue;
            }
            if let Some((_, text)) = pages.last_mut() {
                if !text.is_empty() {
                    text.push('\n');
                }
                text.push_str(line);
            }
        }
        pages
    }

    /// Number of pages that decoded successfully.
    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    /// Number of pages in the file, including ones that failed to decode.
    pub fn total_pages(&self) -> u32 {
        self.total_pages
    }

    pub fn headers_found(&self) -> usize {
        self.headers.len()
    }

    pub fn tables_found(&self) -> usize {
        self.tables.len()
    }

    pub fn footnotes_found(&self) -> usize {
        self.footnotes.len()
    }

    /// Recoverable problems hit while extracting.
    pub fn warnings(&self) -> &[ExtractionWarning] {
        &self.warnings
    }

    /// Whether no text at all was extracted.
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
            && self.tables.is_empty()
            && self.footnotes.is_empty()
            && self.body_pages().iter().all(|(_, text)| text.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_marker_round_trip() {
        assert_eq!(page_marker(3), "[[page 3]]");
        assert_eq!(parse_page_marker("[[page 12]]"), Some(12));
        assert_eq!(parse_page_marker("  [[page 1]]  "), Some(1));
        assert_eq!(parse_page_marker("[[page x]]"), None);
        assert_eq!(parse_page_marker("page 1"), None);
    }

    #[test]
    fn test_body_pages() {
        let result = ExtractionResult {
            source_name: "doc.pdf".into(),
            title: None,
            author: None,
            headers: vec![],
            tables: vec![],
            footnotes: vec![],
            body_text: "[[page 1]]\nfirst line\nsecond line\n[[page 3]]\nthird".into(),
            page_count: 2,
            total_pages: 3,
            warnings: vec![],
        };
        let pages = result.body_pages();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0], (1, "first line\nsecond line".to_string()));
        assert_eq!(pages[1], (3, "third".to_string()));
        assert!(!result.is_empty());
    }
}
