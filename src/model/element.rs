//! Classified structural elements.

use serde::{Deserialize, Serialize};

use super::TextSpan;

/// A heading line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Header {
    pub text: String,
    /// 1 = largest header font size in the document
    pub level: u8,
    pub font_size: f32,
    pub page_number: u32,
    pub spans: Vec<TextSpan>,
}

/// A footnote or bottom-of-page note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Footnote {
    pub text: String,
    /// Leading marker such as `"1."`, `"*"` or `"注3"`, when one was matched
    pub marker_text: Option<String>,
    pub page_number: u32,
    pub spans: Vec<TextSpan>,
}

/// One cell of a detected table region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableCell {
    pub text: String,
    pub row_index: usize,
    pub col_index: usize,
    /// Index of the table region on its page
    pub region: usize,
    pub page_number: u32,
    pub spans: Vec<TextSpan>,
}

/// Running text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Body {
    pub text: String,
    pub page_number: u32,
    pub spans: Vec<TextSpan>,
}

/// Element kind without payload, for counting and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    Header,
    Footnote,
    TableCell,
    Body,
}

/// A span (or group of spans) labelled by the structural classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StructuralElement {
    Header(Header),
    Footnote(Footnote),
    TableCell(TableCell),
    Body(Body),
}

impl StructuralElement {
    pub fn kind(&self) -> ElementKind {
        match self {
            StructuralElement::Header(_) => ElementKind::Header,
            StructuralElement::Footnote(_) => ElementKind::Footnote,
            StructuralElement::TableCell(_) => ElementKind::TableCell,
            StructuralElement::Body(_) => ElementKind::Body,
        }
    }

    pub fn text(&self) -> &str {
        match self {
            StructuralElement::Header(h) => &h.text,
            StructuralElement::Footnote(f) => &f.text,
            StructuralElement::TableCell(c) => &c.text,
            StructuralElement::Body(b) => &b.text,
        }
    }

    pub fn page_number(&self) -> u32 {
        match self {
            StructuralElement::Header(h) => h.page_number,
            StructuralElement::Footnote(f) => f.page_number,
            StructuralElement::TableCell(c) => c.page_number,
            StructuralElement::Body(b) => b.page_number,
        }
    }

    /// The spans this element was built from.
    pub fn spans(&self) -> &[TextSpan] {
        match self {
            StructuralElement::Header(h) => &h.spans,
            StructuralElement::Footnote(f) => &f.spans,
            StructuralElement::TableCell(c) => &c.spans,
            StructuralElement::Body(b) => &b.spans,
        }
    }
}
