//! Data model shared by the structural and classification stages.
//!
//! Spans and elements are produced per page and owned by the document
//! being processed; [`ExtractionResult`] owns the assembled sequences;
//! [`CategorizedKnowledge`] is a fresh value with no reference back to
//! the extraction.

mod element;
mod extraction;
mod knowledge;
mod schema;
mod span;
mod table;
mod warning;

pub use element::{Body, ElementKind, Footnote, Header, StructuralElement, TableCell};
pub use extraction::{page_marker, parse_page_marker, ExtractionResult};
pub use knowledge::{CategorizedKnowledge, ClassificationStatus, KnowledgeMetadata};
pub use schema::{normalize_name, CategoryDef, CategorySchema, ExtractionMode, DETAILED_INFO};
pub use span::{BoundingBox, FontFlags, TextSpan};
pub use table::Table;
pub use warning::{ExtractionWarning, WarningKind};
