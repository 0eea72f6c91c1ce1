//! Structural extraction: PDF pages to classified elements.
//!
//! [`PageSpanCollector`] reads spans from a page's content stream,
//! [`StructuralClassifier`] labels them, and [`DocumentAssembler`] merges
//! the pages into an [`ExtractionResult`](crate::model::ExtractionResult).
//! [`StructureExtractor`] runs all three.

mod assembler;
mod backend;
mod classifier;
mod collector;
mod extractor;
mod table_detector;

pub use assembler::DocumentAssembler;
pub use backend::{
    BackendFontInfo, ContentOp, DocumentInfo, LopdfBackend, PageId, PdfBackend, PdfValue,
    DEFAULT_PAGE_HEIGHT,
};
pub use classifier::{
    ClassifiedPage, DocumentThresholds, PagePartition, SpanLabel, StructuralClassifier,
};
pub use collector::PageSpanCollector;
pub use extractor::StructureExtractor;
pub use table_detector::{
    AlignmentTableDetector, CellPlacement, DetectedRegion, TableDetection, TableDetectorConfig,
};
