//! # pdfknow
//!
//! Structured knowledge extraction from PDF documents.
//!
//! Each page is read into positioned text spans, which are classified as
//! headers, footnotes, tables or body text by font size and position. The
//! assembled document is then sent to a generative model in one request,
//! and the answer is reconciled into a fixed set of knowledge categories.
//! A malformed or missing answer still yields a record, marked degraded
//! or failed.
//!
//! ## Quick Start
//!
//! ```no_run
//! use pdfknow::{Config, ExtractionMode, ExtractionOrchestrator, GeminiClient};
//!
//! # async fn run() -> pdfknow::Result<()> {
//! let config = Config::new().with_api_key_from_env();
//! let client = GeminiClient::new(&config.model.api_key, config.model.request_timeout())?;
//! let orchestrator = ExtractionOrchestrator::new(config, client)?;
//!
//! let report = orchestrator
//!     .process_file("report.pdf".as_ref(), ExtractionMode::Detailed)
//!     .await;
//! if let Some(knowledge) = &report.knowledge {
//!     println!("{}", pdfknow::render::to_json(knowledge, Default::default())?);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Structural extraction alone needs no model:
//!
//! ```no_run
//! let extraction = pdfknow::extract_structure("report.pdf", &pdfknow::Config::new())?;
//! println!("{} headers", extraction.headers_found());
//! # Ok::<(), pdfknow::Error>(())
//! ```

pub mod classify;
pub mod config;
pub mod detect;
pub mod error;
pub mod model;
pub mod parser;
pub mod pipeline;
pub mod render;

// Re-export commonly used types
#[cfg(feature = "gemini")]
pub use classify::GeminiClient;
pub use classify::{ModelClient, ModelRequest, PromptBuilder, ResponseReconciler, RetryPolicy};
pub use config::{BatchSettings, Config, ExtractionSettings, ModelSettings, PromptSettings};
pub use detect::{detect_format_from_bytes, detect_format_from_path, PdfFormat};
pub use error::{Error, ModelCallError, Result};
pub use model::{
    CategorizedKnowledge, CategorySchema, ClassificationStatus, ExtractionMode, ExtractionResult,
    ExtractionWarning, Footnote, Header, Table, TextSpan, WarningKind,
};
pub use parser::{StructureExtractor, TableDetection};
pub use pipeline::{
    BatchResult, BatchRunner, BatchSummary, CancelToken, DocumentReport, ExtractionOrchestrator,
    Stage,
};
pub use render::JsonFormat;

use std::path::Path;

/// Run structural extraction on a PDF file, without any model call.
///
/// # Example
///
/// ```no_run
/// use pdfknow::{extract_structure, Config};
///
/// let config = Config::new().with_tables(false);
/// let extraction = extract_structure("document.pdf", &config).unwrap();
/// println!("Pages: {}", extraction.page_count());
/// ```
pub fn extract_structure<P: AsRef<Path>>(path: P, config: &Config) -> Result<ExtractionResult> {
    StructureExtractor::new(&config.extraction)?.extract_file(path.as_ref())
}

/// Run structural extraction on a PDF held in memory.
pub fn extract_structure_bytes(
    data: &[u8],
    source_name: &str,
    config: &Config,
) -> Result<ExtractionResult> {
    StructureExtractor::new(&config.extraction)?.extract_bytes(data, source_name)
}

/// Version of the library.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
