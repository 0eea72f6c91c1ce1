//! Document pipeline: per-document orchestration and batch execution.

mod batch;
mod orchestrator;

pub use batch::{BatchResult, BatchRunner, BatchSummary, CancelToken};
pub use orchestrator::{DocumentReport, ExtractionOrchestrator, Stage};
