//! Structural extraction of a whole document.

use std::path::Path;

use rayon::prelude::*;

use crate::config::ExtractionSettings;
use crate::detect::{detect_format_from_bytes, detect_format_from_path};
use crate::error::Result;
use crate::model::{ExtractionResult, TextSpan};

use super::assembler::DocumentAssembler;
use super::backend::{LopdfBackend, PdfBackend};
use super::classifier::StructuralClassifier;
use super::collector::PageSpanCollector;
use super::table_detector::{AlignmentTableDetector, TableDetection};

/// Runs span collection, classification and assembly for one document.
///
/// # Example
///
/// ```no_run
/// use pdfknow::config::ExtractionSettings;
/// use pdfknow::parser::StructureExtractor;
///
/// let extractor = StructureExtractor::new(&ExtractionSettings::default())?;
/// let result = extractor.extract_file("report.pdf")?;
/// println!("{} headers", result.headers_found());
/// # Ok::<(), pdfknow::Error>(())
/// ```
pub struct StructureExtractor {
    classifier: StructuralClassifier,
    detector: Box<dyn TableDetection>,
    parallel: bool,
}

impl StructureExtractor {
    pub fn new(settings: &ExtractionSettings) -> Result<Self> {
        Ok(Self {
            classifier: StructuralClassifier::new(settings)?,
            detector: Box::new(AlignmentTableDetector::new()),
            parallel: settings.parallel,
        })
    }

    /// Replace the table-detection facility.
    pub fn with_detector(mut self, detector: impl TableDetection + 'static) -> Self {
        self.detector = Box::new(detector);
        self
    }

    /// Open and extract a PDF file.
    ///
    /// Fails only when the file cannot be opened as a PDF at all.
    pub fn extract_file<P: AsRef<Path>>(&self, path: P) -> Result<ExtractionResult> {
        let path = path.as_ref();
        let format = detect_format_from_path(path)?;
        log::debug!("{}: PDF {}", path.display(), format.version);
        let backend = LopdfBackend::load_file(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(self.extract(&backend, name))
    }

    /// Extract a PDF held in memory.
    pub fn extract_bytes(&self, data: &[u8], source_name: &str) -> Result<ExtractionResult> {
        detect_format_from_bytes(data)?;
        let backend = LopdfBackend::load_bytes(data)?;
        Ok(self.extract(&backend, source_name))
    }

    /// Extract from an opened backend. Pages that fail to decode are
    /// skipped with a warning.
    pub fn extract<B>(&self, backend: &B, source_name: impl Into<String>) -> ExtractionResult
    where
        B: PdfBackend + Sync + ?Sized,
    {
        let collector = PageSpanCollector::new(backend);
        let page_numbers: Vec<u32> = backend.pages().keys().copied().collect();

        let collect = |page: u32| (page, collector.collect(page));
        let collected: Vec<(u32, Result<Vec<TextSpan>>)> = if self.parallel {
            page_numbers.into_par_iter().map(collect).collect()
        } else {
            page_numbers.into_iter().map(collect).collect()
        };

        let mut assembler = DocumentAssembler::new(source_name);
        let info = backend.info();
        assembler.set_metadata(info.title, info.author);

        let mut decoded = Vec::with_capacity(collected.len());
        for (page, spans) in collected {
            match spans {
                Ok(spans) => decoded.push((page, spans)),
                Err(e) => {
                    log::warn!("Skipping page {}: {}", page, e);
                    assembler.add_failed_page(page, e.to_string());
                }
            }
        }

        let detector = self.detector.as_ref();
        let partitions: Vec<_> = if self.parallel {
            decoded
                .into_par_iter()
                .map(|(page, spans)| self.classifier.partition_tables(page, spans, detector))
                .collect()
        } else {
            decoded
                .into_iter()
                .map(|(page, spans)| self.classifier.partition_tables(page, spans, detector))
                .collect()
        };

        let thresholds = self.classifier.thresholds(&partitions);
        log::debug!(
            "Median font size {:.1}, header sizes {:?}",
            thresholds.median_font_size,
            thresholds.header_sizes()
        );

        let pages: Vec<_> = if self.parallel {
            partitions
                .into_par_iter()
                .map(|p| self.classifier.classify_page(p, &thresholds))
                .collect()
        } else {
            partitions
                .into_iter()
                .map(|p| self.classifier.classify_page(p, &thresholds))
                .collect()
        };
        for page in pages {
            assembler.add_page(page);
        }
        assembler.finish()
    }
}
