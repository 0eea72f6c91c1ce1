//! Per-document pipeline.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::Semaphore;

use crate::classify::{
    call_with_retry, ModelClient, ModelRequest, Prompt, PromptBuilder, Reconciliation,
    ResponseReconciler, RetryPolicy,
};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::{
    CategorizedKnowledge, CategorySchema, ClassificationStatus, ExtractionMode, ExtractionResult,
    ExtractionWarning, WarningKind,
};
use crate::parser::StructureExtractor;

/// Where a document is in the pipeline.
///
/// Stages only move forward, except that one classification retry goes
/// from `Classified` back to `PromptBuilt` once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Loaded,
    Extracted,
    PromptBuilt,
    Classified,
    Done,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Loaded => "loaded",
            Stage::Extracted => "extracted",
            Stage::PromptBuilt => "prompt-built",
            Stage::Classified => "classified",
            Stage::Done => "done",
            Stage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Outcome of processing one document.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentReport {
    pub source: String,
    pub path: Option<PathBuf>,
    /// `Done` or `Failed`
    pub stage: Stage,
    /// The knowledge record; absent only when the document failed
    pub knowledge: Option<CategorizedKnowledge>,
    /// Structural output, kept even when classification failed
    #[serde(skip)]
    pub extraction: Option<ExtractionResult>,
    pub warnings: Vec<ExtractionWarning>,
    /// Why the document failed, when it did
    pub error: Option<String>,
    #[serde(skip)]
    pub elapsed: Duration,
}

impl DocumentReport {
    pub fn is_success(&self) -> bool {
        self.stage == Stage::Done
    }

    /// Classification status of the record, if one was produced.
    pub fn status(&self) -> Option<ClassificationStatus> {
        self.knowledge.as_ref().map(CategorizedKnowledge::status)
    }
}

/// Tracks one document through the stages.
struct Run {
    source: String,
    path: Option<PathBuf>,
    stage: Stage,
    warnings: Vec<ExtractionWarning>,
    started: Instant,
}

impl Run {
    fn new(source: String, path: Option<PathBuf>) -> Self {
        log::debug!("{}: {}", source, Stage::Loaded);
        Self {
            source,
            path,
            stage: Stage::Loaded,
            warnings: Vec::new(),
            started: Instant::now(),
        }
    }

    fn advance(&mut self, next: Stage) {
        log::debug!("{}: {} -> {}", self.source, self.stage, next);
        self.stage = next;
    }

    fn fail(mut self, error: Error) -> DocumentReport {
        log::error!("{}: {}", self.source, error);
        self.advance(Stage::Failed);
        DocumentReport {
            source: self.source,
            path: self.path,
            stage: self.stage,
            knowledge: None,
            extraction: None,
            warnings: self.warnings,
            error: Some(error.to_string()),
            elapsed: self.started.elapsed(),
        }
    }

    fn done(
        mut self,
        knowledge: CategorizedKnowledge,
        extraction: ExtractionResult,
    ) -> DocumentReport {
        self.advance(Stage::Done);
        log::info!(
            "{}: {} ({} items in {} categories, {:.1?})",
            self.source,
            match knowledge.status() {
                ClassificationStatus::Complete => "complete",
                ClassificationStatus::Degraded => "degraded",
                ClassificationStatus::Failed => "classification failed",
            },
            knowledge.total_items(),
            knowledge.populated_count(),
            self.started.elapsed()
        );
        DocumentReport {
            source: self.source,
            path: self.path,
            stage: self.stage,
            knowledge: Some(knowledge),
            extraction: Some(extraction),
            warnings: self.warnings,
            error: None,
            elapsed: self.started.elapsed(),
        }
    }
}

/// Drives collect, classify, assemble, prompt, model call and
/// reconciliation for one document at a time.
pub struct ExtractionOrchestrator<C> {
    config: Arc<Config>,
    schema: Arc<CategorySchema>,
    extractor: Arc<StructureExtractor>,
    client: Arc<C>,
    model_gate: Arc<Semaphore>,
    policy: RetryPolicy,
}

impl<C: ModelClient + 'static> ExtractionOrchestrator<C> {
    pub fn new(config: Config, client: C) -> Result<Self> {
        Self::from_shared(Arc::new(config), Arc::new(client))
    }

    pub fn from_shared(config: Arc<Config>, client: Arc<C>) -> Result<Self> {
        config.validate()?;
        let extractor = StructureExtractor::new(&config.extraction)?;
        Ok(Self {
            schema: Arc::new(CategorySchema::from_config(&config.prompts)),
            extractor: Arc::new(extractor),
            model_gate: Arc::new(Semaphore::new(config.batch.max_concurrent_model_calls)),
            policy: RetryPolicy::from_settings(&config.model),
            client,
            config,
        })
    }

    /// Replace the structural extractor, e.g. to plug in another table
    /// detector.
    pub fn with_extractor(mut self, extractor: StructureExtractor) -> Self {
        self.extractor = Arc::new(extractor);
        self
    }

    /// Share a model-call gate with other orchestrators.
    pub fn with_model_gate(mut self, gate: Arc<Semaphore>) -> Self {
        self.model_gate = gate;
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn schema(&self) -> &CategorySchema {
        &self.schema
    }

    /// Process one PDF file. Never panics or returns an error: a document
    /// that cannot be opened yields a `Failed` report.
    pub async fn process_file(&self, path: &Path, mode: ExtractionMode) -> DocumentReport {
        let source = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let run = Run::new(source, Some(path.to_path_buf()));

        let extractor = Arc::clone(&self.extractor);
        let owned = path.to_path_buf();
        let extracted =
            tokio::task::spawn_blocking(move || extractor.extract_file(&owned)).await;
        self.finish_extraction(run, extracted, mode).await
    }

    /// Process a PDF held in memory.
    pub async fn process_bytes(
        &self,
        data: Vec<u8>,
        source_name: &str,
        mode: ExtractionMode,
    ) -> DocumentReport {
        let run = Run::new(source_name.to_string(), None);
        let extractor = Arc::clone(&self.extractor);
        let name = source_name.to_string();
        let extracted =
            tokio::task::spawn_blocking(move || extractor.extract_bytes(&data, &name)).await;
        self.finish_extraction(run, extracted, mode).await
    }

    async fn finish_extraction(
        &self,
        mut run: Run,
        extracted: std::result::Result<Result<ExtractionResult>, tokio::task::JoinError>,
        mode: ExtractionMode,
    ) -> DocumentReport {
        let extraction = match extracted {
            Ok(Ok(extraction)) => extraction,
            Ok(Err(e)) => return run.fail(e),
            Err(e) => return run.fail(Error::Other(format!("extraction task failed: {}", e))),
        };
        run.advance(Stage::Extracted);
        run.warnings.extend(extraction.warnings().iter().cloned());

        let knowledge = self.classify(&mut run, &extraction, mode).await;
        run.done(knowledge, extraction)
    }

    /// Build the prompt, call the model and reconcile. A response that
    /// yields nothing gets one retry with a stricter prompt; if that also
    /// fails, the record carries structural detail only.
    async fn classify(
        &self,
        run: &mut Run,
        extraction: &ExtractionResult,
        mode: ExtractionMode,
    ) -> CategorizedKnowledge {
        let reconciler = ResponseReconciler::new(&self.schema);
        let builder = PromptBuilder::new(
            &self.schema,
            &self.config.prompts,
            self.config.extraction.max_prompt_chars,
        );

        if extraction.is_empty() {
            run.warnings.push(ExtractionWarning::new(
                WarningKind::ModelCall,
                "no text extracted; model not called",
            ));
            log::warn!("{}: no text extracted, skipping model call", run.source);
            return reconciler.structural_only(extraction, mode, chrono::Utc::now());
        }

        let prompt = builder.build(extraction, mode);
        run.advance(Stage::PromptBuilt);
        let first = match self.call(run, prompt).await {
            Some(raw) => reconciler.reconcile(&raw, extraction, mode),
            None => return self.call_failed(run, &reconciler, extraction, mode),
        };
        run.advance(Stage::Classified);
        if !first.is_failed() {
            return self.accept(run, first);
        }

        log::warn!("{}: response unusable, retrying with strict prompt", run.source);
        run.warnings.extend(first.warnings);
        let prompt = builder.build_strict(extraction, mode);
        run.advance(Stage::PromptBuilt);
        let second = match self.call(run, prompt).await {
            Some(raw) => reconciler.reconcile(&raw, extraction, mode),
            None => return self.call_failed(run, &reconciler, extraction, mode),
        };
        run.advance(Stage::Classified);
        self.accept(run, second)
    }

    fn accept(&self, run: &mut Run, reconciliation: Reconciliation) -> CategorizedKnowledge {
        run.warnings.extend(reconciliation.warnings);
        reconciliation.knowledge
    }

    fn call_failed(
        &self,
        run: &mut Run,
        reconciler: &ResponseReconciler<'_>,
        extraction: &ExtractionResult,
        mode: ExtractionMode,
    ) -> CategorizedKnowledge {
        run.advance(Stage::Classified);
        reconciler.structural_only(extraction, mode, chrono::Utc::now())
    }

    /// One gated model call with retries. Failures become a warning.
    async fn call(&self, run: &mut Run, prompt: Prompt) -> Option<String> {
        run.warnings.extend(prompt.warnings);
        let request = ModelRequest {
            prompt: prompt.text,
            model: self.config.model.model_name.clone(),
            temperature: self.config.model.temperature,
            max_tokens: self.config.model.max_tokens,
        };

        let _permit = match self.model_gate.acquire().await {
            Ok(permit) => permit,
            Err(_) => {
                run.warnings.push(ExtractionWarning::new(
                    WarningKind::ModelCall,
                    "model-call gate closed",
                ));
                return None;
            }
        };

        match call_with_retry(self.client.as_ref(), &request, &self.policy).await {
            Ok(raw) => Some(raw),
            Err(e) => {
                run.warnings.push(ExtractionWarning::new(
                    WarningKind::ModelCall,
                    e.to_string(),
                ));
                None
            }
        }
    }
}
