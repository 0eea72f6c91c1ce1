//! Concurrent processing of many documents.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;

use crate::classify::ModelClient;
use crate::model::{ClassificationStatus, ExtractionMode};

use super::orchestrator::{DocumentReport, ExtractionOrchestrator};

/// Cooperative cancellation flag shared by a batch and its caller.
///
/// Cancelling stops new documents from starting; documents already
/// running finish normally.
#[derive(Debug, Clone)]
pub struct CancelToken {
    sender: Arc<watch::Sender<bool>>,
    receiver: watch::Receiver<bool>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        let (sender, receiver) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
            receiver,
        }
    }

    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolve once the token is cancelled.
    pub async fn cancelled(&self) {
        let mut receiver = self.receiver.clone();
        // The sender outlives every receiver clone.
        let _ = receiver.wait_for(|cancelled| *cancelled).await;
    }
}

/// Counts for a finished batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchSummary {
    /// Classified with a complete record
    pub complete: usize,
    /// Record produced but degraded or classification failed
    pub degraded: usize,
    /// Could not be processed at all
    pub failed: usize,
    /// Never started because the batch was cancelled
    pub skipped: Vec<PathBuf>,
    pub elapsed: Duration,
}

impl BatchSummary {
    pub fn processed(&self) -> usize {
        self.complete + self.degraded + self.failed
    }

    fn record(&mut self, status: Option<ClassificationStatus>) {
        match status {
            None => self.failed += 1,
            Some(ClassificationStatus::Complete) => self.complete += 1,
            Some(_) => self.degraded += 1,
        }
    }
}

/// Reports and summary of a batch run.
#[derive(Debug)]
pub struct BatchResult {
    /// Reports in completion order
    pub reports: Vec<DocumentReport>,
    pub summary: BatchSummary,
}

/// Runs the per-document pipeline over many files with bounded
/// concurrency.
///
/// At most `max_workers` documents are in flight; model calls are further
/// limited by the orchestrator's model-call gate.
pub struct BatchRunner<C> {
    orchestrator: Arc<ExtractionOrchestrator<C>>,
    workers: Arc<Semaphore>,
    cancel: CancelToken,
}

impl<C: ModelClient + 'static> BatchRunner<C> {
    pub fn new(orchestrator: ExtractionOrchestrator<C>) -> Self {
        let max_workers = orchestrator.config().batch.max_workers.max(1);
        Self {
            orchestrator: Arc::new(orchestrator),
            workers: Arc::new(Semaphore::new(max_workers)),
            cancel: CancelToken::new(),
        }
    }

    /// Use an externally owned cancellation token.
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Process every file and collect the reports.
    pub async fn run(&self, paths: Vec<PathBuf>, mode: ExtractionMode) -> BatchResult {
        let (sender, receiver) = crossbeam_channel::unbounded();
        let summary = self.run_streaming(paths, mode, sender).await;
        BatchResult {
            reports: receiver.try_iter().collect(),
            summary,
        }
    }

    /// Process every file, sending each report as soon as it is ready.
    ///
    /// The sender should be unbounded or have room for every report; a
    /// dropped receiver is tolerated.
    pub async fn run_streaming(
        &self,
        paths: Vec<PathBuf>,
        mode: ExtractionMode,
        sink: Sender<DocumentReport>,
    ) -> BatchSummary {
        let started = Instant::now();
        let mut summary = BatchSummary::default();
        let mut tasks: JoinSet<Option<ClassificationStatus>> = JoinSet::new();
        let total = paths.len();

        log::info!("Starting batch of {} documents", total);

        for path in paths {
            if self.cancel.is_cancelled() {
                summary.skipped.push(path);
                continue;
            }
            let permit = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => None,
                permit = Arc::clone(&self.workers).acquire_owned() => permit.ok(),
            };
            let Some(permit) = permit else {
                summary.skipped.push(path);
                continue;
            };

            let orchestrator = Arc::clone(&self.orchestrator);
            let sink = sink.clone();
            tasks.spawn(async move {
                let report = orchestrator.process_file(&path, mode).await;
                drop(permit);
                let status = report.status();
                if sink.send(report).is_err() {
                    log::debug!("Report receiver dropped");
                }
                status
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(status) => summary.record(status),
                Err(e) => {
                    log::error!("Document task panicked: {}", e);
                    summary.failed += 1;
                }
            }
        }

        if !summary.skipped.is_empty() {
            log::warn!(
                "Batch cancelled: {} of {} documents skipped",
                summary.skipped.len(),
                total
            );
        }
        summary.elapsed = started.elapsed();
        log::info!(
            "Batch finished: {} complete, {} degraded, {} failed, {} skipped in {:.1?}",
            summary.complete,
            summary.degraded,
            summary.failed,
            summary.skipped.len(),
            summary.elapsed
        );
        summary
    }
}
