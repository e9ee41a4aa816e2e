//! Out-of-band diagram completion.
//!
//! A render pass only queues [`PendingRender`] jobs. The scheduler runs them
//! through the engine outside the document lock and writes results back
//! through the cache's ticket check, producing a [`DiagramPatch`] for the
//! host to apply to the presented document. Results whose ticket went stale
//! (the block changed, moved or its document was discarded) produce no patch.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::document::DocumentStore;
use crate::view::{ViewMode, ViewPatch, diagram_box_id};

use super::cache::{DiagramStatus, RenderTicket, Resolution};
use super::engine::{DiagramEngine, DiagramError};
use super::languages::DiagramLanguage;

/// A render requested by a pass and not yet run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRender {
    pub document_id: String,
    pub ticket: RenderTicket,
    pub language: DiagramLanguage,
    /// Trimmed diagram source.
    pub source: String,
}

impl PendingRender {
    pub fn position(&self) -> usize {
        self.ticket.position
    }
}

/// Result of a completed render, addressed to a diagram box.
#[derive(Debug, Clone, PartialEq)]
pub struct DiagramPatch {
    pub document_id: String,
    pub position: usize,
    /// Id of the diagram box whose content is replaced.
    pub container_id: String,
    pub status: DiagramStatus,
    /// New diagram box content when `Rendered`.
    pub markup: Option<String>,
    /// Engine error message when `Failed`.
    pub error: Option<String>,
    /// Visibility change to apply alongside the content.
    pub view: Option<ViewPatch>,
}

/// Runs queued renders against the engine and applies their results.
#[derive(Clone)]
pub struct DiagramScheduler {
    store: DocumentStore,
    engine: Arc<dyn DiagramEngine>,
}

impl DiagramScheduler {
    pub fn new(store: DocumentStore, engine: Arc<dyn DiagramEngine>) -> Self {
        Self { store, engine }
    }

    pub fn engine(&self) -> &Arc<dyn DiagramEngine> {
        &self.engine
    }

    /// Drain the still-current jobs queued for `document_id`.
    pub fn take_pending(&self, document_id: &str) -> Vec<PendingRender> {
        self.store
            .with_existing(document_id, |state| state.take_pending())
            .unwrap_or_default()
    }

    /// Invoke the engine for one job. Holds no lock.
    ///
    /// A panicking engine fails the block instead of unwinding into the
    /// caller or killing a worker with the entry left `Pending`.
    pub fn run(&self, job: &PendingRender) -> Result<String, DiagramError> {
        crate::debug_log!(
            "DIAGRAM",
            "Rendering block {} of {:?} with {} engine",
            job.position(),
            job.document_id,
            self.engine.name()
        );
        catch_unwind(AssertUnwindSafe(|| {
            self.engine.render(&job.source, &job.language)
        }))
        .unwrap_or_else(|_| {
            crate::debug_error!(
                "DIAGRAM",
                "{} engine panicked on block {}",
                self.engine.name(),
                job.position()
            );
            Err(DiagramError::Parse("engine panicked".to_string()))
        })
    }

    /// Write a job's result back; `None` when the ticket is stale.
    pub fn complete(
        &self,
        job: &PendingRender,
        result: Result<String, DiagramError>,
    ) -> Option<DiagramPatch> {
        let position = job.position();
        self.store
            .with_existing(&job.document_id, |state| {
                if !state.block_matches(&job.ticket) {
                    crate::debug_log!(
                        "DIAGRAM",
                        "Dropped result for block {position}: container no longer holds this diagram"
                    );
                    return None;
                }
                let resolution = state.cache.resolve(&job.ticket, result);
                let status = match resolution {
                    Resolution::Stale => {
                        crate::debug_log!(
                            "DIAGRAM",
                            "Dropped stale result for block {position} (generation {})",
                            job.ticket.generation
                        );
                        return None;
                    }
                    Resolution::Applied(status) => status,
                };
                let entry = state.cache.get(position)?;
                let patch = match status {
                    DiagramStatus::Rendered => DiagramPatch {
                        document_id: job.document_id.clone(),
                        position,
                        container_id: diagram_box_id(position),
                        status,
                        markup: Some(entry.rendered_markup.clone()),
                        error: None,
                        view: None,
                    },
                    _ => {
                        let error = entry.error.clone();
                        crate::debug_error!(
                            "DIAGRAM",
                            "Block {position} failed: {}",
                            error.as_deref().unwrap_or("unknown error")
                        );
                        DiagramPatch {
                            document_id: job.document_id.clone(),
                            position,
                            container_id: diagram_box_id(position),
                            status,
                            markup: None,
                            error,
                            view: state.views.toggle(position, ViewMode::Source).ok(),
                        }
                    }
                };
                Some(patch)
            })
            .flatten()
    }

    /// Run every queued job for `document_id` on the calling thread.
    pub fn resolve_pending(&self, document_id: &str) -> Vec<DiagramPatch> {
        self.take_pending(document_id)
            .into_iter()
            .filter_map(|job| {
                let result = self.run(&job);
                self.complete(&job, result)
            })
            .collect()
    }

    /// Run `jobs` on tokio's blocking pool.
    ///
    /// Each completion is sent as soon as it is ready; order across blocks is
    /// unspecified. The receiver closes once every job has finished.
    pub fn spawn(
        &self,
        jobs: Vec<PendingRender>,
        handle: &tokio::runtime::Handle,
    ) -> mpsc::UnboundedReceiver<DiagramPatch> {
        let (tx, rx) = mpsc::unbounded_channel();
        for job in jobs {
            let scheduler = self.clone();
            let tx = tx.clone();
            handle.spawn_blocking(move || {
                let result = scheduler.run(&job);
                if let Some(patch) = scheduler.complete(&job, result) {
                    // The host may have stopped listening; the cache is updated regardless.
                    let _ = tx.send(patch);
                }
            });
        }
        rx
    }
}
