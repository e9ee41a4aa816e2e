//! Per-document render state.
//!
//! `DocumentState` is the explicit state object a render pass reads and
//! writes alongside the document text: the diagram cache, the view state of
//! the last pass, the fenced blocks it saw and the renders it queued.
//! `DocumentStore` keeps one state per document id for the lifetime of the
//! document.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::diagram::{DiagramCache, PendingRender, RenderTicket, compute_source_hash};
use crate::view::ViewState;

/// A fenced block seen in the last render pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockRecord {
    /// Ordinal among all fenced blocks of the pass.
    pub position: usize,
    /// Trimmed info string.
    pub info: String,
    /// Raw block content.
    pub source: String,
    /// Whether the block went to the diagram block renderer.
    pub is_diagram: bool,
}

/// State carried between render passes of one document.
#[derive(Debug, Default)]
pub struct DocumentState {
    pub cache: DiagramCache,
    pub views: ViewState,
    pub blocks: Vec<BlockRecord>,
    pending: Vec<PendingRender>,
}

impl DocumentState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset per-pass state before a structural rebuild.
    ///
    /// The cache survives; view state and the block list are rebuilt by the
    /// pass. Queued renders whose tickets went stale are dropped.
    pub fn begin_pass(&mut self) {
        self.views.reset();
        self.blocks.clear();
        self.cache.begin_pass();
        let cache = &self.cache;
        self.pending.retain(|job| cache.is_current(&job.ticket));
    }

    /// Finish a pass: forget diagram state for positions the pass did not
    /// render as a diagram, and drop their queued renders.
    pub fn end_pass(&mut self) {
        let blocks = &self.blocks;
        let forgotten = self.cache.forget_unless(|position| {
            blocks
                .iter()
                .any(|b| b.position == position && b.is_diagram)
        });
        if forgotten > 0 {
            crate::debug_log!("DIAGRAM", "Forgot {forgotten} diagram entries no longer present");
            let cache = &self.cache;
            self.pending.retain(|job| cache.is_current(&job.ticket));
        }
    }

    /// Whether the last pass rendered a diagram block matching `ticket`.
    pub fn block_matches(&self, ticket: &RenderTicket) -> bool {
        self.block(ticket.position).is_some_and(|b| {
            b.is_diagram && compute_source_hash(b.source.trim()) == ticket.source_hash
        })
    }

    /// Queue a render request produced by the pass.
    pub fn queue(&mut self, job: PendingRender) {
        self.pending.retain(|queued| queued.ticket.position != job.ticket.position);
        self.pending.push(job);
    }

    /// Hand out every queued render that is still current.
    pub fn take_pending(&mut self) -> Vec<PendingRender> {
        let cache = &self.cache;
        std::mem::take(&mut self.pending)
            .into_iter()
            .filter(|job| cache.is_current(&job.ticket))
            .collect()
    }

    /// Number of queued renders.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Fenced block recorded at `position` in the last pass.
    pub fn block(&self, position: usize) -> Option<&BlockRecord> {
        self.blocks.iter().find(|b| b.position == position)
    }
}

/// Process-wide map of document id to document state.
#[derive(Debug, Clone, Default)]
pub struct DocumentStore {
    documents: Arc<Mutex<HashMap<String, DocumentState>>>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` on the state for `id`, creating it on first use.
    pub fn with_document<R>(&self, id: &str, f: impl FnOnce(&mut DocumentState) -> R) -> R {
        let mut documents = self.documents.lock();
        let state = documents.entry(id.to_string()).or_default();
        f(state)
    }

    /// Run `f` on the state for `id` if the document exists.
    pub fn with_existing<R>(
        &self,
        id: &str,
        f: impl FnOnce(&mut DocumentState) -> R,
    ) -> Option<R> {
        let mut documents = self.documents.lock();
        documents.get_mut(id).map(f)
    }

    /// Drop all state for `id`. Returns whether the document existed.
    pub fn discard(&self, id: &str) -> bool {
        let removed = self.documents.lock().remove(id).is_some();
        if removed {
            crate::debug_info!("DIAGRAM", "Discarded document {id:?}");
        }
        removed
    }

    pub fn contains(&self, id: &str) -> bool {
        self.documents.lock().contains_key(id)
    }

    /// Number of live documents.
    pub fn len(&self) -> usize {
        self.documents.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.lock().is_empty()
    }
}
