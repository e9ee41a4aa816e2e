//! `DocumentRenderer`: the entry point hosts talk to.
//!
//! One renderer serves any number of documents. Each document id gets its
//! own [`DocumentState`](crate::document::DocumentState) in the renderer's
//! [`DocumentStore`], created by the first `render` call and dropped by
//! `discard`.
//!
//! A typical host loop:
//!
//! 1. `render(text, id)` and present the returned HTML;
//! 2. `spawn_pending(id, handle)` and apply each [`DiagramPatch`] as it
//!    arrives (replace the content of `patch.container_id`);
//! 3. route control clicks through `Action::from_attributes` + `dispatch`.

use std::path::Path;
use std::sync::Arc;

use par_markdown_config::RenderConfig;
use tokio::sync::mpsc;

use crate::actions::{Action, ActionError, ActionOutcome};
use crate::diagram::{
    CacheStats, DiagramBlockRenderer, DiagramEngine, DiagramError, DiagramPatch,
    DiagramScheduler, DiagramStatus, PendingRender, shared_engine,
};
use crate::document::DocumentStore;
use crate::export::{self, ExportError, ExportFormat, ExportedFile};
use crate::markdown::{
    CmarkTokenizer, Highlighter, KeywordHighlighter, RenderContext, RenderRule, RuleSet,
    Tokenizer,
};
use crate::view::{ViewMode, ViewPatch, ZoomDirection};

/// Renders markdown documents and owns their diagram state.
pub struct DocumentRenderer {
    config: RenderConfig,
    tokenizer: Box<dyn Tokenizer>,
    highlighter: Box<dyn Highlighter>,
    rules: RuleSet,
    diagrams: DiagramBlockRenderer,
    store: DocumentStore,
    scheduler: DiagramScheduler,
}

impl DocumentRenderer {
    /// Renderer using the process-wide diagram engine.
    pub fn new(config: RenderConfig) -> Self {
        let engine = shared_engine(&config.diagrams);
        Self::with_engine(config, engine)
    }

    /// Renderer with its own diagram engine.
    pub fn with_engine(config: RenderConfig, engine: Arc<dyn DiagramEngine>) -> Self {
        let store = DocumentStore::new();
        Self {
            tokenizer: Box::new(CmarkTokenizer::new(&config.markdown)),
            highlighter: Box::new(KeywordHighlighter),
            rules: RuleSet::with_defaults(),
            diagrams: DiagramBlockRenderer::new(&config.diagrams),
            scheduler: DiagramScheduler::new(store.clone(), engine),
            store,
            config,
        }
    }

    pub fn with_tokenizer(mut self, tokenizer: impl Tokenizer + 'static) -> Self {
        self.tokenizer = Box::new(tokenizer);
        self
    }

    pub fn with_highlighter(mut self, highlighter: impl Highlighter + 'static) -> Self {
        self.highlighter = Box::new(highlighter);
        self
    }

    /// Register (or replace) the render rule for a token rule name.
    pub fn with_rule(mut self, name: &str, rule: impl RenderRule + 'static) -> Self {
        self.rules.register(name, rule);
        self
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    // ========================================================================
    // Rendering
    // ========================================================================

    /// Render `text` as the new content of `document_id`.
    ///
    /// Diagram blocks with cached markup for their current source are
    /// embedded directly; the rest get placeholders and queued renders,
    /// retrieved with [`take_pending`](Self::take_pending),
    /// [`resolve_pending`](Self::resolve_pending) or
    /// [`spawn_pending`](Self::spawn_pending). Never invokes the engine.
    pub fn render(&self, text: &str, document_id: &str) -> String {
        let tokens = self.tokenizer.tokenize(text);
        let html = self.store.with_document(document_id, |state| {
            state.begin_pass();
            let mut ctx = RenderContext::new(
                &self.config.markdown,
                self.highlighter.as_ref(),
                &self.diagrams,
                document_id,
                state,
            );
            let html = self.rules.render(&tokens, &mut ctx);
            state.end_pass();
            html
        });
        crate::debug_log!(
            "MARKDOWN",
            "Rendered {document_id:?}: {} tokens -> {} bytes",
            tokens.len(),
            html.len()
        );
        html
    }

    /// Drain the renders queued for `document_id`.
    pub fn take_pending(&self, document_id: &str) -> Vec<PendingRender> {
        self.scheduler.take_pending(document_id)
    }

    /// Apply an engine result obtained by the host for `job`.
    pub fn complete(
        &self,
        job: &PendingRender,
        result: Result<String, DiagramError>,
    ) -> Option<DiagramPatch> {
        self.scheduler.complete(job, result)
    }

    /// Run queued renders on the calling thread.
    pub fn resolve_pending(&self, document_id: &str) -> Vec<DiagramPatch> {
        self.scheduler.resolve_pending(document_id)
    }

    /// Run queued renders on tokio's blocking pool.
    pub fn spawn_pending(
        &self,
        document_id: &str,
        handle: &tokio::runtime::Handle,
    ) -> mpsc::UnboundedReceiver<DiagramPatch> {
        let jobs = self.scheduler.take_pending(document_id);
        crate::debug_info!(
            "DIAGRAM",
            "Spawning {} diagram render(s) for {document_id:?}",
            jobs.len()
        );
        self.scheduler.spawn(jobs, handle)
    }

    // ========================================================================
    // Actions
    // ========================================================================

    /// Show the diagram or the source of a diagram block.
    pub fn toggle(
        &self,
        document_id: &str,
        block: usize,
        mode: ViewMode,
    ) -> Result<ViewPatch, ActionError> {
        self.store
            .with_existing(document_id, |state| state.views.toggle(block, mode))
            .ok_or_else(|| ActionError::UnknownDocument(document_id.to_string()))?
            .map_err(ActionError::from)
    }

    pub fn zoom(
        &self,
        document_id: &str,
        block: usize,
        direction: ZoomDirection,
    ) -> Result<ViewPatch, ActionError> {
        self.store
            .with_existing(document_id, |state| state.views.zoom(block, direction))
            .ok_or_else(|| ActionError::UnknownDocument(document_id.to_string()))?
            .map_err(ActionError::from)
    }

    /// Raw source of a fenced block, for the clipboard.
    ///
    /// With `diagram_only`, blocks that are not diagrams are rejected.
    pub fn copy(
        &self,
        document_id: &str,
        block: usize,
        diagram_only: bool,
    ) -> Result<String, ActionError> {
        self.store
            .with_existing(document_id, |state| {
                state
                    .block(block)
                    .filter(|record| record.is_diagram || !diagram_only)
                    .map(|record| record.source.clone())
            })
            .ok_or_else(|| ActionError::UnknownDocument(document_id.to_string()))?
            .ok_or(ActionError::UnknownBlock(block))
    }

    /// Rendered markup of a diagram block in the last pass.
    fn rendered_markup(&self, document_id: &str, block: usize) -> Result<String, ActionError> {
        self.store
            .with_existing(document_id, |state| {
                if !state.block(block).is_some_and(|record| record.is_diagram) {
                    return Err(ActionError::UnknownBlock(block));
                }
                state
                    .cache
                    .get(block)
                    .filter(|entry| {
                        entry.status == DiagramStatus::Rendered
                            && !entry.rendered_markup.is_empty()
                    })
                    .map(|entry| entry.rendered_markup.clone())
                    .ok_or(ActionError::Export(ExportError::NotRendered { block }))
            })
            .ok_or_else(|| ActionError::UnknownDocument(document_id.to_string()))?
    }

    /// Exported bytes and the file stem they would be saved under.
    pub fn export_bytes(
        &self,
        document_id: &str,
        block: usize,
        format: ExportFormat,
    ) -> Result<(Vec<u8>, String), ActionError> {
        let markup = self.rendered_markup(document_id, block)?;
        let bytes = export::export_bytes(&markup, format, &self.config.export)?;
        let stem = export::derive_filename(&markup, &self.config.export.default_filename);
        Ok((bytes, stem))
    }

    /// Export a rendered diagram into the configured output directory.
    pub fn export(
        &self,
        document_id: &str,
        block: usize,
        format: ExportFormat,
    ) -> Result<ExportedFile, ActionError> {
        let dir = self.config.export.resolved_output_dir();
        self.export_to(document_id, block, format, &dir)
    }

    /// Export a rendered diagram into `dir`.
    pub fn export_to(
        &self,
        document_id: &str,
        block: usize,
        format: ExportFormat,
        dir: &Path,
    ) -> Result<ExportedFile, ActionError> {
        let (bytes, stem) = self.export_bytes(document_id, block, format).inspect_err(|e| {
            crate::debug_error!("EXPORT", "Export of block {block} failed: {e}");
        })?;
        Ok(export::save_export(&bytes, dir, &stem, format)?)
    }

    /// Execute a toolbar action against `document_id`.
    pub fn dispatch(
        &self,
        document_id: &str,
        action: &Action,
    ) -> Result<ActionOutcome, ActionError> {
        crate::debug_log!("VIEW", "Dispatching {} on block {}", action.name(), action.block());
        match *action {
            Action::Toggle { block, mode } => {
                self.toggle(document_id, block, mode).map(ActionOutcome::View)
            }
            Action::Zoom { block, direction } => {
                self.zoom(document_id, block, direction).map(ActionOutcome::View)
            }
            Action::CopySource { block } => {
                self.copy(document_id, block, true).map(ActionOutcome::Clipboard)
            }
            Action::CopyCode { block } => {
                self.copy(document_id, block, false).map(ActionOutcome::Clipboard)
            }
            Action::Export { block, format } => {
                self.export(document_id, block, format).map(ActionOutcome::Exported)
            }
        }
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Drop every piece of state held for `document_id`.
    pub fn discard(&self, document_id: &str) -> bool {
        self.store.discard(document_id)
    }

    pub fn cache_stats(&self, document_id: &str) -> Option<CacheStats> {
        self.store
            .with_existing(document_id, |state| state.cache.stats())
    }
}
