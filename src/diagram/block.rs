//! Diagram block renderer: per fenced diagram block, decide whether to reuse
//! cached markup or request a new render, and emit the block's container.
//!
//! The decision for a block at position `p` with source hash `h`:
//!
//! | cache entry at `p`          | result                                   |
//! |-----------------------------|------------------------------------------|
//! | empty source                | source fallback, `Unrendered`            |
//! | fence still streaming       | source shown, idle placeholder, no job   |
//! | `Rendered` with hash `h`    | cached markup embedded, no job           |
//! | `Pending` with hash `h`     | placeholder with pending flag, no job    |
//! | `Failed` with hash `h`      | source fallback, no job                  |
//! | `Rendered` elsewhere at `h` | markup adopted from the other position   |
//! | anything else               | placeholder with pending flag, new job   |

use par_markdown_config::DiagramConfig;

use crate::document::DocumentState;
use crate::markdown::html::{escape_html, percent_encode};
use crate::markdown::token::Token;
use crate::view::{ViewMode, diagram_box_id, diagram_ops_id, source_id, source_ops_id};

use super::cache::{DiagramStatus, compute_source_hash};
use super::languages::{DiagramLanguage, DiagramLanguages};
use super::scheduler::PendingRender;

/// What goes inside the diagram box.
enum DiagramBody<'a> {
    /// Engine output.
    Rendered(&'a str),
    /// Waiting for engine output; `pending` marks a queued render.
    Placeholder { pending: bool },
}

/// Emits diagram block containers and drives the cache state machine.
#[derive(Debug, Clone)]
pub struct DiagramBlockRenderer {
    languages: DiagramLanguages,
    config: DiagramConfig,
}

impl DiagramBlockRenderer {
    pub fn new(config: &DiagramConfig) -> Self {
        Self {
            languages: DiagramLanguages::new(&config.aliases),
            config: config.clone(),
        }
    }

    pub fn languages(&self) -> &DiagramLanguages {
        &self.languages
    }

    /// Diagram language for a fence info string, if diagrams are enabled.
    pub fn match_language(&self, info: &str) -> Option<&DiagramLanguage> {
        if !self.config.enabled {
            return None;
        }
        self.languages.match_info(info)
    }

    /// Render the fenced diagram block at `position`.
    pub fn render_block(
        &self,
        document_id: &str,
        position: usize,
        language: &DiagramLanguage,
        token: &Token,
        state: &mut DocumentState,
    ) -> String {
        let source = token.content.trim();
        let info = token.info_str();
        let hash = compute_source_hash(source);

        if source.is_empty() {
            state.cache.mark_unrendered(position, hash);
            let mode = state.views.set_default(position, DiagramStatus::Unrendered);
            return self.container(position, info, language, source, None, mode);
        }

        if !token.closed && self.config.defer_unterminated {
            crate::debug_trace!("DIAGRAM", "Block {position} still streaming");
            state.cache.mark_unrendered(position, hash);
            let mode = state.views.set_default(position, DiagramStatus::Unrendered);
            let body = DiagramBody::Placeholder { pending: false };
            return self.container(position, info, language, source, Some(body), mode);
        }

        if let Some(markup) = state.cache.lookup_rendered(position, hash) {
            crate::debug_trace!("DIAGRAM", "Block {position} reused cached markup");
            let markup = markup.to_string();
            let mode = state.views.set_default(position, DiagramStatus::Rendered);
            let body = DiagramBody::Rendered(&markup);
            return self.container(position, info, language, source, Some(body), mode);
        }

        let existing = state
            .cache
            .get(position)
            .filter(|entry| entry.source_hash == hash)
            .map(|entry| entry.status);
        match existing {
            Some(DiagramStatus::Pending) => {
                let mode = state.views.set_default(position, DiagramStatus::Pending);
                let body = DiagramBody::Placeholder { pending: true };
                return self.container(position, info, language, source, Some(body), mode);
            }
            Some(DiagramStatus::Failed) => {
                let mode = state.views.set_default(position, DiagramStatus::Failed);
                return self.container(position, info, language, source, None, mode);
            }
            _ => {}
        }

        if self.config.adopt_moved_blocks
            && let Some(markup) = state
                .cache
                .find_rendered_by_hash(hash, position)
                .map(str::to_string)
        {
            crate::debug_log!("DIAGRAM", "Block {position} adopted markup of a moved block");
            state.cache.adopt(position, hash, markup.clone());
            let mode = state.views.set_default(position, DiagramStatus::Rendered);
            let body = DiagramBody::Rendered(&markup);
            return self.container(position, info, language, source, Some(body), mode);
        }

        let ticket = state.cache.arm(position, hash);
        crate::debug_log!(
            "DIAGRAM",
            "Block {position} queued for rendering (generation {})",
            ticket.generation
        );
        state.queue(PendingRender {
            document_id: document_id.to_string(),
            ticket,
            language: language.clone(),
            source: source.to_string(),
        });
        let mode = state.views.set_default(position, DiagramStatus::Pending);
        let body = DiagramBody::Placeholder { pending: true };
        self.container(position, info, language, source, Some(body), mode)
    }

    /// Block container: toolbar, hidden-or-shown source, diagram box.
    ///
    /// `body` is `None` for a source-only fallback, which carries no diagram.
    fn container(
        &self,
        position: usize,
        info: &str,
        language: &DiagramLanguage,
        source: &str,
        body: Option<DiagramBody<'_>>,
        mode: ViewMode,
    ) -> String {
        let p = position;
        let info = escape_html(info);
        let diagram_hidden = hidden_attr(mode != ViewMode::Diagram);
        let source_hidden = hidden_attr(mode != ViewMode::Source);
        let active = |m: ViewMode| if m == mode { " active" } else { "" };

        let mut html = String::with_capacity(source.len() * 2 + 1024);
        html.push_str(&format!(
            "<div class=\"code-home diagram-home\" data-block=\"{p}\" data-language=\"{}\" data-view=\"{}\">\n",
            escape_html(&language.tag),
            mode.as_str()
        ));
        html.push_str("<div class=\"code-title diagram-toolbar\">\n");
        html.push_str(&format!(
            "<div class=\"diagram-title\">{}</div>\n",
            escape_html(&language.display_name)
        ));
        html.push_str(&format!(
            "<div class=\"diagram-toggle\"><button class=\"toggle-btn{}\" data-action=\"toggle\" data-block=\"{p}\" data-mode=\"diagram\">Diagram</button><button class=\"toggle-btn{}\" data-action=\"toggle\" data-block=\"{p}\" data-mode=\"source\">Code</button></div>\n",
            active(ViewMode::Diagram),
            active(ViewMode::Source)
        ));
        html.push_str(&format!(
            "<div class=\"diagram-ops\" id=\"{}\"{diagram_hidden}><button data-action=\"zoom-in\" data-block=\"{p}\">Zoom in</button><button data-action=\"zoom-out\" data-block=\"{p}\">Zoom out</button><button data-action=\"export\" data-block=\"{p}\" data-format=\"png\">PNG</button><button data-action=\"export\" data-block=\"{p}\" data-format=\"svg\">SVG</button></div>\n",
            diagram_ops_id(p)
        ));
        html.push_str(&format!(
            "<div class=\"source-ops\" id=\"{}\"{source_hidden}><button class=\"copy-code\" data-action=\"copy-source\" data-block=\"{p}\">Copy</button></div>\n",
            source_ops_id(p)
        ));
        html.push_str("</div>\n");
        html.push_str(&format!(
            "<code class=\"language-{info}\" id=\"{}\"{source_hidden}>{}</code>\n",
            source_id(p),
            escape_html(source)
        ));

        if let Some(body) = body {
            let (flag, inner) = match body {
                DiagramBody::Rendered(markup) => (" data-render-done=\"true\"", markup),
                DiagramBody::Placeholder { pending: true } => (" data-pending=\"true\"", ""),
                DiagramBody::Placeholder { pending: false } => ("", ""),
            };
            html.push_str(&format!(
                "<div class=\"diagram-box\" id=\"{}\" style=\"height: {}px\"{diagram_hidden} data-code=\"{}\"{flag}>{inner}</div>\n",
                diagram_box_id(p),
                self.config.box_height_px,
                percent_encode(source)
            ));
        }
        html.push_str("</div>\n");
        html
    }
}

fn hidden_attr(hidden: bool) -> &'static str {
    if hidden { " hidden=\"hidden\"" } else { "" }
}
