//! Diagram block renderer tests: reuse decisions and container markup.

use par_markdown_config::DiagramConfig;

use crate::document::DocumentState;
use crate::markdown::token::{Token, TokenKind};

use super::block::DiagramBlockRenderer;
use super::cache::DiagramStatus;
use super::engine::DiagramError;

fn fence(info: &str, source: &str) -> Token {
    Token::new(TokenKind::Fence, 0)
        .with_info(info)
        .with_content(source)
}

fn pass(
    renderer: &DiagramBlockRenderer,
    state: &mut DocumentState,
    position: usize,
    token: &Token,
) -> String {
    let language = renderer
        .match_language(token.info_str())
        .cloned()
        .expect("diagram language");
    renderer.render_block("doc", position, &language, token, state)
}

fn resolve_all(state: &mut DocumentState, result: Result<String, DiagramError>) {
    for job in state.take_pending() {
        state.cache.resolve(&job.ticket, result.clone());
    }
}

#[test]
fn test_first_pass_emits_placeholder_and_queues_job() {
    let renderer = DiagramBlockRenderer::new(&DiagramConfig::default());
    let mut state = DocumentState::new();
    let html = pass(&renderer, &mut state, 0, &fence("diagram", "A->B\n"));

    assert!(html.contains("data-block=\"0\""));
    assert!(html.contains("id=\"diagram-box-0\""));
    assert!(html.contains("data-pending=\"true\""));
    assert!(html.contains("data-code=\"A-%3EB\""));
    // Source container present but hidden.
    assert!(html.contains(
        "<code class=\"language-diagram\" id=\"diagram-source-0\" hidden=\"hidden\">A-&gt;B</code>"
    ));
    // Toolbar with view toggle and export controls.
    assert!(html.contains("data-action=\"toggle\" data-block=\"0\" data-mode=\"diagram\""));
    assert!(html.contains("data-action=\"toggle\" data-block=\"0\" data-mode=\"source\""));
    assert!(html.contains("data-action=\"export\" data-block=\"0\" data-format=\"png\""));
    assert!(html.contains("data-action=\"export\" data-block=\"0\" data-format=\"svg\""));

    assert_eq!(state.pending_len(), 1);
    assert_eq!(
        state.cache.get(0).map(|e| e.status),
        Some(DiagramStatus::Pending)
    );
}

#[test]
fn test_unchanged_pending_block_is_not_requeued() {
    let renderer = DiagramBlockRenderer::new(&DiagramConfig::default());
    let mut state = DocumentState::new();
    let token = fence("mermaid", "graph TD; A-->B");
    pass(&renderer, &mut state, 0, &token);
    let jobs = state.take_pending();
    assert_eq!(jobs.len(), 1);

    state.begin_pass();
    let html = pass(&renderer, &mut state, 0, &token);
    assert!(html.contains("data-pending=\"true\""));
    assert_eq!(state.pending_len(), 0);
    // The job handed out before the second pass is still current.
    assert!(state.cache.is_current(&jobs[0].ticket));
}

#[test]
fn test_rendered_markup_is_reused_verbatim() {
    let renderer = DiagramBlockRenderer::new(&DiagramConfig::default());
    let mut state = DocumentState::new();
    let token = fence("diagram", "A->B");
    pass(&renderer, &mut state, 0, &token);
    resolve_all(&mut state, Ok("<svg id=\"d0\"></svg>".to_string()));

    state.begin_pass();
    let second = pass(&renderer, &mut state, 0, &token);
    state.begin_pass();
    let third = pass(&renderer, &mut state, 0, &token);

    assert_eq!(second, third);
    assert!(second.contains("data-render-done=\"true\"><svg id=\"d0\"></svg></div>"));
    assert!(!second.contains("data-pending"));
    assert!(second.contains("data-view=\"diagram\""));
    assert_eq!(state.pending_len(), 0);
    assert_eq!(state.cache.stats().hit_count, 2);
}

#[test]
fn test_changed_source_invalidates_cached_markup() {
    let renderer = DiagramBlockRenderer::new(&DiagramConfig::default());
    let mut state = DocumentState::new();
    pass(&renderer, &mut state, 0, &fence("diagram", "A->B"));
    let old_jobs = state.take_pending();
    resolve_all_jobs(&mut state, &old_jobs, Ok("<svg>old</svg>".to_string()));

    state.begin_pass();
    let html = pass(&renderer, &mut state, 0, &fence("diagram", "A->C"));
    assert!(!html.contains("<svg>old</svg>"));
    assert!(html.contains("data-pending=\"true\""));
    assert_eq!(state.pending_len(), 1);
    assert!(!state.cache.is_current(&old_jobs[0].ticket));
}

fn resolve_all_jobs(
    state: &mut DocumentState,
    jobs: &[super::PendingRender],
    result: Result<String, DiagramError>,
) {
    for job in jobs {
        state.cache.resolve(&job.ticket, result.clone());
    }
}

#[test]
fn test_failed_block_shows_source_without_requeue() {
    let renderer = DiagramBlockRenderer::new(&DiagramConfig::default());
    let mut state = DocumentState::new();
    let token = fence("diagram", "A->");
    pass(&renderer, &mut state, 0, &token);
    resolve_all(&mut state, Err(DiagramError::Parse("unexpected end".into())));

    state.begin_pass();
    let html = pass(&renderer, &mut state, 0, &token);
    assert!(!html.contains("diagram-box"));
    assert!(html.contains("<code class=\"language-diagram\" id=\"diagram-source-0\">A-&gt;</code>"));
    assert!(html.contains("data-view=\"source\""));
    assert_eq!(state.pending_len(), 0);

    // An edit moves the block back to pending.
    state.begin_pass();
    pass(&renderer, &mut state, 0, &fence("diagram", "A->B"));
    assert_eq!(state.pending_len(), 1);
}

#[test]
fn test_empty_source_renders_fallback_only() {
    let renderer = DiagramBlockRenderer::new(&DiagramConfig::default());
    let mut state = DocumentState::new();
    let html = pass(&renderer, &mut state, 0, &fence("diagram", "  \n"));
    assert!(!html.contains("diagram-box"));
    assert!(html.contains("data-view=\"source\""));
    assert_eq!(state.pending_len(), 0);
    assert_eq!(
        state.cache.get(0).map(|e| e.status),
        Some(DiagramStatus::Unrendered)
    );
}

#[test]
fn test_unterminated_fence_defers_render() {
    let renderer = DiagramBlockRenderer::new(&DiagramConfig::default());
    let mut state = DocumentState::new();
    let mut token = fence("diagram", "A->B\n");
    token.closed = false;

    let html = pass(&renderer, &mut state, 0, &token);
    assert!(html.contains("id=\"diagram-box-0\""));
    assert!(!html.contains("data-pending"));
    assert!(html.contains("data-view=\"source\""));
    assert_eq!(state.pending_len(), 0);

    // The closing delimiter arrives.
    token.closed = true;
    state.begin_pass();
    let html = pass(&renderer, &mut state, 0, &token);
    assert!(html.contains("data-pending=\"true\""));
    assert_eq!(state.pending_len(), 1);
}

#[test]
fn test_unterminated_fence_renders_when_deferral_is_off() {
    let config = DiagramConfig {
        defer_unterminated: false,
        ..DiagramConfig::default()
    };
    let renderer = DiagramBlockRenderer::new(&config);
    let mut state = DocumentState::new();
    let mut token = fence("diagram", "A->B\n");
    token.closed = false;
    pass(&renderer, &mut state, 0, &token);
    assert_eq!(state.pending_len(), 1);
}

#[test]
fn test_moved_block_adopts_rendered_markup() {
    let renderer = DiagramBlockRenderer::new(&DiagramConfig::default());
    let mut state = DocumentState::new();
    let token = fence("diagram", "A->B");
    pass(&renderer, &mut state, 0, &token);
    resolve_all(&mut state, Ok("<svg>ab</svg>".to_string()));

    // A new block was inserted ahead; the same diagram is now at position 1.
    state.begin_pass();
    pass(&renderer, &mut state, 0, &fence("diagram", "X->Y"));
    let html = pass(&renderer, &mut state, 1, &token);
    assert!(html.contains("data-render-done=\"true\"><svg>ab</svg>"));
    assert_eq!(state.pending_len(), 1);
    assert_eq!(state.take_pending()[0].position(), 0);
}

#[test]
fn test_moved_block_rerenders_when_adoption_is_off() {
    let config = DiagramConfig {
        adopt_moved_blocks: false,
        ..DiagramConfig::default()
    };
    let renderer = DiagramBlockRenderer::new(&config);
    let mut state = DocumentState::new();
    let token = fence("diagram", "A->B");
    pass(&renderer, &mut state, 0, &token);
    resolve_all(&mut state, Ok("<svg>ab</svg>".to_string()));

    state.begin_pass();
    let html = pass(&renderer, &mut state, 1, &token);
    assert!(html.contains("data-pending=\"true\""));
    assert_eq!(state.pending_len(), 1);
}

#[test]
fn test_disabled_diagrams_match_nothing() {
    let config = DiagramConfig {
        enabled: false,
        ..DiagramConfig::default()
    };
    let renderer = DiagramBlockRenderer::new(&config);
    assert!(renderer.match_language("mermaid").is_none());
    assert!(renderer.languages().get("mermaid").is_some());
}
