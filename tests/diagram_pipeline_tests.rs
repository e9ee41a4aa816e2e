mod common;

use common::{BAD_TOKEN, fence, renderer};
use par_markdown::diagram::{DiagramError, DiagramStatus};
use par_markdown::{Action, ActionOutcome, ViewMode};

#[test]
fn test_failed_block_is_isolated() {
    let (renderer, engine) = renderer();
    let text = format!(
        "{}\n{}\n{}",
        fence("diagram", "A->B"),
        fence("diagram", &format!("A->{BAD_TOKEN}")),
        fence("diagram", "C->D")
    );
    renderer.render(&text, "doc");
    let mut patches = renderer.resolve_pending("doc");
    patches.sort_by_key(|p| p.position);
    assert_eq!(engine.calls(), 3);

    let statuses: Vec<_> = patches.iter().map(|p| p.status).collect();
    assert_eq!(
        statuses,
        vec![
            DiagramStatus::Rendered,
            DiagramStatus::Failed,
            DiagramStatus::Rendered
        ]
    );
    // The failed block's patch flips it to its source view.
    let view = patches[1].view.as_ref().unwrap();
    assert_eq!(view.mode, ViewMode::Source);
    assert!(view.show.contains(&"diagram-source-1".to_string()));

    let html = renderer.render(&text, "doc");
    assert_eq!(html.matches("data-render-done=\"true\"").count(), 2);
    assert!(!html.contains("id=\"diagram-box-1\""));
    assert!(html.contains("id=\"diagram-source-1\">A-&gt;!!</code>"));
    // Failed blocks are not retried while their source is unchanged.
    assert!(renderer.take_pending("doc").is_empty());
    assert_eq!(engine.calls(), 3);
}

#[test]
fn test_appending_blocks_keeps_earlier_markup() {
    let (renderer, engine) = renderer();
    let mut text = fence("diagram", "A->B");
    renderer.render(&text, "doc");
    renderer.resolve_pending("doc");
    let first = renderer.render(&text, "doc");
    let first_box = extract_box(&first, 0);

    text.push_str("\nMore prose.\n\n");
    text.push_str(&fence("diagram", "C->D"));
    let html = renderer.render(&text, "doc");
    assert_eq!(extract_box(&html, 0), first_box);

    let jobs = renderer.take_pending("doc");
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].position(), 1);
    assert_eq!(engine.calls(), 1);
}

#[test]
fn test_inserting_block_before_adopts_moved_markup() {
    let (renderer, engine) = renderer();
    let original = fence("diagram", "A->B");
    renderer.render(&original, "doc");
    renderer.resolve_pending("doc");
    let before = extract_box_content(&renderer.render(&original, "doc"), 0);

    let text = format!("{}\n{}", fence("diagram", "X->Y"), original);
    let html = renderer.render(&text, "doc");
    // The moved diagram keeps its markup; the new one is queued.
    assert_eq!(extract_box_content(&html, 1), before);
    let jobs = renderer.take_pending("doc");
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].position(), 0);
    assert_eq!(jobs[0].source, "X->Y");
    assert_eq!(engine.calls(), 1);
}

#[test]
fn test_result_for_changed_block_is_discarded() {
    let (renderer, _) = renderer();
    renderer.render(&fence("diagram", "A->B"), "doc");
    let jobs = renderer.take_pending("doc");
    assert_eq!(jobs.len(), 1);

    // The block is edited while its render is in flight.
    renderer.render(&fence("diagram", "A->C"), "doc");
    assert!(renderer.complete(&jobs[0], Ok("<svg/>".to_string())).is_none());

    let stats = renderer.cache_stats("doc").unwrap();
    assert_eq!(stats.pending_count, 1);
    let fresh = renderer.take_pending("doc");
    assert_eq!(fresh.len(), 1);
    assert_eq!(fresh[0].source, "A->C");
}

#[test]
fn test_result_for_block_that_became_code_is_discarded() {
    let (renderer, engine) = renderer();
    renderer.render(&fence("diagram", "A->B"), "doc");

    // The queued diagram is replaced by a plain code fence before it runs.
    let html = renderer.render(&fence("python", "print(1)"), "doc");
    assert!(!html.contains("diagram-box-0"));
    assert!(renderer.resolve_pending("doc").is_empty());
    assert_eq!(engine.calls(), 0);
    assert_eq!(renderer.cache_stats("doc").unwrap().entry_count, 0);
}

#[test]
fn test_in_flight_result_for_deleted_block_is_discarded() {
    let (renderer, _) = renderer();
    renderer.render(&fence("diagram", "A->B"), "doc");
    let jobs = renderer.take_pending("doc");
    assert_eq!(jobs.len(), 1);

    renderer.render("The diagram is gone.\n", "doc");
    assert!(renderer.complete(&jobs[0], Ok("<svg/>".to_string())).is_none());
    assert_eq!(renderer.cache_stats("doc").unwrap().entry_count, 0);
}

#[test]
fn test_result_for_discarded_document_is_discarded() {
    let (renderer, _) = renderer();
    renderer.render(&fence("diagram", "A->B"), "doc");
    let jobs = renderer.take_pending("doc");
    renderer.discard("doc");
    assert!(
        renderer
            .complete(&jobs[0], Err(DiagramError::EmptyOutput))
            .is_none()
    );
}

#[test]
fn test_streaming_fence_waits_for_closing_delimiter() {
    let (renderer, engine) = renderer();
    let partial = "Intro\n\n```diagram\nA->B\nB->C";
    let html = renderer.render(partial, "doc");
    assert!(html.contains("data-view=\"source\""));
    assert!(!html.contains("data-pending"));
    assert!(renderer.take_pending("doc").is_empty());

    let complete = format!("{partial}\n```\n");
    let html = renderer.render(&complete, "doc");
    assert!(html.contains("data-pending=\"true\""));
    assert_eq!(renderer.resolve_pending("doc").len(), 1);
    assert_eq!(engine.calls(), 1);
}

#[test]
fn test_toggle_is_presentation_only() {
    let (renderer, engine) = renderer();
    let text = fence("diagram", "A->B");
    renderer.render(&text, "doc");
    renderer.resolve_pending("doc");
    renderer.render(&text, "doc");

    let action = Action::Toggle {
        block: 0,
        mode: ViewMode::Source,
    };
    let ActionOutcome::View(patch) = renderer.dispatch("doc", &action).unwrap() else {
        panic!("expected a view patch");
    };
    assert!(patch.changed);
    assert_eq!(patch.hide, vec!["diagram-box-0", "diagram-ops-0"]);

    let back = renderer.toggle("doc", 0, ViewMode::Diagram).unwrap();
    assert!(back.changed);
    assert_eq!(engine.calls(), 1);
    assert_eq!(
        renderer.cache_stats("doc").unwrap().entry_count,
        1,
        "toggling keeps cached markup"
    );
    assert!(renderer.render(&text, "doc").contains("data-render-done"));
}

#[test]
fn test_copy_and_zoom_actions() {
    let (renderer, _) = renderer();
    let text = format!("{}\n{}", fence("rust", "let x = 1;"), fence("diagram", "A->B"));
    renderer.render(&text, "doc");

    let copied = renderer
        .dispatch("doc", &Action::CopyCode { block: 0 })
        .unwrap();
    assert_eq!(copied, ActionOutcome::Clipboard("let x = 1;\n".to_string()));
    let source = renderer
        .dispatch("doc", &Action::CopySource { block: 1 })
        .unwrap();
    assert_eq!(source, ActionOutcome::Clipboard("A->B\n".to_string()));
    assert!(
        renderer
            .dispatch("doc", &Action::CopySource { block: 0 })
            .is_err()
    );

    let zoom = renderer
        .dispatch(
            "doc",
            &Action::from_attributes([("data-action", "zoom-in"), ("data-block", "1")]).unwrap(),
        )
        .unwrap();
    let ActionOutcome::View(patch) = zoom else {
        panic!("expected a view patch");
    };
    assert_eq!(
        patch.style.as_deref(),
        Some("transform: scale(1.25); transform-origin: 0 0")
    );
}

#[test]
fn test_actions_on_unknown_targets() {
    let (renderer, _) = renderer();
    assert!(renderer.toggle("missing", 0, ViewMode::Source).is_err());
    renderer.render("no fences here\n", "doc");
    assert!(renderer.toggle("doc", 3, ViewMode::Source).is_err());
}

#[tokio::test]
async fn test_spawned_renders_patch_in_independently() {
    let (renderer, engine) = renderer();
    let text: String = (0..5)
        .map(|i| fence("diagram", &format!("N{i}->M{i}")))
        .collect::<Vec<_>>()
        .join("\n");
    renderer.render(&text, "doc");

    let mut rx = renderer.spawn_pending("doc", &tokio::runtime::Handle::current());
    let mut positions = Vec::new();
    while let Some(patch) = rx.recv().await {
        assert_eq!(patch.status, DiagramStatus::Rendered);
        assert_eq!(patch.container_id, format!("diagram-box-{}", patch.position));
        positions.push(patch.position);
    }
    positions.sort_unstable();
    assert_eq!(positions, vec![0, 1, 2, 3, 4]);
    assert_eq!(engine.calls(), 5);

    let html = renderer.render(&text, "doc");
    assert_eq!(html.matches("data-render-done=\"true\"").count(), 5);
}

/// The full diagram box element for `position`.
fn extract_box(html: &str, position: usize) -> String {
    let marker = format!("<div class=\"diagram-box\" id=\"diagram-box-{position}\"");
    let start = html.find(&marker).expect("diagram box present");
    let end = html[start..].find("</div>").expect("diagram box closed") + start;
    html[start..end].to_string()
}

/// Content of the diagram box for `position`.
fn extract_box_content(html: &str, position: usize) -> String {
    let element = extract_box(html, position);
    let open_end = element.find('>').expect("open tag") + 1;
    element[open_end..].to_string()
}
