//! Shared integration test helpers for par-markdown.
//!
//! Include this module at the top of each test file that needs it:
//!
//! ```ignore
//! mod common;
//! use common::{CountingEngine, renderer_with};
//! ```
//!
//! The `#[allow(dead_code)]` attribute suppresses warnings when only a subset
//! of helpers are used per file.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use par_markdown::DocumentRenderer;
use par_markdown::config::RenderConfig;
use par_markdown::diagram::{DiagramEngine, DiagramError, DiagramLanguage};

/// Source fragment that makes [`CountingEngine`] fail with a parse error.
pub const BAD_TOKEN: &str = "!!";

/// Fake diagram engine that counts invocations.
///
/// Output is a small valid SVG embedding the source length, so tests can tell
/// renders apart without depending on a real engine.
#[derive(Default)]
pub struct CountingEngine {
    calls: AtomicUsize,
}

impl CountingEngine {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl DiagramEngine for CountingEngine {
    fn render(&self, source: &str, _language: &DiagramLanguage) -> Result<String, DiagramError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if source.contains(BAD_TOKEN) {
            return Err(DiagramError::Parse(format!("unexpected {BAD_TOKEN}")));
        }
        let width = 20 + source.len() * 4;
        Ok(format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" id=\"diagram-{}\" viewBox=\"0 0 {width} 40\" width=\"{width}\" height=\"40\"><rect x=\"0\" y=\"0\" width=\"{width}\" height=\"40\" fill=\"#336699\"/></svg>",
            source.len()
        ))
    }

    fn name(&self) -> &str {
        "counting"
    }
}

/// Renderer with default config around a fresh counting engine.
pub fn renderer() -> (DocumentRenderer, Arc<CountingEngine>) {
    renderer_with(RenderConfig::default())
}

pub fn renderer_with(config: RenderConfig) -> (DocumentRenderer, Arc<CountingEngine>) {
    let engine = Arc::new(CountingEngine::default());
    let renderer = DocumentRenderer::with_engine(config, engine.clone());
    (renderer, engine)
}

/// A fenced block.
pub fn fence(info: &str, body: &str) -> String {
    format!("```{info}\n{body}\n```\n")
}
