//! Diagram blocks: fenced blocks whose content is drawn by a diagram engine.
//!
//! A render pass never waits on an engine. For each diagram fence the
//! [`DiagramBlockRenderer`] either embeds markup cached for the same source
//! or emits a placeholder and queues a [`PendingRender`]; the
//! [`DiagramScheduler`] later runs queued renders and returns
//! [`DiagramPatch`]es for the host to apply.
//!
//! # Sub-modules
//!
//! - [`languages`]: supported diagram types, aliases and info-string matching
//! - [`engine`]: `DiagramEngine` trait and the native / local / Kroki backends
//! - [`cache`]: per-document diagram state and render tickets
//! - [`block`]: reuse decision and container markup
//! - [`scheduler`]: out-of-band completion and patch-in
//! - [`svg_utils`]: font database, SVG sanitization and theme helpers

pub mod block;
pub mod cache;
pub mod engine;
pub mod languages;
pub mod scheduler;
pub(crate) mod svg_utils;

pub use block::DiagramBlockRenderer;
pub use cache::{
    CacheStats, DiagramCache, DiagramCacheEntry, DiagramStatus, RenderTicket, Resolution,
    compute_source_hash,
};
#[cfg(feature = "mermaid")]
pub use engine::NativeMermaidEngine;
pub use engine::{
    AutoEngine, DiagramEngine, DiagramError, DisabledEngine, KrokiEngine, LocalCliEngine,
    build_engine, shared_engine,
};
pub use languages::{DiagramLanguage, DiagramLanguages, default_diagram_languages};
pub use scheduler::{DiagramPatch, DiagramScheduler, PendingRender};

#[cfg(test)]
mod tests;
