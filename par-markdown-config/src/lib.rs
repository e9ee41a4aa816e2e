//! Configuration system for the par-markdown renderer.
//!
//! This crate provides configuration loading, saving, and default values
//! for the renderer. It includes:
//!
//! - Markdown rendering options (raw HTML, scroll-sync line tags, tables)
//! - Diagram engine selection, tag aliases and theme overrides
//! - Export settings (background, margin, device scale, output location)
//! - YAML persistence with atomic writes

pub mod config;
pub mod defaults;
pub mod error;
mod persistence;

pub use config::{
    DiagramConfig, DiagramEngineKind, DiagramThemeConfig, ExportConfig, MarkdownConfig,
    RenderConfig, TableStyleConfig,
};
pub use error::ConfigError;
