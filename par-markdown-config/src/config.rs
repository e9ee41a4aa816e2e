//! Configuration structures for the renderer.
//!
//! Maps to `~/.config/par-markdown/config.yaml`:
//!
//! ```yaml
//! markdown:
//!   allow_raw_html: true
//!   line_tags: true
//! diagrams:
//!   engine: auto
//!   aliases:
//!     diagram: mermaid
//! export:
//!   background_color: white
//!   scale: 2.0
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::defaults;
use crate::error::ConfigError;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level renderer configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct RenderConfig {
    #[serde(default)]
    pub markdown: MarkdownConfig,

    #[serde(default)]
    pub diagrams: DiagramConfig,

    #[serde(default)]
    pub export: ExportConfig,
}

impl RenderConfig {
    /// Check field values that serde cannot reject on its own.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.export.scale.is_finite() && self.export.scale > 0.0) {
            return Err(ConfigError::Validation(format!(
                "export.scale must be a positive number, got {}",
                self.export.scale
            )));
        }
        if !(self.export.margin.is_finite() && self.export.margin >= 0.0) {
            return Err(ConfigError::Validation(format!(
                "export.margin must not be negative, got {}",
                self.export.margin
            )));
        }
        if self.export.default_filename.trim().is_empty() {
            return Err(ConfigError::Validation(
                "export.default_filename must not be empty".to_string(),
            ));
        }
        if self.export.max_dimension == 0 {
            return Err(ConfigError::Validation(
                "export.max_dimension must be greater than zero".to_string(),
            ));
        }
        for (alias, target) in &self.diagrams.aliases {
            if alias.trim().is_empty() || target.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "diagrams.aliases entry {alias:?} -> {target:?} must name both tags"
                )));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Markdown
// ---------------------------------------------------------------------------

/// Options for token production and the render rule dispatcher.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct MarkdownConfig {
    /// Pass raw HTML blocks and inline HTML through unescaped.
    #[serde(default = "defaults::bool_true")]
    pub allow_raw_html: bool,

    /// Tag top-level paragraphs and headings with `data-line` for scroll-sync.
    #[serde(default = "defaults::bool_true")]
    pub line_tags: bool,

    /// Run non-diagram fenced blocks through the highlighter.
    #[serde(default = "defaults::bool_true")]
    pub highlight_code: bool,

    #[serde(default)]
    pub table: TableStyleConfig,

    /// Tokenizer extension: pipe tables.
    #[serde(default = "defaults::bool_true")]
    pub tables: bool,

    /// Tokenizer extension: `~~strikethrough~~`.
    #[serde(default = "defaults::bool_true")]
    pub strikethrough: bool,

    /// Tokenizer extension: `- [x]` task list markers.
    #[serde(default = "defaults::bool_true")]
    pub tasklists: bool,

    /// Tokenizer extension: footnotes.
    #[serde(default = "defaults::bool_true")]
    pub footnotes: bool,
}

impl Default for MarkdownConfig {
    fn default() -> Self {
        Self {
            allow_raw_html: true,
            line_tags: true,
            highlight_code: true,
            table: TableStyleConfig::default(),
            tables: true,
            strikethrough: true,
            tasklists: true,
            footnotes: true,
        }
    }
}

/// Inline styling applied by the table rules.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TableStyleConfig {
    /// Max height of the scroll container before it scrolls vertically.
    #[serde(default = "defaults::table_max_height_px")]
    pub max_height_px: u32,

    /// Dashed border color of the scroll container.
    #[serde(default = "defaults::table_border_color")]
    pub border_color: String,

    /// Border color of header and data cells.
    #[serde(default = "defaults::cell_border_color")]
    pub cell_border_color: String,

    /// CSS padding of header and data cells.
    #[serde(default = "defaults::cell_padding")]
    pub cell_padding: String,
}

impl Default for TableStyleConfig {
    fn default() -> Self {
        Self {
            max_height_px: defaults::table_max_height_px(),
            border_color: defaults::table_border_color(),
            cell_border_color: defaults::cell_border_color(),
            cell_padding: defaults::cell_padding(),
        }
    }
}

// ---------------------------------------------------------------------------
// Diagrams
// ---------------------------------------------------------------------------

/// Which diagram engine backend to construct.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DiagramEngineKind {
    /// Native mermaid first, then local CLI tools, then Kroki.
    #[default]
    Auto,
    /// Pure-Rust mermaid rendering only.
    Native,
    /// Local CLI tools (`mmdc`, `dot`, `plantuml`, `d2`).
    Local,
    /// Kroki HTTP API.
    Kroki,
    /// Never invoke an engine; diagram blocks show their source.
    Disabled,
}

/// Diagram block rendering options.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DiagramConfig {
    /// Route diagram-tagged fences to the diagram block renderer.
    #[serde(default = "defaults::bool_true")]
    pub enabled: bool,

    #[serde(default)]
    pub engine: DiagramEngineKind,

    /// Kroki server URL (used by the `kroki` and `auto` engines).
    #[serde(default = "defaults::kroki_server")]
    pub kroki_server: String,

    /// Extra fence tags mapped onto a registered diagram language.
    #[serde(default = "defaults::diagram_aliases")]
    pub aliases: BTreeMap<String, String>,

    #[serde(default)]
    pub theme: DiagramThemeConfig,

    /// Height of the diagram box in the emitted container.
    #[serde(default = "defaults::diagram_box_height_px")]
    pub box_height_px: u32,

    /// Hold off engine work for a fence whose closing delimiter has not
    /// streamed in yet.
    #[serde(default = "defaults::bool_true")]
    pub defer_unterminated: bool,

    /// Let an unchanged diagram that moved to another position reuse the
    /// markup rendered for it at its old position.
    #[serde(default = "defaults::bool_true")]
    pub adopt_moved_blocks: bool,
}

impl Default for DiagramConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            engine: DiagramEngineKind::default(),
            kroki_server: defaults::kroki_server(),
            aliases: defaults::diagram_aliases(),
            theme: DiagramThemeConfig::default(),
            box_height_px: defaults::diagram_box_height_px(),
            defer_unterminated: true,
            adopt_moved_blocks: true,
        }
    }
}

/// Theme applied once when the native engine is constructed.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DiagramThemeConfig {
    #[serde(default = "defaults::theme_font_family")]
    pub font_family: String,

    #[serde(default = "defaults::theme_font_size")]
    pub font_size: f32,

    #[serde(default = "defaults::theme_background")]
    pub background: String,

    /// Node fill color; engine default when unset.
    #[serde(default)]
    pub primary_color: Option<String>,

    /// Edge color; engine default when unset.
    #[serde(default)]
    pub line_color: Option<String>,

    /// Label color; engine default when unset.
    #[serde(default)]
    pub text_color: Option<String>,
}

impl Default for DiagramThemeConfig {
    fn default() -> Self {
        Self {
            font_family: defaults::theme_font_family(),
            font_size: defaults::theme_font_size(),
            background: defaults::theme_background(),
            primary_color: None,
            line_color: None,
            text_color: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

/// Settings for raster/vector export of rendered diagrams.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ExportConfig {
    /// Fill of the background shape inserted behind raster exports.
    #[serde(default = "defaults::export_background")]
    pub background_color: String,

    /// Extra space the background shape extends past the bounding box.
    #[serde(default = "defaults::export_margin")]
    pub margin: f32,

    /// Device scale factor applied to raster pixel dimensions.
    #[serde(default = "defaults::export_scale")]
    pub scale: f32,

    /// Where exported files are written. Falls back to the downloads
    /// directory, then the current directory.
    #[serde(default)]
    pub output_dir: Option<PathBuf>,

    /// File stem used when the diagram has neither an id nor a title.
    #[serde(default = "defaults::export_filename")]
    pub default_filename: String,

    /// Largest raster width/height in pixels after scaling.
    #[serde(default = "defaults::export_max_dimension")]
    pub max_dimension: u32,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            background_color: defaults::export_background(),
            margin: defaults::export_margin(),
            scale: defaults::export_scale(),
            output_dir: None,
            default_filename: defaults::export_filename(),
            max_dimension: defaults::export_max_dimension(),
        }
    }
}

impl ExportConfig {
    /// Resolve the directory exported files land in.
    pub fn resolved_output_dir(&self) -> PathBuf {
        self.output_dir
            .clone()
            .or_else(dirs::download_dir)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}
