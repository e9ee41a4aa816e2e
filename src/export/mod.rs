//! Diagram export: standalone SVG documents and PNG images.
//!
//! Both exports work on a disposable copy of the rendered diagram parsed from
//! the cached markup; the live markup is never modified. Temporary values
//! (the copied tree, the pixmap, the scratch file) are owned and dropped on
//! every exit path, so a failed export leaves nothing behind.
//!
//! # Sub-modules
//!
//! - [`svg_tree`]: owned SVG element tree: parse, bounding box, serialize
//! - [`raster`]: resvg rasterization and PNG encoding
//! - [`save`]: filename derivation and atomic file writes

pub mod raster;
pub mod save;
pub mod svg_tree;

use std::path::PathBuf;

use par_markdown_config::ExportConfig;
use thiserror::Error;

pub use raster::export_raster;
pub use save::{derive_filename, save_export};
pub use svg_tree::{BoundingBox, SvgDocument, SvgNode};

/// XML declaration written at the top of every exported SVG.
pub const XML_PROLOG: &str = "<?xml version=\"1.0\" standalone=\"no\"?>\n";

/// Export target format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportFormat {
    Png,
    Svg,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Png => "png",
            ExportFormat::Svg => "svg",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ExportFormat::Png => "image/png",
            ExportFormat::Svg => "image/svg+xml",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "png" | "raster" => Some(ExportFormat::Png),
            "svg" | "vector" => Some(ExportFormat::Svg),
            _ => None,
        }
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// Errors surfaced to the user when an export fails.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("diagram block {block} has no rendered diagram to export")]
    NotRendered { block: usize },

    #[error("failed to parse diagram SVG: {0}")]
    Parse(String),

    #[error("invalid diagram dimensions {width}x{height}")]
    InvalidDimensions { width: f32, height: f32 },

    #[error("failed to rasterize diagram: {0}")]
    Rasterize(String),

    #[error("failed to encode PNG: {0}")]
    Encode(#[from] image::ImageError),

    #[error("failed to write export: {0}")]
    Io(#[from] std::io::Error),
}

/// A diagram written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedFile {
    pub path: PathBuf,
    pub format: ExportFormat,
    pub bytes_written: usize,
}

/// Standalone SVG text for a rendered diagram.
///
/// The copy gets an `xmlns` declaration when the live markup lacks one and
/// is prefixed with an XML declaration. Geometry is left untouched.
pub fn export_vector(svg: &str) -> Result<String, ExportError> {
    let mut doc = SvgDocument::parse(svg)?;
    doc.ensure_namespace();
    let text = format!("{XML_PROLOG}{}", doc.serialize());
    crate::debug_info!("EXPORT", "SVG export produced {} bytes", text.len());
    Ok(text)
}

/// Encoded bytes for `format`.
pub fn export_bytes(
    svg: &str,
    format: ExportFormat,
    config: &ExportConfig,
) -> Result<Vec<u8>, ExportError> {
    match format {
        ExportFormat::Svg => export_vector(svg).map(String::into_bytes),
        ExportFormat::Png => export_raster(svg, config),
    }
}
