//! View controller: which representation of a diagram block is visible.
//!
//! Each diagram block is emitted with both representations present in the
//! markup, the diagram box (with its zoom/export toolbar) and the raw source
//! (with a copy button). Toggling only flips visibility; it never touches
//! the tokenizer, the highlighter, the engine or the diagram cache.
//!
//! View state is presentational and per pass: every render resets each block
//! to its default, `Diagram` while the block is `Rendered` or `Pending`,
//! `Source` otherwise.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::diagram::DiagramStatus;

/// Zoom multiplier applied per zoom step.
pub const ZOOM_STEP: f32 = 1.25;
pub const MIN_ZOOM: f32 = 0.25;
pub const MAX_ZOOM: f32 = 4.0;

/// Visible representation of a diagram block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewMode {
    Diagram,
    Source,
}

impl ViewMode {
    /// Default mode for a block in the given lifecycle state.
    pub fn default_for(status: DiagramStatus) -> Self {
        match status {
            DiagramStatus::Rendered | DiagramStatus::Pending => ViewMode::Diagram,
            DiagramStatus::Failed | DiagramStatus::Unrendered => ViewMode::Source,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ViewMode::Diagram => "diagram",
            ViewMode::Source => "source",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "diagram" => Some(ViewMode::Diagram),
            "source" | "code" => Some(ViewMode::Source),
            _ => None,
        }
    }
}

/// Zoom direction for a toolbar zoom action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoomDirection {
    In,
    Out,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ViewError {
    #[error("no diagram block at position {0}")]
    UnknownBlock(usize),
}

/// Element ids of a diagram block's two representations.
pub fn diagram_box_id(position: usize) -> String {
    format!("diagram-box-{position}")
}

pub fn diagram_ops_id(position: usize) -> String {
    format!("diagram-ops-{position}")
}

pub fn source_id(position: usize) -> String {
    format!("diagram-source-{position}")
}

pub fn source_ops_id(position: usize) -> String {
    format!("source-ops-{position}")
}

/// Visibility change the host applies to the presented document.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewPatch {
    pub block: usize,
    pub mode: ViewMode,
    /// Element ids to un-hide.
    pub show: Vec<String>,
    /// Element ids to hide.
    pub hide: Vec<String>,
    /// Whether the mode differs from the one before the call.
    pub changed: bool,
    /// Inline style for the diagram box, set by zoom actions.
    pub style: Option<String>,
}

impl ViewPatch {
    fn for_mode(block: usize, mode: ViewMode, changed: bool) -> Self {
        let diagram = vec![diagram_box_id(block), diagram_ops_id(block)];
        let source = vec![source_id(block), source_ops_id(block)];
        let (show, hide) = match mode {
            ViewMode::Diagram => (diagram, source),
            ViewMode::Source => (source, diagram),
        };
        Self {
            block,
            mode,
            show,
            hide,
            changed,
            style: None,
        }
    }
}

/// Per-block view state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockView {
    pub mode: ViewMode,
    pub zoom: f32,
}

/// View state for every diagram block of one document.
#[derive(Debug, Default)]
pub struct ViewState {
    blocks: BTreeMap<usize, BlockView>,
}

impl ViewState {
    /// Forget all blocks; called at the start of every render pass.
    pub fn reset(&mut self) {
        self.blocks.clear();
    }

    /// Register a block with its computed default mode.
    pub fn set_default(&mut self, position: usize, status: DiagramStatus) -> ViewMode {
        let mode = ViewMode::default_for(status);
        self.blocks
            .insert(position, BlockView { mode, zoom: 1.0 });
        mode
    }

    pub fn get(&self, position: usize) -> Option<&BlockView> {
        self.blocks.get(&position)
    }

    pub fn mode(&self, position: usize) -> Option<ViewMode> {
        self.blocks.get(&position).map(|b| b.mode)
    }

    /// Number of diagram blocks in the last pass.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Switch `position` to `mode`.
    pub fn toggle(&mut self, position: usize, mode: ViewMode) -> Result<ViewPatch, ViewError> {
        let block = self
            .blocks
            .get_mut(&position)
            .ok_or(ViewError::UnknownBlock(position))?;
        let changed = block.mode != mode;
        block.mode = mode;
        crate::debug_log!(
            "VIEW",
            "Block {position} -> {} (changed={changed})",
            mode.as_str()
        );
        Ok(ViewPatch::for_mode(position, mode, changed))
    }

    /// Step the zoom factor of `position` and return the new box style.
    pub fn zoom(
        &mut self,
        position: usize,
        direction: ZoomDirection,
    ) -> Result<ViewPatch, ViewError> {
        let block = self
            .blocks
            .get_mut(&position)
            .ok_or(ViewError::UnknownBlock(position))?;
        let next = match direction {
            ZoomDirection::In => block.zoom * ZOOM_STEP,
            ZoomDirection::Out => block.zoom / ZOOM_STEP,
        };
        let zoom = next.clamp(MIN_ZOOM, MAX_ZOOM);
        let changed = (zoom - block.zoom).abs() > f32::EPSILON;
        block.zoom = zoom;

        let mut patch = ViewPatch::for_mode(position, block.mode, false);
        patch.changed = changed;
        patch.style = Some(format!(
            "transform: scale({}); transform-origin: 0 0",
            format_zoom(zoom)
        ));
        Ok(patch)
    }
}

/// Print a zoom factor without float noise (`1.25`, `0.8`, `2`).
fn format_zoom(zoom: f32) -> String {
    let rounded = (zoom * 10_000.0).round() / 10_000.0;
    let text = format!("{rounded:.4}");
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_modes() {
        assert_eq!(ViewMode::default_for(DiagramStatus::Rendered), ViewMode::Diagram);
        assert_eq!(ViewMode::default_for(DiagramStatus::Pending), ViewMode::Diagram);
        assert_eq!(ViewMode::default_for(DiagramStatus::Failed), ViewMode::Source);
        assert_eq!(
            ViewMode::default_for(DiagramStatus::Unrendered),
            ViewMode::Source
        );
    }

    #[test]
    fn test_parse_mode() {
        assert_eq!(ViewMode::parse("diagram"), Some(ViewMode::Diagram));
        assert_eq!(ViewMode::parse("Code"), Some(ViewMode::Source));
        assert_eq!(ViewMode::parse("source"), Some(ViewMode::Source));
        assert_eq!(ViewMode::parse("other"), None);
    }

    #[test]
    fn test_toggle_switches_visibility() {
        let mut views = ViewState::default();
        views.set_default(2, DiagramStatus::Rendered);

        let patch = views.toggle(2, ViewMode::Source).unwrap();
        assert!(patch.changed);
        assert_eq!(patch.show, vec!["diagram-source-2", "source-ops-2"]);
        assert_eq!(patch.hide, vec!["diagram-box-2", "diagram-ops-2"]);
        assert_eq!(views.mode(2), Some(ViewMode::Source));

        let again = views.toggle(2, ViewMode::Source).unwrap();
        assert!(!again.changed);
    }

    #[test]
    fn test_toggle_unknown_block() {
        let mut views = ViewState::default();
        assert_eq!(
            views.toggle(0, ViewMode::Diagram),
            Err(ViewError::UnknownBlock(0))
        );
    }

    #[test]
    fn test_reset_clears_state() {
        let mut views = ViewState::default();
        views.set_default(0, DiagramStatus::Rendered);
        views.toggle(0, ViewMode::Source).unwrap();
        views.reset();
        assert!(views.is_empty());
        assert_eq!(views.set_default(0, DiagramStatus::Rendered), ViewMode::Diagram);
    }

    #[test]
    fn test_zoom_steps_and_clamps() {
        let mut views = ViewState::default();
        views.set_default(0, DiagramStatus::Rendered);

        let patch = views.zoom(0, ZoomDirection::In).unwrap();
        assert_eq!(
            patch.style.as_deref(),
            Some("transform: scale(1.25); transform-origin: 0 0")
        );
        assert!(patch.changed);

        for _ in 0..20 {
            views.zoom(0, ZoomDirection::In).unwrap();
        }
        assert_eq!(views.get(0).unwrap().zoom, MAX_ZOOM);
        assert!(!views.zoom(0, ZoomDirection::In).unwrap().changed);

        for _ in 0..40 {
            views.zoom(0, ZoomDirection::Out).unwrap();
        }
        assert_eq!(views.get(0).unwrap().zoom, MIN_ZOOM);
    }

    #[test]
    fn test_format_zoom() {
        assert_eq!(format_zoom(1.0), "1");
        assert_eq!(format_zoom(0.8), "0.8");
        assert_eq!(format_zoom(1.5625), "1.5625");
    }
}
