//! Toolbar actions.
//!
//! Every interactive control in the emitted HTML carries `data-action` and
//! `data-block` attributes (plus `data-mode` / `data-format` where needed).
//! The host forwards those attributes; [`Action::from_attributes`] turns them
//! into a typed action that [`crate::DocumentRenderer::dispatch`] executes
//! against the owning document.

use thiserror::Error;

use crate::export::{ExportError, ExportFormat, ExportedFile};
use crate::view::{ViewError, ViewMode, ViewPatch, ZoomDirection};

/// A toolbar action bound to a block position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Show the diagram or its source.
    Toggle { block: usize, mode: ViewMode },
    /// Copy a diagram's raw source.
    CopySource { block: usize },
    /// Copy a code block's content.
    CopyCode { block: usize },
    Zoom { block: usize, direction: ZoomDirection },
    Export { block: usize, format: ExportFormat },
}

/// Result of a dispatched action, for the host to apply.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    View(ViewPatch),
    /// Text to place on the clipboard.
    Clipboard(String),
    Exported(ExportedFile),
}

#[derive(Error, Debug)]
pub enum ActionError {
    #[error("missing attribute {0}")]
    MissingAttribute(&'static str),

    #[error("invalid value {value:?} for attribute {name}")]
    InvalidAttribute { name: &'static str, value: String },

    #[error("unknown action {0:?}")]
    UnknownAction(String),

    #[error("no block at position {0}")]
    UnknownBlock(usize),

    #[error("unknown document {0:?}")]
    UnknownDocument(String),

    #[error(transparent)]
    View(#[from] ViewError),

    #[error(transparent)]
    Export(#[from] ExportError),
}

impl Action {
    /// The `data-action` value of this action.
    pub fn name(&self) -> &'static str {
        match self {
            Action::Toggle { .. } => "toggle",
            Action::CopySource { .. } => "copy-source",
            Action::CopyCode { .. } => "copy-code",
            Action::Zoom {
                direction: ZoomDirection::In,
                ..
            } => "zoom-in",
            Action::Zoom {
                direction: ZoomDirection::Out,
                ..
            } => "zoom-out",
            Action::Export { .. } => "export",
        }
    }

    pub fn block(&self) -> usize {
        match *self {
            Action::Toggle { block, .. }
            | Action::CopySource { block }
            | Action::CopyCode { block }
            | Action::Zoom { block, .. }
            | Action::Export { block, .. } => block,
        }
    }

    /// Parse the attributes of a clicked control.
    ///
    /// Names may be given with or without the `data-` prefix.
    pub fn from_attributes<'a>(
        attrs: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Result<Self, ActionError> {
        let mut action = None;
        let mut block = None;
        let mut mode = None;
        let mut format = None;
        for (name, value) in attrs {
            match name.strip_prefix("data-").unwrap_or(name) {
                "action" => action = Some(value),
                "block" => block = Some(value),
                "mode" => mode = Some(value),
                "format" => format = Some(value),
                _ => {}
            }
        }

        let action = action.ok_or(ActionError::MissingAttribute("data-action"))?;
        let block = block.ok_or(ActionError::MissingAttribute("data-block"))?;
        let block = block
            .trim()
            .parse::<usize>()
            .map_err(|_| ActionError::InvalidAttribute {
                name: "data-block",
                value: block.to_string(),
            })?;

        match action {
            "toggle" => {
                let raw = mode.ok_or(ActionError::MissingAttribute("data-mode"))?;
                let mode = ViewMode::parse(raw).ok_or_else(|| ActionError::InvalidAttribute {
                    name: "data-mode",
                    value: raw.to_string(),
                })?;
                Ok(Action::Toggle { block, mode })
            }
            "copy-source" => Ok(Action::CopySource { block }),
            "copy-code" => Ok(Action::CopyCode { block }),
            "zoom-in" => Ok(Action::Zoom {
                block,
                direction: ZoomDirection::In,
            }),
            "zoom-out" => Ok(Action::Zoom {
                block,
                direction: ZoomDirection::Out,
            }),
            "export" => {
                let raw = format.ok_or(ActionError::MissingAttribute("data-format"))?;
                let format =
                    ExportFormat::parse(raw).ok_or_else(|| ActionError::InvalidAttribute {
                        name: "data-format",
                        value: raw.to_string(),
                    })?;
                Ok(Action::Export { block, format })
            }
            other => Err(ActionError::UnknownAction(other.to_string())),
        }
    }

    /// The attributes a control for this action carries.
    pub fn to_attributes(&self) -> Vec<(&'static str, String)> {
        let mut attrs = vec![
            ("data-action", self.name().to_string()),
            ("data-block", self.block().to_string()),
        ];
        match self {
            Action::Toggle { mode, .. } => attrs.push(("data-mode", mode.as_str().to_string())),
            Action::Export { format, .. } => {
                attrs.push(("data-format", format.extension().to_string()))
            }
            _ => {}
        }
        attrs
    }
}
