// Library exports for the CLI binary, integration tests and embedding hosts.
//
// # Mutex Usage Policy
//
//   - `parking_lot::Mutex`:     per-document state (`DocumentStore`) and the
//                               debug logger. Never held across an engine
//                               invocation or an `.await`.
//
//   - `tokio::sync::mpsc`:      completed diagram renders travel back to the
//                               host on a channel; no async mutex is needed.

/// Crate version, reported by the CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[macro_use]
pub mod debug;

pub mod actions;
pub mod cli;
pub mod diagram;
pub mod document;
pub mod export;
pub mod markdown;
pub mod renderer;
pub mod view;

pub use par_markdown_config as config;

pub use actions::{Action, ActionError, ActionOutcome};
pub use diagram::{DiagramEngine, DiagramError, DiagramPatch, DiagramStatus, PendingRender};
pub use document::{DocumentState, DocumentStore};
pub use export::{ExportError, ExportFormat, ExportedFile};
pub use markdown::{CmarkTokenizer, Highlighter, KeywordHighlighter, Token, TokenKind, Tokenizer};
pub use renderer::DocumentRenderer;
pub use view::{ViewError, ViewMode, ViewPatch};
