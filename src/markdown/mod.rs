//! Markdown to HTML.
//!
//! Text is flattened into a [`Token`] stream by a [`Tokenizer`] and turned
//! into HTML by the [`RuleSet`] dispatcher. Fenced blocks are routed either to
//! the diagram block renderer or to a [`Highlighter`].

pub mod fence;
pub mod highlight;
pub mod html;
pub mod rules;
pub mod token;
pub mod tokenizer;

pub use highlight::{Highlighter, KeywordHighlighter};
pub use rules::{RenderContext, RenderError, RenderRule, RuleSet, generic_fragment};
pub use token::{LineRange, Token, TokenKind, Tokenizer};
pub use tokenizer::CmarkTokenizer;
