//! Token data model shared by the tokenizer and the render rule dispatcher.
//!
//! Tokens are produced fresh on every render pass and owned by that pass.
//! The shape is deliberately flat: block structure is expressed with paired
//! open/close tokens plus a `level` nesting depth, so rules can look at
//! neighbouring tokens by index the same way the dispatcher walks them.

/// Half-open range of zero-based source lines `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRange {
    pub start: usize,
    pub end: usize,
}

/// Kind of a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    ParagraphOpen,
    ParagraphClose,
    HeadingOpen(u8),
    HeadingClose(u8),
    BlockquoteOpen,
    BlockquoteClose,
    BulletListOpen,
    OrderedListOpen(u64),
    BulletListClose,
    OrderedListClose,
    ListItemOpen,
    ListItemClose,
    TableOpen,
    TableClose,
    TheadOpen,
    TheadClose,
    TbodyOpen,
    TbodyClose,
    TrOpen,
    TrClose,
    ThOpen,
    ThClose,
    TdOpen,
    TdClose,
    /// Fenced block; `Token::info` carries the info string.
    Fence,
    /// Indented code block.
    CodeBlock,
    HtmlBlock,
    HtmlInline,
    Text,
    InlineCode,
    SoftBreak,
    HardBreak,
    EmphasisOpen,
    EmphasisClose,
    StrongOpen,
    StrongClose,
    StrikethroughOpen,
    StrikethroughClose,
    /// `href` and optional `title` live in `Token::attrs`.
    LinkOpen,
    LinkClose,
    /// Alt text in `content`; `src` and optional `title` in `attrs`.
    Image,
    Rule,
    TaskMarker(bool),
    FootnoteReference,
    FootnoteOpen,
    FootnoteClose,
    /// Anything the tokenizer does not model; rendered as escaped content.
    Other(String),
}

impl TokenKind {
    /// Rule name used to look up custom render rules.
    pub fn rule_name(&self) -> &str {
        match self {
            TokenKind::ParagraphOpen => "paragraph_open",
            TokenKind::ParagraphClose => "paragraph_close",
            TokenKind::HeadingOpen(_) => "heading_open",
            TokenKind::HeadingClose(_) => "heading_close",
            TokenKind::BlockquoteOpen => "blockquote_open",
            TokenKind::BlockquoteClose => "blockquote_close",
            TokenKind::BulletListOpen => "bullet_list_open",
            TokenKind::OrderedListOpen(_) => "ordered_list_open",
            TokenKind::BulletListClose => "bullet_list_close",
            TokenKind::OrderedListClose => "ordered_list_close",
            TokenKind::ListItemOpen => "list_item_open",
            TokenKind::ListItemClose => "list_item_close",
            TokenKind::TableOpen => "table_open",
            TokenKind::TableClose => "table_close",
            TokenKind::TheadOpen => "thead_open",
            TokenKind::TheadClose => "thead_close",
            TokenKind::TbodyOpen => "tbody_open",
            TokenKind::TbodyClose => "tbody_close",
            TokenKind::TrOpen => "tr_open",
            TokenKind::TrClose => "tr_close",
            TokenKind::ThOpen => "th_open",
            TokenKind::ThClose => "th_close",
            TokenKind::TdOpen => "td_open",
            TokenKind::TdClose => "td_close",
            TokenKind::Fence => "fence",
            TokenKind::CodeBlock => "code_block",
            TokenKind::HtmlBlock => "html_block",
            TokenKind::HtmlInline => "html_inline",
            TokenKind::Text => "text",
            TokenKind::InlineCode => "code_inline",
            TokenKind::SoftBreak => "softbreak",
            TokenKind::HardBreak => "hardbreak",
            TokenKind::EmphasisOpen => "em_open",
            TokenKind::EmphasisClose => "em_close",
            TokenKind::StrongOpen => "strong_open",
            TokenKind::StrongClose => "strong_close",
            TokenKind::StrikethroughOpen => "s_open",
            TokenKind::StrikethroughClose => "s_close",
            TokenKind::LinkOpen => "link_open",
            TokenKind::LinkClose => "link_close",
            TokenKind::Image => "image",
            TokenKind::Rule => "hr",
            TokenKind::TaskMarker(_) => "task_marker",
            TokenKind::FootnoteReference => "footnote_ref",
            TokenKind::FootnoteOpen => "footnote_open",
            TokenKind::FootnoteClose => "footnote_close",
            TokenKind::Other(name) => name.as_str(),
        }
    }
}

/// A discrete lexical unit of the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// Raw content (text, code, fence body, alt text).
    pub content: String,
    /// Info string of a fenced block.
    pub info: Option<String>,
    /// Source lines covered by the token, when known.
    pub lines: Option<LineRange>,
    /// Nesting depth: 0 for top-level blocks.
    pub level: usize,
    /// Extra attributes (`href`, `src`, `title`, `align`, footnote label).
    pub attrs: Vec<(String, String)>,
    /// For fences: whether the closing delimiter is present.
    pub closed: bool,
}

impl Token {
    /// Create a token with no content or attributes.
    pub fn new(kind: TokenKind, level: usize) -> Self {
        Self {
            kind,
            content: String::new(),
            info: None,
            lines: None,
            level,
            attrs: Vec::new(),
            closed: true,
        }
    }

    #[must_use]
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    #[must_use]
    pub fn with_info(mut self, info: impl Into<String>) -> Self {
        self.info = Some(info.into());
        self
    }

    #[must_use]
    pub fn with_lines(mut self, lines: Option<LineRange>) -> Self {
        self.lines = lines;
        self
    }

    #[must_use]
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.push((name.into(), value.into()));
        self
    }

    /// Look up an attribute by name.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Trimmed info string, empty when absent.
    pub fn info_str(&self) -> &str {
        self.info.as_deref().map_or("", str::trim)
    }
}

/// Turns document text into an ordered token sequence.
///
/// Implementations must be deterministic (same input, same output) and keep
/// no state between calls. Malformed input never fails tokenization; the
/// offending span degrades to text tokens.
pub trait Tokenizer: Send + Sync {
    fn tokenize(&self, text: &str) -> Vec<Token>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_names_match_dispatch_keys() {
        assert_eq!(TokenKind::TableOpen.rule_name(), "table_open");
        assert_eq!(TokenKind::HeadingOpen(3).rule_name(), "heading_open");
        assert_eq!(TokenKind::Fence.rule_name(), "fence");
        assert_eq!(TokenKind::Other("math".into()).rule_name(), "math");
    }

    #[test]
    fn test_token_builders() {
        let token = Token::new(TokenKind::LinkOpen, 1)
            .with_attr("href", "https://example.com")
            .with_lines(Some(LineRange { start: 2, end: 3 }));
        assert_eq!(token.attr("href"), Some("https://example.com"));
        assert_eq!(token.attr("title"), None);
        assert_eq!(token.lines.map(|l| l.start), Some(2));
        assert_eq!(token.level, 1);
        assert!(token.closed);
    }

    #[test]
    fn test_info_str_trims() {
        let token = Token::new(TokenKind::Fence, 0).with_info("  mermaid  ");
        assert_eq!(token.info_str(), "mermaid");
        assert_eq!(Token::new(TokenKind::Fence, 0).info_str(), "");
    }
}
