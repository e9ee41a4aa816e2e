//! pulldown-cmark backed token stream producer.
//!
//! pulldown-cmark yields a nested event stream; this module flattens it into
//! the [`Token`] shape the rule dispatcher consumes: paired open/close tokens
//! with a nesting `level`, leaf tokens for code and HTML blocks, and
//! zero-based source line ranges for block tokens.

use std::ops::Range;

use pulldown_cmark::{Alignment, CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag, TagEnd};

use par_markdown_config::MarkdownConfig;

use super::token::{LineRange, Token, TokenKind, Tokenizer};

/// Token stream producer backed by pulldown-cmark.
#[derive(Debug, Clone)]
pub struct CmarkTokenizer {
    options: Options,
}

impl Default for CmarkTokenizer {
    fn default() -> Self {
        Self::new(&MarkdownConfig::default())
    }
}

impl CmarkTokenizer {
    /// Create a tokenizer with the extensions enabled in `config`.
    pub fn new(config: &MarkdownConfig) -> Self {
        let mut options = Options::empty();
        if config.tables {
            options.insert(Options::ENABLE_TABLES);
        }
        if config.strikethrough {
            options.insert(Options::ENABLE_STRIKETHROUGH);
        }
        if config.tasklists {
            options.insert(Options::ENABLE_TASKLISTS);
        }
        if config.footnotes {
            options.insert(Options::ENABLE_FOOTNOTES);
        }
        Self { options }
    }
}

impl Tokenizer for CmarkTokenizer {
    fn tokenize(&self, text: &str) -> Vec<Token> {
        let mut builder = TokenBuilder::new(text);
        for (event, range) in Parser::new_ext(text, self.options).into_offset_iter() {
            builder.push_event(event, range);
        }
        builder.finish()
    }
}

/// Byte offsets at which each source line starts.
struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    fn new(text: &str) -> Self {
        let mut starts = vec![0];
        starts.extend(text.match_indices('\n').map(|(i, _)| i + 1));
        Self { starts }
    }

    fn line_of(&self, offset: usize) -> usize {
        self.starts
            .partition_point(|&start| start <= offset)
            .saturating_sub(1)
    }

    fn range(&self, range: &Range<usize>) -> LineRange {
        let start = self.line_of(range.start);
        let last = self.line_of(range.end.saturating_sub(1).max(range.start));
        LineRange {
            start,
            end: last + 1,
        }
    }
}

/// Table bookkeeping between `Start(Table)` and `End(Table)`.
struct TableState {
    alignments: Vec<Alignment>,
    in_head: bool,
    body_open: bool,
    column: usize,
}

struct TokenBuilder<'a> {
    text: &'a str,
    lines: LineIndex,
    tokens: Vec<Token>,
    depth: usize,
    /// Open blockquotes around the current event.
    quotes: usize,
    /// Code or HTML block collecting its text events.
    leaf: Option<Token>,
    /// Image collecting alt text, plus the nesting depth of events inside it.
    image: Option<(Token, usize)>,
    tables: Vec<TableState>,
}

impl<'a> TokenBuilder<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            lines: LineIndex::new(text),
            tokens: Vec::new(),
            depth: 0,
            quotes: 0,
            leaf: None,
            image: None,
            tables: Vec::new(),
        }
    }

    fn finish(mut self) -> Vec<Token> {
        if let Some(leaf) = self.leaf.take() {
            self.tokens.push(leaf);
        }
        if let Some((image, _)) = self.image.take() {
            self.tokens.push(image);
        }
        self.tokens
    }

    fn open(&mut self, kind: TokenKind, range: &Range<usize>) -> Token {
        let token = Token::new(kind, self.depth).with_lines(Some(self.lines.range(range)));
        self.depth += 1;
        token
    }

    fn close(&mut self, kind: TokenKind) -> Token {
        self.depth = self.depth.saturating_sub(1);
        Token::new(kind, self.depth)
    }

    fn leaf(&self, kind: TokenKind, content: impl Into<String>) -> Token {
        Token::new(kind, self.depth).with_content(content)
    }

    fn push_event(&mut self, event: Event<'a>, range: Range<usize>) {
        if self.image.is_some() {
            self.push_image_event(event);
            return;
        }
        if let Some(leaf) = self.leaf.as_mut() {
            match event {
                Event::Text(text) | Event::Html(text) => {
                    leaf.content.push_str(&text);
                    return;
                }
                Event::End(TagEnd::CodeBlock) | Event::End(TagEnd::HtmlBlock) => {
                    if let Some(leaf) = self.leaf.take() {
                        self.tokens.push(leaf);
                    }
                    return;
                }
                _ => {
                    if let Some(leaf) = self.leaf.take() {
                        self.tokens.push(leaf);
                    }
                }
            }
        }

        match event {
            Event::Start(tag) => self.push_start(tag, range),
            Event::End(tag) => self.push_end(tag),
            Event::Text(text) => {
                let token = self.leaf(TokenKind::Text, text.as_ref());
                self.tokens.push(token);
            }
            Event::Code(code) => {
                let token = self.leaf(TokenKind::InlineCode, code.as_ref());
                self.tokens.push(token);
            }
            Event::Html(html) => {
                let token = self
                    .leaf(TokenKind::HtmlBlock, html.as_ref())
                    .with_lines(Some(self.lines.range(&range)));
                self.tokens.push(token);
            }
            Event::InlineHtml(html) => {
                let token = self.leaf(TokenKind::HtmlInline, html.as_ref());
                self.tokens.push(token);
            }
            Event::FootnoteReference(label) => {
                let token = self
                    .leaf(TokenKind::FootnoteReference, label.as_ref())
                    .with_attr("label", label.as_ref());
                self.tokens.push(token);
            }
            Event::SoftBreak => {
                let token = self.leaf(TokenKind::SoftBreak, "");
                self.tokens.push(token);
            }
            Event::HardBreak => {
                let token = self.leaf(TokenKind::HardBreak, "");
                self.tokens.push(token);
            }
            Event::Rule => {
                let token = self
                    .leaf(TokenKind::Rule, "")
                    .with_lines(Some(self.lines.range(&range)));
                self.tokens.push(token);
            }
            Event::TaskListMarker(checked) => {
                let token = self.leaf(TokenKind::TaskMarker(checked), "");
                self.tokens.push(token);
            }
            // Math and anything added later degrade to escaped text.
            other => {
                let raw = &self.text[range.clone()];
                crate::debug_trace!("MARKDOWN", "Unmodelled event {:?}", other);
                let token = self.leaf(TokenKind::Other("text".to_string()), raw);
                self.tokens.push(token);
            }
        }
    }

    fn push_start(&mut self, tag: Tag<'a>, range: Range<usize>) {
        let token = match tag {
            Tag::Paragraph => self.open(TokenKind::ParagraphOpen, &range),
            Tag::Heading { level, .. } => {
                self.open(TokenKind::HeadingOpen(heading_level(level)), &range)
            }
            Tag::BlockQuote(_) => {
                self.quotes += 1;
                self.open(TokenKind::BlockquoteOpen, &range)
            }
            Tag::CodeBlock(kind) => {
                let token = match kind {
                    CodeBlockKind::Fenced(info) => {
                        let source = &self.text[range.clone()];
                        let mut token = Token::new(TokenKind::Fence, self.depth)
                            .with_info(info.as_ref())
                            .with_lines(Some(self.lines.range(&range)));
                        // Anything after the block means its container ended it.
                        token.closed = range.end < self.text.trim_end().len()
                            || fence_is_closed(source, self.quotes);
                        token
                    }
                    CodeBlockKind::Indented => Token::new(TokenKind::CodeBlock, self.depth)
                        .with_lines(Some(self.lines.range(&range))),
                };
                self.leaf = Some(token);
                return;
            }
            Tag::HtmlBlock => {
                self.leaf = Some(
                    Token::new(TokenKind::HtmlBlock, self.depth)
                        .with_lines(Some(self.lines.range(&range))),
                );
                return;
            }
            Tag::List(Some(start)) => self.open(TokenKind::OrderedListOpen(start), &range),
            Tag::List(None) => self.open(TokenKind::BulletListOpen, &range),
            Tag::Item => self.open(TokenKind::ListItemOpen, &range),
            Tag::FootnoteDefinition(label) => {
                let label = label.to_string();
                self.open(TokenKind::FootnoteOpen, &range)
                    .with_attr("label", label)
            }
            Tag::Table(alignments) => {
                self.tables.push(TableState {
                    alignments,
                    in_head: false,
                    body_open: false,
                    column: 0,
                });
                self.open(TokenKind::TableOpen, &range)
            }
            Tag::TableHead => {
                if let Some(table) = self.tables.last_mut() {
                    table.in_head = true;
                    table.column = 0;
                }
                let thead = self.open(TokenKind::TheadOpen, &range);
                self.tokens.push(thead);
                self.open(TokenKind::TrOpen, &range)
            }
            Tag::TableRow => {
                let needs_body = self.tables.last().is_some_and(|t| !t.body_open);
                if needs_body {
                    if let Some(table) = self.tables.last_mut() {
                        table.body_open = true;
                    }
                    let tbody = self.open(TokenKind::TbodyOpen, &range);
                    self.tokens.push(tbody);
                }
                if let Some(table) = self.tables.last_mut() {
                    table.column = 0;
                }
                self.open(TokenKind::TrOpen, &range)
            }
            Tag::TableCell => {
                let (in_head, align) = match self.tables.last_mut() {
                    Some(table) => {
                        let align = table.alignments.get(table.column).copied();
                        table.column += 1;
                        (table.in_head, align)
                    }
                    None => (false, None),
                };
                let kind = if in_head {
                    TokenKind::ThOpen
                } else {
                    TokenKind::TdOpen
                };
                let token = self.open(kind, &range);
                match align.and_then(alignment_name) {
                    Some(name) => token.with_attr("align", name),
                    None => token,
                }
            }
            Tag::Emphasis => self.open(TokenKind::EmphasisOpen, &range),
            Tag::Strong => self.open(TokenKind::StrongOpen, &range),
            Tag::Strikethrough => self.open(TokenKind::StrikethroughOpen, &range),
            Tag::Link {
                dest_url, title, ..
            } => {
                let token = self
                    .open(TokenKind::LinkOpen, &range)
                    .with_attr("href", dest_url.as_ref());
                if title.is_empty() {
                    token
                } else {
                    token.with_attr("title", title.as_ref())
                }
            }
            Tag::Image {
                dest_url, title, ..
            } => {
                let mut token = self
                    .leaf(TokenKind::Image, "")
                    .with_attr("src", dest_url.as_ref());
                if !title.is_empty() {
                    token = token.with_attr("title", title.as_ref());
                }
                self.image = Some((token, 0));
                return;
            }
            // Keep depth balanced for constructs this shape does not model.
            _ => {
                self.depth += 1;
                return;
            }
        };
        self.tokens.push(token);
    }

    fn push_end(&mut self, tag: TagEnd) {
        let token = match tag {
            TagEnd::Paragraph => self.close(TokenKind::ParagraphClose),
            TagEnd::Heading(level) => self.close(TokenKind::HeadingClose(heading_level(level))),
            TagEnd::BlockQuote(_) => {
                self.quotes = self.quotes.saturating_sub(1);
                self.close(TokenKind::BlockquoteClose)
            }
            TagEnd::List(true) => self.close(TokenKind::OrderedListClose),
            TagEnd::List(false) => self.close(TokenKind::BulletListClose),
            TagEnd::Item => self.close(TokenKind::ListItemClose),
            TagEnd::FootnoteDefinition => self.close(TokenKind::FootnoteClose),
            TagEnd::Table => {
                let body_open = self.tables.pop().is_some_and(|t| t.body_open);
                if body_open {
                    let tbody = self.close(TokenKind::TbodyClose);
                    self.tokens.push(tbody);
                }
                self.close(TokenKind::TableClose)
            }
            TagEnd::TableHead => {
                if let Some(table) = self.tables.last_mut() {
                    table.in_head = false;
                }
                let tr = self.close(TokenKind::TrClose);
                self.tokens.push(tr);
                self.close(TokenKind::TheadClose)
            }
            TagEnd::TableRow => self.close(TokenKind::TrClose),
            TagEnd::TableCell => {
                let in_head = self.tables.last().is_some_and(|t| t.in_head);
                if in_head {
                    self.close(TokenKind::ThClose)
                } else {
                    self.close(TokenKind::TdClose)
                }
            }
            TagEnd::Emphasis => self.close(TokenKind::EmphasisClose),
            TagEnd::Strong => self.close(TokenKind::StrongClose),
            TagEnd::Strikethrough => self.close(TokenKind::StrikethroughClose),
            TagEnd::Link => self.close(TokenKind::LinkClose),
            // Leaf blocks are closed in `push_event`; an unmatched end is ignored.
            TagEnd::CodeBlock | TagEnd::HtmlBlock | TagEnd::Image => return,
            _ => {
                self.depth = self.depth.saturating_sub(1);
                return;
            }
        };
        self.tokens.push(token);
    }

    fn push_image_event(&mut self, event: Event<'a>) {
        let Some((mut image, nested)) = self.image.take() else {
            return;
        };
        match event {
            Event::End(TagEnd::Image) if nested == 0 => {
                self.tokens.push(image);
                return;
            }
            Event::Start(_) => {
                self.image = Some((image, nested + 1));
                return;
            }
            Event::End(_) => {
                self.image = Some((image, nested.saturating_sub(1)));
                return;
            }
            Event::Text(text) | Event::Code(text) => image.content.push_str(&text),
            Event::SoftBreak | Event::HardBreak => image.content.push(' '),
            _ => {}
        }
        self.image = Some((image, nested));
    }
}

fn heading_level(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

fn alignment_name(align: Alignment) -> Option<&'static str> {
    match align {
        Alignment::None => None,
        Alignment::Left => Some("left"),
        Alignment::Center => Some("center"),
        Alignment::Right => Some("right"),
    }
}

/// Whether the raw text of a fenced block ends with a closing delimiter.
///
/// A closing fence uses the opening character, is at least as long as the
/// opening run, and carries nothing but whitespace after it. `quotes` is the
/// number of blockquote markers prefixing each line inside the block.
pub(crate) fn fence_is_closed(raw: &str, quotes: usize) -> bool {
    let mut lines = raw.trim_end_matches(['\n', '\r']).lines();
    let Some(first) = lines.next() else {
        return false;
    };
    let opening = strip_quote_markers(first, quotes).trim_start();
    let Some(marker) = opening.chars().next().filter(|c| *c == '`' || *c == '~') else {
        return false;
    };
    let open_len = opening.chars().take_while(|c| *c == marker).count();

    let Some(last) = lines.last() else {
        return false;
    };
    let closing = strip_quote_markers(last, quotes).trim();
    let close_len = closing.chars().take_while(|c| *c == marker).count();
    close_len >= open_len && closing.chars().skip(close_len).all(char::is_whitespace)
}

/// Drop up to `quotes` leading `>` markers, each with its indentation.
fn strip_quote_markers(line: &str, quotes: usize) -> &str {
    let mut rest = line;
    for _ in 0..quotes {
        match rest.trim_start().strip_prefix('>') {
            Some(inner) => rest = inner,
            None => break,
        }
    }
    rest
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(tokens: &[Token]) -> Vec<&str> {
        tokens.iter().map(|t| t.kind.rule_name()).collect()
    }

    #[test]
    fn test_paragraph_lines_and_level() {
        let tokens = CmarkTokenizer::default().tokenize("first\n\nsecond\nline\n");
        let opens: Vec<&Token> = tokens
            .iter()
            .filter(|t| t.kind == TokenKind::ParagraphOpen)
            .collect();
        assert_eq!(opens.len(), 2);
        assert_eq!(opens[0].lines, Some(LineRange { start: 0, end: 1 }));
        assert_eq!(opens[1].lines, Some(LineRange { start: 2, end: 4 }));
        assert!(opens.iter().all(|t| t.level == 0));
    }

    #[test]
    fn test_nested_paragraph_level() {
        let tokens = CmarkTokenizer::default().tokenize("> quoted text\n");
        let para = tokens
            .iter()
            .find(|t| t.kind == TokenKind::ParagraphOpen)
            .unwrap();
        assert_eq!(para.level, 1);

        let close = tokens
            .iter()
            .find(|t| t.kind == TokenKind::BlockquoteClose)
            .unwrap();
        assert_eq!(close.level, 0);
    }

    #[test]
    fn test_fence_token() {
        let tokens = CmarkTokenizer::default().tokenize("text\n\n```mermaid\nA->B\n```\n");
        let fence = tokens.iter().find(|t| t.kind == TokenKind::Fence).unwrap();
        assert_eq!(fence.info.as_deref(), Some("mermaid"));
        assert_eq!(fence.content, "A->B\n");
        assert!(fence.closed);
        assert_eq!(fence.lines, Some(LineRange { start: 2, end: 5 }));
        assert_eq!(fence.level, 0);
    }

    #[test]
    fn test_unterminated_fence() {
        let tokens = CmarkTokenizer::default().tokenize("```mermaid\ngraph TD\n  A-->B\n");
        let fence = tokens.iter().find(|t| t.kind == TokenKind::Fence).unwrap();
        assert!(!fence.closed);
        assert_eq!(fence.content, "graph TD\n  A-->B\n");
    }

    #[test]
    fn test_fence_is_closed_rules() {
        assert!(fence_is_closed("```\ncode\n```", 0));
        assert!(fence_is_closed("````rust\ncode\n`````\n", 0));
        assert!(fence_is_closed("~~~\ncode\n~~~  \n", 0));
        assert!(!fence_is_closed("````\ncode\n```", 0));
        assert!(!fence_is_closed("```\ncode\n~~~", 0));
        assert!(!fence_is_closed("```mermaid", 0));
        assert!(!fence_is_closed("```\n```not closing", 0));
        // Quote markers only count inside a blockquote.
        assert!(fence_is_closed("```\n> code\n> ```", 1));
        assert!(fence_is_closed("```\n> > code\n>> ```\n", 2));
        assert!(!fence_is_closed("```\n> ```", 0));
    }

    #[test]
    fn test_fence_in_blockquote_is_closed() {
        let tokens = CmarkTokenizer::default().tokenize("> ```diagram\n> A->B\n> ```\n");
        let fence = tokens.iter().find(|t| t.kind == TokenKind::Fence).unwrap();
        assert!(fence.closed);
        assert_eq!(fence.content, "A->B\n");

        let streaming = CmarkTokenizer::default().tokenize("> ```diagram\n> A->B\n");
        let fence = streaming.iter().find(|t| t.kind == TokenKind::Fence).unwrap();
        assert!(!fence.closed);
    }

    #[test]
    fn test_fence_in_list_item_is_closed() {
        let tokens = CmarkTokenizer::default().tokenize("- item\n\n  ```diagram\n  A->B\n  ```\n");
        let fence = tokens.iter().find(|t| t.kind == TokenKind::Fence).unwrap();
        assert!(fence.closed);
    }

    #[test]
    fn test_fence_ended_by_container_is_closed() {
        // The blockquote ends, taking the unterminated fence with it.
        let tokens = CmarkTokenizer::default().tokenize("> ```diagram\n> A->B\n\nafter\n");
        let fence = tokens.iter().find(|t| t.kind == TokenKind::Fence).unwrap();
        assert!(fence.closed);
    }

    #[test]
    fn test_table_structure() {
        let tokens = CmarkTokenizer::default().tokenize("| a | b |\n|:--|--:|\n| 1 | 2 |\n");
        assert_eq!(
            kinds(&tokens),
            vec![
                "table_open",
                "thead_open",
                "tr_open",
                "th_open",
                "text",
                "th_close",
                "th_open",
                "text",
                "th_close",
                "tr_close",
                "thead_close",
                "tbody_open",
                "tr_open",
                "td_open",
                "text",
                "td_close",
                "td_open",
                "text",
                "td_close",
                "tr_close",
                "tbody_close",
                "table_close",
            ]
        );
        let aligns: Vec<Option<&str>> = tokens
            .iter()
            .filter(|t| matches!(t.kind, TokenKind::ThOpen | TokenKind::TdOpen))
            .map(|t| t.attr("align"))
            .collect();
        assert_eq!(
            aligns,
            vec![Some("left"), Some("right"), Some("left"), Some("right")]
        );
        assert_eq!(tokens.last().map(|t| t.level), Some(0));
    }

    #[test]
    fn test_image_collects_alt_text() {
        let tokens = CmarkTokenizer::default().tokenize("![a *cat*](cat.png \"Cat\")\n");
        let image = tokens.iter().find(|t| t.kind == TokenKind::Image).unwrap();
        assert_eq!(image.content, "a cat");
        assert_eq!(image.attr("src"), Some("cat.png"));
        assert_eq!(image.attr("title"), Some("Cat"));
        assert!(!tokens.iter().any(|t| t.kind == TokenKind::EmphasisOpen));
    }

    #[test]
    fn test_html_block_is_one_token() {
        let tokens = CmarkTokenizer::default().tokenize("<div>\n<b>hi</b>\n</div>\n");
        let html: Vec<&Token> = tokens
            .iter()
            .filter(|t| t.kind == TokenKind::HtmlBlock)
            .collect();
        assert_eq!(html.len(), 1);
        assert!(html[0].content.contains("<b>hi</b>"));
    }

    #[test]
    fn test_deterministic() {
        let text = "# Title\n\n- a\n- b\n\n```python\nprint(1)\n```\n";
        let tokenizer = CmarkTokenizer::default();
        assert_eq!(tokenizer.tokenize(text), tokenizer.tokenize(text));
    }

    #[test]
    fn test_depth_balanced() {
        let text = "> - item *em* [link](x)\n>\n> | a |\n> |---|\n> | b |\n\n[^1]\n\n[^1]: note\n";
        let tokens = CmarkTokenizer::default().tokenize(text);
        let opens = tokens
            .iter()
            .filter(|t| t.kind.rule_name().ends_with("_open"))
            .count();
        let closes = tokens
            .iter()
            .filter(|t| t.kind.rule_name().ends_with("_close"))
            .count();
        assert_eq!(opens, closes);
        assert!(tokens.iter().all(|t| t.level < 8));
    }
}
