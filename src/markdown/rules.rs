//! Render rule dispatcher.
//!
//! `RuleSet` maps token rule names (`table_open`, `fence`, ...) to
//! [`RenderRule`]s. Tokens without a registered rule get a generic fragment.
//! A rule that fails, or a token this module does not know, degrades to
//! escaped text; the pass always runs to the end of the token stream.

use std::collections::HashMap;

use par_markdown_config::MarkdownConfig;
use thiserror::Error;

use crate::diagram::DiagramBlockRenderer;
use crate::document::DocumentState;

use super::highlight::Highlighter;
use super::html::{escape_html, is_safe_url};
use super::token::{Token, TokenKind};

/// Errors that can occur while rendering a single token.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// The token does not have the shape its rule expects.
    #[error("malformed {rule} token at index {index}: {reason}")]
    MalformedToken {
        rule: String,
        index: usize,
        reason: String,
    },
}

impl RenderError {
    pub fn malformed(token: &Token, index: usize, reason: impl Into<String>) -> Self {
        RenderError::MalformedToken {
            rule: token.kind.rule_name().to_string(),
            index,
            reason: reason.into(),
        }
    }
}

/// Everything a rule may consult while producing its fragment.
pub struct RenderContext<'a> {
    pub config: &'a MarkdownConfig,
    pub highlighter: &'a dyn Highlighter,
    pub diagrams: &'a DiagramBlockRenderer,
    pub document_id: &'a str,
    pub state: &'a mut DocumentState,
    next_block: usize,
}

impl<'a> RenderContext<'a> {
    pub fn new(
        config: &'a MarkdownConfig,
        highlighter: &'a dyn Highlighter,
        diagrams: &'a DiagramBlockRenderer,
        document_id: &'a str,
        state: &'a mut DocumentState,
    ) -> Self {
        Self {
            config,
            highlighter,
            diagrams,
            document_id,
            state,
            next_block: 0,
        }
    }

    /// Claim the next fenced block position of this pass.
    pub fn next_block_position(&mut self) -> usize {
        let position = self.next_block;
        self.next_block += 1;
        position
    }

    /// Number of fenced blocks seen so far in this pass.
    pub fn block_count(&self) -> usize {
        self.next_block
    }
}

/// Produces the HTML fragment for the token at `idx`.
pub trait RenderRule: Send + Sync {
    fn render(
        &self,
        tokens: &[Token],
        idx: usize,
        ctx: &mut RenderContext<'_>,
    ) -> Result<String, RenderError>;
}

impl<F> RenderRule for F
where
    F: Fn(&[Token], usize, &mut RenderContext<'_>) -> Result<String, RenderError> + Send + Sync,
{
    fn render(
        &self,
        tokens: &[Token],
        idx: usize,
        ctx: &mut RenderContext<'_>,
    ) -> Result<String, RenderError> {
        self(tokens, idx, ctx)
    }
}

/// Registry of custom rules keyed by token rule name.
pub struct RuleSet {
    rules: HashMap<String, Box<dyn RenderRule>>,
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl RuleSet {
    /// A rule set with no overrides; every token gets its generic fragment.
    pub fn empty() -> Self {
        Self {
            rules: HashMap::new(),
        }
    }

    /// The standard overrides: scrollable tables, styled cells, line-tagged
    /// paragraphs and headings, and fenced blocks.
    pub fn with_defaults() -> Self {
        let mut rules = Self::empty();
        rules.register("table_open", table_open);
        rules.register("table_close", table_close);
        rules.register("th_open", th_open);
        rules.register("td_open", td_open);
        rules.register("paragraph_open", paragraph_open);
        rules.register("heading_open", heading_open);
        rules.register("fence", super::fence::fence);
        rules
    }

    /// Register (or replace) the rule for `name`.
    pub fn register(&mut self, name: &str, rule: impl RenderRule + 'static) {
        self.rules.insert(name.to_string(), Box::new(rule));
    }

    /// Whether a custom rule exists for `name`.
    pub fn has_rule(&self, name: &str) -> bool {
        self.rules.contains_key(name)
    }

    /// Render the whole token stream.
    pub fn render(&self, tokens: &[Token], ctx: &mut RenderContext<'_>) -> String {
        let mut html = String::new();
        for (idx, token) in tokens.iter().enumerate() {
            let name = token.kind.rule_name();
            let fragment = match self.rules.get(name) {
                Some(rule) => rule.render(tokens, idx, ctx),
                None => Ok(generic_fragment(token, ctx.config)),
            };
            match fragment {
                Ok(fragment) => html.push_str(&fragment),
                Err(e) => {
                    crate::debug_error!("MARKDOWN", "Rule {name} failed: {e}");
                    html.push_str(&escape_html(&token.content));
                }
            }
        }
        html
    }
}

// ---------------------------------------------------------------------------
// Overrides
// ---------------------------------------------------------------------------

fn table_open(
    _tokens: &[Token],
    _idx: usize,
    ctx: &mut RenderContext<'_>,
) -> Result<String, RenderError> {
    let style = &ctx.config.table;
    Ok(format!(
        "<div style=\"max-width: 100%; max-height: {}px; overflow: auto; padding: 10px; margin: 10px 0; border: 2px dashed {}; border-radius: 4px;\"><table style=\"width: auto; border-collapse: collapse;\">\n",
        style.max_height_px,
        escape_html(&style.border_color)
    ))
}

fn table_close(
    _tokens: &[Token],
    _idx: usize,
    _ctx: &mut RenderContext<'_>,
) -> Result<String, RenderError> {
    Ok("</table></div>\n".to_string())
}

fn cell_style(token: &Token, ctx: &RenderContext<'_>, header: bool) -> String {
    let style = &ctx.config.table;
    let mut css = format!(
        "border: 1px solid {}; padding: {};",
        escape_html(&style.cell_border_color),
        escape_html(&style.cell_padding)
    );
    match token.attr("align") {
        Some(align) => css.push_str(&format!(" text-align: {align};")),
        None if header => css.push_str(" text-align: left;"),
        None => {}
    }
    if header {
        css.push_str(" white-space: nowrap;");
    }
    css
}

fn th_open(
    tokens: &[Token],
    idx: usize,
    ctx: &mut RenderContext<'_>,
) -> Result<String, RenderError> {
    Ok(format!("<th style=\"{}\">", cell_style(&tokens[idx], ctx, true)))
}

fn td_open(
    tokens: &[Token],
    idx: usize,
    ctx: &mut RenderContext<'_>,
) -> Result<String, RenderError> {
    Ok(format!("<td style=\"{}\">", cell_style(&tokens[idx], ctx, false)))
}

/// First source line of a top-level token, when line tags are on.
fn line_tag(token: &Token, ctx: &RenderContext<'_>) -> Option<usize> {
    if !ctx.config.line_tags || token.level != 0 {
        return None;
    }
    token.lines.map(|lines| lines.start)
}

fn paragraph_open(
    tokens: &[Token],
    idx: usize,
    ctx: &mut RenderContext<'_>,
) -> Result<String, RenderError> {
    Ok(match line_tag(&tokens[idx], ctx) {
        Some(line) => format!(
            "<p class=\"line\" data-line=\"{line}\" style=\"overflow-wrap: anywhere\">"
        ),
        None => "<p>".to_string(),
    })
}

fn heading_open(
    tokens: &[Token],
    idx: usize,
    ctx: &mut RenderContext<'_>,
) -> Result<String, RenderError> {
    let token = &tokens[idx];
    let TokenKind::HeadingOpen(level) = token.kind else {
        return Err(RenderError::malformed(token, idx, "not a heading"));
    };
    if !(1..=6).contains(&level) {
        return Err(RenderError::malformed(
            token,
            idx,
            format!("heading level {level}"),
        ));
    }
    Ok(match line_tag(token, ctx) {
        Some(line) => format!("<h{level} class=\"line\" data-line=\"{line}\">"),
        None => format!("<h{level}>"),
    })
}

// ---------------------------------------------------------------------------
// Generic fragments
// ---------------------------------------------------------------------------

fn raw_or_escaped(content: &str, config: &MarkdownConfig) -> String {
    if config.allow_raw_html {
        content.to_string()
    } else {
        escape_html(content)
    }
}

fn url_attr(token: &Token, name: &str) -> String {
    let url = token.attr(name).unwrap_or_default();
    if is_safe_url(url) {
        escape_html(url)
    } else {
        crate::debug_log!("MARKDOWN", "Dropped unsafe {name} {url:?}");
        String::new()
    }
}

fn title_attr(token: &Token) -> String {
    token
        .attr("title")
        .map(|title| format!(" title=\"{}\"", escape_html(title)))
        .unwrap_or_default()
}

/// Fragment for a token with no custom rule.
pub fn generic_fragment(token: &Token, config: &MarkdownConfig) -> String {
    match &token.kind {
        TokenKind::ParagraphOpen => "<p>".to_string(),
        TokenKind::ParagraphClose => "</p>\n".to_string(),
        TokenKind::HeadingOpen(level) => format!("<h{level}>"),
        TokenKind::HeadingClose(level) => format!("</h{level}>\n"),
        TokenKind::BlockquoteOpen => "<blockquote>\n".to_string(),
        TokenKind::BlockquoteClose => "</blockquote>\n".to_string(),
        TokenKind::BulletListOpen => "<ul>\n".to_string(),
        TokenKind::BulletListClose => "</ul>\n".to_string(),
        TokenKind::OrderedListOpen(1) => "<ol>\n".to_string(),
        TokenKind::OrderedListOpen(start) => format!("<ol start=\"{start}\">\n"),
        TokenKind::OrderedListClose => "</ol>\n".to_string(),
        TokenKind::ListItemOpen => "<li>".to_string(),
        TokenKind::ListItemClose => "</li>\n".to_string(),
        TokenKind::TableOpen => "<table>\n".to_string(),
        TokenKind::TableClose => "</table>\n".to_string(),
        TokenKind::TheadOpen => "<thead>\n".to_string(),
        TokenKind::TheadClose => "</thead>\n".to_string(),
        TokenKind::TbodyOpen => "<tbody>\n".to_string(),
        TokenKind::TbodyClose => "</tbody>\n".to_string(),
        TokenKind::TrOpen => "<tr>\n".to_string(),
        TokenKind::TrClose => "</tr>\n".to_string(),
        TokenKind::ThOpen => "<th>".to_string(),
        TokenKind::ThClose => "</th>\n".to_string(),
        TokenKind::TdOpen => "<td>".to_string(),
        TokenKind::TdClose => "</td>\n".to_string(),
        TokenKind::Fence => {
            let lang = token.info_str().split_whitespace().next().unwrap_or("");
            let class = if lang.is_empty() {
                String::new()
            } else {
                format!(" class=\"language-{}\"", escape_html(lang))
            };
            format!(
                "<pre><code{class}>{}</code></pre>\n",
                escape_html(&token.content)
            )
        }
        TokenKind::CodeBlock => format!(
            "<pre><code>{}</code></pre>\n",
            escape_html(&token.content)
        ),
        TokenKind::HtmlBlock => raw_or_escaped(&token.content, config),
        TokenKind::HtmlInline => raw_or_escaped(&token.content, config),
        TokenKind::Text => escape_html(&token.content),
        TokenKind::InlineCode => format!("<code>{}</code>", escape_html(&token.content)),
        TokenKind::SoftBreak => "\n".to_string(),
        TokenKind::HardBreak => "<br>\n".to_string(),
        TokenKind::EmphasisOpen => "<em>".to_string(),
        TokenKind::EmphasisClose => "</em>".to_string(),
        TokenKind::StrongOpen => "<strong>".to_string(),
        TokenKind::StrongClose => "</strong>".to_string(),
        TokenKind::StrikethroughOpen => "<s>".to_string(),
        TokenKind::StrikethroughClose => "</s>".to_string(),
        TokenKind::LinkOpen => format!(
            "<a href=\"{}\"{}>",
            url_attr(token, "href"),
            title_attr(token)
        ),
        TokenKind::LinkClose => "</a>".to_string(),
        TokenKind::Image => format!(
            "<img src=\"{}\" alt=\"{}\"{}>",
            url_attr(token, "src"),
            escape_html(&token.content),
            title_attr(token)
        ),
        TokenKind::Rule => "<hr>\n".to_string(),
        TokenKind::TaskMarker(checked) => format!(
            "<input class=\"task-list-item-checkbox\" disabled=\"\" type=\"checkbox\"{}> ",
            if *checked { " checked=\"\"" } else { "" }
        ),
        TokenKind::FootnoteReference => {
            let label = escape_html(token.attr("label").unwrap_or(&token.content));
            format!("<sup class=\"footnote-ref\"><a href=\"#fn-{label}\">{label}</a></sup>")
        }
        TokenKind::FootnoteOpen => {
            let label = escape_html(token.attr("label").unwrap_or_default());
            format!(
                "<div class=\"footnote-definition\" id=\"fn-{label}\"><sup class=\"footnote-definition-label\">{label}</sup>\n"
            )
        }
        TokenKind::FootnoteClose => "</div>\n".to_string(),
        TokenKind::Other(_) => escape_html(&token.content),
    }
}
