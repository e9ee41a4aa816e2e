//! Fenced block rule.
//!
//! Every fence claims the next block position. Fences whose info string
//! names a diagram language go to the diagram block renderer; all others are
//! highlighted (or escaped) and wrapped in a container with a copy button.

use crate::document::BlockRecord;

use super::html::escape_html;
use super::rules::{RenderContext, RenderError};
use super::token::{Token, TokenKind};

pub(crate) fn fence(
    tokens: &[Token],
    idx: usize,
    ctx: &mut RenderContext<'_>,
) -> Result<String, RenderError> {
    let token = &tokens[idx];
    if token.kind != TokenKind::Fence {
        return Err(RenderError::malformed(token, idx, "not a fence"));
    }

    let position = ctx.next_block_position();
    let info = token.info_str();
    let language = ctx.diagrams.match_language(info).cloned();

    ctx.state.blocks.push(BlockRecord {
        position,
        info: info.to_string(),
        source: token.content.clone(),
        is_diagram: language.is_some(),
    });

    match language {
        Some(language) => Ok(ctx.diagrams.render_block(
            ctx.document_id,
            position,
            &language,
            token,
            ctx.state,
        )),
        None => Ok(code_block(position, info, &token.content, ctx)),
    }
}

fn code_block(position: usize, info: &str, source: &str, ctx: &RenderContext<'_>) -> String {
    let lang = info.split_whitespace().next().unwrap_or("");
    let mut body = String::new();
    if ctx.config.highlight_code && !lang.is_empty() {
        body = ctx.highlighter.highlight(source, lang);
    }
    if body.is_empty() {
        body = escape_html(source);
    }
    let class = if lang.is_empty() {
        String::new()
    } else {
        format!(" class=\"language-{}\"", escape_html(lang))
    };

    format!(
        "<pre><div class=\"code-home\" data-block=\"{position}\"><div class=\"code-title\"><div>{}</div><button class=\"copy-code\" data-action=\"copy-code\" data-block=\"{position}\">Copy code</button></div><div class=\"code-body\"><code{class}>{body}</code></div></div></pre>\n",
        escape_html(info)
    )
}
