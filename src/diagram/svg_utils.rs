//! SVG helpers shared by the diagram engines and the export rasterizer:
//! the lazily-loaded font database, font-family sanitization and the native
//! Mermaid theme.

use std::sync::Arc;

#[cfg(feature = "mermaid")]
use par_markdown_config::DiagramThemeConfig;

/// Lazily-loaded system font database for SVG text rendering.
///
/// Loading system fonts is expensive (~50ms), so we do it once and share
/// the database across all rasterizations.
pub(crate) static FONTDB: std::sync::LazyLock<Arc<fontdb::Database>> =
    std::sync::LazyLock::new(|| {
        let mut db = fontdb::Database::new();
        db.load_system_fonts();
        crate::debug_info!("EXPORT", "Loaded {} font faces from system", db.len());
        Arc::new(db)
    });

/// Fix malformed SVG font-family attributes that contain unescaped inner quotes.
///
/// Some renderers emit SVG like:
///   `font-family="Inter, "Segoe UI", sans-serif"`
/// which is invalid XML. We replace inner `"` within attribute values with `'`.
pub(crate) fn sanitize_svg_font_family(svg: &str) -> String {
    const ATTR: &str = "font-family=\"";
    let mut result = String::with_capacity(svg.len());
    let mut rest = svg;

    while let Some(found) = rest.find(ATTR) {
        let value_start = found + ATTR.len();
        result.push_str(&rest[..value_start]);
        rest = &rest[value_start..];

        // Inside the attribute value: a quote closes it only when followed by
        // whitespace, `/`, `>` or the end of input.
        let mut consumed = rest.len();
        let mut chars = rest.char_indices().peekable();
        while let Some((i, c)) = chars.next() {
            if c != '"' {
                result.push(c);
                continue;
            }
            match chars.peek() {
                Some(&(_, after)) if !(after.is_whitespace() || after == '/' || after == '>') => {
                    result.push('\'');
                }
                _ => {
                    result.push('"');
                    consumed = i + 1;
                    break;
                }
            }
        }
        rest = &rest[consumed..];
    }
    result.push_str(rest);
    result
}

/// Build the `mermaid_rs_renderer::Theme` the native engine is created with.
///
/// Starts from the library's modern theme and applies the configured font,
/// background and optional color overrides.
#[cfg(feature = "mermaid")]
pub(crate) fn mermaid_theme(config: &DiagramThemeConfig) -> mermaid_rs_renderer::Theme {
    let mut theme = mermaid_rs_renderer::Theme {
        font_family: config.font_family.clone(),
        font_size: config.font_size,
        background: config.background.clone(),
        ..mermaid_rs_renderer::Theme::modern()
    };
    if let Some(primary) = &config.primary_color {
        theme.primary_color = primary.clone();
        theme.sequence_actor_fill = primary.clone();
    }
    if let Some(line) = &config.line_color {
        theme.line_color = line.clone();
        theme.sequence_actor_line = line.clone();
    }
    if let Some(text) = &config.text_color {
        theme.text_color = text.clone();
        theme.primary_text_color = text.clone();
    }
    theme
}
