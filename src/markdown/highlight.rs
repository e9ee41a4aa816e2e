//! Keyword-based syntax highlighting for fenced code blocks.
//!
//! Provides the [`Highlighter`] seam and [`KeywordHighlighter`], which emits
//! `hljs-*` classed spans. The highlighter is intentionally simple: it does
//! not build a parse tree but uses fast tokenisation with string matching
//! against small keyword and builtin tables for the languages most often
//! fenced next to diagrams.

use super::html::escape_html;

/// Converts source text into highlighted HTML.
///
/// Returns an empty string for an unrecognised language; callers then fall
/// back to escaped plain text. Implementations never panic on odd input.
pub trait Highlighter: Send + Sync {
    fn highlight(&self, source: &str, language: &str) -> String;
}

impl<F> Highlighter for F
where
    F: Fn(&str, &str) -> String + Send + Sync,
{
    fn highlight(&self, source: &str, language: &str) -> String {
        self(source, language)
    }
}

// ---------------------------------------------------------------------------
// Language definitions
// ---------------------------------------------------------------------------

/// Keyword tables for one language and the fence tags that select it.
pub(crate) struct LanguageDef {
    pub(crate) tags: &'static [&'static str],
    pub(crate) keywords: &'static [&'static str],
    /// Line comment marker; empty when the language has none.
    pub(crate) comment_prefix: &'static str,
    pub(crate) builtins: &'static [&'static str],
}

static LANGUAGES: &[LanguageDef] = &[
    LanguageDef {
        tags: &["rust", "rs"],
        keywords: &[
            "as", "async", "await", "break", "const", "continue", "crate", "else", "enum",
            "false", "fn", "for", "if", "impl", "in", "let", "loop", "match", "mod", "move",
            "mut", "pub", "ref", "return", "self", "static", "struct", "super", "trait", "true",
            "type", "unsafe", "use", "where", "while",
        ],
        comment_prefix: "//",
        builtins: &[
            "Arc", "Box", "Err", "None", "Ok", "Option", "Result", "Self", "Some", "String", "Vec",
        ],
    },
    LanguageDef {
        tags: &["python", "py"],
        keywords: &[
            "False", "None", "True", "and", "as", "async", "await", "break", "class", "continue",
            "def", "elif", "else", "except", "finally", "for", "from", "if", "import", "in", "is",
            "lambda", "not", "or", "pass", "raise", "return", "try", "while", "with", "yield",
        ],
        comment_prefix: "#",
        builtins: &["dict", "float", "int", "len", "list", "print", "range", "self", "str"],
    },
    LanguageDef {
        tags: &["javascript", "js", "typescript", "ts"],
        keywords: &[
            "async", "await", "break", "case", "catch", "class", "const", "continue", "default",
            "else", "export", "false", "finally", "for", "from", "function", "if", "import",
            "let", "new", "null", "return", "switch", "this", "throw", "true", "try", "undefined",
            "var", "while",
        ],
        comment_prefix: "//",
        builtins: &["Array", "JSON", "Map", "Object", "Promise", "console"],
    },
    LanguageDef {
        tags: &["shell", "sh", "bash", "zsh"],
        keywords: &[
            "case", "do", "done", "elif", "else", "esac", "export", "fi", "for", "function", "if",
            "in", "local", "return", "then", "until", "while",
        ],
        comment_prefix: "#",
        builtins: &["cd", "echo", "exit", "printf", "read", "set", "source"],
    },
    LanguageDef {
        tags: &["json"],
        keywords: &["false", "null", "true"],
        comment_prefix: "",
        builtins: &[],
    },
    LanguageDef {
        tags: &["yaml", "yml"],
        keywords: &["false", "null", "true"],
        comment_prefix: "#",
        builtins: &[],
    },
];

/// Keyword tables for a fence tag, matched case-insensitively.
pub(crate) fn get_language_def(language: &str) -> Option<&'static LanguageDef> {
    LANGUAGES
        .iter()
        .find(|def| def.tags.iter().any(|tag| tag.eq_ignore_ascii_case(language)))
}

// ---------------------------------------------------------------------------
// Highlighter
// ---------------------------------------------------------------------------

/// Span class for each highlighted token category.
const CLASS_KEYWORD: &str = "hljs-keyword";
const CLASS_BUILTIN: &str = "hljs-built_in";
const CLASS_STRING: &str = "hljs-string";
const CLASS_NUMBER: &str = "hljs-number";
const CLASS_COMMENT: &str = "hljs-comment";

/// Highlighter for the languages known to [`get_language_def`].
#[derive(Debug, Default, Clone, Copy)]
pub struct KeywordHighlighter;

impl Highlighter for KeywordHighlighter {
    fn highlight(&self, source: &str, language: &str) -> String {
        let Some(def) = get_language_def(language) else {
            return String::new();
        };
        let mut out = String::with_capacity(source.len() * 2);
        for (i, line) in source.split('\n').enumerate() {
            if i > 0 {
                out.push('\n');
            }
            highlight_code_line(line, def, &mut out);
        }
        out
    }
}

fn push_span(out: &mut String, class: &str, text: &str) {
    out.push_str("<span class=\"");
    out.push_str(class);
    out.push_str("\">");
    out.push_str(&escape_html(text));
    out.push_str("</span>");
}

/// Highlight a single code line using simple keyword matching.
fn highlight_code_line(line: &str, def: &LanguageDef, out: &mut String) {
    // Full-line comment.
    if !def.comment_prefix.is_empty() && line.trim_start().starts_with(def.comment_prefix) {
        let indent = line.len() - line.trim_start().len();
        out.push_str(&line[..indent]);
        push_span(out, CLASS_COMMENT, &line[indent..]);
        return;
    }

    let mut chars = line.char_indices().peekable();

    while let Some(&(byte_pos, ch)) = chars.peek() {
        // String literal.
        if ch == '"' || ch == '\'' {
            let quote = ch;
            let start = byte_pos;
            chars.next(); // consume opening quote
            let mut escaped = false;
            while let Some(&(_, c)) = chars.peek() {
                chars.next();
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == quote {
                    break;
                }
            }
            let end = chars.peek().map(|&(i, _)| i).unwrap_or(line.len());
            push_span(out, CLASS_STRING, &line[start..end]);
            continue;
        }

        // Inline comment.
        if !def.comment_prefix.is_empty() && line[byte_pos..].starts_with(def.comment_prefix) {
            push_span(out, CLASS_COMMENT, &line[byte_pos..]);
            break;
        }

        // Word (identifier, keyword or number).
        if ch.is_alphanumeric() || ch == '_' {
            let start = byte_pos;
            while let Some(&(_, c)) = chars.peek() {
                if c.is_alphanumeric() || c == '_' || (c == '.' && ch.is_ascii_digit()) {
                    chars.next();
                } else {
                    break;
                }
            }
            let end = chars.peek().map(|&(i, _)| i).unwrap_or(line.len());
            let word = &line[start..end];

            if def.keywords.contains(&word) {
                push_span(out, CLASS_KEYWORD, word);
            } else if def.builtins.contains(&word) {
                push_span(out, CLASS_BUILTIN, word);
            } else if ch.is_ascii_digit() {
                push_span(out, CLASS_NUMBER, word);
            } else {
                out.push_str(&escape_html(word));
            }
            continue;
        }

        // Other character (punctuation, whitespace, etc.).
        let start = byte_pos;
        chars.next();
        let end = chars.peek().map(|&(i, _)| i).unwrap_or(line.len());
        out.push_str(&escape_html(&line[start..end]));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_language_returns_empty() {
        assert_eq!(KeywordHighlighter.highlight("print(1)", "brainfuck"), "");
        assert_eq!(KeywordHighlighter.highlight("print(1)", ""), "");
    }

    #[test]
    fn test_python_builtin_and_number() {
        let html = KeywordHighlighter.highlight("print(1)", "python");
        assert_eq!(
            html,
            "<span class=\"hljs-built_in\">print</span>(<span class=\"hljs-number\">1</span>)"
        );
    }

    #[test]
    fn test_keywords_strings_comments() {
        let html = KeywordHighlighter.highlight("let s = \"<x>\"; // done", "rust");
        assert!(html.contains("<span class=\"hljs-keyword\">let</span>"));
        assert!(html.contains("<span class=\"hljs-string\">&quot;&lt;x&gt;&quot;</span>"));
        assert!(html.contains("<span class=\"hljs-comment\">// done</span>"));
    }

    #[test]
    fn test_full_line_comment_keeps_indent() {
        let html = KeywordHighlighter.highlight("    # note", "python");
        assert_eq!(html, "    <span class=\"hljs-comment\"># note</span>");
    }

    #[test]
    fn test_multiline_preserves_newlines() {
        let html = KeywordHighlighter.highlight("a = 1\nb = 2\n", "py");
        assert_eq!(html.matches('\n').count(), 2);
    }

    #[test]
    fn test_escapes_plain_text() {
        let html = KeywordHighlighter.highlight("x < y && z", "js");
        assert_eq!(html, "x &lt; y &amp;&amp; z");
    }

    #[test]
    fn test_language_tags_are_case_insensitive() {
        assert!(get_language_def("Rust").is_some());
        assert!(get_language_def("YML").is_some());
        assert!(get_language_def("sql").is_none());
    }

    #[test]
    fn test_closure_highlighter() {
        let upper = |source: &str, _lang: &str| source.to_uppercase();
        assert_eq!(upper.highlight("abc", "any"), "ABC");
    }
}
