//! HTML escaping and attribute encoding helpers.

/// Escape text for use in HTML element content or a double-quoted attribute.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 8);
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// Percent-encode raw source so it can travel in a `data-*` attribute.
pub fn percent_encode(source: &str) -> String {
    urlencoding::encode(source).into_owned()
}

/// Inverse of [`percent_encode`]; `None` when the input is not valid UTF-8
/// after decoding.
pub fn percent_decode(encoded: &str) -> Option<String> {
    urlencoding::decode(encoded).ok().map(|s| s.into_owned())
}

/// Reject link targets that would execute script when followed.
///
/// `data:` is only allowed for raster images.
pub fn is_safe_url(url: &str) -> bool {
    let normalized: String = url
        .trim()
        .chars()
        .filter(|c| !c.is_ascii_whitespace() && !c.is_ascii_control())
        .collect::<String>()
        .to_ascii_lowercase();

    if normalized.starts_with("javascript:")
        || normalized.starts_with("vbscript:")
        || normalized.starts_with("file:")
    {
        return false;
    }
    if let Some(rest) = normalized.strip_prefix("data:") {
        return ["image/gif", "image/png", "image/jpeg", "image/webp"]
            .iter()
            .any(|mime| rest.starts_with(mime));
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<a href="x">&</a>"#),
            "&lt;a href=&quot;x&quot;&gt;&amp;&lt;/a&gt;"
        );
        assert_eq!(escape_html("plain"), "plain");
    }

    #[test]
    fn test_percent_encode_round_trip() {
        let source = "graph TD\n  A-->B; \"quoted\" & 100%";
        let encoded = percent_encode(source);
        assert!(!encoded.contains('\n'));
        assert!(!encoded.contains('"'));
        assert!(!encoded.contains(' '));
        assert_eq!(percent_decode(&encoded).as_deref(), Some(source));
    }

    #[test]
    fn test_is_safe_url() {
        assert!(is_safe_url("https://example.com"));
        assert!(is_safe_url("#section"));
        assert!(is_safe_url("data:image/png;base64,AAAA"));
        assert!(!is_safe_url("javascript:alert(1)"));
        assert!(!is_safe_url("  JavaScript:alert(1)"));
        assert!(!is_safe_url("java\tscript:alert(1)"));
        assert!(!is_safe_url("data:text/html,<script>"));
    }
}
