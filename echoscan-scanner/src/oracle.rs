// Reflection detection against rendered output

/// Where a payload was seen, in the order the surfaces are checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reflection {
    RawHtml,
    RawText,
    EscapedHtml,
    EscapedText,
}

impl Reflection {
    pub fn reason(&self) -> &'static str {
        match self {
            Reflection::RawHtml => "payload found in rendered DOM HTML",
            Reflection::RawText => "payload found in visible text",
            Reflection::EscapedHtml => "HTML-escaped payload found in rendered DOM HTML",
            Reflection::EscapedText => "HTML-escaped payload found in visible text",
        }
    }

    pub fn is_escaped(&self) -> bool {
        matches!(self, Reflection::EscapedHtml | Reflection::EscapedText)
    }
}

/// Unescaped hits win over escaped ones, HTML over visible text.
pub fn is_reflected(rendered_html: &str, visible_text: &str, payload: &str) -> Option<Reflection> {
    if payload.is_empty() {
        return None;
    }
    if rendered_html.contains(payload) {
        return Some(Reflection::RawHtml);
    }
    if visible_text.contains(payload) {
        return Some(Reflection::RawText);
    }

    let escaped = html_escape(payload);
    if rendered_html.contains(&escaped) {
        return Some(Reflection::EscapedHtml);
    }
    if visible_text.contains(&escaped) {
        return Some(Reflection::EscapedText);
    }
    None
}

/// `&` goes first so the entities added for the others are not re-escaped.
pub fn html_escape(payload: &str) -> String {
    payload
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAYLOAD: &str = "XSS_TEST_1337<svg onload=alert(1337)>";

    #[test]
    fn test_html_escape() {
        assert_eq!(
            html_escape(r#"<a href="x">'&'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;&#x27;&amp;&#x27;&lt;/a&gt;"
        );
    }

    #[test]
    fn test_raw_html_wins() {
        let html = format!("<p>{}</p><p>{}</p>", PAYLOAD, html_escape(PAYLOAD));
        assert_eq!(is_reflected(&html, PAYLOAD, PAYLOAD), Some(Reflection::RawHtml));
    }

    #[test]
    fn test_raw_text() {
        assert_eq!(
            is_reflected("<p></p>", PAYLOAD, PAYLOAD),
            Some(Reflection::RawText)
        );
    }

    #[test]
    fn test_escaped_html() {
        let html = format!("<p>{}</p>", html_escape(PAYLOAD));
        let hit = is_reflected(&html, "", PAYLOAD).unwrap();
        assert_eq!(hit, Reflection::EscapedHtml);
        assert!(hit.is_escaped());
        assert_eq!(hit.reason(), "HTML-escaped payload found in rendered DOM HTML");
    }

    #[test]
    fn test_escaped_text() {
        let text = html_escape(PAYLOAD);
        assert_eq!(
            is_reflected("<p>nothing</p>", &text, PAYLOAD),
            Some(Reflection::EscapedText)
        );
    }

    #[test]
    fn test_no_reflection() {
        assert_eq!(is_reflected("<p>clean</p>", "clean", PAYLOAD), None);
        assert_eq!(is_reflected("anything", "anything", ""), None);
    }

    #[test]
    fn test_is_pure() {
        let html = format!("<div>{}</div>", PAYLOAD);
        let first = is_reflected(&html, "", PAYLOAD);
        let second = is_reflected(&html, "", PAYLOAD);
        assert!(first.is_some());
        assert_eq!(first, second);
    }
}
