//! Rich-text cleaning for plan descriptions and update content
//!
//! Editors paste HTML from word processors and press releases. Only a small
//! set of formatting tags survives, bare URLs become links, and every link is
//! marked `rel="noopener"`.

use ammonia::Builder;
use linkify::{LinkFinder, LinkKind};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};

const ALLOWED_TAGS: [&str; 13] = [
    "a",
    "strong",
    "b",
    "i",
    "em",
    "ul",
    "ol",
    "li",
    "p",
    "h3",
    "h4",
    "h5",
    "blockquote",
];

static CLEANER: Lazy<Builder<'static>> = Lazy::new(|| {
    let mut builder = Builder::default();
    builder
        .tags(ALLOWED_TAGS.iter().copied().collect::<HashSet<_>>())
        .tag_attributes(HashMap::from([(
            "a",
            HashSet::from(["href", "title"]),
        )]))
        .generic_attributes(HashSet::new())
        .link_rel(Some("noopener"));
    builder
});

// attribute values may hold a `>`
static TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<[^>"]*(?:"[^"]*"[^>"]*)*>"#).expect("valid regex"));

static FINDER: Lazy<LinkFinder> = Lazy::new(|| {
    let mut finder = LinkFinder::new();
    finder.kinds(&[LinkKind::Url]).url_must_have_scheme(false);
    finder
});

/// Typographic quotes that close a quoted URL in German and French text
const CLOSING_QUOTES: [char; 8] = [
    '\u{201C}', '\u{201D}', '\u{2018}', '\u{2019}', '\u{201E}', '\u{00AB}', '\u{00BB}', '\u{203A}',
];

/// Clean user supplied HTML. Empty input stays empty.
pub fn clean_rich_text(input: &str) -> String {
    if input.trim().is_empty() {
        return String::new();
    }
    let cleaned = CLEANER.clean(input).to_string();
    // second pass puts rel="noopener" on the links linkify added
    CLEANER.clean(&linkify(&cleaned)).to_string()
}

/// Wrap bare URLs in text nodes with anchors, leaving existing links alone
fn linkify(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut anchor_depth = 0usize;
    let mut last = 0;

    for tag in TAG_RE.find_iter(html) {
        push_text(&mut out, &html[last..tag.start()], anchor_depth > 0);
        let raw = tag.as_str();
        let lower = raw.to_ascii_lowercase();
        if lower == "<a>" || lower.starts_with("<a ") {
            anchor_depth += 1;
        } else if lower.starts_with("</a") {
            anchor_depth = anchor_depth.saturating_sub(1);
        }
        out.push_str(raw);
        last = tag.end();
    }
    push_text(&mut out, &html[last..], anchor_depth > 0);
    out
}

/// Link URLs in one serialized text node. The node is unescaped first so
/// entities such as `&gt;` never end up inside a link.
fn push_text(out: &mut String, escaped: &str, inside_anchor: bool) {
    if inside_anchor || escaped.is_empty() {
        out.push_str(escaped);
        return;
    }
    let text = unescape(escaped);
    let mut last = 0;
    for link in FINDER.links(&text) {
        let url = link.as_str().trim_end_matches(CLOSING_QUOTES);
        if url.is_empty() {
            continue;
        }
        let href = if url.contains("://") {
            url.to_string()
        } else {
            format!("http://{}", url)
        };
        escape_into(out, &text[last..link.start()]);
        out.push_str(r#"<a href=""#);
        escape_into(out, &href);
        out.push_str(r#"">"#);
        escape_into(out, url);
        out.push_str("</a>");
        last = link.start() + url.len();
    }
    escape_into(out, &text[last..]);
}

fn unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", "\u{00A0}")
        .replace("&amp;", "&")
}

fn escape_into(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disallowed_tags_are_stripped() {
        let cleaned =
            clean_rich_text("<p>Hallo <script>alert(1)</script><div>Welt</div><img src=x></p>");
        assert!(cleaned.starts_with("<p>Hallo "));
        assert!(cleaned.contains("Welt"));
        assert!(!cleaned.contains("script"));
        assert!(!cleaned.contains("alert"));
        assert!(!cleaned.contains("<div"));
        assert!(!cleaned.contains("<img"));
    }

    #[test]
    fn test_links_get_noopener_and_lose_handlers() {
        let cleaned = clean_rich_text(
            r#"<a href="https://example.org" onclick="steal()" target="_blank">Quelle</a>"#,
        );
        assert!(cleaned.contains(r#"href="https://example.org""#));
        assert!(cleaned.contains(r#"rel="noopener""#));
        assert!(!cleaned.contains("onclick"));
        assert!(!cleaned.contains("target"));
    }

    #[test]
    fn test_bare_urls_are_linkified() {
        let cleaned = clean_rich_text("<p>Siehe https://www.bundestag.de/drucksache.</p>");
        assert!(cleaned.contains(r#"href="https://www.bundestag.de/drucksache""#));
        assert!(cleaned.contains(r#"rel="noopener""#));
        assert!(cleaned.contains(">https://www.bundestag.de/drucksache</a>.</p>"));
    }

    #[test]
    fn test_www_links_get_scheme() {
        let cleaned = clean_rich_text("mehr unter www.bmas.de");
        assert!(cleaned.contains(r#"href="http://www.bmas.de""#));
    }

    #[test]
    fn test_existing_links_are_not_nested() {
        let cleaned = clean_rich_text(r#"<a href="https://a.org">https://a.org</a>"#);
        assert_eq!(cleaned.matches("<a ").count(), 1);
    }

    #[test]
    fn test_allowed_formatting_survives() {
        let input = "<h3>Stand</h3><ul><li><strong>fertig</strong></li></ul>";
        assert_eq!(clean_rich_text(input), input);
    }

    #[test]
    fn test_german_quotes_stay_outside_links() {
        let cleaned =
            clean_rich_text("<p>laut \u{201E}https://www.bundestag.de\u{201C} beschlossen</p>");
        assert_eq!(
            cleaned,
            "<p>laut \u{201E}<a href=\"https://www.bundestag.de\" rel=\"noopener\">https://www.bundestag.de</a>\u{201C} beschlossen</p>"
        );
    }

    #[test]
    fn test_escaped_angle_brackets_stay_outside_links() {
        let cleaned = clean_rich_text("<p>Quelle: &lt;https://example.org&gt;</p>");
        assert_eq!(
            cleaned,
            "<p>Quelle: &lt;<a href=\"https://example.org\" rel=\"noopener\">https://example.org</a>&gt;</p>"
        );
    }

    #[test]
    fn test_ampersands_in_urls_survive() {
        let cleaned = clean_rich_text("<p>https://example.org/?a=1&amp;b=2 und mehr</p>");
        assert!(cleaned.contains(r#"href="https://example.org/?a=1&amp;b=2""#));
        assert!(cleaned.contains(">https://example.org/?a=1&amp;b=2</a> und mehr"));
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(clean_rich_text(""), "");
        assert_eq!(clean_rich_text("   "), "");
    }
}
