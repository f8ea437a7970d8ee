//! DOM compression for vision prompts.
//!
//! Raw career-site HTML runs to hundreds of kilobytes; a vision model only
//! needs the interactive skeleton. `compress` strips noise and renders each
//! actionable element as one line, preserving document order:
//!
//! ```text
//! <H1>Apply for Platform Engineer</H1>
//! <INPUT name="email" type="text" placeholder="Email"></INPUT>
//! <BUTTON type="submit">Submit application</BUTTON>
//! ```
//!
//! `visible_text` is the companion for job postings: markup out, prose in.

use regex::Regex;

/// Tags worth keeping in the digest. `input` is handled separately because it
/// never carries a closing tag.
const KEPT_TAGS: [&str; 8] = ["a", "button", "select", "textarea", "label", "h1", "h2", "h3"];

/// Attributes carried into the digest, in render order.
const KEPT_ATTRS: [&str; 6] = ["id", "name", "type", "placeholder", "aria-label", "value"];

/// Paired tags whose entire content is dropped before extraction.
const NOISE_BLOCKS: [&str; 6] = ["script", "style", "noscript", "svg", "header", "footer"];

// ─────────────────────────────────────────────────────────────────────────────
// Public API
// ─────────────────────────────────────────────────────────────────────────────

/// Compresses raw HTML into a newline-joined digest of interactive elements.
pub fn compress(html: &str) -> String {
    let cleaned = strip_noise(html);

    // (byte offset, rendered line) so lines from separate per-tag passes can
    // be re-sorted into document order.
    let mut lines: Vec<(usize, String)> = Vec::new();

    for tag in KEPT_TAGS {
        let pattern = format!(r"(?is)<{tag}\b([^>]*)>(.*?)</{tag}\s*>");
        let re = Regex::new(&pattern).expect("hardcoded regex");
        for caps in re.captures_iter(&cleaned) {
            let Some(full) = caps.get(0) else { continue };
            let attrs = caps.get(1).map_or("", |m| m.as_str());
            let inner = caps.get(2).map_or("", |m| m.as_str());

            if is_hidden(attrs) {
                continue;
            }
            let text = flatten_text(inner);
            let rendered_attrs = render_attrs(attrs);
            if text.is_empty() && rendered_attrs.is_empty() {
                continue;
            }
            lines.push((full.start(), format_line(tag, &rendered_attrs, &text)));
        }
    }

    let input_re = Regex::new(r"(?i)<input\b([^>]*?)/?>").expect("hardcoded regex");
    for caps in input_re.captures_iter(&cleaned) {
        let Some(full) = caps.get(0) else { continue };
        let attrs = caps.get(1).map_or("", |m| m.as_str());

        if is_hidden(attrs) {
            continue;
        }
        // Inputs have no inner text; the value attribute stands in.
        let text = attr_value(attrs, "value").unwrap_or_default();
        let rendered_attrs = render_attrs(attrs);
        if text.is_empty() && rendered_attrs.is_empty() {
            continue;
        }
        lines.push((full.start(), format_line("input", &rendered_attrs, &text)));
    }

    lines.sort_by_key(|(start, _)| *start);
    lines
        .into_iter()
        .map(|(_, line)| line)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Extracts human-readable prose from raw HTML. Used on job postings, where
/// the body text matters and the widgets do not.
pub fn visible_text(html: &str) -> String {
    let cleaned = strip_noise(html);
    let tag_re = Regex::new(r"<[^>]+>").expect("hardcoded regex");
    let without_tags = tag_re.replace_all(&cleaned, " ");
    collapse_whitespace(&decode_entities(&without_tags))
}

// ─────────────────────────────────────────────────────────────────────────────
// Noise removal
// ─────────────────────────────────────────────────────────────────────────────

fn strip_noise(html: &str) -> String {
    let comment_re = Regex::new(r"(?s)<!--.*?-->").expect("hardcoded regex");
    let mut cleaned = comment_re.replace_all(html, "").into_owned();

    for tag in NOISE_BLOCKS {
        let pattern = format!(r"(?is)<{tag}\b.*?</{tag}\s*>");
        let re = Regex::new(&pattern).expect("hardcoded regex");
        cleaned = re.replace_all(&cleaned, "").into_owned();
    }

    let void_re = Regex::new(r"(?i)</?(meta|path)\b[^>]*>").expect("hardcoded regex");
    void_re.replace_all(&cleaned, "").into_owned()
}

fn is_hidden(attrs: &str) -> bool {
    if attr_value(attrs, "type").is_some_and(|t| t.eq_ignore_ascii_case("hidden")) {
        return true;
    }
    if let Some(style) = attr_value(attrs, "style") {
        let style = style.to_lowercase().replace(' ', "");
        if style.contains("display:none") || style.contains("visibility:hidden") {
            return true;
        }
    }
    false
}

// ─────────────────────────────────────────────────────────────────────────────
// Attribute and text helpers
// ─────────────────────────────────────────────────────────────────────────────

fn attr_value(attrs: &str, name: &str) -> Option<String> {
    // The (?:^|\s) prefix keeps e.g. data-type from matching type.
    let pattern = format!(r#"(?i)(?:^|\s){name}\s*=\s*("([^"]*)"|'([^']*)'|([^\s>'"]+))"#);
    let re = Regex::new(&pattern).expect("hardcoded regex");
    let caps = re.captures(attrs)?;
    let raw = caps
        .get(2)
        .or_else(|| caps.get(3))
        .or_else(|| caps.get(4))
        .map_or("", |m| m.as_str());
    let value = decode_entities(raw).trim().to_string();
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

fn render_attrs(attrs: &str) -> String {
    KEPT_ATTRS
        .iter()
        .filter_map(|name| attr_value(attrs, name).map(|value| format!(r#"{name}="{value}""#)))
        .collect::<Vec<_>>()
        .join(" ")
}

fn format_line(tag: &str, rendered_attrs: &str, text: &str) -> String {
    let tag = tag.to_uppercase();
    if rendered_attrs.is_empty() {
        format!("<{tag}>{text}</{tag}>")
    } else {
        format!("<{tag} {rendered_attrs}>{text}</{tag}>")
    }
}

fn flatten_text(inner: &str) -> String {
    let tag_re = Regex::new(r"<[^>]+>").expect("hardcoded regex");
    let without_tags = tag_re.replace_all(inner, " ");
    collapse_whitespace(&decode_entities(&without_tags))
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compress_keeps_interactive_elements() {
        let html = r#"
            <html><body>
            <h1>Apply for Platform Engineer</h1>
            <form>
                <input type="text" name="email" placeholder="Email">
                <button type="submit">Submit application</button>
            </form>
            </body></html>
        "#;
        let digest = compress(html);
        assert!(digest.contains("<H1>Apply for Platform Engineer</H1>"));
        assert!(digest.contains(r#"<INPUT name="email" type="text" placeholder="Email"></INPUT>"#));
        assert!(digest.contains(r#"<BUTTON type="submit">Submit application</BUTTON>"#));
    }

    #[test]
    fn test_compress_skips_hidden_elements() {
        let html = r#"
            <input type="hidden" name="csrf" value="tok123">
            <button style="display: none">Ghost</button>
            <button type="submit">Real</button>
        "#;
        let digest = compress(html);
        assert!(!digest.contains("csrf"));
        assert!(!digest.contains("Ghost"));
        assert!(digest.contains("Real"));
    }

    #[test]
    fn test_compress_preserves_document_order() {
        let html = r#"
            <label for="em">Email</label>
            <input type="email" name="em">
            <button type="submit">Go</button>
        "#;
        let digest = compress(html);
        let lines: Vec<&str> = digest.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("<LABEL"));
        assert!(lines[1].starts_with("<INPUT"));
        assert!(lines[2].starts_with("<BUTTON"));
    }

    #[test]
    fn test_compress_drops_noise_blocks() {
        let html = r#"
            <script>var tracking = "noise";</script>
            <svg><path d="M0 0"/></svg>
            <!-- build marker -->
            <a href="/jobs" id="all-jobs">All jobs</a>
        "#;
        let digest = compress(html);
        assert_eq!(digest, r#"<A id="all-jobs">All jobs</A>"#);
    }

    #[test]
    fn test_compress_uses_input_value_as_text() {
        let html = r#"<input type="submit" value="Send">"#;
        assert_eq!(compress(html), r#"<INPUT type="submit" value="Send">Send</INPUT>"#);
    }

    #[test]
    fn test_compress_flattens_nested_markup() {
        let html = "<button><span>Apply</span> <b>now</b></button>";
        assert_eq!(compress(html), "<BUTTON>Apply now</BUTTON>");
    }

    #[test]
    fn test_attr_value_ignores_prefixed_names() {
        assert_eq!(
            attr_value(r#" data-type="x" type="email""#, "type").as_deref(),
            Some("email")
        );
        assert_eq!(attr_value(r#" data-type="x""#, "type"), None);
    }

    #[test]
    fn test_attr_value_handles_quote_styles() {
        assert_eq!(attr_value(r#" id="a""#, "id").as_deref(), Some("a"));
        assert_eq!(attr_value(" id='b'", "id").as_deref(), Some("b"));
        assert_eq!(attr_value(" id=c", "id").as_deref(), Some("c"));
    }

    #[test]
    fn test_visible_text_drops_scripts_and_decodes_entities() {
        let html = "<p>Senior Rust&nbsp;Engineer &amp; Tech Lead</p><script>nope()</script>";
        assert_eq!(visible_text(html), "Senior Rust Engineer & Tech Lead");
    }
}
