//! Post-processing: deterministic text rules applied to service Markdown.
//!
//! ## Why is post-processing necessary?
//!
//! Docling does not always honour its own directives. With
//! `image_export_mode=placeholder` some pipelines still inline a picture as a
//! base64 data URI, which bloats a "text only" file by megabytes. Empty
//! slides in a batch come back as an empty member or a bare `{}` token that
//! would read as noise in a RAG index.
//!
//! Both fixes are pure `&str → String` rules so they are testable in
//! isolation and never touch the network.

use once_cell::sync::Lazy;
use regex::Regex;

// ── Rule 1: Scrub inline base64 images (strip mode) ──────────────────────────

static RE_INLINE_DATA_IMAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"!\[[^\]]*\]\(data:image/[^;)]+;base64,[A-Za-z0-9+/=\s]+\)").unwrap()
});

/// Remove every `![alt](data:image/...;base64,...)` reference.
pub fn strip_inline_images(input: &str) -> String {
    RE_INLINE_DATA_IMAGE.replace_all(input, "").into_owned()
}

// ── Rule 2: No-text slide placeholder ────────────────────────────────────────

/// Bodies that count as "nothing extracted" for a zip member.
const EMPTY_MEMBER_TOKENS: &[&str] = &["{", "}", "{}", "{ }"];

/// Whether a (trimmed) zip member body carries no usable text.
///
/// An empty-object token is treated exactly like an empty body.
pub fn is_empty_member(text: &str) -> bool {
    let t = text.trim();
    t.is_empty() || EMPTY_MEMBER_TOKENS.contains(&t)
}

/// Placeholder Markdown for a slide member with no extractable text.
pub fn no_text_placeholder(member_name: &str) -> String {
    format!("*[Slide {member_name}: image with no extractable text]*")
}

/// Matches [`no_text_placeholder`] output; group 1 is the member name.
pub static RE_NO_TEXT_PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\*\[Slide ([^:\]]+): image with no extractable text\]\*").unwrap()
});

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_png_and_jpeg_data_uris() {
        let input = "# Title\n\n![Figure 1](data:image/png;base64,iVBORw0KGgo=)\ntext\n![](data:image/jpeg;base64,/9j/4AAQ)";
        let out = strip_inline_images(input);
        assert_eq!(out, "# Title\n\n\ntext\n");
    }

    #[test]
    fn keeps_remote_and_placeholder_images() {
        let input = "![chart](https://example.org/c.png)\n<!-- image -->";
        assert_eq!(strip_inline_images(input), input);
    }

    #[test]
    fn empty_member_detection() {
        assert!(is_empty_member(""));
        assert!(is_empty_member("  \n "));
        assert!(is_empty_member("{}"));
        assert!(is_empty_member(" { } "));
        assert!(is_empty_member("{"));
        assert!(!is_empty_member("{\"a\": 1}"));
        assert!(!is_empty_member("Quarterly results"));
    }

    #[test]
    fn placeholder_round_trips_through_regex() {
        let p = no_text_placeholder("slide_07.md");
        let caps = RE_NO_TEXT_PLACEHOLDER.captures(&p).expect("matches");
        assert_eq!(&caps[1], "slide_07.md");
    }
}
