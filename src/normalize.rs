// src/normalize.rs
//! Free-text cleanup for feed fields: entity decoding, tag stripping,
//! whitespace collapsing. `clean` is idempotent.

use once_cell::sync::OnceCell;
use regex::Regex;

/// Normalize a markup-laden feed field to plain text.
///
/// Tags are replaced by a space rather than removed, so malformed
/// fragments degrade to extra whitespace and get collapsed afterwards.
pub fn clean(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, " ").to_string();

    // 3) Collapse whitespace
    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").to_string();

    out.trim().to_string()
}

/// Cap a string at `max` characters (not bytes).
pub fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}
