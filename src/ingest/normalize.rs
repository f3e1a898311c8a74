// src/ingest/normalize.rs
use once_cell::sync::OnceCell;
use regex::Regex;

/// Clean raw feed text for scoring and sheet output: strip tags, collapse
/// whitespace, swap `"` for `'` so the value stays CSV-safe, trim.
pub fn normalize_text(s: &str) -> String {
    if s.is_empty() {
        return String::new();
    }

    // 1) Strip HTML/XML tags
    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"<[^>]+>").unwrap());
    let out = re_tags.replace_all(s, "");

    // 2) Collapse whitespace (covers \n and \r as well)
    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").unwrap());
    let out = re_ws.replace_all(&out, " ");

    // 3) Quotes
    let out = out.replace('"', "'").replace(['\n', '\r'], " ");

    out.trim().to_string()
}
