//! Sample copy: the short excerpt written to the sheet.

use crate::ingest::normalize_text;

/// Summaries shorter than this get the title prepended.
pub const SHORT_SUMMARY_CHARS: usize = 50;
pub const ELLIPSIS: &str = "...";

/// Build a bounded excerpt. Lengths are counted in chars, so the result never
/// splits a UTF-8 sequence and `chars().count() <= max_len` always holds.
pub fn compose_sample_copy(title: &str, summary: &str, max_len: usize) -> String {
    let clean_summary = normalize_text(summary);

    let combined = if clean_summary.chars().count() < SHORT_SUMMARY_CHARS {
        format!("{title}. {clean_summary}")
    } else {
        clean_summary
    };

    if combined.chars().count() <= max_len {
        return combined;
    }

    let keep = max_len.saturating_sub(ELLIPSIS.len());
    let mut out: String = combined.chars().take(keep).collect();
    out.push_str(ELLIPSIS);
    // max_len < 3 can't even fit the ellipsis
    if out.chars().count() > max_len {
        out = out.chars().take(max_len).collect();
    }
    out
}
