//! Keyword relevance scoring.
//!
//! score = Σ weight(k) for every table phrase found in `lower(title + " " + summary)`
//!       + 2 × |matched|            when more than one phrase matched
//!       + 3 per table phrase found in `lower(title)`
//!
//! Title phrases are rewarded twice on purpose: once through the content scan and
//! once through the flat title bonus.

use crate::config::KeywordTable;

pub const MULTI_MATCH_BONUS: u32 = 2;
pub const TITLE_MATCH_BONUS: u32 = 3;

/// Result of scoring one (title, summary) pair.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Score {
    pub score: u32,
    /// Matched phrases in table order (not position in text).
    pub matched_keywords: Vec<String>,
}

/// Pure function of its inputs; substring matching, no tokenization.
pub fn score_article(title: &str, summary: &str, table: &KeywordTable) -> Score {
    let content = format!("{title} {summary}").to_lowercase();

    let mut score = 0u32;
    let mut matched_keywords = Vec::new();
    for kw in table.iter() {
        if content.contains(&kw.phrase) {
            score = score.saturating_add(kw.weight);
            matched_keywords.push(kw.phrase.clone());
        }
    }

    if matched_keywords.len() > 1 {
        let n = u32::try_from(matched_keywords.len()).unwrap_or(u32::MAX);
        score = score.saturating_add(n.saturating_mul(MULTI_MATCH_BONUS));
    }

    let title_lower = title.to_lowercase();
    for kw in table.iter() {
        if title_lower.contains(&kw.phrase) {
            score = score.saturating_add(TITLE_MATCH_BONUS);
        }
    }

    Score {
        score,
        matched_keywords,
    }
}
