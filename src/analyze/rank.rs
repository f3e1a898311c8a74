//! Cross-feed ranking: highest score first, ties keep encounter order.

use crate::ingest::types::ScoredArticle;

/// `sort_by` is stable, so equal scores stay in the order feeds produced them.
pub fn rank(mut articles: Vec<ScoredArticle>, limit: usize) -> Vec<ScoredArticle> {
    articles.sort_by(|a, b| b.score.cmp(&a.score));
    articles.truncate(limit);
    articles
}
