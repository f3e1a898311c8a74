// src/ingest/mod.rs
pub mod dedup;
pub mod normalize;
pub mod providers;
pub mod types;

pub use dedup::DedupCache;
pub use normalize::normalize_text;

use metrics::{counter, gauge};

use crate::analyze::{compose_sample_copy, score_article};
use crate::config::{CuratorConfig, KeywordTable};
use crate::error::EntryError;
use crate::ingest::types::{Article, FeedSource, RawEntry, ScoredArticle};
use crate::telemetry::{ensure_metrics_described, log_id};

const UNKNOWN_SOURCE: &str = "Unknown Source";

/// Per-feed knobs taken from the curator config.
#[derive(Debug, Clone, Copy)]
pub struct IngestParams {
    pub min_score: u32,
    pub max_entries_per_feed: usize,
    pub sample_copy_max_length: usize,
}

impl From<&CuratorConfig> for IngestParams {
    fn from(cfg: &CuratorConfig) -> Self {
        Self {
            min_score: cfg.min_score,
            max_entries_per_feed: cfg.max_entries_per_feed,
            sample_copy_max_length: cfg.sample_copy_max_length,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub seen: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub duplicates: usize,
    pub entry_errors: usize,
    pub feed_failed: bool,
}

#[derive(Debug, Clone, Default)]
pub struct FeedIngest {
    pub articles: Vec<ScoredArticle>,
    pub stats: IngestStats,
}

/// Pull one feed, score its newest `max_entries_per_feed` entries and keep those
/// at or above `min_score`. Accepted ids go into `cache` immediately; rejected ones
/// do not, so they are re-evaluated if they show up again.
///
/// Never fails: a broken feed yields an empty result, a broken entry is skipped.
pub async fn ingest_feed(
    source: &dyn FeedSource,
    table: &KeywordTable,
    cache: &mut DedupCache,
    params: IngestParams,
) -> FeedIngest {
    ensure_metrics_described();
    let mut out = FeedIngest::default();

    tracing::info!(feed = source.name(), "fetching feed");
    let batch = match source.fetch().await {
        Ok(b) => b,
        Err(e) => {
            tracing::error!(feed = source.name(), error = %e, "feed fetch failed");
            counter!("curator_feed_errors_total").increment(1);
            out.stats.feed_failed = true;
            return out;
        }
    };

    if batch.entries.is_empty() {
        tracing::warn!(feed = source.name(), "no entries found in feed");
        return out;
    }

    let source_name = batch
        .title
        .clone()
        .unwrap_or_else(|| UNKNOWN_SOURCE.to_string());

    for entry in batch.entries.into_iter().take(params.max_entries_per_feed) {
        out.stats.seen += 1;
        counter!("curator_entries_seen_total").increment(1);

        let id = match entry_id(&entry) {
            Ok(id) => id,
            Err(e) => {
                entry_failed(source.name(), &e, &mut out.stats);
                continue;
            }
        };

        if cache.contains(&id) {
            out.stats.duplicates += 1;
            counter!("curator_dedup_skipped_total").increment(1);
            continue;
        }

        match evaluate_entry(id, entry, &source_name, table, params) {
            Ok(Some(scored)) => {
                tracing::debug!(
                    feed = source.name(),
                    id = %log_id(&scored.article.id),
                    score = scored.score,
                    matched = ?scored.matched_keywords,
                    "entry accepted"
                );
                cache.insert(scored.article.id.clone());
                out.stats.accepted += 1;
                counter!("curator_entries_accepted_total").increment(1);
                out.articles.push(scored);
            }
            Ok(None) => {
                out.stats.rejected += 1;
                counter!("curator_entries_rejected_total").increment(1);
            }
            Err(e) => entry_failed(source.name(), &e, &mut out.stats),
        }
    }

    gauge!("curator_dedup_cache_size").set(cache.len() as f64);
    tracing::info!(
        feed = source.name(),
        seen = out.stats.seen,
        accepted = out.stats.accepted,
        rejected = out.stats.rejected,
        duplicates = out.stats.duplicates,
        "feed ingested"
    );
    out
}

fn entry_failed(feed: &str, e: &EntryError, stats: &mut IngestStats) {
    tracing::warn!(feed, error = %e, "skipping malformed entry");
    counter!("curator_entry_errors_total").increment(1);
    stats.entry_errors += 1;
}

/// Feed-provided id, falling back to the link.
pub fn entry_id(entry: &RawEntry) -> Result<String, EntryError> {
    entry
        .id
        .as_deref()
        .or(entry.link.as_deref())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or(EntryError::MissingId)
}

/// Normalize + score one entry. `Ok(None)` means below threshold.
fn evaluate_entry(
    id: String,
    entry: RawEntry,
    source_name: &str,
    table: &KeywordTable,
    params: IngestParams,
) -> Result<Option<ScoredArticle>, EntryError> {
    let raw_title = entry
        .title
        .ok_or_else(|| EntryError::MissingTitle(id.clone()))?;
    let link = entry
        .link
        .filter(|l| !l.trim().is_empty())
        .ok_or_else(|| EntryError::MissingLink(id.clone()))?;

    let title = normalize_text(&raw_title);
    let raw_summary = entry.summary.unwrap_or_default();
    let summary = normalize_text(&raw_summary);

    let s = score_article(&title, &summary, table);
    if s.score < params.min_score {
        return Ok(None);
    }

    let sample_copy = compose_sample_copy(&title, &summary, params.sample_copy_max_length);
    Ok(Some(ScoredArticle {
        article: Article {
            id,
            title,
            raw_summary,
            link,
            published_at: entry.published,
            source_name: source_name.to_string(),
        },
        score: s.score,
        matched_keywords: s.matched_keywords,
        sample_copy,
    }))
}
