// src/curator.rs
//! One curation cycle: ingest every feed → rank → append rows to the sink.
//!
//! The curator owns the dedup cache. `run_cycle` and `cleanup_cache` are the two
//! entry points the scheduler calls; nothing else mutates the cache between them.

use std::time::{Duration, Instant};

use chrono::{NaiveDate, Utc};
use metrics::{counter, gauge};

use crate::analyze::rank;
use crate::config::CuratorConfig;
use crate::error::{FeedError, SinkError};
use crate::ingest::providers::rss::{http_client, RssFeedSource};
use crate::ingest::types::{FeedSource, ScoredArticle};
use crate::ingest::{ingest_feed, DedupCache, FeedIngest, IngestParams};
use crate::sink::{RowSink, SheetRow};
use crate::telemetry::ensure_metrics_described;

const LOG_TITLE_CHARS: usize = 60;

/// Summary of one cycle, returned to the caller and logged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub feeds_polled: usize,
    pub feeds_failed: usize,
    pub candidates: usize,
    pub selected: usize,
    pub appended: usize,
    pub failed_rows: usize,
}

/// Output of the ingest + rank half of a cycle.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    pub articles: Vec<ScoredArticle>,
    pub feeds_polled: usize,
    pub feeds_failed: usize,
    pub candidates: usize,
}

pub struct Curator {
    cfg: CuratorConfig,
    feeds: Vec<Box<dyn FeedSource>>,
    sink: Box<dyn RowSink>,
    cache: DedupCache,
}

impl Curator {
    pub fn new(cfg: CuratorConfig, feeds: Vec<Box<dyn FeedSource>>, sink: Box<dyn RowSink>) -> Self {
        Self {
            cfg,
            feeds,
            sink,
            cache: DedupCache::new(),
        }
    }

    /// HTTP feed sources for every configured URL, sharing one client.
    pub fn from_config(cfg: CuratorConfig, sink: Box<dyn RowSink>) -> Result<Self, FeedError> {
        let client = http_client()?;
        let feeds = cfg
            .feeds
            .iter()
            .map(|url| {
                Box::new(RssFeedSource::with_client(url.clone(), client.clone()))
                    as Box<dyn FeedSource>
            })
            .collect();
        Ok(Self::new(cfg, feeds, sink))
    }

    pub fn config(&self) -> &CuratorConfig {
        &self.cfg
    }

    pub fn cache(&self) -> &DedupCache {
        &self.cache
    }

    pub fn sink(&self) -> &dyn RowSink {
        self.sink.as_ref()
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
        gauge!("curator_dedup_cache_size").set(0.0);
        tracing::info!("processed articles cache cleared");
    }

    /// Scheduled cleanup: keep the newest `dedup_retain` ids once the cache
    /// grows past `dedup_max_size`.
    pub fn cleanup_cache(&mut self) -> usize {
        let evicted = self
            .cache
            .cleanup(self.cfg.dedup_max_size, self.cfg.dedup_retain);
        gauge!("curator_dedup_cache_size").set(self.cache.len() as f64);
        if evicted > 0 {
            tracing::info!(evicted, remaining = self.cache.len(), "cleaned up processed articles cache");
        }
        evicted
    }

    /// Ingest each feed in configured order and rank the union.
    pub async fn collect(&mut self) -> Selection {
        ensure_metrics_described();
        let params = IngestParams::from(&self.cfg);
        let mut sel = Selection::default();
        let mut all = Vec::new();

        for (i, feed) in self.feeds.iter().enumerate() {
            if i > 0 {
                pause(self.cfg.feed_fetch_delay).await;
            }
            let FeedIngest { articles, stats } =
                ingest_feed(feed.as_ref(), &self.cfg.keywords, &mut self.cache, params).await;
            sel.feeds_polled += 1;
            if stats.feed_failed {
                sel.feeds_failed += 1;
            }
            all.extend(articles);
        }

        sel.candidates = all.len();
        sel.articles = rank(all, self.cfg.max_articles_per_run);
        sel
    }

    /// Score one feed against a scratch cache; the sink and the real cache stay untouched.
    pub async fn preview_feed(&self, feed: &dyn FeedSource) -> FeedIngest {
        let mut scratch = DedupCache::new();
        ingest_feed(feed, &self.cfg.keywords, &mut scratch, IngestParams::from(&self.cfg)).await
    }

    /// Append rows one by one. A failed row is logged and skipped.
    /// Returns (appended, failed).
    pub async fn append_articles(&self, articles: &[ScoredArticle], date: NaiveDate) -> (usize, usize) {
        if articles.is_empty() {
            tracing::info!("no articles to add");
            return (0, 0);
        }

        let mut appended = 0usize;
        let mut failed = 0usize;
        for (i, art) in articles.iter().enumerate() {
            if i > 0 {
                pause(self.cfg.sheet_update_delay).await;
            }
            let row = SheetRow::from_article(art, date);
            match self.sink.append_row(&row).await {
                Ok(()) => {
                    appended += 1;
                    counter!("curator_rows_appended_total").increment(1);
                    tracing::info!(
                        title = %clip(&art.article.title, LOG_TITLE_CHARS),
                        score = art.score,
                        keywords = %art.matched_keywords.iter().take(3).cloned().collect::<Vec<_>>().join(", "),
                        "added article"
                    );
                }
                Err(e) => {
                    failed += 1;
                    counter!("curator_row_errors_total").increment(1);
                    tracing::error!(link = %art.article.link, error = %e, "failed to add article");
                }
            }
        }
        tracing::info!(appended, failed, "sheet update finished");
        (appended, failed)
    }

    /// Full cycle dated with today's date in the configured offset.
    pub async fn run_cycle(&mut self) -> Result<CycleReport, SinkError> {
        let today = Utc::now()
            .with_timezone(&self.cfg.schedule.utc_offset)
            .date_naive();
        self.run_cycle_on(today).await
    }

    /// Full cycle. Only an unreachable sink aborts it; feed and row failures are
    /// absorbed and counted in the report.
    pub async fn run_cycle_on(&mut self, date: NaiveDate) -> Result<CycleReport, SinkError> {
        ensure_metrics_described();
        counter!("curator_cycles_total").increment(1);
        let t0 = Instant::now();
        tracing::info!(feeds = self.feeds.len(), "starting news curation run");

        // Checked before ingesting so an outage doesn't burn ids into the cache.
        match self.sink.check_connection().await {
            Ok(header) => tracing::info!(?header, "sheet connected"),
            Err(e) => {
                tracing::error!(error = %e, "sheet unreachable, skipping this cycle");
                return Err(e);
            }
        }

        let sel = self.collect().await;
        let mut report = CycleReport {
            feeds_polled: sel.feeds_polled,
            feeds_failed: sel.feeds_failed,
            candidates: sel.candidates,
            selected: sel.articles.len(),
            ..Default::default()
        };

        if sel.articles.is_empty() {
            tracing::info!("no articles met relevance threshold");
        } else {
            tracing::info!(count = sel.articles.len(), "found high-quality articles");
            for (i, a) in sel.articles.iter().take(3).enumerate() {
                tracing::info!(
                    rank = i + 1,
                    title = %clip(&a.article.title, 50),
                    score = a.score,
                    "top article"
                );
            }
            let (appended, failed) = self.append_articles(&sel.articles, date).await;
            report.appended = appended;
            report.failed_rows = failed;
        }

        gauge!("curator_last_cycle_ts").set(Utc::now().timestamp() as f64);
        tracing::info!(
            duration_s = t0.elapsed().as_secs_f64(),
            feeds_failed = report.feeds_failed,
            candidates = report.candidates,
            appended = report.appended,
            "curation cycle completed"
        );
        Ok(report)
    }
}

async fn pause(d: Duration) {
    if !d.is_zero() {
        tokio::time::sleep(d).await;
    }
}

/// First `max` chars plus "..." when longer.
pub fn clip(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max).collect();
    out.push_str("...");
    out
}
