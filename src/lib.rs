// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod analyze;
pub mod config;
pub mod curator;
pub mod error;
pub mod ingest;
pub mod maintenance;
pub mod metrics;
pub mod scheduler;
pub mod sink;
pub mod telemetry;

// ---- Re-exports for stable public API ----
pub use crate::config::{CuratorConfig, KeywordTable, SheetCredentials};
pub use crate::curator::{CycleReport, Curator};
pub use crate::error::{ConfigError, EntryError, FeedError, SinkError};
pub use crate::ingest::types::{Article, FeedSource, RawEntry, ScoredArticle};
pub use crate::ingest::DedupCache;
pub use crate::sink::{RowSink, SheetRow};

use anyhow::Context;

/// Shared startup for both binaries: config, credentials, Sheets sink.
/// Callers load `.env` first. Any failure here is a configuration error.
pub fn build_curator_from_env() -> anyhow::Result<Curator> {
    let cfg = CuratorConfig::load().context("loading curator config")?;
    let creds = SheetCredentials::from_env().context("reading Google Sheets credentials")?;
    let sink = sink::SheetsSink::new(creds).context("building Google Sheets client")?;

    tracing::info!(
        feeds = cfg.feeds.len(),
        keywords = cfg.keywords.len(),
        min_score = cfg.min_score,
        max_per_run = cfg.max_articles_per_run,
        "curator configured"
    );
    Curator::from_config(cfg, Box::new(sink)).context("building feed http client")
}
