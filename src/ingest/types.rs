// src/ingest/types.rs
use serde::{Deserialize, Serialize};

use crate::error::FeedError;

/// One entry as the feed published it, before normalization.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawEntry {
    pub id: Option<String>,
    pub link: Option<String>,
    pub title: Option<String>,
    /// `summary`, falling back to `description`.
    pub summary: Option<String>,
    pub published: Option<String>,
}

/// Everything a single fetch produced. Entries are in feed order (newest first
/// for every feed we poll).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedBatch {
    pub title: Option<String>,
    pub entries: Vec<RawEntry>,
}

#[async_trait::async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch(&self) -> Result<FeedBatch, FeedError>;
    /// Used in logs; the feed URL for HTTP sources.
    fn name(&self) -> &str;
}

/// Normalized article, alive for one curation cycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Article {
    pub id: String,
    pub title: String,
    pub raw_summary: String,
    pub link: String,
    pub published_at: Option<String>,
    pub source_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScoredArticle {
    #[serde(flatten)]
    pub article: Article,
    pub score: u32,
    pub matched_keywords: Vec<String>,
    pub sample_copy: String,
}
