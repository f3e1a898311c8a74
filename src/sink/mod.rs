// src/sink/mod.rs
//! Append-only row sink that receives curated articles.

pub mod auth;
pub mod memory;
pub mod sheets;

pub use memory::MemorySink;
pub use sheets::SheetsSink;

use chrono::NaiveDate;
use serde::Serialize;

use crate::error::SinkError;
use crate::ingest::types::ScoredArticle;

/// Columns after the sample copy, left blank for manual annotation.
pub const ANNOTATION_COLUMNS: usize = 3;

/// `[date_added, link, sample_copy, "", "", ""]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SheetRow {
    pub date_added: String,
    pub link: String,
    pub sample_copy: String,
}

impl SheetRow {
    pub fn from_article(article: &ScoredArticle, date: NaiveDate) -> Self {
        Self {
            date_added: date.format("%Y-%m-%d").to_string(),
            link: article.article.link.clone(),
            sample_copy: article.sample_copy.clone(),
        }
    }

    pub fn to_values(&self) -> Vec<String> {
        let mut v = vec![
            self.date_added.clone(),
            self.link.clone(),
            self.sample_copy.clone(),
        ];
        v.extend(std::iter::repeat(String::new()).take(ANNOTATION_COLUMNS));
        v
    }
}

#[async_trait::async_trait]
pub trait RowSink: Send + Sync {
    /// Verify the sink is reachable; returns the header row.
    async fn check_connection(&self) -> Result<Vec<String>, SinkError>;

    /// Persist one row. Failures here are `SinkError::Append`.
    async fn append_row(&self, row: &SheetRow) -> Result<(), SinkError>;

    /// Every row including the header (maintenance tooling only).
    async fn read_rows(&self) -> Result<Vec<Vec<String>>, SinkError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::Article;

    #[test]
    fn row_has_three_blank_annotation_columns() {
        let art = ScoredArticle {
            article: Article {
                id: "x".into(),
                title: "t".into(),
                raw_summary: String::new(),
                link: "https://example.test/x".into(),
                published_at: None,
                source_name: "s".into(),
            },
            score: 9,
            matched_keywords: vec!["web3".into()],
            sample_copy: "copy".into(),
        };
        let date = NaiveDate::from_ymd_opt(2025, 1, 6).unwrap();
        let row = SheetRow::from_article(&art, date);
        assert_eq!(
            row.to_values(),
            vec!["2025-01-06", "https://example.test/x", "copy", "", "", ""]
        );
    }
}
