// tests/curator_cycle.rs
use std::time::Duration;

use atticus_news_curator::ingest::providers::RssFeedSource;
use atticus_news_curator::sink::MemorySink;
use atticus_news_curator::{Curator, CuratorConfig, FeedSource, SinkError};
use chrono::NaiveDate;

fn fixture(name: &str, file: &str) -> Box<dyn FeedSource> {
    let xml = std::fs::read_to_string(format!("tests/fixtures/{file}")).expect("fixture");
    Box::new(RssFeedSource::from_fixture(name, &xml))
}

fn feeds() -> Vec<Box<dyn FeedSource>> {
    vec![
        fixture("crypto_desk", "crypto_desk.xml"),
        fixture("options_wire", "options_wire.xml"),
        fixture("chain_research", "chain_research.atom"),
    ]
}

fn fast_config() -> CuratorConfig {
    CuratorConfig {
        feed_fetch_delay: Duration::ZERO,
        sheet_update_delay: Duration::ZERO,
        ..CuratorConfig::default()
    }
}

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 6).unwrap()
}

async fn data_rows(curator: &Curator) -> Vec<Vec<String>> {
    let rows = curator.sink().read_rows().await.unwrap();
    rows.into_iter().skip(1).collect()
}

#[tokio::test]
async fn twelve_candidates_five_rows() {
    let mut curator = Curator::new(fast_config(), feeds(), Box::new(MemorySink::new()));

    let report = curator.run_cycle_on(day()).await.unwrap();

    assert_eq!(report.feeds_polled, 3);
    assert_eq!(report.feeds_failed, 0);
    assert_eq!(report.candidates, 12);
    assert_eq!(report.selected, 5);
    assert_eq!(report.appended, 5);
    assert_eq!(report.failed_rows, 0);

    let rows = data_rows(&curator).await;
    let links: Vec<_> = rows.iter().map(|r| r[1].as_str()).collect();
    // 47, 27, 15, 13, then the first of the 10s in feed order
    assert_eq!(
        links,
        vec![
            "https://cryptodesk.test/a1",
            "https://optionswire.test/b1",
            "https://cryptodesk.test/a2",
            "https://cryptodesk.test/a3",
            "https://cryptodesk.test/a5",
        ]
    );
    for r in &rows {
        assert_eq!(r.len(), 6);
        assert_eq!(r[0], "2025-01-06");
        assert!(r[3..].iter().all(String::is_empty));
    }

    // every candidate, shipped or not, is remembered
    assert_eq!(curator.cache().len(), 12);
}

#[tokio::test]
async fn second_cycle_adds_nothing() {
    let mut curator = Curator::new(fast_config(), feeds(), Box::new(MemorySink::new()));
    curator.run_cycle_on(day()).await.unwrap();

    let report = curator.run_cycle_on(day()).await.unwrap();
    assert_eq!(report.candidates, 0);
    assert_eq!(report.appended, 0);
    assert_eq!(data_rows(&curator).await.len(), 5);
}

#[tokio::test]
async fn clearing_the_cache_lets_articles_return() {
    let mut curator = Curator::new(fast_config(), feeds(), Box::new(MemorySink::new()));
    curator.run_cycle_on(day()).await.unwrap();

    curator.clear_cache();
    assert!(curator.cache().is_empty());

    let report = curator.run_cycle_on(day()).await.unwrap();
    assert_eq!(report.appended, 5);
    assert_eq!(data_rows(&curator).await.len(), 10);
}

#[tokio::test]
async fn unreachable_sink_aborts_before_ingest() {
    let mut curator = Curator::new(fast_config(), feeds(), Box::new(MemorySink::offline()));

    let err = curator.run_cycle_on(day()).await.unwrap_err();
    assert!(matches!(err, SinkError::Connection(_)));
    assert!(err.is_connection());
    assert!(curator.cache().is_empty());
}

#[tokio::test]
async fn failed_row_is_skipped_and_others_land() {
    let sink = MemorySink::new().failing_on(["https://optionswire.test/b1"]);
    let mut curator = Curator::new(fast_config(), feeds(), Box::new(sink));

    let report = curator.run_cycle_on(day()).await.unwrap();
    assert_eq!(report.selected, 5);
    assert_eq!(report.appended, 4);
    assert_eq!(report.failed_rows, 1);

    let rows = data_rows(&curator).await;
    assert!(rows.iter().all(|r| r[1] != "https://optionswire.test/b1"));
}

#[tokio::test]
async fn broken_feed_does_not_stop_the_cycle() {
    let mut feeds = feeds();
    feeds.insert(0, Box::new(RssFeedSource::from_fixture("broken", "not a feed")));
    let mut curator = Curator::new(fast_config(), feeds, Box::new(MemorySink::new()));

    let report = curator.run_cycle_on(day()).await.unwrap();
    assert_eq!(report.feeds_polled, 4);
    assert_eq!(report.feeds_failed, 1);
    assert_eq!(report.appended, 5);
}

#[tokio::test]
async fn nothing_qualifies_writes_nothing() {
    let cfg = CuratorConfig {
        min_score: 1_000,
        ..fast_config()
    };
    let mut curator = Curator::new(cfg, feeds(), Box::new(MemorySink::new()));

    let report = curator.run_cycle_on(day()).await.unwrap();
    assert_eq!(report.selected, 0);
    assert!(data_rows(&curator).await.is_empty());
    assert!(curator.cache().is_empty());
}

#[tokio::test]
async fn cleanup_keeps_most_recent_ids() {
    let cfg = CuratorConfig {
        dedup_max_size: 10,
        dedup_retain: 4,
        ..fast_config()
    };
    let mut curator = Curator::new(cfg, feeds(), Box::new(MemorySink::new()));
    curator.run_cycle_on(day()).await.unwrap();
    assert_eq!(curator.cache().len(), 12);

    assert_eq!(curator.cleanup_cache(), 8);
    let kept: Vec<_> = curator.cache().iter().collect();
    assert_eq!(
        kept,
        vec![
            "https://optionswire.test/b4",
            "https://optionswire.test/b6",
            "urn:uuid:c1",
            "urn:uuid:c3",
        ]
    );

    // under the bound: no-op
    assert_eq!(curator.cleanup_cache(), 0);
}

#[tokio::test]
async fn preview_leaves_cache_and_sink_alone() {
    let curator = Curator::new(fast_config(), feeds(), Box::new(MemorySink::new()));
    let xml = std::fs::read_to_string("tests/fixtures/crypto_desk.xml").expect("fixture");
    let feed = RssFeedSource::from_fixture("preview", &xml);

    let res = curator.preview_feed(&feed).await;
    assert_eq!(res.articles.len(), 5);
    assert!(curator.cache().is_empty());
    assert!(data_rows(&curator).await.is_empty());
}
