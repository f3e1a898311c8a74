// src/telemetry.rs
//! Tracing setup and metric descriptions shared by the binaries.

use metrics::{describe_counter, describe_gauge, describe_histogram};
use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub const ENV_LOG_FORMAT: &str = "CURATOR_LOG_FORMAT";
const DEFAULT_FILTER: &str = "atticus_news_curator=info,curator_admin=info,warn";

/// Install the global subscriber. `RUST_LOG` overrides the default filter and
/// `CURATOR_LOG_FORMAT=json` switches to JSON lines. Safe to call twice.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let json = std::env::var(ENV_LOG_FORMAT)
        .ok()
        .is_some_and(|v| v.eq_ignore_ascii_case("json"));

    let res = if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .try_init()
    };
    if res.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

/// One-time metrics registration (so series carry descriptions once a recorder exists).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("curator_entries_seen_total", "Feed entries considered.");
        describe_counter!(
            "curator_entries_accepted_total",
            "Entries at or above the score threshold."
        );
        describe_counter!(
            "curator_entries_rejected_total",
            "Entries below the score threshold."
        );
        describe_counter!(
            "curator_dedup_skipped_total",
            "Entries skipped because their id was already accepted."
        );
        describe_counter!("curator_entry_errors_total", "Malformed entries skipped.");
        describe_counter!("curator_feed_errors_total", "Feed fetch/parse failures.");
        describe_counter!("curator_rows_appended_total", "Rows written to the sheet.");
        describe_counter!("curator_row_errors_total", "Row appends that failed.");
        describe_counter!("curator_cycles_total", "Curation cycles started.");
        describe_histogram!("curator_feed_parse_ms", "Feed parse time in milliseconds.");
        describe_gauge!("curator_dedup_cache_size", "Ids held in the dedup cache.");
        describe_gauge!(
            "curator_last_cycle_ts",
            "Unix ts when the last curation cycle finished."
        );
        describe_gauge!("curator_next_run_ts", "Unix ts of the next scheduled job.");
        describe_counter!(
            "curator_sheets_token_mints_total",
            "Service-account access tokens minted."
        );
    });
}

/// Short stable fingerprint for log lines, so ids/URLs don't flood the logs.
pub fn log_id(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let digest = Sha256::digest(text.as_bytes());
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}
