//! Operator menu: run a cycle now, inspect or export the sheet, clear the dedup
//! cache, or dry-run a single feed.

use std::io::{self, BufRead, Write};

use atticus_news_curator::analyze::rank;
use atticus_news_curator::curator::clip;
use atticus_news_curator::ingest::providers::RssFeedSource;
use atticus_news_curator::{build_curator_from_env, maintenance, telemetry, Curator};

fn show_menu() {
    println!();
    println!("Atticus News Curator - Utility Menu");
    println!("{}", "=".repeat(50));
    println!("1. Run manual curation");
    println!("2. View recent articles");
    println!("3. Clear processed cache");
    println!("4. Test single RSS feed");
    println!("5. Export sheet data");
    println!("6. Exit");
    println!("{}", "=".repeat(50));
}

fn prompt(lines: &mut impl Iterator<Item = io::Result<String>>, label: &str) -> Option<String> {
    print!("{label}");
    let _ = io::stdout().flush();
    lines.next()?.ok().map(|s| s.trim().to_string())
}

async fn manual_curation(curator: &mut Curator) {
    match curator.run_cycle().await {
        Ok(r) => println!(
            "Manual curation completed: {} selected, {} added, {} failed rows, {}/{} feeds failed",
            r.selected, r.appended, r.failed_rows, r.feeds_failed, r.feeds_polled
        ),
        Err(e) => println!("Manual curation failed: {e}"),
    }
}

async fn view_recent(curator: &Curator) {
    match curator.sink().read_rows().await {
        Ok(rows) => {
            println!("Recent articles in Google Sheets:");
            println!("{}", "-".repeat(80));
            let recent = maintenance::recent_rows(&rows, maintenance::RECENT_ROWS);
            for (i, line) in maintenance::format_recent(recent).iter().enumerate() {
                println!("{}. {line}", i + 1);
            }
        }
        Err(e) => println!("Failed to view articles: {e}"),
    }
}

async fn test_feed(curator: &Curator, url: &str) {
    let source = match RssFeedSource::from_url(url) {
        Ok(s) => s,
        Err(e) => {
            println!("Feed test failed: {e}");
            return;
        }
    };
    let res = curator.preview_feed(&source).await;
    if res.stats.feed_failed {
        println!("Feed test failed: could not fetch or parse {url}");
        return;
    }
    println!("Results from {url}:");
    println!(
        "Found {} relevant articles ({} entries checked)",
        res.articles.len(),
        res.stats.seen
    );
    for (i, a) in rank(res.articles, 3).iter().enumerate() {
        println!("{}. {} (Score: {})", i + 1, clip(&a.article.title, 60), a.score);
    }
}

async fn export(curator: &Curator) {
    let rows = match curator.sink().read_rows().await {
        Ok(r) => r,
        Err(e) => {
            println!("Export failed: {e}");
            return;
        }
    };
    if rows.is_empty() {
        println!("No data found in sheet");
        return;
    }
    match maintenance::export_rows(&rows, std::path::Path::new("."), chrono::Local::now()) {
        Ok((path, n)) => {
            println!("Sheet data exported to {}", path.display());
            println!("Exported {n} rows");
        }
        Err(e) => println!("Export failed: {e:#}"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    telemetry::init_tracing();

    let mut curator = build_curator_from_env()?;

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        show_menu();
        let Some(choice) = prompt(&mut lines, "\nSelect option (1-6): ") else {
            break;
        };
        match choice.as_str() {
            "1" => manual_curation(&mut curator).await,
            "2" => view_recent(&curator).await,
            "3" => {
                curator.clear_cache();
                println!("Processed articles cache cleared");
            }
            "4" => {
                if let Some(url) = prompt(&mut lines, "Enter RSS feed URL: ").filter(|u| !u.is_empty()) {
                    test_feed(&curator, &url).await;
                }
            }
            "5" => export(&curator).await,
            "6" => {
                println!("Goodbye!");
                break;
            }
            _ => println!("Invalid option. Please try again."),
        }
    }
    Ok(())
}
