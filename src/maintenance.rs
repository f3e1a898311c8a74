// src/maintenance.rs
//! Helpers behind the operator menu (`curator_admin`): sheet views and export.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use serde_json::{Map, Value};

use crate::curator::clip;

/// Data rows to show in "recent articles".
pub const RECENT_ROWS: usize = 10;
const PREVIEW_CHARS: usize = 60;

/// Last `n` data rows (header excluded), oldest first.
pub fn recent_rows(rows: &[Vec<String>], n: usize) -> &[Vec<String>] {
    let data = rows.get(1..).unwrap_or(&[]);
    &data[data.len().saturating_sub(n)..]
}

/// `"{date}: {sample copy clipped to 60 chars}"`; rows with fewer than three
/// columns are skipped.
pub fn format_recent(rows: &[Vec<String>]) -> Vec<String> {
    rows.iter()
        .filter(|r| r.len() >= 3)
        .map(|r| {
            let date = if r[0].is_empty() { "No date" } else { r[0].as_str() };
            format!("{date}: {}", clip(&r[2], PREVIEW_CHARS))
        })
        .collect()
}

/// One JSON object per data row, keyed by the header row. Short rows are
/// padded with empty strings.
pub fn rows_to_records(rows: &[Vec<String>]) -> Vec<Map<String, Value>> {
    let Some((headers, data)) = rows.split_first() else {
        return Vec::new();
    };
    data.iter()
        .map(|row| {
            headers
                .iter()
                .enumerate()
                .map(|(i, h)| {
                    let v = row.get(i).cloned().unwrap_or_default();
                    (h.clone(), Value::String(v))
                })
                .collect()
        })
        .collect()
}

pub fn export_file_name(now: DateTime<Local>) -> String {
    format!("sheet_export_{}.json", now.format("%Y%m%d_%H%M%S"))
}

/// Write the records as pretty JSON into `dir`. Returns (path, record count).
pub fn export_rows(rows: &[Vec<String>], dir: &Path, now: DateTime<Local>) -> Result<(PathBuf, usize)> {
    let records = rows_to_records(rows);
    let path = dir.join(export_file_name(now));
    let json = serde_json::to_string_pretty(&records).context("serializing sheet export")?;
    std::fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
    Ok((path, records.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sheet(n: usize) -> Vec<Vec<String>> {
        let mut rows = vec![vec!["Date Added".into(), "Reference Link".into(), "Sample Copy".into()]];
        for i in 0..n {
            rows.push(vec![format!("2025-01-{:02}", i + 1), format!("https://x/{i}"), format!("copy {i}")]);
        }
        rows
    }

    #[test]
    fn recent_rows_skip_header_and_keep_tail() {
        let rows = sheet(15);
        let recent = recent_rows(&rows, RECENT_ROWS);
        assert_eq!(recent.len(), 10);
        assert_eq!(recent[0][2], "copy 5");
        assert_eq!(recent_rows(&sheet(3), 10).len(), 3);
        assert!(recent_rows(&[], 10).is_empty());
    }

    #[test]
    fn format_recent_clips_and_marks_missing_dates() {
        let rows = vec![
            vec!["".into(), "l".into(), "x".repeat(80)],
            vec!["2025-01-01".into(), "l".into()],
        ];
        let out = format_recent(&rows);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0], format!("No date: {}...", "x".repeat(60)));
    }

    #[test]
    fn records_pad_short_rows() {
        let rows = vec![
            vec!["A".into(), "B".into()],
            vec!["1".into()],
        ];
        let recs = rows_to_records(&rows);
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0]["A"], Value::String("1".into()));
        assert_eq!(recs[0]["B"], Value::String(String::new()));
    }

    #[test]
    fn export_writes_timestamped_file() {
        let dir = tempfile::tempdir().unwrap();
        let now = Local.with_ymd_and_hms(2025, 1, 6, 9, 30, 5).unwrap();
        let (path, n) = export_rows(&sheet(2), dir.path(), now).unwrap();
        assert_eq!(n, 2);
        assert!(path.ends_with("sheet_export_20250106_093005.json"));
        let back: Vec<Map<String, Value>> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back[1]["Sample Copy"], Value::String("copy 1".into()));
    }
}
