// src/sink/memory.rs
//! In-process sink for tests and dry runs. Can be told to drop specific rows or
//! to act unreachable.

use std::collections::HashSet;
use std::sync::Mutex;

use super::{RowSink, SheetRow};
use crate::error::SinkError;

pub const DEFAULT_HEADER: [&str; 6] = [
    "Date Added",
    "Reference Link",
    "Sample Copy",
    "Notes",
    "Status",
    "Owner",
];

pub struct MemorySink {
    rows: Mutex<Vec<Vec<String>>>,
    failing_links: HashSet<String>,
    offline: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(vec![DEFAULT_HEADER.iter().map(|s| s.to_string()).collect()]),
            failing_links: HashSet::new(),
            offline: false,
        }
    }

    /// Appends for these links return `SinkError::Append`.
    pub fn failing_on<I, S>(mut self, links: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.failing_links = links.into_iter().map(Into::into).collect();
        self
    }

    /// Every call returns `SinkError::Connection`.
    pub fn offline() -> Self {
        Self {
            offline: true,
            ..Self::new()
        }
    }

    /// Data rows only (header excluded).
    pub fn appended(&self) -> Vec<Vec<String>> {
        let rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        rows.iter().skip(1).cloned().collect()
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl RowSink for MemorySink {
    async fn check_connection(&self) -> Result<Vec<String>, SinkError> {
        if self.offline {
            return Err(SinkError::Connection("memory sink is offline".into()));
        }
        let rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        Ok(rows.first().cloned().unwrap_or_default())
    }

    async fn append_row(&self, row: &SheetRow) -> Result<(), SinkError> {
        if self.offline {
            return Err(SinkError::Connection("memory sink is offline".into()));
        }
        if self.failing_links.contains(&row.link) {
            return Err(SinkError::Append(format!("rejected row for {}", row.link)));
        }
        self.rows
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(row.to_values());
        Ok(())
    }

    async fn read_rows(&self) -> Result<Vec<Vec<String>>, SinkError> {
        if self.offline {
            return Err(SinkError::Connection("memory sink is offline".into()));
        }
        Ok(self.rows.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }
}
