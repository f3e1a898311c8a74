// src/error.rs
//! Failure taxonomy. Only the I/O edges (config load, feed fetch, sink calls) fail;
//! scoring and ranking are total.

use thiserror::Error;

/// Fatal at startup: the daemon refuses to run without these.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variables: {}", .0.join(", "))]
    MissingEnv(Vec<String>),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("failed to read config at {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// A whole feed could not be used this cycle. Recovered by the ingestor.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("feed request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("feed returned HTTP {0}")]
    Status(u16),

    #[error("feed is neither RSS nor Atom: {0}")]
    Parse(String),
}

/// One entry inside an otherwise healthy feed is unusable.
#[derive(Debug, Error)]
pub enum EntryError {
    #[error("entry has neither id nor link")]
    MissingId,

    #[error("entry {0} has no title")]
    MissingTitle(String),

    #[error("entry {0} has no link")]
    MissingLink(String),
}

/// Sink failures. `Connection` aborts a cycle, `Append` only skips one row.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink unreachable: {0}")]
    Connection(String),

    #[error("row append failed: {0}")]
    Append(String),

    #[error("sink read failed: {0}")]
    Read(String),
}

impl SinkError {
    pub fn is_connection(&self) -> bool {
        matches!(self, SinkError::Connection(_))
    }
}
