// src/config.rs
//! Curator configuration: keyword table, feed list, thresholds, timing and cache bounds.
//!
//! Resolution order:
//! 1) `$CURATOR_CONFIG_PATH` (must exist if set)
//! 2) `config/curator.toml`
//! 3) built-in defaults
//!
//! `CURATOR_MIN_SCORE` / `CURATOR_MAX_ARTICLES` override the loaded values.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{FixedOffset, NaiveTime, Offset, Utc};
use serde::Deserialize;

use crate::error::ConfigError;

pub const DEFAULT_CONFIG_PATH: &str = "config/curator.toml";
pub const ENV_CONFIG_PATH: &str = "CURATOR_CONFIG_PATH";
pub const ENV_MIN_SCORE: &str = "CURATOR_MIN_SCORE";
pub const ENV_MAX_ARTICLES: &str = "CURATOR_MAX_ARTICLES";

pub const ENV_SHEET_ID: &str = "GOOGLE_SHEET_ID";
pub const ENV_SHEETS_TOKEN: &str = "GOOGLE_SHEETS_ACCESS_TOKEN";
pub const ENV_SHEET_RANGE: &str = "GOOGLE_SHEET_RANGE";
pub const DEFAULT_SHEET_RANGE: &str = "Sheet1!A:F";

pub const ENV_PROJECT_ID: &str = "GOOGLE_PROJECT_ID";
pub const ENV_PRIVATE_KEY_ID: &str = "GOOGLE_PRIVATE_KEY_ID";
pub const ENV_PRIVATE_KEY: &str = "GOOGLE_PRIVATE_KEY";
pub const ENV_CLIENT_EMAIL: &str = "GOOGLE_CLIENT_EMAIL";
pub const ENV_CLIENT_ID: &str = "GOOGLE_CLIENT_ID";
pub const ENV_TOKEN_URI: &str = "GOOGLE_TOKEN_URI";
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

const DEFAULT_KEYWORDS: &[(&str, u32)] = &[
    ("bitcoin options", 15),
    ("crypto options", 12),
    ("btc options", 15),
    ("perpetual futures", 10),
    ("defi options", 10),
    ("downside protection", 8),
    ("institutional crypto", 8),
    ("crypto derivatives", 9),
    ("btc etf", 7),
    ("volatility trading", 8),
    ("options trading", 12),
    ("web3", 5),
    ("hedging strategies", 7),
    ("risk management", 6),
    ("crypto volatility", 6),
    ("institutional adoption", 7),
    ("derivatives market", 8),
    ("digital assets", 4),
    ("crypto hedge", 6),
    ("portfolio protection", 7),
    ("trading infrastructure", 6),
    ("market making", 7),
    ("liquidity provision", 6),
    ("automated trading", 5),
    ("algorithmic trading", 5),
];

const DEFAULT_FEEDS: &[&str] = &[
    "https://cointelegraph.com/rss",
    "https://decrypt.co/feed",
    "https://blockworks.co/feed",
    "https://www.coindesk.com/arc/outboundfeeds/rss/",
    "https://thedefiant.io/feed",
    "https://cryptonews.com/news/feed",
    "https://www.theblockcrypto.com/rss.xml",
    "https://bitcoinmagazine.com/.rss/full/",
];

/// One weighted phrase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keyword {
    pub phrase: String,
    pub weight: u32,
}

/// Ordered phrase → weight table. Iteration order is the configured order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordTable {
    entries: Vec<Keyword>,
}

impl KeywordTable {
    /// Phrases are trimmed and lowercased; empty phrases, zero weights and
    /// duplicates (after lowercasing) are rejected.
    pub fn new<I, S>(pairs: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (S, u32)>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let mut entries = Vec::new();
        for (phrase, weight) in pairs {
            let phrase = phrase.as_ref().trim().to_lowercase();
            if phrase.is_empty() {
                return Err(ConfigError::Invalid("empty keyword phrase".into()));
            }
            if weight == 0 {
                return Err(ConfigError::Invalid(format!(
                    "keyword `{phrase}` must have a positive weight"
                )));
            }
            if !seen.insert(phrase.clone()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate keyword `{phrase}`"
                )));
            }
            entries.push(Keyword { phrase, weight });
        }
        Ok(Self { entries })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Keyword> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn weight_of(&self, phrase: &str) -> Option<u32> {
        self.entries
            .iter()
            .find(|k| k.phrase == phrase)
            .map(|k| k.weight)
    }
}

impl Default for KeywordTable {
    fn default() -> Self {
        Self {
            entries: DEFAULT_KEYWORDS
                .iter()
                .map(|(p, w)| Keyword {
                    phrase: (*p).to_string(),
                    weight: *w,
                })
                .collect(),
        }
    }
}

/// Wall-clock trigger times, interpreted in `utc_offset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleConfig {
    pub morning_run: NaiveTime,
    pub afternoon_run: NaiveTime,
    pub cleanup_time: NaiveTime,
    pub utc_offset: FixedOffset,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            morning_run: hm(14, 0),
            afternoon_run: hm(20, 0),
            cleanup_time: hm(6, 0),
            utc_offset: utc(),
        }
    }
}

fn hm(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap_or(NaiveTime::MIN)
}

fn utc() -> FixedOffset {
    Utc.fix()
}

/// Immutable process-wide configuration, built once at startup.
#[derive(Debug, Clone)]
pub struct CuratorConfig {
    pub keywords: KeywordTable,
    pub feeds: Vec<String>,
    pub min_score: u32,
    pub max_articles_per_run: usize,
    pub sample_copy_max_length: usize,
    pub max_entries_per_feed: usize,
    pub feed_fetch_delay: Duration,
    pub sheet_update_delay: Duration,
    pub dedup_max_size: usize,
    pub dedup_retain: usize,
    pub schedule: ScheduleConfig,
}

impl Default for CuratorConfig {
    fn default() -> Self {
        Self {
            keywords: KeywordTable::default(),
            feeds: DEFAULT_FEEDS.iter().map(|s| s.to_string()).collect(),
            min_score: 8,
            max_articles_per_run: 5,
            sample_copy_max_length: 140,
            max_entries_per_feed: 10,
            feed_fetch_delay: Duration::from_secs_f64(1.0),
            sheet_update_delay: Duration::from_secs_f64(2.0),
            dedup_max_size: 1000,
            dedup_retain: 500,
            schedule: ScheduleConfig::default(),
        }
    }
}

/* ----------------------------
TOML schema
---------------------------- */

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    scoring: Option<ScoringSection>,
    #[serde(default)]
    timing: Option<TimingSection>,
    #[serde(default)]
    cache: Option<CacheSection>,
    #[serde(default)]
    feeds: Option<FeedsSection>,
    #[serde(default)]
    keywords: Option<Vec<KeywordEntry>>,
}

#[derive(Debug, Deserialize)]
struct ScoringSection {
    min_relevance_score: Option<u32>,
    max_articles_per_run: Option<usize>,
    sample_copy_max_length: Option<usize>,
    max_entries_per_feed: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct TimingSection {
    morning_run: Option<String>,
    afternoon_run: Option<String>,
    cleanup_time: Option<String>,
    utc_offset: Option<String>,
    feed_fetch_delay_secs: Option<f64>,
    sheet_update_delay_secs: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct CacheSection {
    max_processed_articles: Option<usize>,
    cleanup_retain: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct FeedsSection {
    urls: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct KeywordEntry {
    phrase: String,
    weight: u32,
}

impl CuratorConfig {
    /// Load using env var + fallbacks, then apply env overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut cfg = if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(ConfigError::Invalid(format!(
                    "{ENV_CONFIG_PATH} points to non-existent path {}",
                    pb.display()
                )));
            }
            Self::from_path(&pb)?
        } else {
            let default_p = PathBuf::from(DEFAULT_CONFIG_PATH);
            if default_p.exists() {
                Self::from_path(&default_p)?
            } else {
                tracing::info!("no config file found, using built-in defaults");
                Self::default()
            }
        };
        cfg.apply_env_overrides()?;
        Ok(cfg)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Sections that are absent keep their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(s)?;
        let mut cfg = Self::default();

        if let Some(sc) = file.scoring {
            if let Some(v) = sc.min_relevance_score {
                cfg.min_score = v;
            }
            if let Some(v) = sc.max_articles_per_run {
                cfg.max_articles_per_run = v;
            }
            if let Some(v) = sc.sample_copy_max_length {
                cfg.sample_copy_max_length = v;
            }
            if let Some(v) = sc.max_entries_per_feed {
                cfg.max_entries_per_feed = v;
            }
        }

        if let Some(t) = file.timing {
            if let Some(v) = t.morning_run.as_deref() {
                cfg.schedule.morning_run = parse_clock(v)?;
            }
            if let Some(v) = t.afternoon_run.as_deref() {
                cfg.schedule.afternoon_run = parse_clock(v)?;
            }
            if let Some(v) = t.cleanup_time.as_deref() {
                cfg.schedule.cleanup_time = parse_clock(v)?;
            }
            if let Some(v) = t.utc_offset.as_deref() {
                cfg.schedule.utc_offset = v.trim().parse::<FixedOffset>().map_err(|e| {
                    ConfigError::Invalid(format!("utc_offset `{v}`: {e}"))
                })?;
            }
            if let Some(v) = t.feed_fetch_delay_secs {
                cfg.feed_fetch_delay = parse_delay("feed_fetch_delay_secs", v)?;
            }
            if let Some(v) = t.sheet_update_delay_secs {
                cfg.sheet_update_delay = parse_delay("sheet_update_delay_secs", v)?;
            }
        }

        if let Some(c) = file.cache {
            if let Some(v) = c.max_processed_articles {
                cfg.dedup_max_size = v;
            }
            if let Some(v) = c.cleanup_retain {
                cfg.dedup_retain = v;
            }
        }

        if let Some(f) = file.feeds {
            cfg.feeds = clean_feeds(f.urls);
        }

        if let Some(kw) = file.keywords {
            cfg.keywords = KeywordTable::new(kw.into_iter().map(|k| (k.phrase, k.weight)))?;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(v) = parse_env_number::<u32>(ENV_MIN_SCORE)? {
            self.min_score = v;
        }
        if let Some(v) = parse_env_number::<usize>(ENV_MAX_ARTICLES)? {
            self.max_articles_per_run = v;
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.keywords.is_empty() {
            return Err(ConfigError::Invalid("keyword table is empty".into()));
        }
        if self.feeds.is_empty() {
            return Err(ConfigError::Invalid("feed list is empty".into()));
        }
        if self.dedup_retain > self.dedup_max_size {
            return Err(ConfigError::Invalid(format!(
                "cleanup_retain ({}) exceeds max_processed_articles ({})",
                self.dedup_retain, self.dedup_max_size
            )));
        }
        Ok(())
    }
}

fn parse_clock(s: &str) -> Result<NaiveTime, ConfigError> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M")
        .map_err(|e| ConfigError::Invalid(format!("time `{s}` is not HH:MM: {e}")))
}

fn parse_delay(name: &str, secs: f64) -> Result<Duration, ConfigError> {
    if !secs.is_finite() || secs < 0.0 {
        return Err(ConfigError::Invalid(format!(
            "{name} must be a non-negative number of seconds"
        )));
    }
    Ok(Duration::from_secs_f64(secs))
}

fn parse_env_number<T: std::str::FromStr>(name: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::Invalid(format!("{name}=`{raw}` is not a valid number"))),
        Err(_) => Ok(None),
    }
}

/// Trim, drop empties and duplicates while keeping the configured order.
fn clean_feeds(urls: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    urls.into_iter()
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty() && seen.insert(u.clone()))
        .collect()
}

/// Service-account key fields, as found in the JSON key file Google issues.
#[derive(Clone)]
pub struct ServiceAccountKey {
    pub project_id: String,
    pub private_key_id: String,
    /// PEM, with real newlines.
    pub private_key: String,
    pub client_email: String,
    pub client_id: String,
    pub token_uri: String,
}

impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("project_id", &self.project_id)
            .field("private_key_id", &self.private_key_id)
            .field("private_key", &"<redacted>")
            .field("client_email", &self.client_email)
            .field("client_id", &self.client_id)
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

/// How the sink obtains its bearer token.
#[derive(Clone)]
pub enum SheetsAuth {
    /// Minted from the key and refreshed before it expires.
    ServiceAccount(ServiceAccountKey),
    /// Used as-is; never refreshed.
    AccessToken(String),
}

impl std::fmt::Debug for SheetsAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ServiceAccount(key) => f.debug_tuple("ServiceAccount").field(key).finish(),
            Self::AccessToken(_) => f.debug_tuple("AccessToken").field(&"<redacted>").finish(),
        }
    }
}

/// Google Sheets access for the row sink.
#[derive(Debug, Clone)]
pub struct SheetCredentials {
    pub sheet_id: String,
    pub auth: SheetsAuth,
    pub range: String,
}

impl SheetCredentials {
    /// Service-account variables unless `GOOGLE_SHEETS_ACCESS_TOKEN` is set.
    /// Reports every missing variable at once.
    pub fn from_env() -> Result<Self, ConfigError> {
        let get = |k: &str| std::env::var(k).ok().filter(|v| !v.trim().is_empty());
        let mut missing = Vec::new();
        let mut require = |k: &str| {
            let v = get(k);
            if v.is_none() {
                missing.push(k.to_string());
            }
            v.unwrap_or_default()
        };

        let sheet_id = require(ENV_SHEET_ID);
        let auth = match get(ENV_SHEETS_TOKEN) {
            Some(token) => SheetsAuth::AccessToken(token),
            None => SheetsAuth::ServiceAccount(ServiceAccountKey {
                project_id: require(ENV_PROJECT_ID),
                private_key_id: require(ENV_PRIVATE_KEY_ID),
                // `.env` files carry the PEM on one line with literal `\n`
                private_key: require(ENV_PRIVATE_KEY).replace("\\n", "\n"),
                client_email: require(ENV_CLIENT_EMAIL),
                client_id: require(ENV_CLIENT_ID),
                token_uri: get(ENV_TOKEN_URI).unwrap_or_else(|| DEFAULT_TOKEN_URI.to_string()),
            }),
        };

        if !missing.is_empty() {
            return Err(ConfigError::MissingEnv(missing));
        }
        Ok(Self {
            sheet_id,
            auth,
            range: get(ENV_SHEET_RANGE).unwrap_or_else(|| DEFAULT_SHEET_RANGE.to_string()),
        })
    }
}
