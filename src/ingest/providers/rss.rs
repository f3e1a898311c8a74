// src/ingest/providers/rss.rs
//! RSS 2.0 / RSS 1.0 / Atom feed source over HTTP, or over an in-memory document
//! for tests and the maintenance tool.

use std::time::Duration;

use async_trait::async_trait;
use metrics::histogram;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use reqwest::Client;

use crate::error::FeedError;
use crate::ingest::types::{FeedBatch, FeedSource, RawEntry};

const HTTP_TIMEOUT: Duration = Duration::from_secs(15);
const USER_AGENT: &str = concat!("atticus-news-curator/", env!("CARGO_PKG_VERSION"));

/* ----------------------------
Document walk
---------------------------- */

/// Parse an RSS or Atom document into a batch.
///
/// Only direct children of `<item>` / `<entry>` are read, matched on their full
/// qualified name, so `media:title`, `dc:title` or `atom:link` never collide with
/// the plain fields. Items may be interleaved with other channel children.
pub fn parse_feed(xml: &str) -> Result<FeedBatch, FeedError> {
    let t0 = std::time::Instant::now();
    let cleaned = scrub_html_entities_for_xml(xml);
    let mut reader = Reader::from_str(&cleaned);
    let mut walk = Walk::default();

    loop {
        let event = match reader.read_event() {
            Ok(ev) => ev,
            Err(e) => {
                return Err(FeedError::Parse(format!(
                    "at byte {}: {e}",
                    reader.buffer_position()
                )))
            }
        };
        match event {
            Event::Start(e) => walk.open(&e, false)?,
            Event::Empty(e) => walk.open(&e, true)?,
            Event::End(_) => walk.close(),
            Event::Text(t) => match t.unescape() {
                Ok(text) => walk.text(&text),
                Err(_) => walk.text(&String::from_utf8_lossy(&t)),
            },
            Event::CData(t) => walk.text(&String::from_utf8_lossy(&t)),
            Event::Eof => break,
            _ => {}
        }
    }

    let batch = walk.finish()?;
    histogram!("curator_feed_parse_ms").record(t0.elapsed().as_secs_f64() * 1000.0);
    Ok(batch)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dialect {
    Rss,
    Atom,
}

impl Dialect {
    fn from_root(name: &[u8]) -> Option<Self> {
        match name {
            b"rss" | b"rdf:RDF" => Some(Self::Rss),
            b"feed" => Some(Self::Atom),
            _ => None,
        }
    }

    fn entry_tag(self) -> &'static [u8] {
        match self {
            Self::Rss => b"item",
            Self::Atom => b"entry",
        }
    }

    fn feed_tag(self) -> &'static [u8] {
        match self {
            Self::Rss => b"channel",
            Self::Atom => b"feed",
        }
    }

    fn field(self, name: &[u8]) -> Option<Field> {
        match (self, name) {
            (_, b"title") => Some(Field::Title),
            (_, b"summary") => Some(Field::Summary),
            (Self::Rss, b"link") => Some(Field::Link),
            (Self::Rss, b"guid") | (Self::Atom, b"id") => Some(Field::Id),
            (Self::Rss, b"description") | (Self::Atom, b"content") => Some(Field::Body),
            (Self::Rss, b"pubDate") | (Self::Atom, b"published") => Some(Field::Published),
            (Self::Atom, b"updated") => Some(Field::Updated),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Field {
    Id,
    Title,
    Link,
    Summary,
    Body,
    Published,
    Updated,
}

enum Target {
    FeedTitle,
    Entry(Field),
}

/// Text collected for one element until its end tag.
struct Capture {
    depth: usize,
    target: Target,
    text: String,
}

#[derive(Default)]
struct Draft {
    id: Option<String>,
    title: Option<String>,
    link: Option<String>,
    summary: Option<String>,
    body: Option<String>,
    published: Option<String>,
    updated: Option<String>,
    alternate: Option<String>,
    first_link: Option<String>,
}

impl Draft {
    /// First occurrence wins.
    fn set(&mut self, field: Field, text: String) {
        let slot = match field {
            Field::Id => &mut self.id,
            Field::Title => &mut self.title,
            Field::Link => &mut self.link,
            Field::Summary => &mut self.summary,
            Field::Body => &mut self.body,
            Field::Published => &mut self.published,
            Field::Updated => &mut self.updated,
        };
        if slot.is_none() {
            *slot = Some(text);
        }
    }

    /// Atom `<link>`: `rel="alternate"` (or no rel) wins over the first link seen.
    fn atom_link(&mut self, e: &BytesStart<'_>) {
        let Some(href) = attr(e, "href") else {
            return;
        };
        let is_alternate = attr(e, "rel").map_or(true, |rel| rel == "alternate");
        if self.first_link.is_none() {
            self.first_link = Some(href.clone());
        }
        if is_alternate && self.alternate.is_none() {
            self.alternate = Some(href);
        }
    }

    fn finish(self) -> RawEntry {
        RawEntry {
            id: non_empty(self.id).map(decode),
            title: non_empty(self.title).map(decode),
            link: non_empty(self.link)
                .or_else(|| non_empty(self.alternate))
                .or_else(|| non_empty(self.first_link))
                .map(decode),
            summary: non_empty(self.summary)
                .or_else(|| non_empty(self.body))
                .map(decode),
            published: non_empty(self.published).or_else(|| non_empty(self.updated)),
        }
    }
}

#[derive(Default)]
struct Walk {
    dialect: Option<Dialect>,
    /// Qualified names of the open elements.
    stack: Vec<Vec<u8>>,
    title: Option<String>,
    entries: Vec<RawEntry>,
    /// Depth of the open entry element and what it has collected so far.
    entry: Option<(usize, Draft)>,
    capture: Option<Capture>,
}

impl Walk {
    fn open(&mut self, e: &BytesStart<'_>, empty: bool) -> Result<(), FeedError> {
        let qname = e.name();
        let name = qname.as_ref();
        let depth = self.stack.len();

        let dialect = match self.dialect {
            Some(d) => d,
            None => {
                let d = Dialect::from_root(name).ok_or_else(|| {
                    FeedError::Parse(format!(
                        "unexpected root element <{}>",
                        String::from_utf8_lossy(name)
                    ))
                })?;
                self.dialect = Some(d);
                d
            }
        };
        if !empty {
            self.stack.push(name.to_vec());
        }
        if self.capture.is_some() {
            return Ok(());
        }

        if let Some((entry_depth, draft)) = self.entry.as_mut() {
            if depth != *entry_depth + 1 {
                return Ok(());
            }
            if dialect == Dialect::Atom && name == b"link" {
                draft.atom_link(e);
            } else if let Some(field) = dialect.field(name) {
                if !empty {
                    self.capture = Some(Capture {
                        depth,
                        target: Target::Entry(field),
                        text: String::new(),
                    });
                }
            }
            return Ok(());
        }

        if name == dialect.entry_tag() {
            if empty {
                self.entries.push(Draft::default().finish());
            } else {
                self.entry = Some((depth, Draft::default()));
            }
            return Ok(());
        }

        let under_feed = depth > 0
            && self
                .stack
                .get(depth - 1)
                .is_some_and(|parent| parent.as_slice() == dialect.feed_tag());
        if name == b"title" && !empty && under_feed && self.title.is_none() {
            self.capture = Some(Capture {
                depth,
                target: Target::FeedTitle,
                text: String::new(),
            });
        }
        Ok(())
    }

    fn close(&mut self) {
        self.stack.pop();
        let depth = self.stack.len();

        if self.capture.as_ref().is_some_and(|c| c.depth == depth) {
            if let Some(c) = self.capture.take() {
                match c.target {
                    Target::FeedTitle => self.title = Some(c.text),
                    Target::Entry(field) => {
                        if let Some((_, draft)) = self.entry.as_mut() {
                            draft.set(field, c.text);
                        }
                    }
                }
            }
        } else if self.capture.is_none()
            && self.entry.as_ref().is_some_and(|(d, _)| *d == depth)
        {
            if let Some((_, draft)) = self.entry.take() {
                self.entries.push(draft.finish());
            }
        }
    }

    fn text(&mut self, s: &str) {
        if let Some(c) = self.capture.as_mut() {
            c.text.push_str(s);
        }
    }

    fn finish(self) -> Result<FeedBatch, FeedError> {
        if self.dialect.is_none() {
            return Err(FeedError::Parse("document has no root element".into()));
        }
        Ok(FeedBatch {
            title: non_empty(self.title).map(decode),
            entries: self.entries,
        })
    }
}

fn attr(e: &BytesStart<'_>, key: &str) -> Option<String> {
    e.try_get_attribute(key)
        .ok()
        .flatten()
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Entities that survive inside CDATA blocks.
fn decode(s: String) -> String {
    html_escape::decode_html_entities(&s).into_owned()
}

/// HTML-only named entities are not valid XML; swap the common ones before parsing.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
        .replace("&hellip;", "...")
}

/// Client with the feed timeout and our user agent.
pub fn http_client() -> Result<Client, FeedError> {
    build_http_client(HTTP_TIMEOUT)
}

pub fn build_http_client(timeout: Duration) -> Result<Client, FeedError> {
    Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| {
            tracing::error!(error = %e, "failed to build feed http client");
            FeedError::Http(e)
        })
}

pub struct RssFeedSource {
    name: String,
    mode: Mode,
}

enum Mode {
    Fixture(String),
    Http { client: Client },
}

impl RssFeedSource {
    pub fn from_url(url: impl Into<String>) -> Result<Self, FeedError> {
        Ok(Self::with_client(url, http_client()?))
    }

    /// Share one connection pool across all feeds.
    pub fn with_client(url: impl Into<String>, client: Client) -> Self {
        Self {
            name: url.into(),
            mode: Mode::Http { client },
        }
    }

    pub fn from_fixture(name: impl Into<String>, xml: &str) -> Self {
        Self {
            name: name.into(),
            mode: Mode::Fixture(xml.to_string()),
        }
    }
}

#[async_trait]
impl FeedSource for RssFeedSource {
    async fn fetch(&self) -> Result<FeedBatch, FeedError> {
        match &self.mode {
            Mode::Fixture(s) => parse_feed(s),
            Mode::Http { client } => {
                let resp = client.get(&self.name).send().await?;
                let status = resp.status();
                if !status.is_success() {
                    return Err(FeedError::Status(status.as_u16()));
                }
                let body = resp.text().await?;
                parse_feed(&body)
            }
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0">
  <channel>
    <title>Crypto Wire</title>
    <item>
      <title>Bitcoin options &amp; more</title>
      <link>https://example.test/a</link>
      <guid isPermaLink="false">urn:a</guid>
      <pubDate>Mon, 06 Jan 2025 14:00:00 GMT</pubDate>
      <description><![CDATA[<p>Desks see&nbsp;demand</p>]]></description>
    </item>
    <item>
      <title>No guid here</title>
      <link>https://example.test/b</link>
    </item>
  </channel>
</rss>"#;

    const ATOM: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title type="text">Atom Desk</title>
  <entry>
    <id>tag:example.test,2025:1</id>
    <title type="html">Perpetual futures volume</title>
    <link rel="self" href="https://example.test/self/1"/>
    <link rel="alternate" href="https://example.test/1"/>
    <updated>2025-01-06T10:00:00Z</updated>
    <summary>Open interest climbs</summary>
  </entry>
</feed>"#;

    #[test]
    fn parses_rss_items_and_guid() {
        let batch = parse_feed(RSS).unwrap();
        assert_eq!(batch.title.as_deref(), Some("Crypto Wire"));
        assert_eq!(batch.entries.len(), 2);

        let first = &batch.entries[0];
        assert_eq!(first.id.as_deref(), Some("urn:a"));
        assert_eq!(first.title.as_deref(), Some("Bitcoin options & more"));
        assert_eq!(first.summary.as_deref(), Some("<p>Desks see demand</p>"));
        assert!(first.published.is_some());

        assert_eq!(batch.entries[1].id, None);
        assert_eq!(batch.entries[1].link.as_deref(), Some("https://example.test/b"));
    }

    #[test]
    fn parses_atom_alternate_link() {
        let batch = parse_feed(ATOM).unwrap();
        assert_eq!(batch.title.as_deref(), Some("Atom Desk"));
        let e = &batch.entries[0];
        assert_eq!(e.link.as_deref(), Some("https://example.test/1"));
        assert_eq!(e.published.as_deref(), Some("2025-01-06T10:00:00Z"));
        assert_eq!(e.summary.as_deref(), Some("Open interest climbs"));
    }

    #[test]
    fn garbage_is_a_parse_error() {
        assert!(matches!(
            parse_feed("<html><body>nope</body></html>"),
            Err(FeedError::Parse(_))
        ));
    }
    #[test]
    fn rdf_feed_reads_plain_children_only() {
        let xml = r#"<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#"
            xmlns="http://purl.org/rss/1.0/" xmlns:dc="http://purl.org/dc/elements/1.1/">
          <channel><title>RDF Desk</title></channel>
          <item>
            <dc:title>wrong</dc:title>
            <title>Hedging with collars</title>
            <link>https://example.test/r1</link>
          </item>
        </rdf:RDF>"#;
        let batch = parse_feed(xml).unwrap();
        assert_eq!(batch.title.as_deref(), Some("RDF Desk"));
        assert_eq!(batch.entries.len(), 1);
        assert_eq!(batch.entries[0].title.as_deref(), Some("Hedging with collars"));
    }

    #[test]
    fn empty_document_is_a_parse_error() {
        assert!(matches!(parse_feed("   "), Err(FeedError::Parse(_))));
    }

    #[tokio::test]
    async fn stalled_server_hits_the_client_timeout() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let client = build_http_client(Duration::from_millis(200)).unwrap();
        let source = RssFeedSource::with_client(format!("http://{addr}/feed"), client);
        let started = std::time::Instant::now();
        match source.fetch().await {
            Err(FeedError::Http(e)) => assert!(e.is_timeout(), "{e}"),
            other => panic!("expected a timeout, got {other:?}"),
        }
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
