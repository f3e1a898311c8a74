// src/sink/sheets.rs
//! Google Sheets v4 REST sink (`values.get` / `values.append`) authenticated with
//! a bearer token from [`TokenSource`].

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::{Deserialize, Serialize};

use super::auth::TokenSource;
use super::{RowSink, SheetRow};
use crate::config::SheetCredentials;
use crate::error::{ConfigError, SinkError};

const SHEETS_API: &str = "https://sheets.googleapis.com/v4/spreadsheets/";
const HTTP_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Serialize)]
struct AppendBody<'a> {
    values: [&'a [String]; 1],
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

pub struct SheetsSink {
    client: Client,
    base: Url,
    sheet_id: String,
    range: String,
    tokens: TokenSource,
}

impl SheetsSink {
    pub fn new(creds: SheetCredentials) -> Result<Self, ConfigError> {
        Self::with_base_url(creds, SHEETS_API)
    }

    /// Point at another API root (a local stub in tests).
    pub fn with_base_url(creds: SheetCredentials, base: &str) -> Result<Self, ConfigError> {
        let base = Url::parse(base)
            .map_err(|e| ConfigError::Invalid(format!("bad sheets base url `{base}`: {e}")))?;
        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| ConfigError::Invalid(format!("sheets http client: {e}")))?;
        Ok(Self {
            client,
            base,
            sheet_id: creds.sheet_id,
            range: creds.range,
            tokens: TokenSource::new(creds.auth)?,
        })
    }

    /// `{base}{sheet_id}/values/{range}{suffix}` with the range percent-encoded.
    fn values_url(&self, range: &str, suffix: &str) -> Result<Url, String> {
        let mut url = self
            .base
            .join(&format!("{}/", self.sheet_id))
            .map_err(|e| e.to_string())?;
        url.path_segments_mut()
            .map_err(|_| "sheets base url cannot be a base".to_string())?
            .pop_if_empty()
            .push("values")
            .push(&format!("{range}{suffix}"));
        Ok(url)
    }

    /// `Sheet1!A:F` → `Sheet1!1:1`
    fn header_range(&self) -> String {
        match self.range.split_once('!') {
            Some((sheet, _)) => format!("{sheet}!1:1"),
            None => "1:1".to_string(),
        }
    }

    /// Send with a bearer token. A 401 on a minted token mints a new one and
    /// retries once.
    async fn send_authorized(
        &self,
        request: impl Fn(&str) -> RequestBuilder,
    ) -> Result<Response, String> {
        let token = self.tokens.bearer(&self.client).await?;
        let resp = request(&token).send().await.map_err(|e| e.to_string())?;
        if resp.status() != StatusCode::UNAUTHORIZED || !self.tokens.refreshes() {
            return Ok(resp);
        }

        tracing::warn!("sheets rejected the access token, minting a new one");
        self.tokens.invalidate().await;
        let token = self.tokens.bearer(&self.client).await?;
        request(&token).send().await.map_err(|e| e.to_string())
    }

    async fn get_values(&self, range: &str) -> Result<Vec<Vec<String>>, String> {
        let url = self.values_url(range, "")?;
        let resp = self
            .send_authorized(|token| self.client.get(url.clone()).bearer_auth(token))
            .await?
            .error_for_status()
            .map_err(|e| e.to_string())?;
        let vr: ValueRange = resp.json().await.map_err(|e| e.to_string())?;
        Ok(vr.values)
    }
}

#[async_trait::async_trait]
impl RowSink for SheetsSink {
    async fn check_connection(&self) -> Result<Vec<String>, SinkError> {
        let header = self
            .get_values(&self.header_range())
            .await
            .map_err(SinkError::Connection)?;
        Ok(header.into_iter().next().unwrap_or_default())
    }

    async fn append_row(&self, row: &SheetRow) -> Result<(), SinkError> {
        let mut url = self
            .values_url(&self.range, ":append")
            .map_err(SinkError::Append)?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "RAW")
            .append_pair("insertDataOption", "INSERT_ROWS");

        let values = row.to_values();
        let body = AppendBody {
            values: [values.as_slice()],
        };

        self.send_authorized(|token| self.client.post(url.clone()).bearer_auth(token).json(&body))
            .await
            .map_err(|e| SinkError::Append(format!("sheets append: {e}")))?
            .error_for_status()
            .map_err(|e| SinkError::Append(format!("sheets append non-2xx: {e}")))?;
        Ok(())
    }

    async fn read_rows(&self) -> Result<Vec<Vec<String>>, SinkError> {
        self.get_values(&self.range)
            .await
            .map_err(SinkError::Read)
    }
}
