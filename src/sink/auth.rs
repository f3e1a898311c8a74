// src/sink/auth.rs
//! Bearer tokens for the Sheets API.
//!
//! A fixed token is handed out as-is. A service-account key is exchanged at the
//! token endpoint with the JWT-bearer grant (RS256 assertion), and the result is
//! cached until `REFRESH_MARGIN` before the reported `expires_in`.

use std::time::{Duration, Instant};

use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use metrics::counter;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::config::{ServiceAccountKey, SheetsAuth, ENV_PRIVATE_KEY};
use crate::error::ConfigError;

pub const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
/// Longest assertion lifetime Google accepts.
const ASSERTION_TTL_SECS: i64 = 3600;
/// Used when the token response omits `expires_in`.
const DEFAULT_EXPIRES_IN_SECS: u64 = 3600;
pub const REFRESH_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub iss: String,
    pub scope: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<u64>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: Instant,
}

impl CachedToken {
    fn new(value: String, expires_in: Duration, issued: Instant) -> Self {
        Self {
            value,
            expires_at: issued + expires_in,
        }
    }

    fn is_fresh(&self, now: Instant) -> bool {
        self.expires_at
            .checked_sub(REFRESH_MARGIN)
            .is_some_and(|deadline| now < deadline)
    }
}

pub struct TokenSource {
    kind: Kind,
}

enum Kind {
    Fixed(String),
    ServiceAccount {
        account: ServiceAccountKey,
        key: EncodingKey,
        cached: Mutex<Option<CachedToken>>,
    },
}

impl TokenSource {
    /// Fails when the service-account key is not an RSA PEM.
    pub fn new(auth: SheetsAuth) -> Result<Self, ConfigError> {
        let kind = match auth {
            SheetsAuth::AccessToken(token) => Kind::Fixed(token),
            SheetsAuth::ServiceAccount(account) => {
                let key = EncodingKey::from_rsa_pem(account.private_key.as_bytes()).map_err(|e| {
                    ConfigError::Invalid(format!("{ENV_PRIVATE_KEY} is not an RSA PEM key: {e}"))
                })?;
                Kind::ServiceAccount {
                    account,
                    key,
                    cached: Mutex::new(None),
                }
            }
        };
        Ok(Self { kind })
    }

    /// Whether a rejected token can be replaced by minting a new one.
    pub fn refreshes(&self) -> bool {
        matches!(self.kind, Kind::ServiceAccount { .. })
    }

    /// Token for the next request. Mints one when nothing fresh is cached.
    pub async fn bearer(&self, client: &Client) -> Result<String, String> {
        match &self.kind {
            Kind::Fixed(token) => Ok(token.clone()),
            Kind::ServiceAccount {
                account,
                key,
                cached,
            } => {
                let mut slot = cached.lock().await;
                if let Some(tok) = slot.as_ref().filter(|t| t.is_fresh(Instant::now())) {
                    return Ok(tok.value.clone());
                }
                let fresh = mint(client, account, key).await?;
                let value = fresh.value.clone();
                *slot = Some(fresh);
                Ok(value)
            }
        }
    }

    /// Forget a cached token the API rejected.
    pub async fn invalidate(&self) {
        if let Kind::ServiceAccount { cached, .. } = &self.kind {
            *cached.lock().await = None;
        }
    }
}

async fn mint(
    client: &Client,
    account: &ServiceAccountKey,
    key: &EncodingKey,
) -> Result<CachedToken, String> {
    let issued = Instant::now();
    let assertion = sign_assertion(account, key, Utc::now().timestamp())?;

    let resp = client
        .post(&account.token_uri)
        .form(&[
            ("grant_type", JWT_BEARER_GRANT),
            ("assertion", assertion.as_str()),
        ])
        .send()
        .await
        .map_err(|e| format!("token request: {e}"))?;
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        tracing::warn!(%status, "token endpoint refused the assertion");
        return Err(format!("token endpoint returned {status}: {}", body.trim()));
    }
    let tr: TokenResponse = resp
        .json()
        .await
        .map_err(|e| format!("token response: {e}"))?;

    let expires_in = tr.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS);
    counter!("curator_sheets_token_mints_total").increment(1);
    tracing::info!(
        client_email = %account.client_email,
        expires_in,
        "minted sheets access token"
    );
    Ok(CachedToken::new(
        tr.access_token,
        Duration::from_secs(expires_in),
        issued,
    ))
}

/// RS256 assertion with the key id in the header.
pub fn sign_assertion(
    account: &ServiceAccountKey,
    key: &EncodingKey,
    iat: i64,
) -> Result<String, String> {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(account.private_key_id.clone());
    let claims = Claims {
        iss: account.client_email.clone(),
        scope: SHEETS_SCOPE.to_string(),
        aud: account.token_uri.clone(),
        iat,
        exp: iat + ASSERTION_TTL_SECS,
    };
    jsonwebtoken::encode(&header, &claims, key).map_err(|e| format!("signing assertion: {e}"))
}
