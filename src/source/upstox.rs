//! Upstox historical candle integration.
//!
//! API docs: https://upstox.com/developer/api-documentation/v3/get-historical-candle-data
//! Endpoint: `GET /v3/historical-candle/{instrument_key}/{unit}/{interval}/{to_date}/{from_date}`
//! Auth: `Authorization: Bearer {access_token}`. Tokens expire daily; the
//! OAuth exchange that produces them happens outside this process.
//!
//! Instrument keys look like `NSE_EQ|INE009A01021`. A static map from the
//! config is consulted first, then a `<segment>|<ticker>` fallback built
//! from the symbol's exchange suffix.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use super::{CandleRequest, CandleSource};
use crate::config::UpstoxConfig;
use crate::types::{RawCandle, SourceError};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

const SOURCE_NAME: &str = "upstox";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Exchange suffix → Upstox segment.
const SUFFIX_SEGMENTS: &[(&str, &str)] = &[(".NS", "NSE_EQ"), (".BO", "BSE_EQ")];

// ---------------------------------------------------------------------------
// API response types (Upstox JSON → Rust)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct CandleResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    data: Option<CandleData>,
    #[serde(default)]
    errors: Vec<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct CandleData {
    #[serde(default)]
    candles: Option<Vec<RawCandle>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiErrorDetail {
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl ApiErrorDetail {
    fn describe(&self) -> String {
        match (&self.error_code, &self.message) {
            (Some(code), Some(msg)) => format!("{code}: {msg}"),
            (None, Some(msg)) => msg.clone(),
            (Some(code), None) => code.clone(),
            (None, None) => "unknown error".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Instrument keys
// ---------------------------------------------------------------------------

/// Resolves scanner symbols to Upstox instrument keys.
#[derive(Debug, Clone)]
pub struct InstrumentResolver {
    overrides: HashMap<String, String>,
    default_segment: String,
}

impl InstrumentResolver {
    pub fn new(overrides: HashMap<String, String>, default_segment: impl Into<String>) -> Self {
        Self {
            overrides,
            default_segment: default_segment.into(),
        }
    }

    /// Static map first (by full symbol, then by bare ticker), else
    /// `<segment>|<ticker>` with the segment taken from the suffix.
    pub fn resolve(&self, symbol: &str) -> String {
        let symbol = symbol.trim();
        if let Some(key) = self.overrides.get(symbol) {
            return key.clone();
        }

        let (ticker, segment) = SUFFIX_SEGMENTS
            .iter()
            .find_map(|(suffix, segment)| symbol.strip_suffix(suffix).map(|t| (t, *segment)))
            .unwrap_or((symbol, self.default_segment.as_str()));

        if let Some(key) = self.overrides.get(ticker) {
            return key.clone();
        }
        format!("{segment}|{ticker}")
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Upstox historical candle client.
pub struct UpstoxClient {
    http: Client,
    base_url: String,
    access_token: Option<SecretString>,
    resolver: InstrumentResolver,
}

impl UpstoxClient {
    /// Create a new client.
    ///
    /// A missing token is not an error here: every fetch then fails with
    /// [`SourceError::MissingCredential`], which the scanner reports per
    /// symbol.
    pub fn new(config: &UpstoxConfig, access_token: Option<SecretString>) -> Result<Self, SourceError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent("rsi-scanner/0.1.0")
            .build()
            .map_err(|e| SourceError::Unavailable(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            access_token,
            resolver: InstrumentResolver::new(config.instruments.clone(), config.default_segment.clone()),
        })
    }

    pub fn has_credential(&self) -> bool {
        self.access_token.is_some()
    }

    /// Build the request URL for a candle request.
    fn candles_url(&self, request: &CandleRequest) -> String {
        let key = self.resolver.resolve(&request.symbol);
        format!(
            "{}/v3/historical-candle/{}/{}/{}/{}/{}",
            self.base_url,
            urlencoding::encode(&key),
            request.unit,
            request.interval,
            request.to_date.format(DATE_FORMAT),
            request.from_date.format(DATE_FORMAT),
        )
    }

    /// Interpret a response body. Split out so it can be tested offline.
    fn parse_body(status: StatusCode, body: &str) -> Result<Vec<RawCandle>, SourceError> {
        let parsed: Result<CandleResponse, _> = serde_json::from_str(body);

        if !status.is_success() {
            let message = parsed
                .ok()
                .and_then(|r| r.errors.first().map(ApiErrorDetail::describe))
                .unwrap_or_else(|| body.chars().take(200).collect());
            if status == StatusCode::UNAUTHORIZED {
                return Err(SourceError::Unauthorized(message));
            }
            return Err(SourceError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let resp = parsed.map_err(|e| SourceError::Malformed(format!("invalid JSON: {e}")))?;

        if resp.status.as_deref() == Some("error") {
            let message = resp
                .errors
                .first()
                .map(ApiErrorDetail::describe)
                .unwrap_or_else(|| "status=error".to_string());
            return Err(SourceError::Api {
                status: status.as_u16(),
                message,
            });
        }

        resp.data
            .and_then(|d| d.candles)
            .ok_or_else(|| SourceError::Malformed("missing data.candles".to_string()))
    }
}

// ---------------------------------------------------------------------------
// CandleSource trait implementation
// ---------------------------------------------------------------------------

#[async_trait]
impl CandleSource for UpstoxClient {
    async fn fetch_candles(&self, request: &CandleRequest) -> Result<Vec<RawCandle>, SourceError> {
        let token = self.access_token.as_ref().ok_or(SourceError::MissingCredential)?;
        let url = self.candles_url(request);

        debug!(symbol = %request.symbol, url = %url, "Fetching Upstox candles");

        let resp = self
            .http
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/json")
            .bearer_auth(token.expose_secret())
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;
        let candles = Self::parse_body(status, &body)?;

        debug!(symbol = %request.symbol, candles = candles.len(), "Upstox candles received");
        Ok(candles)
    }

    fn name(&self) -> &str {
        SOURCE_NAME
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
