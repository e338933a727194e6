//! Candle source integrations.
//!
//! Defines the `CandleSource` trait and the request shape shared by all
//! implementations. The Upstox historical-candle client is the only
//! production source.

pub mod upstox;

use async_trait::async_trait;
use chrono::{Duration, NaiveDate};

use crate::config::{CandleUnit, Settings};
use crate::types::{RawCandle, SourceError};

/// A historical candle request for one instrument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandleRequest {
    /// Symbol as listed in the symbols file (e.g. `INFY.NS`).
    pub symbol: String,
    pub unit: CandleUnit,
    pub interval: u32,
    /// Inclusive calendar-date window.
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
}

impl CandleRequest {
    /// Build a request covering the trailing `settings.history_days`
    /// calendar days up to and including `today`.
    pub fn trailing(symbol: &str, settings: &Settings, today: NaiveDate) -> Self {
        Self {
            symbol: symbol.to_string(),
            unit: settings.unit,
            interval: settings.interval,
            from_date: today - Duration::days(i64::from(settings.history_days)),
            to_date: today,
        }
    }
}

/// Abstraction over historical market-data providers.
///
/// Implementors return candles in whatever order the provider sends them;
/// normalization happens downstream. Authentication is the implementor's
/// concern, and a missing or rejected credential is a [`SourceError`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CandleSource: Send + Sync {
    async fn fetch_candles(&self, request: &CandleRequest) -> Result<Vec<RawCandle>, SourceError>;

    /// Source name for logging and identification.
    fn name(&self) -> &str;
}
