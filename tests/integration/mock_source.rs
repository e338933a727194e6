//! Mock candle source for integration testing.
//!
//! Provides a deterministic `CandleSource` implementation that returns
//! scripted candles per symbol, can fail individual symbols, and records
//! every request. Everything stays in memory.

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use rsi_scanner::source::{CandleRequest, CandleSource};
use rsi_scanner::types::{RawCandle, SourceError};

/// Scripted response for one symbol.
#[derive(Clone)]
pub enum Script {
    Candles(Vec<RawCandle>),
    Unavailable(String),
    Unauthorized,
    Malformed,
}

/// A mock candle source for deterministic testing.
#[derive(Clone, Default)]
pub struct MockCandleSource {
    scripts: HashMap<String, Script>,
    requests: Arc<Mutex<Vec<CandleRequest>>>,
}

impl MockCandleSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the response for `symbol`. Unscripted symbols get no candles.
    pub fn with(mut self, symbol: &str, script: Script) -> Self {
        self.scripts.insert(symbol.to_string(), script);
        self
    }

    /// Symbols requested so far, in call order.
    pub fn requested_symbols(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.symbol.clone())
            .collect()
    }

    pub fn requests(&self) -> Vec<CandleRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CandleSource for MockCandleSource {
    async fn fetch_candles(&self, request: &CandleRequest) -> Result<Vec<RawCandle>, SourceError> {
        self.requests.lock().unwrap().push(request.clone());

        match self.scripts.get(&request.symbol) {
            Some(Script::Candles(c)) => Ok(c.clone()),
            Some(Script::Unavailable(msg)) => Err(SourceError::Unavailable(msg.clone())),
            Some(Script::Unauthorized) => Err(SourceError::Unauthorized("token expired".into())),
            Some(Script::Malformed) => Err(SourceError::Malformed("missing data.candles".into())),
            None => Ok(Vec::new()),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}

// ---------------------------------------------------------------------------
// Candle builders
// ---------------------------------------------------------------------------

/// One-minute candles with the given closes, newest first as Upstox sends them.
pub fn candles_newest_first(closes: &[f64]) -> Vec<RawCandle> {
    let t0 = Utc.with_ymd_and_hms(2026, 3, 9, 3, 45, 0).unwrap();
    let mut out: Vec<RawCandle> = closes
        .iter()
        .enumerate()
        .map(|(i, &c)| {
            let ts = (t0 + Duration::minutes(i as i64))
                .with_timezone(&chrono::FixedOffset::east_opt(330 * 60).unwrap())
                .to_rfc3339();
            RawCandle::new(&ts, c, c + 0.5, c - 0.5, c, 1_000)
        })
        .collect();
    out.reverse();
    out
}

/// Steadily falling closes: RSI 0, BUY.
pub fn falling(n: usize) -> Vec<RawCandle> {
    candles_newest_first(&(0..n).map(|i| 500.0 - i as f64).collect::<Vec<_>>())
}

/// Steadily rising closes: RSI 100, SELL.
pub fn rising(n: usize) -> Vec<RawCandle> {
    candles_newest_first(&(0..n).map(|i| 500.0 + i as f64).collect::<Vec<_>>())
}

/// Alternating closes: RSI near 50, no signal.
pub fn choppy(n: usize) -> Vec<RawCandle> {
    candles_newest_first(&(0..n).map(|i| if i % 2 == 0 { 500.0 } else { 501.0 }).collect::<Vec<_>>())
}
