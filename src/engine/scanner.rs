//! Scan orchestrator.
//!
//! Walks the configured symbols strictly in order: fetch candles for the
//! trailing window, normalize, classify. Every symbol ends up with a
//! tagged [`SymbolOutcome`]. A fetch or parse failure is logged and
//! recorded against that symbol only; it never aborts the scan.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::signal::{evaluate, normalize};
use crate::config::Settings;
use crate::source::{CandleRequest, CandleSource};
use crate::types::{
    NoSignalReason, ResultTable, ScannerError, SymbolOutcome, SymbolStatus,
};

// ---------------------------------------------------------------------------
// Scan report
// ---------------------------------------------------------------------------

/// Everything one scan cycle produced.
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub scan_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// One entry per input symbol, in input order.
    pub outcomes: Vec<SymbolOutcome>,
}

impl ScanReport {
    /// BUY/SELL signals in input symbol order.
    pub fn table(&self) -> ResultTable {
        self.outcomes
            .iter()
            .filter_map(|o| o.signal().cloned())
            .collect()
    }

    pub fn failures(&self) -> impl Iterator<Item = &SymbolOutcome> {
        self.outcomes.iter().filter(|o| o.is_failure())
    }

    pub fn failure_count(&self) -> usize {
        self.failures().count()
    }

    pub fn symbols_scanned(&self) -> usize {
        self.outcomes.len()
    }
}

// ---------------------------------------------------------------------------
// Scanner
// ---------------------------------------------------------------------------

/// Sequential RSI scanner over a candle source.
#[derive(Clone)]
pub struct Scanner {
    source: Arc<dyn CandleSource>,
}

impl Scanner {
    pub fn new(source: Arc<dyn CandleSource>) -> Self {
        Self { source }
    }

    /// Scan all symbols using today's date for the request window.
    pub async fn scan(&self, symbols: &[String], settings: &Settings) -> ScanReport {
        self.scan_at(symbols, settings, Utc::now()).await
    }

    /// Scan all symbols as of `now`.
    ///
    /// Symbols are processed one at a time in input order. Duplicates are
    /// scanned again and can produce duplicate rows.
    pub async fn scan_at(
        &self,
        symbols: &[String],
        settings: &Settings,
        now: DateTime<Utc>,
    ) -> ScanReport {
        let scan_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(%scan_id, symbols = symbols.len(), granularity = %settings.granularity(), "Starting RSI scan");

        let mut outcomes = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            let status = match self.scan_symbol(symbol, settings, now).await {
                Ok(status) => status,
                Err(e) => {
                    warn!(%scan_id, symbol = %symbol, error = %e, "Symbol scan failed, skipping");
                    SymbolStatus::Failed {
                        kind: e.kind(),
                        message: e.to_string(),
                    }
                }
            };
            outcomes.push(SymbolOutcome {
                symbol: symbol.clone(),
                status,
            });
        }

        let report = ScanReport {
            scan_id,
            started_at,
            finished_at: Utc::now(),
            outcomes,
        };

        info!(
            %scan_id,
            scanned = report.symbols_scanned(),
            signals = report.table().len(),
            failed = report.failure_count(),
            "RSI scan complete"
        );

        report
    }

    /// Fetch → normalize → classify for a single symbol.
    async fn scan_symbol(
        &self,
        symbol: &str,
        settings: &Settings,
        now: DateTime<Utc>,
    ) -> Result<SymbolStatus, ScannerError> {
        let request = CandleRequest::trailing(symbol, settings, now.date_naive());
        let raw = self.source.fetch_candles(&request).await?;
        let series = normalize(symbol, &raw, settings.lookback_bars)?;

        let status = match evaluate(&series, settings) {
            Ok(signal) => {
                info!(
                    symbol,
                    action = %signal.action,
                    rsi = format!("{:.1}", signal.rsi),
                    price = signal.price,
                    "Signal"
                );
                SymbolStatus::Signal { signal }
            }
            Err(detail) => {
                match &detail {
                    NoSignalReason::InsufficientHistory { bars, required } => {
                        debug!(symbol, bars, required, "Insufficient history")
                    }
                    NoSignalReason::Neutral { rsi } => {
                        debug!(symbol, rsi = format!("{rsi:.1}"), bars = series.len(), "No signal")
                    }
                }
                SymbolStatus::NoSignal { detail }
            }
        };
        Ok(status)
    }
}

/// Timer for periodic scan cycles. The first tick fires immediately.
///
/// A cycle that overruns `every` pushes the next one back instead of
/// queueing catch-up scans.
pub fn cycle_timer(every: Duration) -> Interval {
    let mut timer = tokio::time::interval(every);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    timer
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
