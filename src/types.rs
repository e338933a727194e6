//! Shared types for the RSI scanner.
//!
//! These types form the data model used across all modules: raw candles
//! as the source returns them, normalized bars and series, the signal
//! produced by classification, and the per-symbol outcome of a scan.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Raw candles
// ---------------------------------------------------------------------------

/// One candle record exactly as the source returned it.
///
/// Upstox encodes candles as positional JSON arrays:
/// `[timestamp, open, high, low, close, volume, open_interest]`. The
/// timestamp may be an ISO-8601 string or epoch seconds, and any numeric
/// field may arrive as a string. Interpretation is deferred to
/// [`crate::engine::signal::normalize`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawCandle(pub Vec<serde_json::Value>);

impl RawCandle {
    /// Build a raw candle from an ISO-8601 timestamp and OHLCV values.
    pub fn new(timestamp: &str, open: f64, high: f64, low: f64, close: f64, volume: u64) -> Self {
        RawCandle(vec![
            serde_json::json!(timestamp),
            serde_json::json!(open),
            serde_json::json!(high),
            serde_json::json!(low),
            serde_json::json!(close),
            serde_json::json!(volume),
            serde_json::json!(0),
        ])
    }
}

// ---------------------------------------------------------------------------
// Bars
// ---------------------------------------------------------------------------

/// A single normalized OHLCV sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
    /// Not all instruments carry open interest; equities report 0.
    pub open_interest: u64,
}

/// Ordered, deduplicated bars for exactly one symbol.
///
/// Built once per scan cycle by `normalize` and never mutated afterwards.
/// Timestamps are strictly ascending.
#[derive(Debug, Clone, PartialEq)]
pub struct BarSeries {
    symbol: String,
    bars: Vec<Bar>,
}

impl BarSeries {
    /// Wrap bars that are already sorted ascending with unique timestamps.
    pub(crate) fn from_sorted(symbol: impl Into<String>, bars: Vec<Bar>) -> Self {
        debug_assert!(bars.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
        Self {
            symbol: symbol.into(),
            bars,
        }
    }

    pub fn empty(symbol: impl Into<String>) -> Self {
        Self::from_sorted(symbol, Vec::new())
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn closes(&self) -> impl Iterator<Item = f64> + '_ {
        self.bars.iter().map(|b| b.close)
    }

    pub fn last(&self) -> Option<&Bar> {
        self.bars.last()
    }
}

// ---------------------------------------------------------------------------
// Signals
// ---------------------------------------------------------------------------

/// Classification of an oscillator reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Buy,
    Sell,
    None,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Buy => write!(f, "BUY"),
            Action::Sell => write!(f, "SELL"),
            Action::None => write!(f, "NONE"),
        }
    }
}

/// A BUY or SELL signal for one symbol.
///
/// `price` and `rsi` keep full precision; rounding happens only when a
/// [`SignalRow`] is built for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub symbol: String,
    pub action: Action,
    pub price: f64,
    /// Wilder RSI at the most recent bar, in [0, 100].
    pub rsi: f64,
    pub bar_time: DateTime<Utc>,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} @ {:.2} (RSI {:.1})",
            self.action, self.symbol, self.price, self.rsi
        )
    }
}

/// Signals of one scan cycle, in input symbol order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ResultTable(Vec<Signal>);

impl ResultTable {
    pub fn signals(&self) -> &[Signal] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Display rows with the presentation rounding applied.
    pub fn rows(&self, currency: &str) -> Vec<SignalRow> {
        self.0.iter().map(|s| SignalRow::from_signal(s, currency)).collect()
    }

    /// Render as a fixed-width text table for terminal output.
    pub fn render_text(&self, currency: &str) -> String {
        if self.is_empty() {
            return "No RSI signals right now.".to_string();
        }

        let header = ["Symbol", "Action", "Price", "RSI"];
        let rows: Vec<[String; 4]> = self
            .rows(currency)
            .into_iter()
            .map(|r| [r.symbol, r.action, r.price, r.rsi])
            .collect();

        let mut widths = header.map(|h| h.chars().count());
        for row in &rows {
            for (w, cell) in widths.iter_mut().zip(row) {
                *w = (*w).max(cell.chars().count());
            }
        }

        let line = |cells: [&str; 4]| -> String {
            cells
                .iter()
                .zip(widths)
                .map(|(c, w)| format!("{c:<w$}"))
                .collect::<Vec<_>>()
                .join("  ")
                .trim_end()
                .to_string()
        };

        let mut out = format!("Found {} signal(s)\n", self.len());
        out.push_str(&line(header));
        out.push('\n');
        for row in &rows {
            out.push_str(&line([&row[0], &row[1], &row[2], &row[3]]));
            out.push('\n');
        }
        out
    }
}

impl FromIterator<Signal> for ResultTable {
    fn from_iter<I: IntoIterator<Item = Signal>>(iter: I) -> Self {
        ResultTable(iter.into_iter().collect())
    }
}

// ---------------------------------------------------------------------------
// Presentation rows
// ---------------------------------------------------------------------------

/// One rendered table row: `Symbol | Action | Price | RSI`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SignalRow {
    pub symbol: String,
    pub action: String,
    pub price: String,
    #[serde(rename = "RSI")]
    pub rsi: String,
}

impl SignalRow {
    pub fn from_signal(signal: &Signal, currency: &str) -> Self {
        Self {
            symbol: display_symbol(&signal.symbol).to_string(),
            action: signal.action.to_string(),
            price: format_price(signal.price, currency),
            rsi: format!("{:.1}", signal.rsi),
        }
    }
}

/// Strip the exchange suffix (`INFY.NS` → `INFY`).
pub fn display_symbol(symbol: &str) -> &str {
    symbol
        .strip_suffix(".NS")
        .or_else(|| symbol.strip_suffix(".BO"))
        .unwrap_or(symbol)
}

/// Format a price as `<currency>1,234.56`.
pub fn format_price(price: f64, currency: &str) -> String {
    let Some(value) = Decimal::from_f64(price) else {
        return format!("{currency}{price:.2}");
    };
    let value = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let text = format!("{value:.2}");
    let (sign, text) = match text.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", text.as_str()),
    };
    let (int_part, frac_part) = text.split_once('.').unwrap_or((text, "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    format!("{sign}{currency}{grouped}.{frac_part}")
}

// ---------------------------------------------------------------------------
// Per-symbol outcomes
// ---------------------------------------------------------------------------

/// Why a symbol produced no signal.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum NoSignalReason {
    /// Fewer than `period + 1` bars. Expected for thinly traded symbols.
    InsufficientHistory { bars: usize, required: usize },
    /// RSI inside the band, or exactly on a threshold.
    Neutral { rsi: f64 },
}

/// Coarse failure category. Both are handled the same way (row omitted).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    SourceUnavailable,
    MalformedResponse,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::SourceUnavailable => write!(f, "source unavailable"),
            FailureKind::MalformedResponse => write!(f, "malformed response"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SymbolStatus {
    Signal { signal: Signal },
    NoSignal { detail: NoSignalReason },
    Failed { kind: FailureKind, message: String },
}

/// Tagged result of scanning one symbol.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SymbolOutcome {
    pub symbol: String,
    #[serde(flatten)]
    pub status: SymbolStatus,
}

impl SymbolOutcome {
    pub fn signal(&self) -> Option<&Signal> {
        match &self.status {
            SymbolStatus::Signal { signal } => Some(signal),
            _ => None,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.status, SymbolStatus::Failed { .. })
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors returned by a [`crate::source::CandleSource`].
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("No access token configured")]
    MissingCredential,

    #[error("Access token rejected: {0}")]
    Unauthorized(String),

    #[error("Source unavailable: {0}")]
    Unavailable(String),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl SourceError {
    pub fn kind(&self) -> FailureKind {
        match self {
            SourceError::Malformed(_) => FailureKind::MalformedResponse,
            _ => FailureKind::SourceUnavailable,
        }
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            SourceError::Malformed(err.to_string())
        } else {
            SourceError::Unavailable(err.to_string())
        }
    }
}

/// Domain-specific error types for the scanner.
#[derive(Debug, thiserror::Error)]
pub enum ScannerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("Malformed candle at index {index}: {message}")]
    Malformed { index: usize, message: String },

    #[error("Symbols file error ({path}): {message}")]
    SymbolsFile { path: String, message: String },
}

impl ScannerError {
    pub fn kind(&self) -> FailureKind {
        match self {
            ScannerError::Source(e) => e.kind(),
            _ => FailureKind::MalformedResponse,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
