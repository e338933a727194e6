//! Signal engine: candle normalization and RSI threshold classification.
//!
//! Both operations are pure. `normalize` turns whatever the source sent
//! into a clean [`BarSeries`]; `classify` reads the RSI at the last bar
//! and compares it against the configured band.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;
use std::collections::BTreeMap;

use super::indicator::compute_rsi;
use crate::config::Settings;
use crate::types::{Action, Bar, BarSeries, NoSignalReason, RawCandle, ScannerError, Signal};

/// Positional layout of a raw candle.
const TIMESTAMP: usize = 0;
const OPEN: usize = 1;
const HIGH: usize = 2;
const LOW: usize = 3;
const CLOSE: usize = 4;
const VOLUME: usize = 5;
const OPEN_INTEREST: usize = 6;

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Parse, sort, deduplicate and truncate raw candles.
///
/// - Timestamps may be ISO-8601 strings or epoch seconds.
/// - Numeric fields may be JSON numbers or numeric strings.
/// - Duplicate timestamps keep the last occurrence in source order.
/// - Only the `lookback_bars` most recent bars are retained.
///
/// Empty input yields an empty series. Any unparseable candle fails the
/// whole series, since a gap would silently shift the oscillator.
pub fn normalize(
    symbol: &str,
    raw: &[RawCandle],
    lookback_bars: usize,
) -> Result<BarSeries, ScannerError> {
    let mut by_time: BTreeMap<DateTime<Utc>, Bar> = BTreeMap::new();

    for (index, candle) in raw.iter().enumerate() {
        let bar = parse_candle(candle).map_err(|message| ScannerError::Malformed { index, message })?;
        by_time.insert(bar.timestamp, bar);
    }

    let skip = by_time.len().saturating_sub(lookback_bars);
    let bars: Vec<Bar> = by_time.into_values().skip(skip).collect();

    Ok(BarSeries::from_sorted(symbol, bars))
}

fn parse_candle(candle: &RawCandle) -> Result<Bar, String> {
    let fields = &candle.0;
    if fields.len() < 6 {
        return Err(format!("expected at least 6 fields, got {}", fields.len()));
    }

    let timestamp = parse_timestamp(&fields[TIMESTAMP])?;
    let price = |i: usize, name: &str| -> Result<f64, String> {
        let v = parse_number(&fields[i]).map_err(|e| format!("{name}: {e}"))?;
        if !v.is_finite() || v <= 0.0 {
            return Err(format!("{name}: expected a positive price, got {v}"));
        }
        Ok(v)
    };
    let count = |i: usize, name: &str| -> Result<u64, String> {
        let v = parse_number(&fields[i]).map_err(|e| format!("{name}: {e}"))?;
        if !v.is_finite() || v < 0.0 {
            return Err(format!("{name}: expected a non-negative count, got {v}"));
        }
        Ok(v.round() as u64)
    };

    Ok(Bar {
        timestamp,
        open: price(OPEN, "open")?,
        high: price(HIGH, "high")?,
        low: price(LOW, "low")?,
        close: price(CLOSE, "close")?,
        volume: count(VOLUME, "volume")?,
        open_interest: match fields.get(OPEN_INTEREST) {
            Some(Value::Null) | None => 0,
            Some(_) => count(OPEN_INTEREST, "open_interest")?,
        },
    })
}

fn parse_number(value: &Value) -> Result<f64, String> {
    match value {
        Value::Number(n) => n.as_f64().ok_or_else(|| format!("unrepresentable number {n}")),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| format!("not a number: '{s}'")),
        other => Err(format!("unexpected value {other}")),
    }
}

fn parse_timestamp(value: &Value) -> Result<DateTime<Utc>, String> {
    match value {
        Value::Number(n) => {
            let secs = n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64))
                .ok_or_else(|| format!("bad epoch timestamp {n}"))?;
            epoch_seconds(secs)
        }
        Value::String(s) => parse_timestamp_str(s.trim()),
        other => Err(format!("unexpected timestamp {other}")),
    }
}

fn epoch_seconds(secs: i64) -> Result<DateTime<Utc>, String> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| format!("epoch timestamp out of range: {secs}"))
}

fn parse_timestamp_str(s: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Ok(naive.and_utc());
        }
    }
    if let Ok(secs) = s.parse::<i64>() {
        return epoch_seconds(secs);
    }
    Err(format!("unrecognised timestamp '{s}'"))
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Map an RSI reading to an action. Both thresholds are exclusive.
pub fn action_for(rsi: f64, settings: &Settings) -> Action {
    if rsi < settings.rsi_oversold {
        Action::Buy
    } else if rsi > settings.rsi_overbought {
        Action::Sell
    } else {
        Action::None
    }
}

/// Evaluate a series, explaining why no signal was produced.
///
/// `settings` must have passed [`Settings::validate`]; in particular
/// `rsi_period` is non-zero, so a missing RSI always means too few bars.
pub fn evaluate(series: &BarSeries, settings: &Settings) -> Result<Signal, NoSignalReason> {
    debug_assert!(settings.validate().is_ok(), "evaluate called with unvalidated settings");
    let required = settings.rsi_period + 1;
    let closes: Vec<f64> = series.closes().collect();

    let (Some(rsi), Some(last)) = (compute_rsi(&closes, settings.rsi_period), series.last()) else {
        return Err(NoSignalReason::InsufficientHistory {
            bars: series.len(),
            required,
        });
    };

    match action_for(rsi, settings) {
        Action::None => Err(NoSignalReason::Neutral { rsi }),
        action => Ok(Signal {
            symbol: series.symbol().to_string(),
            action,
            price: last.close,
            rsi,
            bar_time: last.timestamp,
        }),
    }
}

/// Classify a series into a BUY/SELL signal, or `None`.
pub fn classify(series: &BarSeries, settings: &Settings) -> Option<Signal> {
    evaluate(series, settings).ok()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
