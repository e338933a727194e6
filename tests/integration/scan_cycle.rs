//! Full scan cycles against the mock source.

use chrono::{NaiveDate, TimeZone, Utc};
use std::sync::Arc;

use rsi_scanner::config::{AppConfig, Settings};
use rsi_scanner::engine::scanner::Scanner;
use rsi_scanner::symbols::parse_symbols;
use rsi_scanner::types::{Action, FailureKind, NoSignalReason, SymbolStatus};

use crate::mock_source::{choppy, falling, rising, MockCandleSource, Script};

fn symbols(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn now() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 9, 10, 0, 0).unwrap()
}

#[tokio::test]
async fn test_partial_failure_keeps_other_rows_in_order() {
    let source = MockCandleSource::new()
        .with("ONE.NS", Script::Candles(falling(40)))
        .with("TWO.NS", Script::Unavailable("connection refused".into()))
        .with("THREE.NS", Script::Candles(rising(40)));
    let scanner = Scanner::new(Arc::new(source.clone()));

    let report = scanner
        .scan_at(&symbols(&["ONE.NS", "TWO.NS", "THREE.NS"]), &Settings::default(), now())
        .await;

    let table = report.table();
    let got: Vec<_> = table
        .signals()
        .iter()
        .map(|s| (s.symbol.as_str(), s.action))
        .collect();
    assert_eq!(got, vec![("ONE.NS", Action::Buy), ("THREE.NS", Action::Sell)]);
    assert_eq!(report.failure_count(), 1);
    assert_eq!(report.outcomes[1].symbol, "TWO.NS");

    // Every symbol was attempted, in order
    assert_eq!(source.requested_symbols(), vec!["ONE.NS", "TWO.NS", "THREE.NS"]);
}

#[tokio::test]
async fn test_all_signals_in_input_order() {
    let source = MockCandleSource::new()
        .with("A", Script::Candles(rising(30)))
        .with("B", Script::Candles(falling(30)))
        .with("C", Script::Candles(rising(30)));
    let scanner = Scanner::new(Arc::new(source));

    let report = scanner
        .scan_at(&symbols(&["A", "B", "C"]), &Settings::default(), now())
        .await;

    let table = report.table();
    let order: Vec<_> = table.signals().iter().map(|s| s.symbol.as_str()).collect();
    assert_eq!(order, vec!["A", "B", "C"]);
}

#[tokio::test]
async fn test_every_failure_kind_is_isolated() {
    let source = MockCandleSource::new()
        .with("AUTH", Script::Unauthorized)
        .with("BROKEN", Script::Malformed)
        .with("OK", Script::Candles(falling(30)));
    let scanner = Scanner::new(Arc::new(source));

    let report = scanner
        .scan_at(&symbols(&["AUTH", "BROKEN", "OK"]), &Settings::default(), now())
        .await;

    let kinds: Vec<_> = report
        .outcomes
        .iter()
        .map(|o| match &o.status {
            SymbolStatus::Failed { kind, .. } => Some(*kind),
            _ => None,
        })
        .collect();
    assert_eq!(
        kinds,
        vec![
            Some(FailureKind::SourceUnavailable),
            Some(FailureKind::MalformedResponse),
            None
        ]
    );
    assert_eq!(report.table().len(), 1);
}

#[tokio::test]
async fn test_neutral_and_thin_symbols_produce_no_rows() {
    let source = MockCandleSource::new()
        .with("CHOPPY", Script::Candles(choppy(60)))
        .with("THIN", Script::Candles(falling(5)));
    let scanner = Scanner::new(Arc::new(source));

    let report = scanner
        .scan_at(&symbols(&["CHOPPY", "THIN", "UNLISTED"]), &Settings::default(), now())
        .await;

    assert!(report.table().is_empty());
    assert_eq!(report.failure_count(), 0);
    assert!(matches!(
        report.outcomes[0].status,
        SymbolStatus::NoSignal { detail: NoSignalReason::Neutral { .. } }
    ));
    assert_eq!(
        report.outcomes[1].status,
        SymbolStatus::NoSignal {
            detail: NoSignalReason::InsufficientHistory { bars: 5, required: 15 }
        }
    );
    assert_eq!(
        report.outcomes[2].status,
        SymbolStatus::NoSignal {
            detail: NoSignalReason::InsufficientHistory { bars: 0, required: 15 }
        }
    );
}

#[tokio::test]
async fn test_lookback_truncation_uses_latest_close() {
    // 500 bars newest-first; only the latest 100 are kept
    let source = MockCandleSource::new().with("X", Script::Candles(falling(500)));
    let scanner = Scanner::new(Arc::new(source));

    let report = scanner
        .scan_at(&symbols(&["X"]), &Settings::default(), now())
        .await;

    let table = report.table();
    let signal = &table.signals()[0];
    assert_eq!(signal.price, 500.0 - 499.0);
    assert_eq!(signal.action, Action::Buy);
}

#[tokio::test]
async fn test_config_driven_cycle() {
    let cfg = AppConfig::from_toml(
        r#"
[scanner]
unit = "minutes"
interval = "5"
lookback_bars = "50"
rsi_period = "7"
rsi_oversold = "25"
rsi_overbought = "75"
history_days = "3"
"#,
    )
    .unwrap();
    let settings = Settings::from_config(&cfg.scanner).unwrap();
    let list = parse_symbols("\nINFY.NS\n\nTCS.NS\n");

    let source = MockCandleSource::new()
        .with("INFY.NS", Script::Candles(falling(20)))
        .with("TCS.NS", Script::Candles(choppy(20)));
    let scanner = Scanner::new(Arc::new(source.clone()));

    let report = scanner.scan_at(&list, &settings, now()).await;
    let rows = report.table().rows("₹");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].symbol, "INFY");
    assert_eq!(rows[0].action, "BUY");
    assert_eq!(rows[0].price, "₹481.00");
    assert_eq!(rows[0].rsi, "0.0");

    let req = &source.requests()[0];
    assert_eq!(req.interval, 5);
    assert_eq!(req.from_date, NaiveDate::from_ymd_opt(2026, 3, 6).unwrap());
    assert_eq!(req.to_date, NaiveDate::from_ymd_opt(2026, 3, 9).unwrap());
}
