//! Dashboard routes served over the mock source.

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use std::sync::Arc;
use tower::ServiceExt;

use rsi_scanner::config::{DashboardConfig, Settings};
use rsi_scanner::dashboard::build_router;
use rsi_scanner::dashboard::routes::{DashboardState, ViewOptions};
use rsi_scanner::engine::scanner::Scanner;

use crate::mock_source::{falling, rising, MockCandleSource, Script};

fn app_state(source: MockCandleSource) -> Arc<DashboardState> {
    Arc::new(DashboardState::new(
        Scanner::new(Arc::new(source)),
        vec!["SBIN.NS".into(), "DOWN.NS".into(), "TCS.NS".into()],
        Settings::default(),
        ViewOptions::from(&DashboardConfig::default()),
    ))
}

async fn json_body(resp: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(resp.into_body(), 100_000).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_signals_table_with_failed_symbol() {
    let source = MockCandleSource::new()
        .with("SBIN.NS", Script::Candles(falling(30)))
        .with("DOWN.NS", Script::Unavailable("timeout".into()))
        .with("TCS.NS", Script::Candles(rising(30)));
    let state = app_state(source.clone());

    let resp = build_router(Arc::clone(&state))
        .oneshot(Request::builder().uri("/api/signals").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let json = json_body(resp).await;
    let rows = json["rows"].as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["Symbol"], "SBIN");
    assert_eq!(rows[0]["Action"], "BUY");
    assert_eq!(rows[1]["Symbol"], "TCS");
    assert_eq!(rows[1]["Action"], "SELL");
    assert_eq!(rows[1]["RSI"], "100.0");
    assert_eq!(json["failures"][0]["symbol"], "DOWN.NS");

    // Second viewer within the TTL is served from cache
    let resp = build_router(Arc::clone(&state))
        .oneshot(Request::builder().uri("/api/signals").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let again = json_body(resp).await;
    assert_eq!(again["scan_id"], json["scan_id"]);
    assert_eq!(source.requested_symbols().len(), 3);
}

#[tokio::test]
async fn test_manual_refresh_rescans() {
    let source = MockCandleSource::new().with("SBIN.NS", Script::Candles(falling(30)));
    let state = app_state(source.clone());

    let _ = build_router(Arc::clone(&state))
        .oneshot(Request::builder().uri("/api/signals").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let resp = build_router(Arc::clone(&state))
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/api/refresh")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(source.requested_symbols().len(), 6);
}

#[tokio::test]
async fn test_status_reports_cached_scan() {
    let state = app_state(MockCandleSource::new());

    let _ = build_router(Arc::clone(&state))
        .oneshot(Request::builder().uri("/api/signals").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let resp = build_router(state)
        .oneshot(Request::builder().uri("/api/status").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let json = json_body(resp).await;
    assert_eq!(json["symbols"], 3);
    assert!(json["last_scan_id"].is_string());
    assert_eq!(json["cache_ttl_secs"], 60);
}
