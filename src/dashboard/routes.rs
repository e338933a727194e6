//! Dashboard API route handlers.
//!
//! All endpoints return JSON. State is shared via `Arc<DashboardState>`.
//! Scan results are cached for `cache_ttl`; every viewer inside that
//! window is served the same report. A stale cache is refreshed by a
//! scan on its own task, so it always runs to completion and fills the
//! cache even when the viewer that started it disconnects. Other viewers
//! wait for that scan rather than starting their own.

use axum::{extract::State, http::StatusCode, Json};
use chrono::{FixedOffset, Offset, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info};

use crate::config::{DashboardConfig, Settings};
use crate::engine::scanner::{ScanReport, Scanner};
use crate::types::{FailureKind, SignalRow, SymbolStatus};

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

struct CachedScan {
    report: Arc<ScanReport>,
    fetched_at: Instant,
}

/// Display options for the dashboard.
#[derive(Debug, Clone)]
pub struct ViewOptions {
    pub cache_ttl: Duration,
    pub auto_refresh_secs: u64,
    pub currency_symbol: String,
    pub utc_offset_minutes: i32,
}

impl From<&DashboardConfig> for ViewOptions {
    fn from(cfg: &DashboardConfig) -> Self {
        Self {
            cache_ttl: Duration::from_secs(cfg.cache_ttl_secs),
            auto_refresh_secs: cfg.auto_refresh_secs,
            currency_symbol: cfg.currency_symbol.clone(),
            utc_offset_minutes: cfg.utc_offset_minutes,
        }
    }
}

/// Shared state accessible by all route handlers.
pub struct DashboardState {
    scanner: Scanner,
    symbols: Arc<[String]>,
    settings: Settings,
    view: ViewOptions,
    /// Last completed scan. Only written briefly, so status reads never
    /// wait on a running scan.
    cache: Arc<RwLock<Option<CachedScan>>>,
    /// Held by the scan task for its whole run: at most one scan in flight.
    scan_lock: Arc<Mutex<()>>,
}

impl DashboardState {
    pub fn new(scanner: Scanner, symbols: Vec<String>, settings: Settings, view: ViewOptions) -> Self {
        Self {
            scanner,
            symbols: symbols.into(),
            settings,
            view,
            cache: Arc::new(RwLock::new(None)),
            scan_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Return the cached report, re-scanning if it is missing or stale.
    ///
    /// Fails only if the scan task itself panicked.
    pub async fn current_report(&self) -> Result<(Arc<ScanReport>, Duration), StatusCode> {
        if let Some(hit) = self.fresh_report().await {
            return Ok(hit);
        }

        let guard = Arc::clone(&self.scan_lock).lock_owned().await;
        // A scan that finished while we waited is fresh enough
        if let Some(hit) = self.fresh_report().await {
            return Ok(hit);
        }

        let scanner = self.scanner.clone();
        let symbols = Arc::clone(&self.symbols);
        let settings = self.settings.clone();
        let cache = Arc::clone(&self.cache);

        let task = tokio::spawn(async move {
            let _guard = guard;
            let report = Arc::new(scanner.scan(&symbols, &settings).await);
            *cache.write().await = Some(CachedScan {
                report: Arc::clone(&report),
                fetched_at: Instant::now(),
            });
            report
        });

        match task.await {
            Ok(report) => Ok((report, Duration::ZERO)),
            Err(e) => {
                error!(error = %e, "Dashboard scan task failed");
                Err(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }

    async fn fresh_report(&self) -> Option<(Arc<ScanReport>, Duration)> {
        let cache = self.cache.read().await;
        let cached = cache.as_ref()?;
        let age = cached.fetched_at.elapsed();
        (age < self.view.cache_ttl).then(|| (Arc::clone(&cached.report), age))
    }

    /// Drop the cached report so the next request re-scans.
    pub async fn invalidate(&self) {
        *self.cache.write().await = None;
    }

    async fn cache_age(&self) -> Option<(Duration, uuid::Uuid)> {
        self.cache
            .read()
            .await
            .as_ref()
            .map(|c| (c.fetched_at.elapsed(), c.report.scan_id))
    }

    fn local_time(&self) -> String {
        let offset = FixedOffset::east_opt(self.view.utc_offset_minutes * 60)
            .unwrap_or_else(|| Utc.fix());
        Utc::now().with_timezone(&offset).format("%I:%M %p").to_string()
    }
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct SignalsResponse {
    pub scan_id: String,
    pub scanned_at: String,
    pub cache_age_secs: u64,
    pub symbols_scanned: usize,
    pub signal_count: usize,
    pub rows: Vec<SignalRow>,
    pub failures: Vec<FailureEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailureEntry {
    pub symbol: String,
    pub kind: FailureKind,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub local_time: String,
    pub granularity: String,
    pub rsi_period: usize,
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
    pub lookback_bars: usize,
    pub history_days: u32,
    pub symbols: usize,
    pub cache_ttl_secs: u64,
    pub auto_refresh_secs: u64,
    pub cache_age_secs: Option<u64>,
    pub last_scan_id: Option<String>,
}

impl SignalsResponse {
    fn build(report: &ScanReport, age: Duration, currency: &str) -> Self {
        let table = report.table();
        let failures = report
            .failures()
            .filter_map(|o| match &o.status {
                SymbolStatus::Failed { kind, message } => Some(FailureEntry {
                    symbol: o.symbol.clone(),
                    kind: *kind,
                    message: message.clone(),
                }),
                _ => None,
            })
            .collect();

        Self {
            scan_id: report.scan_id.to_string(),
            scanned_at: report.finished_at.to_rfc3339(),
            cache_age_secs: age.as_secs(),
            symbols_scanned: report.symbols_scanned(),
            signal_count: table.len(),
            rows: table.rows(currency),
            failures,
        }
    }
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

pub type AppState = Arc<DashboardState>;

/// GET /api/signals
pub async fn get_signals(
    State(state): State<AppState>,
) -> Result<Json<SignalsResponse>, StatusCode> {
    let (report, age) = state.current_report().await?;
    Ok(Json(SignalsResponse::build(&report, age, &state.view.currency_symbol)))
}

/// POST /api/refresh
pub async fn refresh(State(state): State<AppState>) -> Result<Json<SignalsResponse>, StatusCode> {
    info!("Manual refresh requested");
    state.invalidate().await;
    get_signals(State(state)).await
}

/// GET /api/status
pub async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let cached = state.cache_age().await;
    let s = &state.settings;

    Json(StatusResponse {
        local_time: state.local_time(),
        granularity: s.granularity(),
        rsi_period: s.rsi_period,
        rsi_oversold: s.rsi_oversold,
        rsi_overbought: s.rsi_overbought,
        lookback_bars: s.lookback_bars,
        history_days: s.history_days,
        symbols: state.symbols.len(),
        cache_ttl_secs: state.view.cache_ttl.as_secs(),
        auto_refresh_secs: state.view.auto_refresh_secs,
        cache_age_secs: cached.map(|(age, _)| age.as_secs()),
        last_scan_id: cached.map(|(_, id)| id.to_string()),
    })
}

/// GET /health
pub async fn health() -> StatusCode {
    StatusCode::OK
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
