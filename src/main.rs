//! RSI Scanner entry point.
//!
//! Loads configuration, initialises structured logging, validates the
//! scanner settings, then either serves the dashboard (which scans on
//! demand behind a TTL cache) or runs a headless scan loop that prints
//! the signal table each cycle.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use rsi_scanner::config::{self, Settings};
use rsi_scanner::dashboard::{
    self,
    routes::{DashboardState, ViewOptions},
};
use rsi_scanner::engine::scanner::{cycle_timer, Scanner};
use rsi_scanner::source::upstox::UpstoxClient;
use rsi_scanner::source::CandleSource;
use rsi_scanner::symbols;

const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    init_logging();

    // Load configuration from TOML, then apply env overrides
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let mut cfg = config::AppConfig::load(&config_path)?;
    cfg.scanner.apply_env_overrides();

    // Invalid settings would mis-classify every symbol identically: fail now
    let settings = Settings::from_config(&cfg.scanner).context("Invalid scanner configuration")?;
    let scan_every = cfg.scanner.scan_interval().context("Invalid scanner configuration")?;
    let symbols = symbols::load_symbols(&cfg.scanner.symbols_file)?;

    info!(
        config = %config_path,
        granularity = %settings.granularity(),
        rsi_period = settings.rsi_period,
        oversold = settings.rsi_oversold,
        overbought = settings.rsi_overbought,
        lookback_bars = settings.lookback_bars,
        history_days = settings.history_days,
        symbols = symbols.len(),
        "RSI scanner starting up"
    );

    // -- Candle source ---------------------------------------------------

    let client = UpstoxClient::new(&cfg.upstox, cfg.upstox.access_token())?;
    if !client.has_credential() {
        warn!(
            env = %cfg.upstox.access_token_env,
            "No access token set; every symbol will fail until one is provided"
        );
    }
    info!(source = client.name(), base_url = %cfg.upstox.base_url, "Candle source ready");

    let scanner = Scanner::new(Arc::new(client));

    // -- Run -------------------------------------------------------------

    if cfg.dashboard.enabled {
        let state = Arc::new(DashboardState::new(
            scanner,
            symbols,
            settings,
            ViewOptions::from(&cfg.dashboard),
        ));
        dashboard::serve_dashboard(state, cfg.dashboard.port).await?;
    } else {
        run_headless(
            &scanner,
            &symbols,
            &settings,
            scan_every,
            &cfg.dashboard.currency_symbol,
        )
        .await;
    }

    info!("RSI scanner shut down cleanly.");
    Ok(())
}

/// Scan on a fixed interval and print each cycle's table until Ctrl+C.
async fn run_headless(
    scanner: &Scanner,
    symbols: &[String],
    settings: &Settings,
    every: Duration,
    currency: &str,
) {
    let mut interval = cycle_timer(every);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!(interval_secs = every.as_secs(), "Entering scan loop. Press Ctrl+C to stop.");

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let report = scanner.scan(symbols, settings).await;
                println!("{}", report.table().render_text(currency));
                for failed in report.failures() {
                    println!("  skipped {}", failed.symbol);
                }
            }
            _ = &mut shutdown => {
                info!("Shutdown signal received.");
                break;
            }
        }
    }
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("rsi_scanner=info"));

    let json_logging = std::env::var("RSI_SCANNER_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt().with_env_filter(env_filter).with_target(true).init();
    }
}
