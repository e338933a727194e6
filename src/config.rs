//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Scanner knobs may arrive as TOML numbers or numeric strings, and any
//! of them can be overridden by an `RSI_SCANNER_<KEY>` environment
//! variable. Everything is parsed and range-checked exactly once, in
//! [`Settings::from_config`]; computation code only ever sees `Settings`.
//!
//! Secrets (the access token) are referenced by env-var name in the
//! config and resolved at runtime.

use anyhow::{Context, Result};
use secrecy::SecretString;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::time::Duration;

use crate::types::ScannerError;

/// Prefix for scanner environment overrides.
pub const ENV_PREFIX: &str = "RSI_SCANNER_";

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub scanner: ScannerConfig,
    #[serde(default)]
    pub upstox: UpstoxConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
}

/// A scalar that may be written as a number or as text.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum ConfigValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl ConfigValue {
    fn as_text(&self) -> String {
        match self {
            ConfigValue::Int(v) => v.to_string(),
            ConfigValue::Float(v) => v.to_string(),
            ConfigValue::Text(s) => s.trim().to_string(),
        }
    }
}

impl From<&str> for ConfigValue {
    fn from(s: &str) -> Self {
        ConfigValue::Text(s.to_string())
    }
}

/// Raw `[scanner]` section, before validation.
#[derive(Debug, Deserialize, Clone)]
pub struct ScannerConfig {
    pub unit: ConfigValue,
    pub interval: ConfigValue,
    pub lookback_bars: ConfigValue,
    pub rsi_period: ConfigValue,
    pub rsi_oversold: ConfigValue,
    pub rsi_overbought: ConfigValue,
    #[serde(default = "default_history_days")]
    pub history_days: ConfigValue,
    #[serde(default = "default_symbols_file")]
    pub symbols_file: String,
    /// Headless loop period. Not part of [`Settings`]; see [`ScannerConfig::scan_interval`].
    #[serde(default = "default_scan_interval_secs")]
    pub scan_interval_secs: ConfigValue,
}

fn default_history_days() -> ConfigValue {
    ConfigValue::Int(7)
}

fn default_symbols_file() -> String {
    "stocks.txt".to_string()
}

fn default_scan_interval_secs() -> ConfigValue {
    ConfigValue::Int(60)
}

impl ScannerConfig {
    /// Apply `RSI_SCANNER_<KEY>` overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary lookup (keys carry [`ENV_PREFIX`]).
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(&format!("{ENV_PREFIX}{}", name.to_uppercase()));

        let fields: [(&str, &mut ConfigValue); 8] = [
            ("unit", &mut self.unit),
            ("interval", &mut self.interval),
            ("lookback_bars", &mut self.lookback_bars),
            ("rsi_period", &mut self.rsi_period),
            ("rsi_oversold", &mut self.rsi_oversold),
            ("rsi_overbought", &mut self.rsi_overbought),
            ("history_days", &mut self.history_days),
            ("scan_interval_secs", &mut self.scan_interval_secs),
        ];
        for (name, slot) in fields {
            if let Some(v) = get(name) {
                *slot = ConfigValue::Text(v);
            }
        }
        if let Some(v) = get("symbols_file") {
            self.symbols_file = v;
        }
    }

    /// Parse the headless scan period. Must be at least one second.
    pub fn scan_interval(&self) -> Result<Duration, ScannerError> {
        let secs: u64 = parse_field("scan_interval_secs", &self.scan_interval_secs)?;
        if secs == 0 {
            return Err(ScannerError::Config("scan_interval_secs must be > 0".into()));
        }
        Ok(Duration::from_secs(secs))
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct UpstoxConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_access_token_env")]
    pub access_token_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Exchange segment used when a symbol has no recognised suffix.
    #[serde(default = "default_segment")]
    pub default_segment: String,
    /// Static symbol → instrument key map, e.g. `INFY = "NSE_EQ|INE009A01021"`.
    #[serde(default)]
    pub instruments: HashMap<String, String>,
}

fn default_base_url() -> String {
    "https://api.upstox.com".to_string()
}

fn default_access_token_env() -> String {
    "UPSTOX_ACCESS_TOKEN".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_segment() -> String {
    "NSE_EQ".to_string()
}

impl Default for UpstoxConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            access_token_env: default_access_token_env(),
            timeout_secs: default_timeout_secs(),
            default_segment: default_segment(),
            instruments: HashMap::new(),
        }
    }
}

impl UpstoxConfig {
    /// Resolve the access token from the configured env var, if set.
    pub fn access_token(&self) -> Option<SecretString> {
        std::env::var(&self.access_token_env)
            .ok()
            .filter(|t| !t.trim().is_empty())
            .map(SecretString::new)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DashboardConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    #[serde(default = "default_auto_refresh_secs")]
    pub auto_refresh_secs: u64,
    #[serde(default = "default_currency_symbol")]
    pub currency_symbol: String,
    /// Offset applied to the clock shown on the dashboard (330 = IST).
    #[serde(default = "default_utc_offset_minutes")]
    pub utc_offset_minutes: i32,
}

fn default_port() -> u16 {
    8501
}

fn default_cache_ttl_secs() -> u64 {
    60
}

fn default_auto_refresh_secs() -> u64 {
    60
}

fn default_currency_symbol() -> String {
    "₹".to_string()
}

fn default_utc_offset_minutes() -> i32 {
    330
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_port(),
            cache_ttl_secs: default_cache_ttl_secs(),
            auto_refresh_secs: default_auto_refresh_secs(),
            currency_symbol: default_currency_symbol(),
            utc_offset_minutes: default_utc_offset_minutes(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::from_toml(&contents).with_context(|| format!("Failed to parse config file: {path}"))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        Ok(config)
    }
}

// ---------------------------------------------------------------------------
// Validated settings
// ---------------------------------------------------------------------------

/// Candle granularity unit accepted by the historical API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandleUnit {
    Minutes,
    Hours,
    Days,
    Weeks,
    Months,
}

impl CandleUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            CandleUnit::Minutes => "minutes",
            CandleUnit::Hours => "hours",
            CandleUnit::Days => "days",
            CandleUnit::Weeks => "weeks",
            CandleUnit::Months => "months",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "minute" | "minutes" => Some(CandleUnit::Minutes),
            "hour" | "hours" => Some(CandleUnit::Hours),
            "day" | "days" => Some(CandleUnit::Days),
            "week" | "weeks" => Some(CandleUnit::Weeks),
            "month" | "months" => Some(CandleUnit::Months),
            _ => None,
        }
    }
}

impl fmt::Display for CandleUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable, validated scanner settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub unit: CandleUnit,
    pub interval: u32,
    pub lookback_bars: usize,
    pub rsi_period: usize,
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
    /// Calendar days requested from the source, independent of `lookback_bars`.
    pub history_days: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            unit: CandleUnit::Minutes,
            interval: 1,
            lookback_bars: 100,
            rsi_period: 14,
            rsi_oversold: 30.0,
            rsi_overbought: 70.0,
            history_days: 7,
        }
    }
}

impl Settings {
    /// Parse and validate the raw `[scanner]` section.
    pub fn from_config(cfg: &ScannerConfig) -> Result<Self, ScannerError> {
        let unit_text = cfg.unit.as_text();
        let unit = CandleUnit::parse(&unit_text)
            .ok_or_else(|| ScannerError::Config(format!("unit: unknown candle unit '{unit_text}'")))?;

        let settings = Self {
            unit,
            interval: parse_field("interval", &cfg.interval)?,
            lookback_bars: parse_field("lookback_bars", &cfg.lookback_bars)?,
            rsi_period: parse_field("rsi_period", &cfg.rsi_period)?,
            rsi_oversold: parse_field("rsi_oversold", &cfg.rsi_oversold)?,
            rsi_overbought: parse_field("rsi_overbought", &cfg.rsi_overbought)?,
            history_days: parse_field("history_days", &cfg.history_days)?,
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Check cross-field invariants.
    pub fn validate(&self) -> Result<(), ScannerError> {
        let fail = |msg: String| -> Result<(), ScannerError> { Err(ScannerError::Config(msg)) };

        if self.rsi_period == 0 {
            return fail("rsi_period must be > 0".into());
        }
        if self.interval == 0 {
            return fail("interval must be > 0".into());
        }
        if self.history_days == 0 {
            return fail("history_days must be > 0".into());
        }
        for (name, v) in [
            ("rsi_oversold", self.rsi_oversold),
            ("rsi_overbought", self.rsi_overbought),
        ] {
            if !(0.0..=100.0).contains(&v) {
                return fail(format!("{name} must be within 0..=100, got {v}"));
            }
        }
        if self.rsi_oversold >= self.rsi_overbought {
            return fail(format!(
                "rsi_oversold ({}) must be below rsi_overbought ({})",
                self.rsi_oversold, self.rsi_overbought
            ));
        }
        if self.lookback_bars <= self.rsi_period {
            return fail(format!(
                "lookback_bars ({}) must exceed rsi_period ({})",
                self.lookback_bars, self.rsi_period
            ));
        }
        Ok(())
    }

    /// Human-readable granularity, e.g. "1 minutes".
    pub fn granularity(&self) -> String {
        format!("{} {}", self.interval, self.unit)
    }
}

fn parse_field<T>(name: &str, value: &ConfigValue) -> Result<T, ScannerError>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    let text = value.as_text();
    text.parse::<T>()
        .map_err(|e| ScannerError::Config(format!("{name}: cannot parse '{text}': {e}")))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
