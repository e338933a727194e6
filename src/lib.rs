//! RSI Scanner: momentum signals over brokerage historical candles.
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod symbols;
pub mod source;
pub mod engine;
pub mod dashboard;
