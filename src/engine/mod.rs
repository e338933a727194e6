//! Core engine: candle normalization, RSI, classification, and the scan loop.

pub mod indicator;
pub mod signal;
pub mod scanner;
