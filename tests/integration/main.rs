//! End-to-end tests: mock candle source → scanner → table / dashboard.

mod dashboard;
mod mock_source;
mod scan_cycle;
