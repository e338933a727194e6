//! Symbol list loading.
//!
//! One instrument identifier per line; surrounding whitespace is trimmed
//! and blank lines are ignored. Order is preserved and duplicates are
//! kept, since the scan reports one row per listed symbol.

use std::fs;
use std::path::Path;
use tracing::info;

use crate::types::ScannerError;

/// Parse symbols from file contents.
pub fn parse_symbols(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}

/// Load symbols from a file.
pub fn load_symbols(path: impl AsRef<Path>) -> Result<Vec<String>, ScannerError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|e| ScannerError::SymbolsFile {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    let symbols = parse_symbols(&contents);
    info!(path = %path.display(), count = symbols.len(), "Symbols loaded");
    Ok(symbols)
}
