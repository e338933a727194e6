//! Wilder's Relative Strength Index.
//!
//! Seeded with the simple mean of the first `period` gains/losses, then
//! smoothed bar by bar with `avg = (avg * (period - 1) + current) / period`.
//! Only the value at the most recent bar is returned.
//!
//! Flat-price policy: when both averages are zero (no movement at all in
//! the window) the oscillator is reported as the neutral 50. When only
//! the average loss is zero the relative strength is infinite and the
//! oscillator is 100.

/// Neutral reading used when the window has no price movement.
pub const NEUTRAL_RSI: f64 = 50.0;

/// Compute the RSI at the last close.
///
/// Returns `None` when `period == 0` or fewer than `period + 1` closes
/// are available.
pub fn compute_rsi(closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 || closes.len() < period + 1 {
        return None;
    }

    let period_f = period as f64;
    let mut changes = closes.windows(2).map(|w| w[1] - w[0]);

    let (mut avg_gain, mut avg_loss) = changes
        .by_ref()
        .take(period)
        .fold((0.0, 0.0), |(g, l), c| (g + c.max(0.0), l + (-c).max(0.0)));
    avg_gain /= period_f;
    avg_loss /= period_f;

    for c in changes {
        avg_gain = (avg_gain * (period_f - 1.0) + c.max(0.0)) / period_f;
        avg_loss = (avg_loss * (period_f - 1.0) + (-c).max(0.0)) / period_f;
    }

    Some(rsi_from_averages(avg_gain, avg_loss))
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        if avg_gain == 0.0 {
            return NEUTRAL_RSI;
        }
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    (100.0 - 100.0 / (1.0 + rs)).clamp(0.0, 100.0)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
