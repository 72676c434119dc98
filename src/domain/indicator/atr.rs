//! ATR (Average True Range), Wilder smoothing.
//!
//! TR[0] = high - low, TR[i] = true range against the previous close.
//! Seed: mean of the first n true ranges; then ATR = (prev * (n-1) + TR) / n.
//!
//! Only Supertrend consumes ATR, so it is returned as a plain per-bar vector
//! rather than a keyed series.

use crate::domain::ohlcv::OhlcvBar;

/// ATR for each bar; `None` for the first (n-1) bars.
pub fn calculate_atr(bars: &[OhlcvBar], period: usize) -> Vec<Option<f64>> {
    if period == 0 {
        return Vec::new();
    }

    let mut values = Vec::with_capacity(bars.len());
    let mut sum = 0.0;
    let mut atr = 0.0;

    for (i, bar) in bars.iter().enumerate() {
        let tr = if i == 0 {
            bar.high - bar.low
        } else {
            bar.true_range(bars[i - 1].close)
        };

        if i < period - 1 {
            sum += tr;
            values.push(None);
            continue;
        }

        if i == period - 1 {
            atr = (sum + tr) / period as f64;
        } else {
            atr = (atr * (period - 1) as f64 + tr) / period as f64;
        }
        values.push(Some(atr));
    }

    values
}
