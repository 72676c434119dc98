//! Supertrend.
//!
//! Basic bands are hl2 ± multiplier * ATR(n). The direction flips up when the
//! close breaks above the previous upper band and down when it breaks below
//! the previous lower band. While the direction holds, the active band only
//! ratchets in the trend's favour. The line is the lower band in an uptrend
//! and the upper band in a downtrend. Direction starts as up.
//!
//! Warmup: same as ATR(n), first (n-1) bars are invalid.

use crate::domain::indicator::{
    calculate_atr, warmup_point, IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue,
};
use crate::domain::ohlcv::OhlcvBar;

pub const DEFAULT_PERIOD: usize = 7;
pub const DEFAULT_MULTIPLIER: f64 = 3.0;

pub fn calculate_supertrend(bars: &[OhlcvBar], period: usize, multiplier: f64) -> IndicatorSeries {
    let indicator_type = IndicatorType::Supertrend {
        period,
        multiplier_x100: (multiplier * 100.0).round() as u32,
    };

    if period == 0 {
        return IndicatorSeries {
            indicator_type,
            values: Vec::new(),
        };
    }

    let atr = calculate_atr(bars, period);
    let start = period - 1;
    let mut values = Vec::with_capacity(bars.len());
    let mut uptrend = true;
    let mut prev_upper = 0.0;
    let mut prev_lower = 0.0;

    for (i, bar) in bars.iter().enumerate() {
        if i < start {
            values.push(warmup_point(bar.timestamp));
            continue;
        }

        let range = multiplier * atr[i].unwrap_or(0.0);
        let hl2 = bar.median_price();
        let mut upper = hl2 + range;
        let mut lower = hl2 - range;

        if i > start {
            if bar.close > prev_upper {
                uptrend = true;
            } else if bar.close < prev_lower {
                uptrend = false;
            } else {
                if uptrend && lower < prev_lower {
                    lower = prev_lower;
                }
                if !uptrend && upper > prev_upper {
                    upper = prev_upper;
                }
            }
        }

        values.push(IndicatorPoint {
            timestamp: bar.timestamp,
            valid: true,
            value: IndicatorValue::Supertrend {
                line: if uptrend { lower } else { upper },
                uptrend,
            },
        });
        prev_upper = upper;
        prev_lower = lower;
    }

    IndicatorSeries {
        indicator_type,
        values,
    }
}
