//! MFI (Money Flow Index).
//!
//! Raw money flow = typical price * volume. A bar's flow counts as positive
//! when its typical price rose against the previous bar, negative when it
//! fell, and is ignored when unchanged.
//!
//! MFI = 100 - 100 / (1 + positive_sum / negative_sum) over the last n bars.
//! No negative flow: 100, or 50 when there is no positive flow either.
//!
//! Warmup: first n bars are invalid.

use crate::domain::indicator::{warmup_point, IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::OhlcvBar;

pub fn calculate_mfi(bars: &[OhlcvBar], period: usize) -> IndicatorSeries {
    if period == 0 {
        return IndicatorSeries {
            indicator_type: IndicatorType::Mfi(period),
            values: Vec::new(),
        };
    }

    // (positive, negative) flow per bar; bar 0 has no direction.
    let flows: Vec<(f64, f64)> = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            if i == 0 {
                return (0.0, 0.0);
            }
            let tp = bar.typical_price();
            let prev_tp = bars[i - 1].typical_price();
            let raw = tp * bar.volume as f64;
            if tp > prev_tp {
                (raw, 0.0)
            } else if tp < prev_tp {
                (0.0, raw)
            } else {
                (0.0, 0.0)
            }
        })
        .collect();

    let values = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            if i < period {
                return warmup_point(bar.timestamp);
            }
            let (positive, negative) = flows[i + 1 - period..=i]
                .iter()
                .fold((0.0, 0.0), |(p, n), &(pos, neg)| (p + pos, n + neg));
            IndicatorPoint {
                timestamp: bar.timestamp,
                valid: true,
                value: IndicatorValue::Simple(mfi_from_flows(positive, negative)),
            }
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::Mfi(period),
        values,
    }
}

fn mfi_from_flows(positive: f64, negative: f64) -> f64 {
    if negative == 0.0 {
        if positive == 0.0 { 50.0 } else { 100.0 }
    } else {
        100.0 - 100.0 / (1.0 + positive / negative)
    }
}
