//! ADX (Average Directional Index), Wilder smoothing.
//!
//! 1. +DM = up move if it exceeds the down move and is positive, else 0;
//!    -DM likewise for the down move. TR is the true range.
//! 2. The first smoothed +DM, -DM and TR are the sums over changes 1..=n;
//!    afterwards S = S - S/n + current.
//! 3. +DI = 100 * S(+DM) / S(TR), -DI = 100 * S(-DM) / S(TR).
//! 4. DX = 100 * |+DI - -DI| / (+DI + -DI).
//! 5. The first ADX is the mean of the first n DX values; afterwards
//!    ADX = (prev * (n-1) + DX) / n.
//!
//! Warmup: the first valid ADX lands on bar 2n - 1.

use crate::domain::indicator::{warmup_point, IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::OhlcvBar;

pub const DEFAULT_PERIOD: usize = 14;

pub fn calculate_adx(bars: &[OhlcvBar], period: usize) -> IndicatorSeries {
    if period == 0 {
        return IndicatorSeries {
            indicator_type: IndicatorType::Adx(period),
            values: Vec::new(),
        };
    }

    let n = period as f64;
    let mut values = Vec::with_capacity(bars.len());
    if let Some(first) = bars.first() {
        values.push(warmup_point(first.timestamp));
    }

    let mut s_plus = 0.0;
    let mut s_minus = 0.0;
    let mut s_tr = 0.0;
    let mut dx_sum = 0.0;
    let mut adx = 0.0;

    for i in 1..bars.len() {
        let (cur, prev) = (&bars[i], &bars[i - 1]);
        let up = cur.high - prev.high;
        let down = prev.low - cur.low;
        let plus_dm = if up > down && up > 0.0 { up } else { 0.0 };
        let minus_dm = if down > up && down > 0.0 { down } else { 0.0 };
        let tr = cur.true_range(prev.close);

        if i <= period {
            s_plus += plus_dm;
            s_minus += minus_dm;
            s_tr += tr;
        } else {
            s_plus = s_plus - s_plus / n + plus_dm;
            s_minus = s_minus - s_minus / n + minus_dm;
            s_tr = s_tr - s_tr / n + tr;
        }

        if i < period {
            values.push(warmup_point(cur.timestamp));
            continue;
        }

        let (plus_di, minus_di) = if s_tr > 0.0 {
            (100.0 * s_plus / s_tr, 100.0 * s_minus / s_tr)
        } else {
            (0.0, 0.0)
        };
        let di_sum = plus_di + minus_di;
        let dx = if di_sum > 0.0 {
            100.0 * (plus_di - minus_di).abs() / di_sum
        } else {
            0.0
        };

        // i - period counts DX values seen so far, starting at 0.
        let dx_index = i - period;
        let valid = if dx_index < period - 1 {
            dx_sum += dx;
            false
        } else if dx_index == period - 1 {
            adx = (dx_sum + dx) / n;
            true
        } else {
            adx = (adx * (n - 1.0) + dx) / n;
            true
        };

        values.push(IndicatorPoint {
            timestamp: cur.timestamp,
            valid,
            value: IndicatorValue::Adx {
                adx: if valid { adx } else { 0.0 },
                plus_di,
                minus_di,
            },
        });
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Adx(period),
        values,
    }
}
