//! MACD (Moving Average Convergence Divergence).
//!
//! MACD Line = EMA(fast) - EMA(slow)
//! Signal Line = EMA(signal) of MACD Line, seeded with the SMA of its first
//! `signal` valid values
//! Histogram = MACD Line - Signal Line
//!
//! Default parameters: fast=12, slow=26, signal=9
//! Warmup: slow - 1 + signal - 1 bars

use crate::domain::indicator::{
    calculate_ema, IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue,
};
use crate::domain::ohlcv::OhlcvBar;

pub const DEFAULT_FAST: usize = 12;
pub const DEFAULT_SLOW: usize = 26;
pub const DEFAULT_SIGNAL: usize = 9;

pub fn calculate_macd(
    bars: &[OhlcvBar],
    fast: usize,
    slow: usize,
    signal_period: usize,
) -> IndicatorSeries {
    let indicator_type = IndicatorType::Macd {
        fast,
        slow,
        signal: signal_period,
    };

    if bars.is_empty() || fast == 0 || slow == 0 || signal_period == 0 {
        return IndicatorSeries {
            indicator_type,
            values: Vec::new(),
        };
    }

    let ema_fast = ema_raw_values(bars, fast);
    let ema_slow = ema_raw_values(bars, slow);

    let macd_line: Vec<f64> = ema_fast
        .iter()
        .zip(&ema_slow)
        .map(|(f, s)| f - s)
        .collect();

    let k = 2.0 / (signal_period as f64 + 1.0);
    let mut signal_line: Vec<f64> = vec![0.0; bars.len()];
    let line_warmup = fast.max(slow) - 1;
    let signal_warmup = line_warmup + signal_period - 1;

    if signal_warmup < bars.len() {
        let seed: f64 = macd_line[line_warmup..=signal_warmup].iter().sum();
        let mut signal_ema = seed / signal_period as f64;
        signal_line[signal_warmup] = signal_ema;

        for i in (signal_warmup + 1)..bars.len() {
            signal_ema = macd_line[i] * k + signal_ema * (1.0 - k);
            signal_line[i] = signal_ema;
        }
    }

    let values = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| IndicatorPoint {
            timestamp: bar.timestamp,
            valid: i >= signal_warmup,
            value: IndicatorValue::Macd {
                line: macd_line[i],
                signal: signal_line[i],
                histogram: macd_line[i] - signal_line[i],
            },
        })
        .collect();

    IndicatorSeries {
        indicator_type,
        values,
    }
}

/// Raw EMA values, 0.0 during warmup.
fn ema_raw_values(bars: &[OhlcvBar], period: usize) -> Vec<f64> {
    calculate_ema(bars, period)
        .values
        .iter()
        .map(|p| p.value.simple().unwrap_or(0.0))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_support::make_bars;

    fn macd_default(bars: &[OhlcvBar]) -> IndicatorSeries {
        calculate_macd(bars, DEFAULT_FAST, DEFAULT_SLOW, DEFAULT_SIGNAL)
    }

    fn rising(n: usize) -> Vec<OhlcvBar> {
        let prices: Vec<f64> = (0..n).map(|i| 100.0 + i as f64).collect();
        make_bars(&prices)
    }

    #[test]
    fn macd_warmup_default() {
        let series = macd_default(&rising(40));

        let warmup = DEFAULT_SLOW - 1 + DEFAULT_SIGNAL - 1;
        for i in 0..warmup {
            assert!(!series.values[i].valid, "Index {} should not be valid", i);
        }
        assert!(series.values[warmup].valid);
        assert_eq!(
            warmup + 1,
            series.indicator_type.min_bars(),
            "first valid point matches min_bars"
        );
    }

    #[test]
    fn macd_histogram_equals_line_minus_signal() {
        let series = macd_default(&rising(40));

        for point in series.values.iter().filter(|p| p.valid) {
            if let IndicatorValue::Macd {
                line,
                signal,
                histogram,
            } = point.value
            {
                assert!((histogram - (line - signal)).abs() < f64::EPSILON);
            } else {
                panic!("Expected Macd value");
            }
        }
    }

    #[test]
    fn macd_line_positive_in_uptrend() {
        let series = macd_default(&rising(50));
        match series.latest() {
            Some(IndicatorValue::Macd { line, .. }) => assert!(*line > 0.0),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn macd_line_is_ema_fast_minus_ema_slow() {
        let bars = make_bars(&[10.0, 20.0, 30.0, 40.0, 50.0, 60.0, 70.0, 80.0, 90.0, 100.0]);
        let series = calculate_macd(&bars, 3, 5, 2);

        let ema_fast = ema_raw_values(&bars, 3);
        let ema_slow = ema_raw_values(&bars, 5);

        for (i, point) in series.values.iter().enumerate() {
            if let IndicatorValue::Macd { line, .. } = point.value {
                assert!((line - (ema_fast[i] - ema_slow[i])).abs() < f64::EPSILON);
            }
        }
    }

    #[test]
    fn macd_degenerate_inputs() {
        let bars = make_bars(&[100.0, 101.0, 102.0]);
        assert!(macd_default(&[]).values.is_empty());
        assert!(calculate_macd(&bars, 0, 26, 9).values.is_empty());
        assert!(calculate_macd(&bars, 12, 0, 9).values.is_empty());
        assert!(calculate_macd(&bars, 12, 26, 0).values.is_empty());
    }

    #[test]
    fn macd_short_series_has_no_valid_points() {
        let series = macd_default(&rising(20));
        assert_eq!(series.values.len(), 20);
        assert!(series.values.iter().all(|p| !p.valid));
    }

    #[test]
    fn macd_custom_parameters() {
        let series = calculate_macd(&rising(20), 5, 10, 3);
        let warmup = 10 - 1 + 3 - 1;
        assert!(!series.values[warmup - 1].valid);
        assert!(series.values[warmup].valid);
    }
}
