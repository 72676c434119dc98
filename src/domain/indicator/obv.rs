//! OBV (On-Balance Volume).

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::OhlcvBar;

/// Calculate OBV (On-Balance Volume) indicator.
///
/// OBV[0] = volume[0]
/// If close[i] > close[i-1]: OBV[i] = OBV[i-1] + volume[i]
/// If close[i] < close[i-1]: OBV[i] = OBV[i-1] - volume[i]
/// If close[i] == close[i-1]: OBV[i] = OBV[i-1]
///
/// No warmup period; all bars are valid.
pub fn calculate_obv(bars: &[OhlcvBar]) -> IndicatorSeries {
    let mut values = Vec::with_capacity(bars.len());
    let mut obv: f64 = 0.0;
    let mut prev_close: f64 = 0.0;

    for (i, bar) in bars.iter().enumerate() {
        if i == 0 {
            obv = bar.volume as f64;
        } else if bar.close > prev_close {
            obv += bar.volume as f64;
        } else if bar.close < prev_close {
            obv -= bar.volume as f64;
        }
        prev_close = bar.close;

        values.push(IndicatorPoint {
            timestamp: bar.timestamp,
            valid: true,
            value: IndicatorValue::Simple(obv),
        });
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Obv,
        values,
    }
}

/// Net OBV change over the last `window` bars as a share of the volume traded
/// in that window. Always within [-1, 1]; 0 when no volume traded.
pub fn obv_flow_ratio(bars: &[OhlcvBar], window: usize) -> Option<f64> {
    if window == 0 || bars.len() < window + 1 {
        return None;
    }
    let series = calculate_obv(bars);
    let end = series.values.len() - 1;
    let start = end - window;
    let delta = series.values[end].value.simple()? - series.values[start].value.simple()?;
    let traded: f64 = bars[start + 1..=end].iter().map(|b| b.volume as f64).sum();
    if traded == 0.0 {
        return Some(0.0);
    }
    Some(delta / traded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_support::make_hlc;

    fn bars(rows: &[(f64, i64)]) -> Vec<OhlcvBar> {
        let hlc: Vec<(f64, f64, f64, i64)> =
            rows.iter().map(|&(c, v)| (c, c, c, v)).collect();
        make_hlc(&hlc)
    }

    fn value_at(series: &IndicatorSeries, i: usize) -> f64 {
        series.values[i].value.simple().unwrap()
    }

    #[test]
    fn obv_first_bar_is_volume() {
        let series = calculate_obv(&bars(&[(100.0, 1000)]));
        assert_eq!(series.values.len(), 1);
        assert!(series.values[0].valid);
        assert!((value_at(&series, 0) - 1000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn obv_up_down_flat() {
        let series = calculate_obv(&bars(&[
            (100.0, 1000),
            (105.0, 500),
            (95.0, 300),
            (95.0, 700),
        ]));
        assert!((value_at(&series, 1) - 1500.0).abs() < f64::EPSILON);
        assert!((value_at(&series, 2) - 1200.0).abs() < f64::EPSILON);
        assert!((value_at(&series, 3) - 1200.0).abs() < f64::EPSILON);
        assert!(series.values.iter().all(|p| p.valid));
        assert_eq!(series.indicator_type, IndicatorType::Obv);
    }

    #[test]
    fn flow_ratio_all_up_is_one() {
        let b = bars(&[(100.0, 10), (101.0, 20), (102.0, 30)]);
        assert_eq!(obv_flow_ratio(&b, 2), Some(1.0));
    }

    #[test]
    fn flow_ratio_mixed() {
        // last 2: +20 then -30 over 50 traded
        let b = bars(&[(100.0, 10), (101.0, 20), (100.0, 30)]);
        let ratio = obv_flow_ratio(&b, 2).unwrap();
        assert!((ratio - (-10.0 / 50.0)).abs() < 1e-12);
    }

    #[test]
    fn flow_ratio_needs_window_plus_one_bars() {
        let b = bars(&[(100.0, 10), (101.0, 20)]);
        assert_eq!(obv_flow_ratio(&b, 2), None);
        assert_eq!(obv_flow_ratio(&b, 0), None);
    }

    #[test]
    fn flow_ratio_zero_volume() {
        let b = bars(&[(100.0, 0), (101.0, 0), (102.0, 0)]);
        assert_eq!(obv_flow_ratio(&b, 2), Some(0.0));
    }
}
