//! Indicator engine.
//!
//! Runs the configured indicator set over one ordered bar series and reduces
//! it to the latest readings the scorer consumes. A series shorter than the
//! longest lookback fails with `InsufficientHistory` instead of producing a
//! partially warmed-up reading.

use std::collections::HashMap;

use chrono::NaiveDateTime;

use crate::domain::error::TmvError;
use crate::domain::indicator::{
    calculate_adx, calculate_ema, calculate_macd, calculate_mfi, calculate_obv,
    calculate_rsi, calculate_supertrend, IndicatorSeries, IndicatorType, IndicatorValue,
};
use crate::domain::indicator::obv::obv_flow_ratio;
use crate::domain::indicator::{adx, macd, supertrend};
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::timeframe::Timeframe;

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorParams {
    pub ema_fast: usize,
    pub ema_slow: usize,
    pub rsi_period: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub adx_period: usize,
    pub mfi_period: usize,
    pub supertrend_period: usize,
    pub supertrend_multiplier: f64,
    /// Bars over which OBV flow is measured.
    pub obv_window: usize,
    /// Trailing RSI values inspected for reversal probability.
    pub reversal_window: usize,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        IndicatorParams {
            ema_fast: 8,
            ema_slow: 21,
            rsi_period: 14,
            macd_fast: macd::DEFAULT_FAST,
            macd_slow: macd::DEFAULT_SLOW,
            macd_signal: macd::DEFAULT_SIGNAL,
            adx_period: adx::DEFAULT_PERIOD,
            mfi_period: 14,
            supertrend_period: supertrend::DEFAULT_PERIOD,
            supertrend_multiplier: supertrend::DEFAULT_MULTIPLIER,
            obv_window: 10,
            reversal_window: 5,
        }
    }
}

impl IndicatorParams {
    fn supertrend_type(&self) -> IndicatorType {
        IndicatorType::Supertrend {
            period: self.supertrend_period,
            multiplier_x100: (self.supertrend_multiplier * 100.0).round() as u32,
        }
    }

    fn macd_type(&self) -> IndicatorType {
        IndicatorType::Macd {
            fast: self.macd_fast,
            slow: self.macd_slow,
            signal: self.macd_signal,
        }
    }

    pub fn indicator_types(&self) -> Vec<IndicatorType> {
        vec![
            IndicatorType::Ema(self.ema_fast),
            IndicatorType::Ema(self.ema_slow),
            self.supertrend_type(),
            self.macd_type(),
            IndicatorType::Rsi(self.rsi_period),
            IndicatorType::Adx(self.adx_period),
            IndicatorType::Obv,
            IndicatorType::Mfi(self.mfi_period),
        ]
    }

    /// Bars each indicator needs before its reading is usable, including the
    /// extra history for OBV flow and the RSI reversal window.
    pub fn lookbacks(&self) -> Vec<(IndicatorType, usize)> {
        self.indicator_types()
            .into_iter()
            .map(|t| {
                let need = match t {
                    IndicatorType::Obv => self.obv_window + 1,
                    IndicatorType::Rsi(_) => t.min_bars() + self.reversal_window.saturating_sub(1),
                    _ => t.min_bars(),
                };
                (t, need)
            })
            .collect()
    }

    /// The longest lookback across the indicator set.
    pub fn min_bars(&self) -> usize {
        self.lookbacks().into_iter().map(|(_, n)| n).max().unwrap_or(0)
    }
}

/// Latest indicator values for one (instrument, timeframe).
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorReadings {
    pub as_of: NaiveDateTime,
    pub close: f64,
    pub ema_fast: f64,
    pub ema_slow: f64,
    pub supertrend: f64,
    pub macd_histogram: f64,
    pub rsi: f64,
    /// Trailing RSI values, oldest first.
    pub recent_rsi: Vec<f64>,
    pub adx: f64,
    pub plus_di: f64,
    pub minus_di: f64,
    /// Net OBV change over the window divided by volume traded in it.
    pub obv_flow: f64,
    pub mfi: f64,
}

/// Compute every series in `types`; keyed by indicator type.
pub fn compute_indicators(
    bars: &[OhlcvBar],
    types: &[IndicatorType],
) -> HashMap<IndicatorType, IndicatorSeries> {
    let mut out = HashMap::new();
    for t in types {
        if out.contains_key(t) {
            continue;
        }
        let series = match *t {
            IndicatorType::Ema(n) => calculate_ema(bars, n),
            IndicatorType::Rsi(n) => calculate_rsi(bars, n),
            IndicatorType::Adx(n) => calculate_adx(bars, n),
            IndicatorType::Mfi(n) => calculate_mfi(bars, n),
            IndicatorType::Obv => calculate_obv(bars),
            IndicatorType::Macd { fast, slow, signal } => calculate_macd(bars, fast, slow, signal),
            IndicatorType::Supertrend {
                period,
                multiplier_x100,
            } => calculate_supertrend(bars, period, multiplier_x100 as f64 / 100.0),
        };
        out.insert(t.clone(), series);
    }
    out
}

/// Fails with `InsufficientHistory` naming the most demanding indicator the
/// series cannot satisfy.
pub fn check_history(
    bars: &[OhlcvBar],
    params: &IndicatorParams,
    symbol: &str,
    timeframe: Timeframe,
) -> Result<(), TmvError> {
    let shortfall = params
        .lookbacks()
        .into_iter()
        .filter(|(_, need)| bars.len() < *need)
        .max_by_key(|(_, need)| *need);

    match shortfall {
        Some((indicator, minimum)) => Err(TmvError::InsufficientHistory {
            symbol: symbol.to_string(),
            timeframe: timeframe.to_string(),
            indicator: indicator.to_string(),
            bars: bars.len(),
            minimum,
        }),
        None => Ok(()),
    }
}

/// Compute the latest readings for one ordered bar series.
pub fn compute_readings(
    bars: &[OhlcvBar],
    params: &IndicatorParams,
    symbol: &str,
    timeframe: Timeframe,
) -> Result<IndicatorReadings, TmvError> {
    check_history(bars, params, symbol, timeframe)?;

    let types = params.indicator_types();
    let series = compute_indicators(bars, &types);
    let latest = |t: &IndicatorType| -> Result<IndicatorValue, TmvError> {
        series
            .get(t)
            .and_then(|s| s.latest())
            .cloned()
            .ok_or_else(|| TmvError::InsufficientHistory {
                symbol: symbol.to_string(),
                timeframe: timeframe.to_string(),
                indicator: t.to_string(),
                bars: bars.len(),
                minimum: t.min_bars(),
            })
    };
    let simple = |t: &IndicatorType| -> Result<f64, TmvError> {
        Ok(latest(t)?.simple().unwrap_or(0.0))
    };

    let ema_fast_t = IndicatorType::Ema(params.ema_fast);
    let ema_slow_t = IndicatorType::Ema(params.ema_slow);
    let st_t = params.supertrend_type();
    let macd_t = params.macd_type();
    let rsi_t = IndicatorType::Rsi(params.rsi_period);
    let adx_t = IndicatorType::Adx(params.adx_period);
    let mfi_t = IndicatorType::Mfi(params.mfi_period);

    let supertrend = match latest(&st_t)? {
        IndicatorValue::Supertrend { line, .. } => line,
        _ => 0.0,
    };
    let macd_histogram = match latest(&macd_t)? {
        IndicatorValue::Macd { histogram, .. } => histogram,
        _ => 0.0,
    };
    let (adx, plus_di, minus_di) = match latest(&adx_t)? {
        IndicatorValue::Adx {
            adx,
            plus_di,
            minus_di,
        } => (adx, plus_di, minus_di),
        _ => (0.0, 0.0, 0.0),
    };

    let recent_rsi = series
        .get(&rsi_t)
        .map(|s| s.tail_simple(params.reversal_window))
        .unwrap_or_default();

    let last = &bars[bars.len() - 1];
    Ok(IndicatorReadings {
        as_of: last.timestamp,
        close: last.close,
        ema_fast: simple(&ema_fast_t)?,
        ema_slow: simple(&ema_slow_t)?,
        supertrend,
        macd_histogram,
        rsi: simple(&rsi_t)?,
        recent_rsi,
        adx,
        plus_di,
        minus_di,
        obv_flow: obv_flow_ratio(bars, params.obv_window).unwrap_or(0.0),
        mfi: simple(&mfi_t)?,
    })
}
