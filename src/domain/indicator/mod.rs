//! Technical indicator implementations.
//!
//! This module provides types for representing indicator values and series:
//! - `IndicatorPoint`: A single point in an indicator time series
//! - `IndicatorValue`: Enum for different indicator output shapes
//! - `IndicatorType`: Enum for indicator identity + parameters (serves as HashMap key)
//! - `IndicatorSeries`: A time series of indicator values
//!
//! Every series has one point per input bar. Points inside an indicator's
//! warmup are marked `valid: false`.

pub mod adx;
pub mod atr;
pub mod ema;
pub mod macd;
pub mod mfi;
pub mod obv;
pub mod rsi;
pub mod supertrend;

pub use adx::calculate_adx;
pub use atr::calculate_atr;
pub use ema::calculate_ema;
pub use macd::calculate_macd;
pub use mfi::calculate_mfi;
pub use obv::calculate_obv;
pub use rsi::calculate_rsi;
pub use supertrend::calculate_supertrend;

use chrono::NaiveDateTime;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorPoint {
    pub timestamp: NaiveDateTime,
    pub valid: bool,
    pub value: IndicatorValue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum IndicatorValue {
    Simple(f64),
    Macd {
        line: f64,
        signal: f64,
        histogram: f64,
    },
    Adx {
        adx: f64,
        plus_di: f64,
        minus_di: f64,
    },
    Supertrend {
        line: f64,
        uptrend: bool,
    },
}

impl IndicatorValue {
    pub fn simple(&self) -> Option<f64> {
        match self {
            IndicatorValue::Simple(v) => Some(*v),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndicatorType {
    Ema(usize),
    Rsi(usize),
    Adx(usize),
    Mfi(usize),
    Obv,
    Macd {
        fast: usize,
        slow: usize,
        signal: usize,
    },
    Supertrend {
        period: usize,
        multiplier_x100: u32,
    },
}

impl IndicatorType {
    /// Minimum number of bars before the first valid point.
    pub fn min_bars(&self) -> usize {
        match self {
            IndicatorType::Ema(n) => *n,
            IndicatorType::Rsi(n) | IndicatorType::Mfi(n) => n + 1,
            IndicatorType::Adx(n) => 2 * n,
            IndicatorType::Obv => 1,
            IndicatorType::Macd { fast, slow, signal } => fast.max(slow) + signal - 1,
            IndicatorType::Supertrend { period, .. } => *period,
        }
    }
}

#[derive(Debug, Clone)]
pub struct IndicatorSeries {
    pub indicator_type: IndicatorType,
    pub values: Vec<IndicatorPoint>,
}

impl IndicatorSeries {
    /// The final point, if it is past warmup.
    pub fn latest(&self) -> Option<&IndicatorValue> {
        self.values.last().filter(|p| p.valid).map(|p| &p.value)
    }

    /// The trailing `n` valid simple values, oldest first.
    pub fn tail_simple(&self, n: usize) -> Vec<f64> {
        let valid: Vec<f64> = self
            .values
            .iter()
            .filter(|p| p.valid)
            .filter_map(|p| p.value.simple())
            .collect();
        valid[valid.len().saturating_sub(n)..].to_vec()
    }
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Ema(period) => write!(f, "EMA({})", period),
            IndicatorType::Rsi(period) => write!(f, "RSI({})", period),
            IndicatorType::Adx(period) => write!(f, "ADX({})", period),
            IndicatorType::Mfi(period) => write!(f, "MFI({})", period),
            IndicatorType::Obv => write!(f, "OBV"),
            IndicatorType::Macd { fast, slow, signal } => {
                write!(f, "MACD({},{},{})", fast, slow, signal)
            }
            IndicatorType::Supertrend {
                period,
                multiplier_x100,
            } => {
                let mult = *multiplier_x100 as f64 / 100.0;
                write!(f, "SUPERTREND({},{})", period, mult)
            }
        }
    }
}

/// Placeholder point used during warmup.
pub(crate) fn warmup_point(timestamp: NaiveDateTime) -> IndicatorPoint {
    IndicatorPoint {
        timestamp,
        valid: false,
        value: IndicatorValue::Simple(0.0),
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indicator_type_display() {
        assert_eq!(IndicatorType::Ema(21).to_string(), "EMA(21)");
        assert_eq!(IndicatorType::Obv.to_string(), "OBV");
        let macd = IndicatorType::Macd {
            fast: 12,
            slow: 26,
            signal: 9,
        };
        assert_eq!(macd.to_string(), "MACD(12,26,9)");
        let st = IndicatorType::Supertrend {
            period: 7,
            multiplier_x100: 300,
        };
        assert_eq!(st.to_string(), "SUPERTREND(7,3)");
    }

    #[test]
    fn min_bars_per_indicator() {
        assert_eq!(IndicatorType::Ema(21).min_bars(), 21);
        assert_eq!(IndicatorType::Rsi(14).min_bars(), 15);
        assert_eq!(IndicatorType::Mfi(14).min_bars(), 15);
        assert_eq!(IndicatorType::Adx(14).min_bars(), 28);
        assert_eq!(IndicatorType::Obv.min_bars(), 1);
        assert_eq!(
            IndicatorType::Macd {
                fast: 12,
                slow: 26,
                signal: 9
            }
            .min_bars(),
            34
        );
        assert_eq!(
            IndicatorType::Supertrend {
                period: 7,
                multiplier_x100: 300
            }
            .min_bars(),
            7
        );
    }

    #[test]
    fn latest_requires_valid_point() {
        let series = IndicatorSeries {
            indicator_type: IndicatorType::Ema(3),
            values: vec![warmup_point(test_support::ts(0))],
        };
        assert!(series.latest().is_none());

        let series = IndicatorSeries {
            indicator_type: IndicatorType::Ema(1),
            values: vec![IndicatorPoint {
                timestamp: test_support::ts(0),
                valid: true,
                value: IndicatorValue::Simple(4.0),
            }],
        };
        assert_eq!(series.latest(), Some(&IndicatorValue::Simple(4.0)));
    }

    #[test]
    fn tail_simple_skips_warmup() {
        let mut values = vec![warmup_point(test_support::ts(0))];
        for i in 1..5 {
            values.push(IndicatorPoint {
                timestamp: test_support::ts(i),
                valid: true,
                value: IndicatorValue::Simple(i as f64),
            });
        }
        let series = IndicatorSeries {
            indicator_type: IndicatorType::Rsi(1),
            values,
        };
        assert_eq!(series.tail_simple(2), vec![3.0, 4.0]);
        assert_eq!(series.tail_simple(10), vec![1.0, 2.0, 3.0, 4.0]);
    }
}
