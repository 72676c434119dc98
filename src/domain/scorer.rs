//! Trend / Momentum / Volume scoring.
//!
//! Every indicator feeds exactly one category:
//!
//! | Signal          | Category |
//! |-----------------|----------|
//! | EMA fast/slow   | Trend    |
//! | Supertrend      | Trend    |
//! | MACD histogram  | Momentum |
//! | RSI             | Momentum |
//! | ADX (signed)    | Momentum |
//! | OBV flow        | Volume   |
//! | MFI             | Volume   |
//!
//! Each signal maps its reading into [-1, 1] with a clamped linear function
//! that is non-decreasing in the reading. A category score is the mean of its
//! signals; the timeframe TMV score is the category-weighted mean.

use std::fmt;

use crate::domain::engine::IndicatorReadings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Trend,
    Momentum,
    Volume,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    EmaSpread,
    Supertrend,
    MacdHistogram,
    Rsi,
    Adx,
    ObvFlow,
    Mfi,
}

impl Signal {
    pub const ALL: [Signal; 7] = [
        Signal::EmaSpread,
        Signal::Supertrend,
        Signal::MacdHistogram,
        Signal::Rsi,
        Signal::Adx,
        Signal::ObvFlow,
        Signal::Mfi,
    ];

    pub fn category(self) -> Category {
        match self {
            Signal::EmaSpread | Signal::Supertrend => Category::Trend,
            Signal::MacdHistogram | Signal::Rsi | Signal::Adx => Category::Momentum,
            Signal::ObvFlow | Signal::Mfi => Category::Volume,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strength {
    Strong,
    Moderate,
    Weak,
}

impl fmt::Display for Strength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            Strength::Strong => "Strong",
            Strength::Moderate => "Moderate",
            Strength::Weak => "Weak",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Bullish,
    Neutral,
    Bearish,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            Direction::Bullish => "Bullish",
            Direction::Neutral => "Neutral",
            Direction::Bearish => "Bearish",
        })
    }
}

/// Normalisation constants, category weights and label thresholds.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringConfig {
    /// EMA spread, in percent of the slow EMA, that maps to ±1.
    pub ema_scale_pct: f64,
    /// Close-to-supertrend distance, in percent, that maps to ±1.
    pub supertrend_scale_pct: f64,
    /// MACD histogram, in percent of close, that maps to ±1.
    pub macd_scale_pct: f64,
    pub rsi_neutral: f64,
    pub rsi_span: f64,
    /// ADX at or below the floor contributes nothing.
    pub adx_floor: f64,
    pub adx_span: f64,
    pub mfi_neutral: f64,
    pub mfi_span: f64,
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
    pub strong_above: f64,
    pub moderate_above: f64,
    pub bullish_above: f64,
    pub bearish_below: f64,
    pub trend_weight: f64,
    pub momentum_weight: f64,
    pub volume_weight: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        ScoringConfig {
            ema_scale_pct: 1.0,
            supertrend_scale_pct: 2.0,
            macd_scale_pct: 0.5,
            rsi_neutral: 50.0,
            rsi_span: 25.0,
            adx_floor: 20.0,
            adx_span: 30.0,
            mfi_neutral: 50.0,
            mfi_span: 25.0,
            rsi_oversold: 30.0,
            rsi_overbought: 70.0,
            strong_above: 0.5,
            moderate_above: 0.0,
            bullish_above: 0.3,
            bearish_below: -0.3,
            trend_weight: 0.4,
            momentum_weight: 0.4,
            volume_weight: 0.2,
        }
    }
}

impl ScoringConfig {
    pub fn weight(&self, category: Category) -> f64 {
        match category {
            Category::Trend => self.trend_weight,
            Category::Momentum => self.momentum_weight,
            Category::Volume => self.volume_weight,
        }
    }

    pub fn strength(&self, score: f64) -> Strength {
        if score >= self.strong_above {
            Strength::Strong
        } else if score > self.moderate_above {
            Strength::Moderate
        } else {
            Strength::Weak
        }
    }

    pub fn direction(&self, score: f64) -> Direction {
        if score >= self.bullish_above {
            Direction::Bullish
        } else if score <= self.bearish_below {
            Direction::Bearish
        } else {
            Direction::Neutral
        }
    }
}

/// One timeframe's scores for one instrument.
#[derive(Debug, Clone, PartialEq)]
pub struct TmvScore {
    pub trend: f64,
    pub momentum: f64,
    pub volume: f64,
    /// Category-weighted mean of the three sub-scores.
    pub tmv: f64,
    pub trend_strength: Strength,
    pub momentum_strength: Strength,
    pub volume_strength: Strength,
    pub direction: Direction,
    pub reversal_probability: f64,
}

fn clamp_unit(x: f64) -> f64 {
    if x.is_nan() { 0.0 } else { x.clamp(-1.0, 1.0) }
}

fn pct_of(numerator: f64, base: f64) -> f64 {
    if base == 0.0 { 0.0 } else { numerator / base * 100.0 }
}

/// A signal's normalised contribution in [-1, 1].
pub fn contribution(signal: Signal, r: &IndicatorReadings, cfg: &ScoringConfig) -> f64 {
    match signal {
        Signal::EmaSpread => {
            clamp_unit(pct_of(r.ema_fast - r.ema_slow, r.ema_slow) / cfg.ema_scale_pct)
        }
        Signal::Supertrend => {
            clamp_unit(pct_of(r.close - r.supertrend, r.supertrend) / cfg.supertrend_scale_pct)
        }
        Signal::MacdHistogram => {
            clamp_unit(pct_of(r.macd_histogram, r.close) / cfg.macd_scale_pct)
        }
        Signal::Rsi => clamp_unit((r.rsi - cfg.rsi_neutral) / cfg.rsi_span),
        Signal::Adx => {
            let strength = ((r.adx - cfg.adx_floor) / cfg.adx_span).clamp(0.0, 1.0);
            let sign = if r.plus_di > r.minus_di {
                1.0
            } else if r.plus_di < r.minus_di {
                -1.0
            } else {
                0.0
            };
            clamp_unit(sign * strength)
        }
        Signal::ObvFlow => clamp_unit(r.obv_flow),
        Signal::Mfi => clamp_unit((r.mfi - cfg.mfi_neutral) / cfg.mfi_span),
    }
}

/// Mean contribution of the signals in `category`, in [`Signal::ALL`] order.
pub fn category_score(category: Category, r: &IndicatorReadings, cfg: &ScoringConfig) -> f64 {
    let values: Vec<f64> = Signal::ALL
        .into_iter()
        .filter(|s| s.category() == category)
        .map(|s| contribution(s, r, cfg))
        .collect();
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Share of `recent` RSI values outside the oversold/overbought band.
pub fn reversal_probability(recent: &[f64], cfg: &ScoringConfig) -> f64 {
    if recent.is_empty() {
        return 0.0;
    }
    let extremes = recent
        .iter()
        .filter(|&&v| v < cfg.rsi_oversold || v > cfg.rsi_overbought)
        .count();
    extremes as f64 / recent.len() as f64
}

pub fn score(r: &IndicatorReadings, cfg: &ScoringConfig) -> TmvScore {
    let trend = category_score(Category::Trend, r, cfg);
    let momentum = category_score(Category::Momentum, r, cfg);
    let volume = category_score(Category::Volume, r, cfg);

    let total_weight = cfg.trend_weight + cfg.momentum_weight + cfg.volume_weight;
    let tmv = if total_weight > 0.0 {
        (cfg.trend_weight * trend + cfg.momentum_weight * momentum + cfg.volume_weight * volume)
            / total_weight
    } else {
        0.0
    };

    TmvScore {
        trend,
        momentum,
        volume,
        tmv,
        trend_strength: cfg.strength(trend),
        momentum_strength: cfg.strength(momentum),
        volume_strength: cfg.strength(volume),
        direction: cfg.direction(tmv),
        reversal_probability: reversal_probability(&r.recent_rsi, cfg),
    }
}
