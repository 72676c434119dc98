//! Configuration loading and validation.
//!
//! Reads every section the refresh cycle depends on and rejects invalid
//! values before any cycle runs. Keys that are absent take their documented
//! defaults; keys that are present but malformed are errors.

use std::str::FromStr;

use crate::domain::engine::IndicatorParams;
use crate::domain::error::TmvError;
use crate::domain::instrument::{parse_symbols, Instrument};
use crate::domain::refresh::{RefreshConfig, TimeframeSpec};
use crate::domain::scorer::ScoringConfig;
use crate::domain::timeframe::{parse_timeframes, Timeframe};
use crate::ports::config_port::ConfigPort;

pub const DEFAULT_TIMEFRAMES: &str = "15m,60m,1d";
pub const DEFAULT_EXCHANGE: &str = "NSE";
pub const DEFAULT_INTERVAL_SECONDS: i64 = 300;
/// Longest history window a timeframe may request.
pub const MAX_HISTORY_DAYS: i64 = 3650;
pub const MAX_AGE_MINUTES: i64 = MAX_HISTORY_DAYS * 24 * 60;
pub const MAX_SUPERTREND_MULTIPLIER: f64 = 100.0;
/// IST.
pub const DEFAULT_UTC_OFFSET_MINUTES: i64 = 330;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    Csv,
    Sqlite,
}

impl FromStr for DataSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "csv" => Ok(DataSource::Csv),
            "sqlite" => Ok(DataSource::Sqlite),
            other => Err(format!("unknown data source '{}', expected csv or sqlite", other)),
        }
    }
}

/// Cycle scheduling and clock settings from `[refresh]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    pub interval_seconds: u64,
    pub utc_offset_minutes: i32,
}

pub fn timeframe_section(timeframe: Timeframe) -> String {
    format!("timeframe.{}", timeframe.label())
}

fn parsed<T: FromStr>(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: T,
) -> Result<T, TmvError>
where
    T::Err: std::fmt::Display,
{
    match config.get_string(section, key) {
        None => Ok(default),
        Some(raw) if raw.trim().is_empty() => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| TmvError::invalid(section, key, format!("'{}': {}", raw.trim(), e))),
    }
}

fn positive_usize(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: usize,
) -> Result<usize, TmvError> {
    let value = parsed::<usize>(config, section, key, default)?;
    if value == 0 {
        return Err(TmvError::invalid(section, key, format!("{} must be at least 1", key)));
    }
    Ok(value)
}

fn positive_f64(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: f64,
) -> Result<f64, TmvError> {
    let value = parsed::<f64>(config, section, key, default)?;
    if !(value.is_finite() && value > 0.0) {
        return Err(TmvError::invalid(section, key, format!("{} must be positive", key)));
    }
    Ok(value)
}

fn non_negative_f64(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: f64,
) -> Result<f64, TmvError> {
    let value = parsed::<f64>(config, section, key, default)?;
    if !(value.is_finite() && value >= 0.0) {
        return Err(TmvError::invalid(section, key, format!("{} must be non-negative", key)));
    }
    Ok(value)
}

fn finite_f64(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: f64,
) -> Result<f64, TmvError> {
    let value = parsed::<f64>(config, section, key, default)?;
    if !value.is_finite() {
        return Err(TmvError::invalid(section, key, format!("{} must be finite", key)));
    }
    Ok(value)
}

pub fn data_source(config: &dyn ConfigPort) -> Result<DataSource, TmvError> {
    parsed(config, "data", "source", DataSource::Csv)
}

pub fn schedule(config: &dyn ConfigPort) -> Result<Schedule, TmvError> {
    let interval = parsed::<u64>(config, "refresh", "interval_seconds", DEFAULT_INTERVAL_SECONDS as u64)?;
    if interval == 0 {
        return Err(TmvError::invalid(
            "refresh",
            "interval_seconds",
            "interval_seconds must be at least 1",
        ));
    }
    let offset = parsed::<i32>(
        config,
        "refresh",
        "utc_offset_minutes",
        DEFAULT_UTC_OFFSET_MINUTES as i32,
    )?;
    if !(-720..=840).contains(&offset) {
        return Err(TmvError::invalid(
            "refresh",
            "utc_offset_minutes",
            "utc_offset_minutes must be between -720 and 840",
        ));
    }
    Ok(Schedule {
        interval_seconds: interval,
        utc_offset_minutes: offset,
    })
}

pub fn indicator_params(config: &dyn ConfigPort) -> Result<IndicatorParams, TmvError> {
    let d = IndicatorParams::default();
    let s = "indicators";
    let params = IndicatorParams {
        ema_fast: positive_usize(config, s, "ema_fast", d.ema_fast)?,
        ema_slow: positive_usize(config, s, "ema_slow", d.ema_slow)?,
        rsi_period: positive_usize(config, s, "rsi_period", d.rsi_period)?,
        macd_fast: positive_usize(config, s, "macd_fast", d.macd_fast)?,
        macd_slow: positive_usize(config, s, "macd_slow", d.macd_slow)?,
        macd_signal: positive_usize(config, s, "macd_signal", d.macd_signal)?,
        adx_period: positive_usize(config, s, "adx_period", d.adx_period)?,
        mfi_period: positive_usize(config, s, "mfi_period", d.mfi_period)?,
        supertrend_period: positive_usize(config, s, "supertrend_period", d.supertrend_period)?,
        supertrend_multiplier: positive_f64(
            config,
            s,
            "supertrend_multiplier",
            d.supertrend_multiplier,
        )?,
        obv_window: positive_usize(config, s, "obv_window", d.obv_window)?,
        reversal_window: positive_usize(config, s, "reversal_window", d.reversal_window)?,
    };

    if params.ema_fast >= params.ema_slow {
        return Err(TmvError::invalid(s, "ema_fast", "ema_fast must be less than ema_slow"));
    }
    if params.macd_fast >= params.macd_slow {
        return Err(TmvError::invalid(s, "macd_fast", "macd_fast must be less than macd_slow"));
    }
    let m = params.supertrend_multiplier;
    if m > MAX_SUPERTREND_MULTIPLIER {
        return Err(TmvError::invalid(
            s,
            "supertrend_multiplier",
            format!("supertrend_multiplier must be at most {}", MAX_SUPERTREND_MULTIPLIER),
        ));
    }
    // Multipliers are keyed in hundredths.
    if ((m * 100.0).round() - m * 100.0).abs() > 1e-6 {
        return Err(TmvError::invalid(
            s,
            "supertrend_multiplier",
            "supertrend_multiplier allows at most two decimals",
        ));
    }
    Ok(params)
}

pub fn scoring_config(config: &dyn ConfigPort) -> Result<ScoringConfig, TmvError> {
    let d = ScoringConfig::default();
    let s = "scoring";
    let scoring = ScoringConfig {
        ema_scale_pct: positive_f64(config, s, "ema_scale_pct", d.ema_scale_pct)?,
        supertrend_scale_pct: positive_f64(config, s, "supertrend_scale_pct", d.supertrend_scale_pct)?,
        macd_scale_pct: positive_f64(config, s, "macd_scale_pct", d.macd_scale_pct)?,
        rsi_neutral: finite_f64(config, s, "rsi_neutral", d.rsi_neutral)?,
        rsi_span: positive_f64(config, s, "rsi_span", d.rsi_span)?,
        adx_floor: non_negative_f64(config, s, "adx_floor", d.adx_floor)?,
        adx_span: positive_f64(config, s, "adx_span", d.adx_span)?,
        mfi_neutral: finite_f64(config, s, "mfi_neutral", d.mfi_neutral)?,
        mfi_span: positive_f64(config, s, "mfi_span", d.mfi_span)?,
        rsi_oversold: finite_f64(config, s, "rsi_oversold", d.rsi_oversold)?,
        rsi_overbought: finite_f64(config, s, "rsi_overbought", d.rsi_overbought)?,
        strong_above: finite_f64(config, s, "strong_above", d.strong_above)?,
        moderate_above: finite_f64(config, s, "moderate_above", d.moderate_above)?,
        bullish_above: finite_f64(config, s, "bullish_above", d.bullish_above)?,
        bearish_below: finite_f64(config, s, "bearish_below", d.bearish_below)?,
        trend_weight: non_negative_f64(config, s, "trend_weight", d.trend_weight)?,
        momentum_weight: non_negative_f64(config, s, "momentum_weight", d.momentum_weight)?,
        volume_weight: non_negative_f64(config, s, "volume_weight", d.volume_weight)?,
    };

    if scoring.rsi_oversold >= scoring.rsi_overbought {
        return Err(TmvError::invalid(
            s,
            "rsi_oversold",
            "rsi_oversold must be less than rsi_overbought",
        ));
    }
    if scoring.moderate_above >= scoring.strong_above {
        return Err(TmvError::invalid(
            s,
            "moderate_above",
            "moderate_above must be less than strong_above",
        ));
    }
    if scoring.bearish_below >= scoring.bullish_above {
        return Err(TmvError::invalid(
            s,
            "bearish_below",
            "bearish_below must be less than bullish_above",
        ));
    }
    if scoring.trend_weight + scoring.momentum_weight + scoring.volume_weight <= 0.0 {
        return Err(TmvError::invalid(
            s,
            "trend_weight",
            "category weights must not all be zero",
        ));
    }
    Ok(scoring)
}

pub fn timeframe_specs(config: &dyn ConfigPort) -> Result<Vec<TimeframeSpec>, TmvError> {
    let raw = config
        .get_string("refresh", "timeframes")
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_TIMEFRAMES.to_string());
    let timeframes = parse_timeframes(&raw)
        .map_err(|e| TmvError::invalid("refresh", "timeframes", e))?;

    let mut specs = Vec::with_capacity(timeframes.len());
    for tf in timeframes {
        let section = timeframe_section(tf);
        let d = TimeframeSpec::with_defaults(tf);
        let history_days = parsed::<i64>(config, &section, "history_days", d.history_days)?;
        if !(1..=MAX_HISTORY_DAYS).contains(&history_days) {
            return Err(TmvError::invalid(
                &section,
                "history_days",
                format!("history_days must be between 1 and {}", MAX_HISTORY_DAYS),
            ));
        }
        let max_age_minutes = parsed::<i64>(config, &section, "max_age_minutes", d.max_age_minutes)?;
        if !(1..=MAX_AGE_MINUTES).contains(&max_age_minutes) {
            return Err(TmvError::invalid(
                &section,
                "max_age_minutes",
                format!("max_age_minutes must be between 1 and {}", MAX_AGE_MINUTES),
            ));
        }
        specs.push(TimeframeSpec {
            timeframe: tf,
            weight: non_negative_f64(config, &section, "weight", d.weight)?,
            history_days,
            max_age_minutes,
        });
    }

    if specs.iter().map(|s| s.weight).sum::<f64>() <= 0.0 {
        return Err(TmvError::invalid(
            "refresh",
            "timeframes",
            "timeframe weights must not all be zero",
        ));
    }
    Ok(specs)
}

/// `[watchlist] symbols`, if set. The data source's own watchlist is used
/// otherwise.
pub fn configured_watchlist(config: &dyn ConfigPort) -> Result<Option<Vec<Instrument>>, TmvError> {
    let raw = match config.get_string("watchlist", "symbols") {
        Some(s) if !s.trim().is_empty() => s,
        _ => return Ok(None),
    };
    let exchange = config
        .get_string("watchlist", "exchange")
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_EXCHANGE.to_string());
    let symbols =
        parse_symbols(&raw).map_err(|e| TmvError::invalid("watchlist", "symbols", e))?;
    Ok(Some(
        symbols
            .iter()
            .map(|s| Instrument::new(s, &exchange, ""))
            .collect(),
    ))
}

pub fn load_refresh_config(config: &dyn ConfigPort) -> Result<RefreshConfig, TmvError> {
    let mut refresh = RefreshConfig::new(timeframe_specs(config)?);
    refresh.indicators = indicator_params(config)?;
    refresh.scoring = scoring_config(config)?;
    refresh.watchlist = configured_watchlist(config)?;
    Ok(refresh)
}

/// Every check `refresh` would make before running a cycle, including the
/// data source selection.
pub fn validate_config(config: &dyn ConfigPort) -> Result<RefreshConfig, TmvError> {
    let refresh = load_refresh_config(config)?;
    schedule(config)?;
    if data_source(config)? == DataSource::Csv {
        match config.get_string("data", "csv_dir") {
            Some(s) if !s.trim().is_empty() => {}
            _ => return Err(TmvError::missing("data", "csv_dir")),
        }
    }
    Ok(refresh)
}
