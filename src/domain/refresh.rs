//! Refresh cycle: fetch, compute, score, aggregate, publish.
//!
//! A cycle is one synchronous pass over the watchlist. Any failure for any
//! (instrument, timeframe) aborts the whole cycle before anything is
//! published, so the previously published snapshot stays current.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, FixedOffset, NaiveDateTime};
use tracing::{debug, info, warn};

use crate::domain::aggregator::{build_row, rank_rows, TimeframeWeights};
use crate::domain::config_validation::timeframe_section;
use crate::domain::engine::{compute_readings, IndicatorParams};
use crate::domain::error::TmvError;
use crate::domain::freshness::{check_freshness, default_max_age_minutes, prepare_bars};
use crate::domain::instrument::{dedupe_watchlist, Instrument};
use crate::domain::scorer::{score, ScoringConfig, TmvScore};
use crate::domain::snapshot::{RankedSnapshot, SnapshotCell};
use crate::domain::timeframe::Timeframe;
use crate::ports::data_port::DataPort;
use crate::ports::snapshot_port::SnapshotSink;

/// Per-timeframe refresh settings.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeframeSpec {
    pub timeframe: Timeframe,
    pub weight: f64,
    /// Calendar days of history requested from the data source.
    pub history_days: i64,
    pub max_age_minutes: i64,
}

impl TimeframeSpec {
    pub fn with_defaults(timeframe: Timeframe) -> Self {
        TimeframeSpec {
            timeframe,
            weight: 1.0,
            history_days: default_history_days(timeframe),
            max_age_minutes: default_max_age_minutes(timeframe),
        }
    }
}

/// Enough calendar days to cover the default lookback across weekends.
pub fn default_history_days(timeframe: Timeframe) -> i64 {
    match timeframe {
        Timeframe::Day => 120,
        Timeframe::Minute60 => 20,
        Timeframe::Minute30 => 10,
        _ => 5,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RefreshConfig {
    /// Sorted by timeframe, no duplicates.
    pub timeframes: Vec<TimeframeSpec>,
    pub indicators: IndicatorParams,
    pub scoring: ScoringConfig,
    /// When set, replaces the data source's watchlist.
    pub watchlist: Option<Vec<Instrument>>,
}

impl RefreshConfig {
    pub fn new(timeframes: Vec<TimeframeSpec>) -> Self {
        let mut timeframes = timeframes;
        timeframes.sort_by_key(|s| s.timeframe);
        timeframes.dedup_by_key(|s| s.timeframe);
        RefreshConfig {
            timeframes,
            indicators: IndicatorParams::default(),
            scoring: ScoringConfig::default(),
            watchlist: None,
        }
    }

    pub fn weights(&self) -> TimeframeWeights {
        self.timeframes
            .iter()
            .map(|s| (s.timeframe, s.weight))
            .collect()
    }

    pub fn timeframe_list(&self) -> Vec<Timeframe> {
        self.timeframes.iter().map(|s| s.timeframe).collect()
    }
}

/// Resets the in-progress flag when the cycle ends, however it ends.
struct CycleGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Runs refresh cycles one at a time and holds the latest snapshot.
#[derive(Debug)]
pub struct RefreshCoordinator {
    config: RefreshConfig,
    in_progress: AtomicBool,
    cell: SnapshotCell,
}

impl RefreshCoordinator {
    pub fn new(config: RefreshConfig) -> Self {
        RefreshCoordinator {
            config,
            in_progress: AtomicBool::new(false),
            cell: SnapshotCell::new(),
        }
    }

    pub fn config(&self) -> &RefreshConfig {
        &self.config
    }

    pub fn latest(&self) -> Option<Arc<RankedSnapshot>> {
        self.cell.load()
    }

    pub fn is_running(&self) -> bool {
        self.in_progress.load(Ordering::Acquire)
    }

    fn begin(&self) -> Result<CycleGuard<'_>, TmvError> {
        self.in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| TmvError::CycleInProgress)?;
        Ok(CycleGuard {
            flag: &self.in_progress,
        })
    }

    /// Run one cycle as of `now`. On success the snapshot has been handed to
    /// `sink` and swapped into the cell; on failure neither happens.
    pub fn run_cycle(
        &self,
        now: DateTime<FixedOffset>,
        data: &dyn DataPort,
        sink: &dyn SnapshotSink,
    ) -> Result<Arc<RankedSnapshot>, TmvError> {
        let _guard = self.begin()?;
        info!(as_of = %now, "refresh cycle started");

        let snapshot = match compute_snapshot(now, &self.config, data) {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "refresh cycle aborted, previous snapshot kept");
                return Err(e);
            }
        };

        if let Err(e) = sink.publish(&snapshot) {
            warn!(error = %e, "publish failed, previous snapshot kept");
            return Err(e);
        }

        let top = snapshot
            .rows
            .first()
            .map(|r| r.instrument.symbol().to_string())
            .unwrap_or_default();
        let published = self.cell.store(snapshot);
        info!(rows = published.rows.len(), top = %top, "snapshot published");
        Ok(published)
    }
}

/// The pure part of a cycle: build a ranked snapshot from the data source.
pub fn compute_snapshot(
    now: DateTime<FixedOffset>,
    config: &RefreshConfig,
    data: &dyn DataPort,
) -> Result<RankedSnapshot, TmvError> {
    let watchlist = match &config.watchlist {
        Some(list) => list.clone(),
        None => data.load_watchlist()?,
    };
    let watchlist = dedupe_watchlist(watchlist);
    if watchlist.is_empty() {
        return Err(TmvError::EmptyWatchlist);
    }
    debug!(instruments = watchlist.len(), timeframes = config.timeframes.len(), "watchlist loaded");

    let weights = config.weights();
    let local_now = now.naive_local();
    let mut rows = Vec::with_capacity(watchlist.len());

    for instrument in watchlist {
        let mut scores: BTreeMap<Timeframe, TmvScore> = BTreeMap::new();
        for spec in &config.timeframes {
            let tmv = score_timeframe(&instrument, spec, local_now, config, data)?;
            scores.insert(spec.timeframe, tmv);
        }
        rows.push(build_row(instrument, scores, &weights, &config.scoring));
    }

    Ok(RankedSnapshot {
        as_of: now,
        timeframes: config.timeframe_list(),
        rows: rank_rows(rows),
    })
}

fn score_timeframe(
    instrument: &Instrument,
    spec: &TimeframeSpec,
    now: NaiveDateTime,
    config: &RefreshConfig,
    data: &dyn DataPort,
) -> Result<TmvScore, TmvError> {
    let symbol = instrument.symbol();
    let from = Duration::try_days(spec.history_days)
        .and_then(|window| now.checked_sub_signed(window))
        .ok_or_else(|| {
            TmvError::invalid(
                &timeframe_section(spec.timeframe),
                "history_days",
                "history window is out of range",
            )
        })?;
    let raw = data.fetch_bars(instrument, spec.timeframe, from, now)?;
    let (bars, dropped) = prepare_bars(symbol, spec.timeframe, raw)?;
    if dropped > 0 {
        warn!(symbol, timeframe = %spec.timeframe, dropped, "duplicate bar timestamps dropped");
    }

    // An empty series fails on history, not freshness.
    if let Some(last) = bars.last() {
        check_freshness(symbol, spec.timeframe, last.timestamp, now, spec.max_age_minutes)?;
    }
    let readings = compute_readings(&bars, &config.indicators, symbol, spec.timeframe)?;
    let tmv = score(&readings, &config.scoring);
    debug!(
        symbol,
        timeframe = %spec.timeframe,
        bars = bars.len(),
        trend = tmv.trend,
        momentum = tmv.momentum,
        volume = tmv.volume,
        tmv = tmv.tmv,
        "timeframe scored"
    );
    Ok(tmv)
}
