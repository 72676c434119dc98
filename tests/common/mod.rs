#![allow(dead_code)]

use chrono::{DateTime, Duration, FixedOffset, NaiveDateTime, TimeZone};
use std::cell::RefCell;
use std::collections::HashMap;
use tmvrank::domain::error::TmvError;
use tmvrank::domain::instrument::Instrument;
pub use tmvrank::domain::ohlcv::OhlcvBar;
use tmvrank::domain::snapshot::RankedSnapshot;
use tmvrank::domain::timeframe::Timeframe;
use tmvrank::ports::data_port::DataPort;
use tmvrank::ports::snapshot_port::{OnCommit, SnapshotSink, StagedSnapshot};

pub struct MockDataPort {
    pub watchlist: Vec<Instrument>,
    pub data: HashMap<(String, Timeframe), Vec<OhlcvBar>>,
    pub errors: HashMap<String, String>,
    pub fetches: RefCell<usize>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            watchlist: Vec::new(),
            data: HashMap::new(),
            errors: HashMap::new(),
            fetches: RefCell::new(0),
        }
    }

    /// Adds the symbol to the watchlist on first use.
    pub fn with_bars(mut self, symbol: &str, timeframe: Timeframe, bars: Vec<OhlcvBar>) -> Self {
        if !self.watchlist.iter().any(|i| i.symbol() == symbol) {
            self.watchlist.push(Instrument::new(symbol, "NSE", ""));
        }
        self.data.insert((symbol.to_string(), timeframe), bars);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn load_watchlist(&self) -> Result<Vec<Instrument>, TmvError> {
        Ok(self.watchlist.clone())
    }

    fn fetch_bars(
        &self,
        instrument: &Instrument,
        timeframe: Timeframe,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<OhlcvBar>, TmvError> {
        *self.fetches.borrow_mut() += 1;
        if let Some(reason) = self.errors.get(instrument.symbol()) {
            return Err(TmvError::upstream("mock", reason));
        }
        Ok(self
            .data
            .get(&(instrument.symbol().to_string(), timeframe))
            .map(|bars| {
                bars.iter()
                    .filter(|b| b.timestamp >= from && b.timestamp <= to)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn get_data_range(
        &self,
        instrument: &Instrument,
        timeframe: Timeframe,
    ) -> Result<Option<(NaiveDateTime, NaiveDateTime, usize)>, TmvError> {
        match self.data.get(&(instrument.symbol().to_string(), timeframe)) {
            Some(bars) if !bars.is_empty() => {
                let min = bars.iter().map(|b| b.timestamp).min().unwrap();
                let max = bars.iter().map(|b| b.timestamp).max().unwrap();
                Ok(Some((min, max, bars.len())))
            }
            _ => Ok(None),
        }
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub published: RefCell<Vec<RankedSnapshot>>,
}

impl SnapshotSink for RecordingSink {
    fn stage<'a>(&'a self, snapshot: &RankedSnapshot) -> Result<Box<dyn StagedSnapshot + 'a>, TmvError> {
        let snapshot = snapshot.clone();
        Ok(Box::new(OnCommit(move || {
            self.published.borrow_mut().push(snapshot);
            Ok::<(), TmvError>(())
        })))
    }
}

/// Refuses to stage.
pub struct FailingSink;

impl SnapshotSink for FailingSink {
    fn stage<'a>(&'a self, _snapshot: &RankedSnapshot) -> Result<Box<dyn StagedSnapshot + 'a>, TmvError> {
        Err(TmvError::Io(std::io::Error::other("disk full")))
    }
}

pub fn ist() -> FixedOffset {
    FixedOffset::east_opt(330 * 60).unwrap()
}

/// 2024-03-01 15:30 IST.
pub fn cycle_time() -> DateTime<FixedOffset> {
    ist().with_ymd_and_hms(2024, 3, 1, 15, 30, 0).unwrap()
}

/// Bars spaced one `timeframe` apart whose last bar opens one bar before
/// `now`. High and low sit one unit around close.
pub fn bars_ending(now: DateTime<FixedOffset>, timeframe: Timeframe, closes: &[f64]) -> Vec<OhlcvBar> {
    let last = now.naive_local() - Duration::minutes(timeframe.minutes());
    let n = closes.len();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| OhlcvBar {
            timestamp: last - Duration::minutes(timeframe.minutes()) * (n - 1 - i) as i32,
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 1000 + (i as i64 % 7) * 100,
        })
        .collect()
}

pub fn uptrend(n: usize) -> Vec<f64> {
    (0..n).map(|i| 100.0 + i as f64).collect()
}

pub fn downtrend(n: usize) -> Vec<f64> {
    (0..n).map(|i| 200.0 - i as f64).collect()
}

pub fn flat(n: usize) -> Vec<f64> {
    vec![100.0; n]
}

pub fn wavy(n: usize, phase: f64) -> Vec<f64> {
    (0..n)
        .map(|i| 100.0 + ((i as f64) * 0.4 + phase).sin() * 5.0 + i as f64 * 0.05)
        .collect()
}

pub fn minutes(n: i64) -> Duration {
    Duration::minutes(n)
}
