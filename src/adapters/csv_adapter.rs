//! CSV directory data adapter.
//!
//! Layout under the base directory:
//!
//! - `watchlist.csv`: `symbol[,exchange[,provider_id]]` with a header row.
//! - `<SYMBOL>_<EXCHANGE>_<TF>.csv`: `timestamp,open,high,low,close,volume`,
//!   where `<TF>` is the timeframe label (`15m`, `1d`).
//!
//! Timestamps may be `YYYY-MM-DD`, `YYYY-MM-DD HH:MM:SS`, ISO `T`-separated,
//! or RFC 3339 with an offset (taken as exchange-local wall time).

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::domain::error::TmvError;
use crate::domain::instrument::Instrument;
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::timeframe::Timeframe;
use crate::ports::data_port::DataPort;

const SOURCE: &str = "csv";
const DEFAULT_EXCHANGE: &str = "NSE";

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    pub fn watchlist_path(&self) -> PathBuf {
        self.base_path.join("watchlist.csv")
    }

    pub fn bars_path(&self, instrument: &Instrument, timeframe: Timeframe) -> PathBuf {
        self.base_path.join(format!(
            "{}_{}_{}.csv",
            instrument.symbol(),
            instrument.exchange(),
            timeframe.label()
        ))
    }

    fn read_all(&self, path: &Path) -> Result<Vec<OhlcvBar>, TmvError> {
        let content = fs::read_to_string(path).map_err(|e| {
            TmvError::upstream(SOURCE, format!("failed to read {}: {}", path.display(), e))
        })?;
        parse_bars(&content, path)
    }
}

pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_local());
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(ts);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

fn field<T>(record: &csv::StringRecord, idx: usize, name: &str, path: &Path) -> Result<T, TmvError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let line = record.position().map(|p| p.line()).unwrap_or(0);
    let raw = record.get(idx).ok_or_else(|| {
        TmvError::upstream(
            SOURCE,
            format!("{}:{}: missing {} column", path.display(), line, name),
        )
    })?;
    raw.trim().parse().map_err(|e| {
        TmvError::upstream(
            SOURCE,
            format!("{}:{}: invalid {} '{}': {}", path.display(), line, name, raw, e),
        )
    })
}

fn price(record: &csv::StringRecord, idx: usize, name: &str, path: &Path) -> Result<f64, TmvError> {
    let value: f64 = field(record, idx, name, path)?;
    if !value.is_finite() {
        return Err(invalid_row(record, name, value, path));
    }
    Ok(value)
}

/// Volume may be written as a float; it must round to a count that fits `i64`.
fn volume(record: &csv::StringRecord, path: &Path) -> Result<i64, TmvError> {
    let value: f64 = field(record, 5, "volume", path)?;
    let rounded = value.round();
    if !rounded.is_finite() || rounded < 0.0 || rounded >= i64::MAX as f64 {
        return Err(invalid_row(record, "volume", value, path));
    }
    Ok(rounded as i64)
}

fn invalid_row(record: &csv::StringRecord, name: &str, value: f64, path: &Path) -> TmvError {
    let line = record.position().map(|p| p.line()).unwrap_or(0);
    TmvError::upstream(
        SOURCE,
        format!("{}:{}: {} out of range: {}", path.display(), line, name, value),
    )
}

/// Parse a bar file body. Rows come back in file order.
pub fn parse_bars(content: &str, path: &Path) -> Result<Vec<OhlcvBar>, TmvError> {
    let mut rdr = csv::Reader::from_reader(content.as_bytes());
    let mut bars = Vec::new();

    for result in rdr.records() {
        let record = result.map_err(|e| {
            TmvError::upstream(SOURCE, format!("{}: CSV parse error: {}", path.display(), e))
        })?;

        let raw_ts = record.get(0).unwrap_or_default();
        let timestamp = parse_timestamp(raw_ts).ok_or_else(|| {
            TmvError::upstream(
                SOURCE,
                format!("{}: invalid timestamp '{}'", path.display(), raw_ts),
            )
        })?;

        bars.push(OhlcvBar {
            timestamp,
            open: price(&record, 1, "open", path)?,
            high: price(&record, 2, "high", path)?,
            low: price(&record, 3, "low", path)?,
            close: price(&record, 4, "close", path)?,
            volume: volume(&record, path)?,
        });
    }

    Ok(bars)
}

impl DataPort for CsvAdapter {
    fn load_watchlist(&self) -> Result<Vec<Instrument>, TmvError> {
        let path = self.watchlist_path();
        let content = fs::read_to_string(&path).map_err(|e| {
            TmvError::upstream(SOURCE, format!("failed to read {}: {}", path.display(), e))
        })?;

        let mut rdr = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(content.as_bytes());
        let mut instruments = Vec::new();
        for result in rdr.records() {
            let record = result.map_err(|e| {
                TmvError::upstream(SOURCE, format!("{}: CSV parse error: {}", path.display(), e))
            })?;
            let symbol = record.get(0).unwrap_or_default().trim();
            if symbol.is_empty() {
                continue;
            }
            let exchange = record
                .get(1)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .unwrap_or(DEFAULT_EXCHANGE);
            let provider_id = record.get(2).unwrap_or_default();
            instruments.push(Instrument::new(symbol, exchange, provider_id));
        }
        Ok(instruments)
    }

    fn fetch_bars(
        &self,
        instrument: &Instrument,
        timeframe: Timeframe,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<OhlcvBar>, TmvError> {
        let path = self.bars_path(instrument, timeframe);
        let mut bars = self.read_all(&path)?;
        bars.retain(|b| b.timestamp >= from && b.timestamp <= to);
        bars.sort_by_key(|b| b.timestamp);
        Ok(bars)
    }

    fn get_data_range(
        &self,
        instrument: &Instrument,
        timeframe: Timeframe,
    ) -> Result<Option<(NaiveDateTime, NaiveDateTime, usize)>, TmvError> {
        let path = self.bars_path(instrument, timeframe);
        if !path.exists() {
            return Ok(None);
        }
        let bars = self.read_all(&path)?;
        let first = bars.iter().map(|b| b.timestamp).min();
        let last = bars.iter().map(|b| b.timestamp).max();
        Ok(first.zip(last).map(|(f, l)| (f, l, bars.len())))
    }
}
