//! Market data access port trait.

use chrono::NaiveDateTime;

use crate::domain::error::TmvError;
use crate::domain::instrument::Instrument;
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::timeframe::Timeframe;

/// Source of instruments and OHLCV history. Timestamps are exchange-local.
pub trait DataPort {
    fn load_watchlist(&self) -> Result<Vec<Instrument>, TmvError>;

    /// Bars with `from <= timestamp <= to`, any order.
    fn fetch_bars(
        &self,
        instrument: &Instrument,
        timeframe: Timeframe,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<OhlcvBar>, TmvError>;

    /// First timestamp, last timestamp and bar count, if any bars exist.
    fn get_data_range(
        &self,
        instrument: &Instrument,
        timeframe: Timeframe,
    ) -> Result<Option<(NaiveDateTime, NaiveDateTime, usize)>, TmvError>;
}
