//! Bar freshness and series preparation.

use chrono::{Duration, NaiveDateTime};

use crate::domain::error::TmvError;
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::timeframe::Timeframe;

/// Default maximum age of the last bar: four bar durations.
pub fn default_max_age_minutes(timeframe: Timeframe) -> i64 {
    4 * timeframe.minutes()
}

/// Fails with `StaleData` when the last bar is more than `max_age_minutes`
/// older than `now`, to the second. A last bar at or after `now` is fresh.
pub fn check_freshness(
    symbol: &str,
    timeframe: Timeframe,
    last_bar: NaiveDateTime,
    now: NaiveDateTime,
    max_age_minutes: i64,
) -> Result<(), TmvError> {
    let age = now.signed_duration_since(last_bar);
    let stale = Duration::try_minutes(max_age_minutes).is_some_and(|limit| age > limit);
    if stale {
        return Err(TmvError::StaleData {
            symbol: symbol.to_string(),
            timeframe: timeframe.to_string(),
            last_bar,
            now,
            max_age_minutes,
        });
    }
    Ok(())
}

/// Sort ascending by timestamp and drop repeated timestamps, keeping the
/// first bar seen for each. Returns the prepared series and the number of
/// duplicates removed. Any remaining bar with a defect fails with
/// `InvalidBar`.
pub fn prepare_bars(
    symbol: &str,
    timeframe: Timeframe,
    mut bars: Vec<OhlcvBar>,
) -> Result<(Vec<OhlcvBar>, usize), TmvError> {
    bars.sort_by_key(|b| b.timestamp);
    let before = bars.len();
    bars.dedup_by_key(|b| b.timestamp);
    let dropped = before - bars.len();
    if let Some((bar, reason)) = bars.iter().find_map(|b| b.defect().map(|r| (b, r))) {
        return Err(TmvError::InvalidBar {
            symbol: symbol.to_string(),
            timeframe: timeframe.to_string(),
            timestamp: bar.timestamp,
            reason: reason.to_string(),
        });
    }
    Ok((bars, dropped))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn bar(ts: NaiveDateTime, close: f64) -> OhlcvBar {
        OhlcvBar {
            timestamp: ts,
            open: close,
            high: close,
            low: close,
            close,
            volume: 100,
        }
    }

    #[test]
    fn default_is_four_bars() {
        assert_eq!(default_max_age_minutes(Timeframe::Minute15), 60);
        assert_eq!(default_max_age_minutes(Timeframe::Day), 4 * 24 * 60);
    }

    #[test]
    fn fresh_within_threshold() {
        assert!(check_freshness("ABC", Timeframe::Minute15, at(10, 0), at(11, 0), 60).is_ok());
        // future bars count as fresh
        assert!(check_freshness("ABC", Timeframe::Minute15, at(12, 0), at(11, 0), 60).is_ok());
    }

    #[test]
    fn stale_past_threshold() {
        let err = check_freshness("ABC", Timeframe::Minute15, at(10, 0), at(11, 1), 60).unwrap_err();
        match err {
            TmvError::StaleData {
                symbol,
                timeframe,
                max_age_minutes,
                ..
            } => {
                assert_eq!(symbol, "ABC");
                assert_eq!(timeframe, "15m");
                assert_eq!(max_age_minutes, 60);
            }
            other => panic!("expected StaleData, got {other}"),
        }
    }

    #[test]
    fn partial_minutes_count_toward_age() {
        let now = at(11, 0) + Duration::seconds(59);
        assert!(check_freshness("ABC", Timeframe::Minute15, at(10, 0), now, 60).is_err());
        assert!(check_freshness("ABC", Timeframe::Minute15, at(10, 0), at(11, 0), 60).is_ok());
    }

    #[test]
    fn prepare_sorts_and_dedupes() {
        let t0 = at(9, 15);
        let bars = vec![
            bar(t0 + Duration::minutes(30), 3.0),
            bar(t0, 1.0),
            bar(t0 + Duration::minutes(15), 2.0),
            bar(t0, 9.0),
        ];
        let (prepared, dropped) = prepare_bars("ABC", Timeframe::Minute15, bars).unwrap();
        assert_eq!(dropped, 1);
        assert_eq!(prepared.len(), 3);
        assert!(prepared.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
        assert_eq!(prepared[0].close, 1.0);
    }

    #[test]
    fn prepare_rejects_unusable_bar() {
        let t0 = at(9, 15);
        let mut bad = bar(t0 + Duration::minutes(15), f64::NAN);
        bad.high = 2.0;
        bad.low = 1.0;
        let bars = vec![bar(t0, 1.0), bad, bar(t0 + Duration::minutes(30), 3.0)];
        let err = prepare_bars("ABC", Timeframe::Minute15, bars).unwrap_err();
        match err {
            TmvError::InvalidBar {
                symbol,
                timestamp,
                reason,
                ..
            } => {
                assert_eq!(symbol, "ABC");
                assert_eq!(timestamp, t0 + Duration::minutes(15));
                assert_eq!(reason, "non-finite price");
            }
            other => panic!("expected InvalidBar, got {other}"),
        }
    }
}
