//! OHLCV bar representation.

use chrono::NaiveDateTime;

/// One bar of market data. Timestamps are exchange-local and mark the bar open.
#[derive(Debug, Clone, PartialEq)]
pub struct OhlcvBar {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

impl OhlcvBar {
    /// (high + low + close) / 3
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }

    /// (high + low) / 2
    pub fn median_price(&self) -> f64 {
        (self.high + self.low) / 2.0
    }

    /// max(high - low, |high - prev_close|, |low - prev_close|)
    pub fn true_range(&self, prev_close: f64) -> f64 {
        let hl = self.high - self.low;
        let hc = (self.high - prev_close).abs();
        let lc = (self.low - prev_close).abs();
        hl.max(hc).max(lc)
    }
}

impl OhlcvBar {
    /// Describes what makes the bar unusable, if anything: a non-finite or
    /// negative price, high below low, or negative volume.
    pub fn defect(&self) -> Option<&'static str> {
        let prices = [self.open, self.high, self.low, self.close];
        if prices.iter().any(|p| !p.is_finite()) {
            return Some("non-finite price");
        }
        if prices.iter().any(|p| *p < 0.0) {
            return Some("negative price");
        }
        if self.high < self.low {
            return Some("high below low");
        }
        if self.volume < 0 {
            return Some("negative volume");
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(hour, 15, 0)
            .unwrap()
    }

    fn sample_bar() -> OhlcvBar {
        OhlcvBar {
            timestamp: ts(15, 9),
            open: 100.0,
            high: 110.0,
            low: 90.0,
            close: 105.0,
            volume: 50_000,
        }
    }

    #[test]
    fn typical_price() {
        let bar = sample_bar();
        let expected = (110.0 + 90.0 + 105.0) / 3.0;
        assert!((bar.typical_price() - expected).abs() < f64::EPSILON);
    }

    #[test]
    fn median_price() {
        assert!((sample_bar().median_price() - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn true_range_hl_dominates() {
        let bar = sample_bar();
        assert!((bar.true_range(100.0) - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn true_range_gap_up() {
        let bar = sample_bar();
        // |110-70| = 40
        assert!((bar.true_range(70.0) - 40.0).abs() < f64::EPSILON);
    }

    #[test]
    fn true_range_gap_down() {
        let bar = sample_bar();
        // |90-130| = 40
        assert!((bar.true_range(130.0) - 40.0).abs() < f64::EPSILON);
    }

    #[test]
    fn sound_bar_has_no_defect() {
        assert_eq!(sample_bar().defect(), None);
        let flat = OhlcvBar {
            high: 100.0,
            low: 100.0,
            volume: 0,
            ..sample_bar()
        };
        assert_eq!(flat.defect(), None);
    }

    #[test]
    fn defects_are_named() {
        let nan_close = OhlcvBar {
            close: f64::NAN,
            ..sample_bar()
        };
        assert_eq!(nan_close.defect(), Some("non-finite price"));
        let inf_high = OhlcvBar {
            high: f64::INFINITY,
            ..sample_bar()
        };
        assert_eq!(inf_high.defect(), Some("non-finite price"));
        let negative = OhlcvBar {
            low: -1.0,
            ..sample_bar()
        };
        assert_eq!(negative.defect(), Some("negative price"));
        let inverted = OhlcvBar {
            high: 80.0,
            ..sample_bar()
        };
        assert_eq!(inverted.defect(), Some("high below low"));
        let volume = OhlcvBar {
            volume: -5,
            ..sample_bar()
        };
        assert_eq!(volume.defect(), Some("negative volume"));
    }
}
