//! Cross-timeframe composite and ranking.
//!
//! The composite is the weight-normalised mean of per-timeframe TMV scores.
//! Inputs are folded in canonical timeframe order, so the same set of scores
//! produces the same bits whatever order they arrive in.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::domain::instrument::Instrument;
use crate::domain::scorer::{Direction, ScoringConfig, TmvScore};
use crate::domain::snapshot::{Alignment, RankedRow};
use crate::domain::timeframe::Timeframe;

/// Weight used for a timeframe with no configured weight.
pub const DEFAULT_WEIGHT: f64 = 1.0;

pub type TimeframeWeights = BTreeMap<Timeframe, f64>;

/// Σ w·tmv / Σ w over the given timeframes. Zero total weight yields 0.
pub fn composite<'a, I>(scores: I, weights: &TimeframeWeights) -> f64
where
    I: IntoIterator<Item = (Timeframe, &'a TmvScore)>,
{
    let ordered: BTreeMap<Timeframe, f64> = scores.into_iter().map(|(tf, s)| (tf, s.tmv)).collect();

    let mut weighted = 0.0;
    let mut total = 0.0;
    for (tf, tmv) in &ordered {
        let w = weights.get(tf).copied().unwrap_or(DEFAULT_WEIGHT);
        weighted += w * tmv;
        total += w;
    }

    if total > 0.0 { weighted / total } else { 0.0 }
}

pub fn alignment<'a, I>(directions: I) -> Alignment
where
    I: IntoIterator<Item = &'a Direction>,
{
    let mut seen_any = false;
    let mut all_bull = true;
    let mut all_bear = true;
    for d in directions {
        seen_any = true;
        all_bull &= *d == Direction::Bullish;
        all_bear &= *d == Direction::Bearish;
    }
    match (seen_any, all_bull, all_bear) {
        (true, true, _) => Alignment::Bullish,
        (true, _, true) => Alignment::Bearish,
        _ => Alignment::Mixed,
    }
}

/// Unranked row for one instrument; `rank` is assigned by [`rank_rows`].
pub fn build_row(
    instrument: Instrument,
    scores: BTreeMap<Timeframe, TmvScore>,
    weights: &TimeframeWeights,
    scoring: &ScoringConfig,
) -> RankedRow {
    let composite = composite(scores.iter().map(|(tf, s)| (*tf, s)), weights);
    let alignment = alignment(scores.values().map(|s| &s.direction));
    RankedRow {
        instrument,
        scores,
        composite,
        rank: 0,
        direction: scoring.direction(composite),
        alignment,
    }
}

/// Composite descending, then symbol, then exchange.
pub fn compare_rows(a: &RankedRow, b: &RankedRow) -> Ordering {
    b.composite
        .total_cmp(&a.composite)
        .then_with(|| a.instrument.symbol().cmp(b.instrument.symbol()))
        .then_with(|| a.instrument.exchange().cmp(b.instrument.exchange()))
}

/// Sort and number rows 1..=n.
pub fn rank_rows(mut rows: Vec<RankedRow>) -> Vec<RankedRow> {
    rows.sort_by(compare_rows);
    for (i, row) in rows.iter_mut().enumerate() {
        row.rank = i + 1;
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::scorer::Strength;

    fn tmv(value: f64, direction: Direction) -> TmvScore {
        TmvScore {
            trend: value,
            momentum: value,
            volume: value,
            tmv: value,
            trend_strength: Strength::Weak,
            momentum_strength: Strength::Weak,
            volume_strength: Strength::Weak,
            direction,
            reversal_probability: 0.0,
        }
    }

    fn row(symbol: &str, exchange: &str, value: f64) -> RankedRow {
        let mut scores = BTreeMap::new();
        scores.insert(Timeframe::Day, tmv(value, Direction::Neutral));
        build_row(
            Instrument::new(symbol, exchange, ""),
            scores,
            &TimeframeWeights::new(),
            &ScoringConfig::default(),
        )
    }

    #[test]
    fn composite_weighted_mean() {
        let a = tmv(0.6, Direction::Bullish);
        let b = tmv(-0.2, Direction::Neutral);
        let mut weights = TimeframeWeights::new();
        weights.insert(Timeframe::Minute15, 3.0);
        weights.insert(Timeframe::Day, 1.0);

        let c = composite([(Timeframe::Minute15, &a), (Timeframe::Day, &b)], &weights);
        assert!((c - (3.0 * 0.6 - 0.2) / 4.0).abs() < 1e-12);
    }

    #[test]
    fn composite_ignores_input_order() {
        let scores = [
            (Timeframe::Minute5, tmv(0.1, Direction::Neutral)),
            (Timeframe::Minute60, tmv(0.7, Direction::Bullish)),
            (Timeframe::Day, tmv(-0.33, Direction::Bearish)),
        ];
        let weights: TimeframeWeights = [
            (Timeframe::Minute5, 0.3),
            (Timeframe::Minute60, 0.5),
            (Timeframe::Day, 0.2),
        ]
        .into_iter()
        .collect();

        let forward = composite(scores.iter().map(|(tf, s)| (*tf, s)), &weights);
        let backward = composite(scores.iter().rev().map(|(tf, s)| (*tf, s)), &weights);
        assert_eq!(forward.to_bits(), backward.to_bits());
    }

    #[test]
    fn composite_zero_weight_is_zero() {
        let s = tmv(0.9, Direction::Bullish);
        let weights: TimeframeWeights = [(Timeframe::Day, 0.0)].into_iter().collect();
        assert_eq!(composite([(Timeframe::Day, &s)], &weights), 0.0);
        assert_eq!(composite(std::iter::empty::<(Timeframe, &TmvScore)>(), &weights), 0.0);
    }

    #[test]
    fn alignment_requires_agreement() {
        use Direction::*;
        assert_eq!(alignment(&[Bullish, Bullish]), Alignment::Bullish);
        assert_eq!(alignment(&[Bearish]), Alignment::Bearish);
        assert_eq!(alignment(&[Bullish, Neutral]), Alignment::Mixed);
        assert_eq!(alignment(&[] as &[Direction]), Alignment::Mixed);
    }

    #[test]
    fn ranks_by_composite_then_symbol() {
        let ranked = rank_rows(vec![
            row("CCC", "NSE", 0.2),
            row("BBB", "NSE", 0.5),
            row("AAA", "NSE", 0.2),
            row("DDD", "NSE", -0.4),
        ]);
        let order: Vec<(&str, usize)> = ranked
            .iter()
            .map(|r| (r.instrument.symbol(), r.rank))
            .collect();
        assert_eq!(order, vec![("BBB", 1), ("AAA", 2), ("CCC", 3), ("DDD", 4)]);
    }

    #[test]
    fn exchange_breaks_symbol_ties() {
        let ranked = rank_rows(vec![row("AAA", "NSE", 0.1), row("AAA", "BSE", 0.1)]);
        assert_eq!(ranked[0].instrument.exchange(), "BSE");
        assert_eq!(ranked[1].rank, 2);
    }

    #[test]
    fn row_direction_from_composite() {
        let r = row("AAA", "NSE", 0.45);
        assert_eq!(r.direction, Direction::Bullish);
        assert_eq!(r.rank, 0);
    }
}
