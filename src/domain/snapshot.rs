//! Ranked snapshot and the cell that holds the latest one.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, FixedOffset};

use crate::domain::instrument::Instrument;
use crate::domain::scorer::{Direction, TmvScore};
use crate::domain::timeframe::Timeframe;

/// Agreement of per-timeframe directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    Bullish,
    Bearish,
    Mixed,
}

impl fmt::Display for Alignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            Alignment::Bullish => "Bullish",
            Alignment::Bearish => "Bearish",
            Alignment::Mixed => "Mixed",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankedRow {
    pub instrument: Instrument,
    /// Per-timeframe scores in canonical timeframe order.
    pub scores: BTreeMap<Timeframe, TmvScore>,
    pub composite: f64,
    /// 1-based, unique within a snapshot.
    pub rank: usize,
    pub direction: Direction,
    pub alignment: Alignment,
}

/// All rows of one refresh, ordered by rank.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedSnapshot {
    pub as_of: DateTime<FixedOffset>,
    pub timeframes: Vec<Timeframe>,
    pub rows: Vec<RankedRow>,
}

impl RankedSnapshot {
    pub fn row(&self, symbol: &str) -> Option<&RankedRow> {
        self.rows.iter().find(|r| r.instrument.symbol() == symbol)
    }
}

/// Holds the most recently published snapshot. Readers get an `Arc` to a
/// complete snapshot; a store replaces it in one step.
#[derive(Debug, Default)]
pub struct SnapshotCell {
    inner: RwLock<Option<Arc<RankedSnapshot>>>,
}

impl SnapshotCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&self) -> Option<Arc<RankedSnapshot>> {
        let guard = self.inner.read().unwrap_or_else(|e| e.into_inner());
        guard.clone()
    }

    pub fn store(&self, snapshot: RankedSnapshot) -> Arc<RankedSnapshot> {
        let snapshot = Arc::new(snapshot);
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        *guard = Some(Arc::clone(&snapshot));
        snapshot
    }
}
