//! SQLite store: watchlist and bar history in, live scores out.
//!
//! Tables:
//!
//! - `watchlist (symbol, exchange, provider_id)`
//! - `ohlcv (symbol, exchange, timeframe, timestamp, open, high, low, close, volume)`
//! - `live_scores`, one row per (instrument, timeframe) of the latest
//!   snapshot, replaced wholesale in one transaction per publish.
//!
//! Timestamps are stored as `YYYY-MM-DD HH:MM:SS` text so they sort and
//! compare lexically.

use chrono::NaiveDateTime;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use tracing::{debug, warn};

use crate::domain::error::TmvError;
use crate::domain::instrument::Instrument;
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::snapshot::RankedSnapshot;
use crate::domain::timeframe::Timeframe;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::snapshot_port::{SnapshotSink, StagedSnapshot};

const SOURCE: &str = "sqlite";
const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn db_err(e: impl std::fmt::Display) -> TmvError {
    TmvError::upstream(SOURCE, e)
}

fn parse_ts(raw: &str) -> Result<NaiveDateTime, TmvError> {
    NaiveDateTime::parse_from_str(raw, TS_FORMAT)
        .map_err(|e| db_err(format!("bad timestamp '{}': {}", raw, e)))
}

/// One `live_scores` row.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveScore {
    pub symbol: String,
    pub exchange: String,
    pub timeframe: String,
    pub trend: f64,
    pub momentum: f64,
    pub volume: f64,
    pub tmv: f64,
    pub trend_strength: String,
    pub momentum_strength: String,
    pub volume_strength: String,
    pub composite: f64,
    pub rank: usize,
    pub direction: String,
    pub alignment: String,
    pub reversal_probability: f64,
    pub as_of: String,
}

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, TmvError> {
        let db_path = config
            .get_string("sqlite", "path")
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| TmvError::missing("sqlite", "path"))?;

        let pool_size = config.get_int("sqlite", "pool_size", 4);
        if pool_size < 1 {
            return Err(TmvError::invalid(
                "sqlite",
                "pool_size",
                "pool_size must be at least 1",
            ));
        }

        let manager = SqliteConnectionManager::file(&db_path);
        let pool = Pool::builder()
            .max_size(pool_size as u32)
            .build(manager)
            .map_err(db_err)?;

        let adapter = Self { pool };
        adapter.initialize_schema()?;
        Ok(adapter)
    }

    /// Single-connection pool so every caller sees the same database.
    pub fn in_memory() -> Result<Self, TmvError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder().max_size(1).build(manager).map_err(db_err)?;
        let adapter = Self { pool };
        adapter.initialize_schema()?;
        Ok(adapter)
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, TmvError> {
        self.pool.get().map_err(db_err)
    }

    pub fn initialize_schema(&self) -> Result<(), TmvError> {
        self.conn()?
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS watchlist (
                    symbol TEXT NOT NULL,
                    exchange TEXT NOT NULL,
                    provider_id TEXT NOT NULL,
                    PRIMARY KEY (symbol, exchange)
                );
                CREATE TABLE IF NOT EXISTS ohlcv (
                    symbol TEXT NOT NULL,
                    exchange TEXT NOT NULL,
                    timeframe TEXT NOT NULL,
                    timestamp TEXT NOT NULL,
                    open REAL NOT NULL,
                    high REAL NOT NULL,
                    low REAL NOT NULL,
                    close REAL NOT NULL,
                    volume INTEGER NOT NULL,
                    PRIMARY KEY (symbol, exchange, timeframe, timestamp)
                );
                CREATE TABLE IF NOT EXISTS live_scores (
                    symbol TEXT NOT NULL,
                    exchange TEXT NOT NULL,
                    timeframe TEXT NOT NULL,
                    trend REAL NOT NULL,
                    momentum REAL NOT NULL,
                    volume REAL NOT NULL,
                    tmv REAL NOT NULL,
                    trend_strength TEXT NOT NULL,
                    momentum_strength TEXT NOT NULL,
                    volume_strength TEXT NOT NULL,
                    composite REAL NOT NULL,
                    rank INTEGER NOT NULL,
                    direction TEXT NOT NULL,
                    alignment TEXT NOT NULL,
                    reversal_probability REAL NOT NULL,
                    as_of TEXT NOT NULL,
                    PRIMARY KEY (symbol, exchange, timeframe)
                );",
            )
            .map_err(db_err)
    }

    /// Replace the stored watchlist.
    pub fn replace_watchlist(&self, instruments: &[Instrument]) -> Result<(), TmvError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(db_err)?;
        tx.execute("DELETE FROM watchlist", []).map_err(db_err)?;
        for inst in instruments {
            tx.execute(
                "INSERT OR REPLACE INTO watchlist (symbol, exchange, provider_id)
                 VALUES (?1, ?2, ?3)",
                params![inst.symbol(), inst.exchange(), inst.provider_id()],
            )
            .map_err(db_err)?;
        }
        tx.commit().map_err(db_err)
    }

    /// Upsert bars for one (instrument, timeframe). Returns rows written.
    pub fn insert_bars(
        &self,
        instrument: &Instrument,
        timeframe: Timeframe,
        bars: &[OhlcvBar],
    ) -> Result<usize, TmvError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(db_err)?;
        for bar in bars {
            tx.execute(
                "INSERT OR REPLACE INTO ohlcv
                 (symbol, exchange, timeframe, timestamp, open, high, low, close, volume)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    instrument.symbol(),
                    instrument.exchange(),
                    timeframe.label(),
                    bar.timestamp.format(TS_FORMAT).to_string(),
                    bar.open,
                    bar.high,
                    bar.low,
                    bar.close,
                    bar.volume
                ],
            )
            .map_err(db_err)?;
        }
        tx.commit().map_err(db_err)?;
        Ok(bars.len())
    }

    /// `live_scores` ordered by rank, then timeframe label.
    pub fn live_scores(&self) -> Result<Vec<LiveScore>, TmvError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT symbol, exchange, timeframe, trend, momentum, volume, tmv,
                        trend_strength, momentum_strength, volume_strength, composite,
                        rank, direction, alignment, reversal_probability, as_of
                 FROM live_scores ORDER BY rank ASC, timeframe ASC",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map([], |row| {
                let rank: i64 = row.get(11)?;
                Ok(LiveScore {
                    symbol: row.get(0)?,
                    exchange: row.get(1)?,
                    timeframe: row.get(2)?,
                    trend: row.get(3)?,
                    momentum: row.get(4)?,
                    volume: row.get(5)?,
                    tmv: row.get(6)?,
                    trend_strength: row.get(7)?,
                    momentum_strength: row.get(8)?,
                    volume_strength: row.get(9)?,
                    composite: row.get(10)?,
                    rank: rank as usize,
                    direction: row.get(12)?,
                    alignment: row.get(13)?,
                    reversal_probability: row.get(14)?,
                    as_of: row.get(15)?,
                })
            })
            .map_err(db_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(db_err)
    }
}

impl DataPort for SqliteAdapter {
    fn load_watchlist(&self) -> Result<Vec<Instrument>, TmvError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT symbol, exchange, provider_id FROM watchlist ORDER BY symbol, exchange")
            .map_err(db_err)?;
        let rows = stmt
            .query_map([], |row| {
                let symbol: String = row.get(0)?;
                let exchange: String = row.get(1)?;
                let provider_id: String = row.get(2)?;
                Ok(Instrument::new(&symbol, &exchange, &provider_id))
            })
            .map_err(db_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(db_err)
    }

    fn fetch_bars(
        &self,
        instrument: &Instrument,
        timeframe: Timeframe,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<OhlcvBar>, TmvError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT timestamp, open, high, low, close, volume
                 FROM ohlcv
                 WHERE symbol = ?1 AND exchange = ?2 AND timeframe = ?3
                   AND timestamp >= ?4 AND timestamp <= ?5
                 ORDER BY timestamp ASC",
            )
            .map_err(db_err)?;

        let rows = stmt
            .query_map(
                params![
                    instrument.symbol(),
                    instrument.exchange(),
                    timeframe.label(),
                    from.format(TS_FORMAT).to_string(),
                    to.format(TS_FORMAT).to_string()
                ],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, f64>(1)?,
                        row.get::<_, f64>(2)?,
                        row.get::<_, f64>(3)?,
                        row.get::<_, f64>(4)?,
                        row.get::<_, i64>(5)?,
                    ))
                },
            )
            .map_err(db_err)?;

        let mut bars = Vec::new();
        for row in rows {
            let (ts, open, high, low, close, volume) = row.map_err(db_err)?;
            bars.push(OhlcvBar {
                timestamp: parse_ts(&ts)?,
                open,
                high,
                low,
                close,
                volume,
            });
        }
        Ok(bars)
    }

    fn get_data_range(
        &self,
        instrument: &Instrument,
        timeframe: Timeframe,
    ) -> Result<Option<(NaiveDateTime, NaiveDateTime, usize)>, TmvError> {
        let conn = self.conn()?;
        let result: (Option<String>, Option<String>, i64) = conn
            .query_row(
                "SELECT MIN(timestamp), MAX(timestamp), COUNT(*) FROM ohlcv
                 WHERE symbol = ?1 AND exchange = ?2 AND timeframe = ?3",
                params![instrument.symbol(), instrument.exchange(), timeframe.label()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .map_err(db_err)?;

        match result {
            (Some(min), Some(max), count) if count > 0 => {
                Ok(Some((parse_ts(&min)?, parse_ts(&max)?, count as usize)))
            }
            _ => Ok(None),
        }
    }
}

impl SnapshotSink for SqliteAdapter {
    /// Opens a write transaction and replaces `live_scores` inside it. The
    /// transaction is committed on commit and rolled back on drop.
    fn stage<'a>(&'a self, snapshot: &RankedSnapshot) -> Result<Box<dyn StagedSnapshot + 'a>, TmvError> {
        let as_of = snapshot.as_of.to_rfc3339();
        let conn = self.conn()?;
        conn.execute_batch("BEGIN IMMEDIATE").map_err(db_err)?;
        let mut staged = StagedLiveScores {
            conn,
            rows: 0,
            open: true,
        };
        staged
            .conn
            .execute("DELETE FROM live_scores", [])
            .map_err(db_err)?;

        for row in &snapshot.rows {
            for (tf, score) in &row.scores {
                staged
                    .conn
                    .execute(
                        "INSERT INTO live_scores
                         (symbol, exchange, timeframe, trend, momentum, volume, tmv,
                          trend_strength, momentum_strength, volume_strength, composite,
                          rank, direction, alignment, reversal_probability, as_of)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
                        params![
                            row.instrument.symbol(),
                            row.instrument.exchange(),
                            tf.label(),
                            score.trend,
                            score.momentum,
                            score.volume,
                            score.tmv,
                            score.trend_strength.to_string(),
                            score.momentum_strength.to_string(),
                            score.volume_strength.to_string(),
                            row.composite,
                            row.rank as i64,
                            score.direction.to_string(),
                            row.alignment.to_string(),
                            score.reversal_probability,
                            as_of
                        ],
                    )
                    .map_err(db_err)?;
                staged.rows += 1;
            }
        }
        Ok(Box::new(staged))
    }
}

struct StagedLiveScores {
    conn: PooledConnection<SqliteConnectionManager>,
    rows: usize,
    open: bool,
}

impl StagedSnapshot for StagedLiveScores {
    fn commit(mut self: Box<Self>) -> Result<(), TmvError> {
        self.conn.execute_batch("COMMIT").map_err(db_err)?;
        self.open = false;
        debug!(rows = self.rows, "live_scores replaced");
        Ok(())
    }
}

impl Drop for StagedLiveScores {
    fn drop(&mut self) {
        if self.open {
            if let Err(e) = self.conn.execute_batch("ROLLBACK") {
                warn!(error = %e, "live_scores rollback failed");
            }
        }
    }
}
