//! CLI definition and dispatch.
//!
//! Rankings, summaries and data ranges go to stdout; diagnostics go through
//! `tracing` to stderr.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::thread;
use std::time::Duration as StdDuration;

use chrono::{DateTime, FixedOffset, Utc};
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_export::CsvExportSink;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::config_validation::{
    data_source, load_refresh_config, schedule, timeframe_section, validate_config, DataSource,
};
use crate::domain::error::TmvError;
use crate::domain::instrument::{dedupe_watchlist, Instrument};
use crate::domain::refresh::{RefreshConfig, RefreshCoordinator};
use crate::domain::snapshot::RankedSnapshot;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::snapshot_port::SnapshotSink;

#[derive(Parser, Debug)]
#[command(
    name = "tmvrank",
    about = "Multi-timeframe Trend-Momentum-Volume scoring and ranking"
)]
pub struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one refresh cycle and publish the ranking
    Refresh {
        #[arg(short, long)]
        config: PathBuf,
        /// CSV export path, overrides [export] csv_path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Run refresh cycles on a fixed interval
    Watch {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Seconds between cycle starts, overrides [refresh] interval_seconds
        #[arg(long)]
        interval: Option<u64>,
        /// Stop after this many cycles
        #[arg(long)]
        max_cycles: Option<u64>,
    },
    /// Check a configuration file without running a cycle
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show stored bar ranges per instrument and timeframe
    Info {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: Option<String>,
    },
    /// Load a CSV data directory into the SQLite store
    Import {
        #[arg(short, long)]
        config: PathBuf,
        /// Directory laid out as for [data] source = csv
        #[arg(long)]
        from: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match execute(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "{e}");
            ExitCode::from(&e)
        }
    }
}

pub fn execute(command: Command) -> Result<(), TmvError> {
    match command {
        Command::Refresh { config, output } => run_refresh(&config, output.as_deref()),
        Command::Watch {
            config,
            output,
            interval,
            max_cycles,
        } => run_watch(&config, output.as_deref(), interval, max_cycles),
        Command::Validate { config } => run_validate(&config),
        Command::Info { config, symbol } => run_info(&config, symbol.as_deref()),
        Command::Import { config, from } => run_import(&config, &from),
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, TmvError> {
    FileConfigAdapter::from_file(path)
}

/// Current wall-clock time at the configured exchange offset.
pub fn now_at_offset(utc_offset_minutes: i32) -> Result<DateTime<FixedOffset>, TmvError> {
    let offset = FixedOffset::east_opt(utc_offset_minutes * 60).ok_or_else(|| {
        TmvError::invalid("refresh", "utc_offset_minutes", "offset out of range")
    })?;
    Ok(Utc::now().with_timezone(&offset))
}

pub fn open_data_port(config: &dyn ConfigPort) -> Result<Box<dyn DataPort>, TmvError> {
    match data_source(config)? {
        DataSource::Csv => {
            let dir = config
                .get_string("data", "csv_dir")
                .filter(|s| !s.trim().is_empty())
                .ok_or_else(|| TmvError::missing("data", "csv_dir"))?;
            Ok(Box::new(CsvAdapter::new(PathBuf::from(dir.trim()))))
        }
        #[cfg(feature = "sqlite")]
        DataSource::Sqlite => {
            use crate::adapters::sqlite_adapter::SqliteAdapter;
            Ok(Box::new(SqliteAdapter::from_config(config)?))
        }
        #[cfg(not(feature = "sqlite"))]
        DataSource::Sqlite => Err(TmvError::invalid(
            "data",
            "source",
            "built without the sqlite feature",
        )),
    }
}

/// The SQLite live table when `[sqlite] path` is set, then the CSV export
/// when a path is given. Commits run in this order: the database commit can
/// still fail after staging, the file rename practically cannot.
pub fn build_sinks(
    config: &dyn ConfigPort,
    output: Option<&Path>,
) -> Result<Vec<Box<dyn SnapshotSink>>, TmvError> {
    let mut sinks: Vec<Box<dyn SnapshotSink>> = Vec::new();

    #[cfg(feature = "sqlite")]
    {
        use crate::adapters::sqlite_adapter::SqliteAdapter;
        if config
            .get_string("sqlite", "path")
            .is_some_and(|p| !p.trim().is_empty())
        {
            sinks.push(Box::new(SqliteAdapter::from_config(config)?));
        }
    }

    let csv_path = output.map(Path::to_path_buf).or_else(|| {
        config
            .get_string("export", "csv_path")
            .filter(|s| !s.trim().is_empty())
            .map(|s| PathBuf::from(s.trim()))
    });
    if let Some(path) = csv_path {
        sinks.push(Box::new(CsvExportSink::new(path)));
    }

    if sinks.is_empty() {
        warn!("no export configured, ranking is printed only");
    }
    Ok(sinks)
}

pub fn print_snapshot(snapshot: &RankedSnapshot) {
    let mut header = format!("{:>4}  {:<12}", "Rank", "Symbol");
    for tf in &snapshot.timeframes {
        header.push_str(&format!(" {:>8}", tf.label()));
    }
    header.push_str(&format!(" {:>9}  {:<8} {:<8}", "Composite", "Dir", "Align"));
    println!("{}", header);

    for row in &snapshot.rows {
        let mut line = format!("{:>4}  {:<12}", row.rank, row.instrument.symbol());
        for tf in &snapshot.timeframes {
            match row.scores.get(tf) {
                Some(s) => line.push_str(&format!(" {:>8.4}", s.tmv)),
                None => line.push_str(&format!(" {:>8}", "-")),
            }
        }
        line.push_str(&format!(
            " {:>9.4}  {:<8} {:<8}",
            row.composite, row.direction, row.alignment
        ));
        println!("{}", line);
    }
}

fn prepare(config_path: &Path) -> Result<(FileConfigAdapter, RefreshConfig), TmvError> {
    let config = load_config(config_path)?;
    let refresh = validate_config(&config)?;
    Ok((config, refresh))
}

fn run_refresh(config_path: &Path, output: Option<&Path>) -> Result<(), TmvError> {
    let (config, refresh) = prepare(config_path)?;
    let sched = schedule(&config)?;
    let data = open_data_port(&config)?;
    let sinks = build_sinks(&config, output)?;

    let coordinator = RefreshCoordinator::new(refresh);
    let snapshot = coordinator.run_cycle(now_at_offset(sched.utc_offset_minutes)?, data.as_ref(), &sinks)?;
    print_snapshot(&snapshot);
    Ok(())
}

fn run_watch(
    config_path: &Path,
    output: Option<&Path>,
    interval: Option<u64>,
    max_cycles: Option<u64>,
) -> Result<(), TmvError> {
    let (config, refresh) = prepare(config_path)?;
    let sched = schedule(&config)?;
    let interval = match interval {
        Some(0) => {
            return Err(TmvError::invalid(
                "refresh",
                "interval_seconds",
                "--interval must be at least 1",
            ))
        }
        Some(s) => s,
        None => sched.interval_seconds,
    };
    let data = open_data_port(&config)?;
    let sinks = build_sinks(&config, output)?;
    let coordinator = RefreshCoordinator::new(refresh);

    info!(interval_seconds = interval, "watching");
    let mut cycle: u64 = 0;
    let mut last: Result<(), TmvError>;
    loop {
        cycle += 1;
        let started = std::time::Instant::now();
        last = match coordinator.run_cycle(now_at_offset(sched.utc_offset_minutes)?, data.as_ref(), &sinks) {
            Ok(snapshot) => {
                print_snapshot(&snapshot);
                Ok(())
            }
            Err(e) => {
                // The next cycle may succeed; the previous snapshot stays published.
                warn!(cycle, error = %e, "cycle failed");
                Err(e)
            }
        };

        if max_cycles.is_some_and(|max| cycle >= max) {
            break;
        }
        let wait = StdDuration::from_secs(interval).saturating_sub(started.elapsed());
        thread::sleep(wait);
    }
    last
}

fn run_validate(config_path: &Path) -> Result<(), TmvError> {
    info!(path = %config_path.display(), "validating configuration");
    let (config, refresh) = prepare(config_path)?;
    let sched = schedule(&config)?;

    let configured: Vec<String> = refresh
        .timeframes
        .iter()
        .map(|s| timeframe_section(s.timeframe))
        .collect();
    for section in config.sections() {
        if section.starts_with("timeframe.") && !configured.contains(&section) {
            warn!(section = %section, "section ignored, timeframe not in [refresh] timeframes");
        }
    }

    println!("source:      {:?}", data_source(&config)?);
    println!("interval:    {}s", sched.interval_seconds);
    println!("utc offset:  {} min", sched.utc_offset_minutes);
    println!("min bars:    {}", refresh.indicators.min_bars());
    for spec in &refresh.timeframes {
        println!(
            "timeframe {:<4} weight {:.3}  history {}d  max age {}m",
            spec.timeframe.label(),
            spec.weight,
            spec.history_days,
            spec.max_age_minutes
        );
    }
    match &refresh.watchlist {
        Some(list) => println!("watchlist:   {} symbols from config", list.len()),
        None => println!("watchlist:   from data source"),
    }
    println!("configuration is valid");
    Ok(())
}

fn resolve_watchlist(
    refresh: &RefreshConfig,
    data: &dyn DataPort,
    symbol: Option<&str>,
) -> Result<Vec<Instrument>, TmvError> {
    let list = match &refresh.watchlist {
        Some(list) => list.clone(),
        None => data.load_watchlist()?,
    };
    let list = dedupe_watchlist(list);
    Ok(match symbol {
        Some(s) => {
            let wanted = s.trim().to_uppercase();
            list.into_iter().filter(|i| i.symbol() == wanted).collect()
        }
        None => list,
    })
}

fn run_info(config_path: &Path, symbol: Option<&str>) -> Result<(), TmvError> {
    let (config, refresh) = prepare(config_path)?;
    let data = open_data_port(&config)?;
    let instruments = resolve_watchlist(&refresh, data.as_ref(), symbol)?;
    if instruments.is_empty() {
        return Err(TmvError::EmptyWatchlist);
    }

    let need = refresh.indicators.min_bars();
    for inst in &instruments {
        for spec in &refresh.timeframes {
            match data.get_data_range(inst, spec.timeframe)? {
                Some((first, last, count)) => {
                    let flag = if count < need { "  (short)" } else { "" };
                    println!(
                        "{} [{}]: {} bars, {} to {}{}",
                        inst,
                        spec.timeframe,
                        count,
                        first,
                        last,
                        flag
                    );
                }
                None => println!("{} [{}]: no data", inst, spec.timeframe),
            }
        }
    }
    Ok(())
}

#[cfg(feature = "sqlite")]
fn run_import(config_path: &Path, from: &Path) -> Result<(), TmvError> {
    use crate::adapters::sqlite_adapter::SqliteAdapter;

    let config = load_config(config_path)?;
    let refresh = load_refresh_config(&config)?;
    let store = SqliteAdapter::from_config(&config)?;
    let source = CsvAdapter::new(from.to_path_buf());

    let instruments = resolve_watchlist(&refresh, &source, None)?;
    if instruments.is_empty() {
        return Err(TmvError::EmptyWatchlist);
    }
    store.replace_watchlist(&instruments)?;

    let mut total = 0usize;
    for inst in &instruments {
        for spec in &refresh.timeframes {
            let Some((first, last, _)) = source.get_data_range(inst, spec.timeframe)? else {
                warn!(instrument = %inst, timeframe = %spec.timeframe, "no csv file, skipped");
                continue;
            };
            let bars = source.fetch_bars(inst, spec.timeframe, first, last)?;
            let written = store.insert_bars(inst, spec.timeframe, &bars)?;
            total += written;
            println!("{} [{}]: {} bars", inst, spec.timeframe, written);
        }
    }
    info!(instruments = instruments.len(), bars = total, "import complete");
    Ok(())
}

#[cfg(not(feature = "sqlite"))]
fn run_import(_config_path: &Path, _from: &Path) -> Result<(), TmvError> {
    Err(TmvError::invalid(
        "data",
        "source",
        "import requires the sqlite feature",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_refresh() {
        let cli = Cli::try_parse_from(["tmvrank", "refresh", "-c", "tmv.ini", "--log-json"]).unwrap();
        assert!(cli.log_json);
        match cli.command {
            Command::Refresh { config, output } => {
                assert_eq!(config, PathBuf::from("tmv.ini"));
                assert!(output.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn cli_parses_watch_limits() {
        let cli = Cli::try_parse_from([
            "tmvrank",
            "watch",
            "--config",
            "tmv.ini",
            "--interval",
            "60",
            "--max-cycles",
            "3",
        ])
        .unwrap();
        match cli.command {
            Command::Watch {
                interval,
                max_cycles,
                ..
            } => {
                assert_eq!(interval, Some(60));
                assert_eq!(max_cycles, Some(3));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn cli_requires_config() {
        assert!(Cli::try_parse_from(["tmvrank", "refresh"]).is_err());
    }

    #[test]
    fn now_at_offset_applies_offset() {
        let now = now_at_offset(330).unwrap();
        assert_eq!(now.offset().local_minus_utc(), 330 * 60);
        assert!(now_at_offset(24 * 60).is_err());
    }

    #[test]
    fn sinks_follow_config() {
        let cfg = FileConfigAdapter::from_string("[export]\ncsv_path = /tmp/tmv.csv\n").unwrap();
        assert_eq!(build_sinks(&cfg, None).unwrap().len(), 1);
        let empty = FileConfigAdapter::from_string("[data]\n").unwrap();
        assert!(build_sinks(&empty, None).unwrap().is_empty());
        assert_eq!(
            build_sinks(&empty, Some(Path::new("/tmp/x.csv"))).unwrap().len(),
            1
        );
    }
}
