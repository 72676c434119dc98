//! Ranked snapshot CSV export.
//!
//! Columns: `Symbol`, then `<tf> Trend`, `<tf> Momentum`, `<tf> Volume`,
//! `<tf> TMV Score` for each timeframe in canonical order, then `Composite`
//! and `Rank`. The file is written beside the target and renamed into
//! place, so readers see either the old file or the new one.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::domain::error::TmvError;
use crate::domain::snapshot::RankedSnapshot;
use crate::ports::snapshot_port::{SnapshotSink, StagedSnapshot};

pub struct CsvExportSink {
    path: PathBuf,
}

impl CsvExportSink {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "export.csv".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

pub fn header(snapshot: &RankedSnapshot) -> Vec<String> {
    let mut cols = vec!["Symbol".to_string()];
    for tf in &snapshot.timeframes {
        for suffix in ["Trend", "Momentum", "Volume", "TMV Score"] {
            cols.push(format!("{} {}", tf, suffix));
        }
    }
    cols.push("Composite".to_string());
    cols.push("Rank".to_string());
    cols
}

fn fmt_score(v: f64) -> String {
    format!("{:.4}", v)
}

pub fn write_snapshot<W: std::io::Write>(snapshot: &RankedSnapshot, out: W) -> Result<(), TmvError> {
    let to_err = |e: csv::Error| TmvError::Io(std::io::Error::other(e));
    let mut wtr = csv::Writer::from_writer(out);
    wtr.write_record(header(snapshot)).map_err(to_err)?;

    for row in &snapshot.rows {
        let mut record = vec![row.instrument.symbol().to_string()];
        for tf in &snapshot.timeframes {
            match row.scores.get(tf) {
                Some(s) => {
                    record.push(fmt_score(s.trend));
                    record.push(fmt_score(s.momentum));
                    record.push(fmt_score(s.volume));
                    record.push(fmt_score(s.tmv));
                }
                None => record.extend(std::iter::repeat_n(String::new(), 4)),
            }
        }
        record.push(fmt_score(row.composite));
        record.push(row.rank.to_string());
        wtr.write_record(&record).map_err(to_err)?;
    }

    wtr.flush()?;
    Ok(())
}

impl SnapshotSink for CsvExportSink {
    /// Writes the temp file. The rename happens on commit.
    fn stage<'a>(&'a self, snapshot: &RankedSnapshot) -> Result<Box<dyn StagedSnapshot + 'a>, TmvError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let staged = StagedCsv {
            tmp: self.temp_path(),
            path: &self.path,
            rows: snapshot.rows.len(),
            done: false,
        };
        let file = fs::File::create(&staged.tmp)?;
        write_snapshot(snapshot, std::io::BufWriter::new(file))?;
        Ok(Box::new(staged))
    }
}

struct StagedCsv<'a> {
    tmp: PathBuf,
    path: &'a Path,
    rows: usize,
    done: bool,
}

impl StagedSnapshot for StagedCsv<'_> {
    fn commit(mut self: Box<Self>) -> Result<(), TmvError> {
        fs::rename(&self.tmp, self.path)?;
        self.done = true;
        debug!(path = %self.path.display(), rows = self.rows, "csv export written");
        Ok(())
    }
}

impl Drop for StagedCsv<'_> {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        match fs::remove_file(&self.tmp) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => {
                warn!(path = %self.tmp.display(), error = %e, "could not remove staged export");
            }
            _ => {}
        }
    }
}
