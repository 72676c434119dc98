//! Snapshot publishing port trait.
//!
//! Publishing is two-phase. `stage` does every write that can fail without
//! making the snapshot visible; `commit` makes it visible. Dropping a staged
//! snapshot without committing discards it.

use crate::domain::error::TmvError;
use crate::domain::snapshot::RankedSnapshot;

/// Receives complete, ranked snapshots. Never called with a partial cycle.
pub trait SnapshotSink {
    fn stage<'a>(&'a self, snapshot: &RankedSnapshot) -> Result<Box<dyn StagedSnapshot + 'a>, TmvError>;

    fn publish(&self, snapshot: &RankedSnapshot) -> Result<(), TmvError> {
        self.stage(snapshot)?.commit()
    }
}

/// A staged write awaiting commit. Drop rolls it back.
pub trait StagedSnapshot {
    fn commit(self: Box<Self>) -> Result<(), TmvError>;
}

/// Staged write whose only effect is the closure run on commit.
pub struct OnCommit<F>(pub F);

impl<F> StagedSnapshot for OnCommit<F>
where
    F: FnOnce() -> Result<(), TmvError>,
{
    fn commit(self: Box<Self>) -> Result<(), TmvError> {
        (self.0)()
    }
}

/// Fans one snapshot out to several sinks. Every sink is staged before any
/// commits; a staging failure drops (rolls back) the ones already staged.
/// Commits run in vector order, so sinks whose commit can fail belong first.
impl SnapshotSink for Vec<Box<dyn SnapshotSink>> {
    fn stage<'a>(&'a self, snapshot: &RankedSnapshot) -> Result<Box<dyn StagedSnapshot + 'a>, TmvError> {
        let staged = self
            .iter()
            .map(|sink| sink.stage(snapshot))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Box::new(StagedAll(staged)))
    }
}

struct StagedAll<'a>(Vec<Box<dyn StagedSnapshot + 'a>>);

impl StagedSnapshot for StagedAll<'_> {
    fn commit(self: Box<Self>) -> Result<(), TmvError> {
        for staged in self.0 {
            staged.commit()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    use chrono::{FixedOffset, TimeZone};

    use crate::domain::timeframe::Timeframe;

    type Log = Rc<RefCell<Vec<String>>>;

    struct Logged {
        name: &'static str,
        log: Log,
        fail_stage: bool,
    }

    struct LoggedStage {
        name: &'static str,
        log: Log,
        committed: bool,
    }

    impl SnapshotSink for Logged {
        fn stage<'a>(&'a self, _snapshot: &RankedSnapshot) -> Result<Box<dyn StagedSnapshot + 'a>, TmvError> {
            if self.fail_stage {
                return Err(TmvError::upstream(self.name, "refused"));
            }
            self.log.borrow_mut().push(format!("stage {}", self.name));
            Ok(Box::new(LoggedStage {
                name: self.name,
                log: Rc::clone(&self.log),
                committed: false,
            }))
        }
    }

    impl StagedSnapshot for LoggedStage {
        fn commit(mut self: Box<Self>) -> Result<(), TmvError> {
            self.committed = true;
            self.log.borrow_mut().push(format!("commit {}", self.name));
            Ok(())
        }
    }

    impl Drop for LoggedStage {
        fn drop(&mut self) {
            if !self.committed {
                self.log.borrow_mut().push(format!("rollback {}", self.name));
            }
        }
    }

    fn snapshot() -> RankedSnapshot {
        RankedSnapshot {
            as_of: FixedOffset::east_opt(19800)
                .unwrap()
                .with_ymd_and_hms(2024, 3, 1, 15, 30, 0)
                .unwrap(),
            timeframes: vec![Timeframe::Day],
            rows: Vec::new(),
        }
    }

    fn sink(name: &'static str, log: &Log, fail_stage: bool) -> Box<dyn SnapshotSink> {
        Box::new(Logged {
            name,
            log: Rc::clone(log),
            fail_stage,
        })
    }

    #[test]
    fn fan_out_stages_all_before_committing() {
        let log: Log = Rc::default();
        let sinks = vec![sink("db", &log, false), sink("csv", &log, false)];
        sinks.publish(&snapshot()).unwrap();
        assert_eq!(
            *log.borrow(),
            vec!["stage db", "stage csv", "commit db", "commit csv"]
        );
    }

    #[test]
    fn staging_failure_rolls_back_earlier_sinks() {
        let log: Log = Rc::default();
        let sinks = vec![
            sink("db", &log, false),
            sink("csv", &log, false),
            sink("broken", &log, true),
        ];
        assert!(sinks.publish(&snapshot()).is_err());
        let log = log.borrow();
        assert!(log.iter().all(|e| !e.starts_with("commit")));
        assert!(log.contains(&"rollback db".to_string()));
        assert!(log.contains(&"rollback csv".to_string()));
    }
}
