//! Consumers of per-tick snapshots.

use std::io;

use eyre::WrapErr;
use indicatif::{ProgressBar, ProgressStyle};
use itertools::Itertools;
use serde::Serialize;

use crate::Snapshot;

/// Implementors consume the snapshot produced after each tick of the simulation.
pub trait Report {
    /// Processes the snapshot of a single tick.
    ///
    /// # Errors
    ///
    /// Implementors may fail, e.g., on I/O errors, which stops the simulation.
    fn report(&mut self, snapshot: &Snapshot) -> eyre::Result<()>;

    /// Called once after the last tick.
    ///
    /// # Errors
    ///
    /// Implementors may fail, e.g., when flushing buffered output.
    fn finish(&mut self) -> eyre::Result<()> {
        Ok(())
    }
}

/// Reports nothing.
impl Report for () {
    fn report(&mut self, _: &Snapshot) -> eyre::Result<()> {
        Ok(())
    }
}

impl<R: Report + ?Sized> Report for Box<R> {
    fn report(&mut self, snapshot: &Snapshot) -> eyre::Result<()> {
        (**self).report(snapshot)
    }
    fn finish(&mut self) -> eyre::Result<()> {
        (**self).finish()
    }
}

/// Passes each snapshot to all reporters in order.
impl<R: Report> Report for Vec<R> {
    fn report(&mut self, snapshot: &Snapshot) -> eyre::Result<()> {
        self.iter_mut().try_for_each(|r| r.report(snapshot))
    }
    fn finish(&mut self) -> eyre::Result<()> {
        self.iter_mut().try_for_each(|r| r.finish())
    }
}

/// Writes the counters of each tick to the log, optionally followed by the contents of both
/// queues.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter {
    queues: bool,
}

impl LogReporter {
    /// Constructs a reporter printing counters only.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Also print every job in both queues.
    #[must_use]
    pub fn with_queues(mut self) -> Self {
        self.queues = true;
        self
    }
}

impl Report for LogReporter {
    fn report(&mut self, snapshot: &Snapshot) -> eyre::Result<()> {
        log::info!("\n{}", snapshot);
        for transition in &snapshot.transitions {
            log::debug!(
                "Job {}: {} -> {}",
                transition.job,
                transition.from,
                transition.to
            );
        }
        if self.queues {
            log::info!("Backlog:\n{}", snapshot.backlog.iter().format("\n"));
            log::info!("Future:\n{}", snapshot.future.iter().format("\n"));
        }
        Ok(())
    }
}

/// A single CSV row.
#[derive(Debug, Serialize)]
struct TickRecord {
    tick: usize,
    time: f64,
    total: usize,
    completed: usize,
    broken: usize,
    scrapped: usize,
    backlog: usize,
    future: usize,
}

impl From<&Snapshot> for TickRecord {
    fn from(snapshot: &Snapshot) -> Self {
        Self {
            tick: snapshot.tick,
            time: snapshot.time.as_minutes(),
            total: snapshot.counters.total(),
            completed: snapshot.counters.completed(),
            broken: snapshot.counters.broken(),
            scrapped: snapshot.counters.scrapped(),
            backlog: snapshot.backlog.len(),
            future: snapshot.future.len(),
        }
    }
}

/// Writes one CSV row of counters per tick.
pub struct CsvReporter<W: io::Write> {
    writer: csv::Writer<W>,
}

impl<W: io::Write> CsvReporter<W> {
    /// Constructs a reporter writing to `writer`. The header is written with the first row.
    pub fn new(writer: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(writer),
        }
    }

    /// Flushes and returns the underlying writer.
    ///
    /// # Errors
    ///
    /// Returns an error if flushing fails.
    pub fn into_inner(self) -> eyre::Result<W> {
        self.writer
            .into_inner()
            .map_err(|err| eyre::eyre!("unable to flush CSV output: {}", err.error()))
    }
}

impl<W: io::Write> Report for CsvReporter<W> {
    fn report(&mut self, snapshot: &Snapshot) -> eyre::Result<()> {
        self.writer
            .serialize(TickRecord::from(snapshot))
            .wrap_err("unable to write CSV record")
    }
    fn finish(&mut self) -> eyre::Result<()> {
        self.writer.flush().wrap_err("unable to flush CSV output")
    }
}

/// Shows a progress bar advancing with the number of jobs that have left the line.
pub struct ProgressReporter {
    pb: ProgressBar,
}

impl ProgressReporter {
    /// Constructs a progress bar reaching its end at `stop_limit` terminated jobs.
    #[must_use]
    pub fn new(stop_limit: usize) -> Self {
        Self::with_bar(ProgressBar::new(stop_limit as u64))
    }

    /// Reports to an existing progress bar.
    #[must_use]
    pub fn with_bar(pb: ProgressBar) -> Self {
        pb.set_style(ProgressStyle::default_bar().template("{msg} {wide_bar} {pos}/{len}"));
        Self { pb }
    }
}

impl Report for ProgressReporter {
    fn report(&mut self, snapshot: &Snapshot) -> eyre::Result<()> {
        let counters = &snapshot.counters;
        self.pb.set_position(counters.terminated() as u64);
        self.pb.set_message(&format!(
            "[{time}] [T={total}] [C={completed}] [B={broken}] [S={scrapped}] [W={waiting}]",
            time = snapshot.time,
            total = counters.total(),
            completed = counters.completed(),
            broken = counters.broken(),
            scrapped = counters.scrapped(),
            waiting = snapshot.backlog.len(),
        ));
        Ok(())
    }
    fn finish(&mut self) -> eyre::Result<()> {
        self.pb.finish();
        Ok(())
    }
}
