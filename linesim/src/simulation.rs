use std::fmt;

use rand::Rng;
use rand_chacha::ChaChaRng;
use serde::{Deserialize, Serialize};

use crate::{
    ConfigError, Counters, EventScheduler, Job, JobId, JobState, LineConfig, Report, SimTime,
    StochasticClock, Transition,
};

/// Read-only view of a queued job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobView {
    /// Job ID.
    pub id: JobId,
    /// Time of the job's next event.
    pub time: SimTime,
    /// Current state.
    pub state: JobState,
    /// Number of defects so far.
    pub defects: u8,
}

impl From<&Job> for JobView {
    fn from(job: &Job) -> Self {
        Self {
            id: job.id(),
            time: job.time(),
            state: job.state(),
            defects: job.defects(),
        }
    }
}

impl fmt::Display for JobView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Id: {}. Time: {} State: {}. Defects: {}",
            self.id, self.time, self.state, self.defects
        )
    }
}

/// State of the simulation right after a tick, passed to [`Report`] implementors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Number of ticks so far, including this one.
    pub tick: usize,
    /// Simulation time of this tick.
    pub time: SimTime,
    /// Aggregate counters.
    pub counters: Counters,
    /// Jobs left waiting for the next tick.
    pub backlog: Vec<JobView>,
    /// Pending events.
    pub future: Vec<JobView>,
    /// State changes made during this tick.
    pub transitions: Vec<Transition>,
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Current time: {}", self.time)?;
        writeln!(f, "Total = {}", self.counters.total())?;
        writeln!(f, "Completed = {}", self.counters.completed())?;
        writeln!(f, "Broken = {}", self.counters.broken())?;
        writeln!(f, "Scrapped = {}", self.counters.scrapped())?;
        writeln!(f, "Backlog = {}", self.backlog.len())?;
        write!(f, "Future = {}", self.future.len())
    }
}

/// Final result of a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Number of ticks executed.
    pub ticks: usize,
    /// Simulation time at the end of the run.
    pub time: SimTime,
    /// Final counters.
    pub counters: Counters,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] ticks={} total={} completed={} broken={} scrapped={}",
            self.time,
            self.ticks,
            self.counters.total(),
            self.counters.completed(),
            self.counters.broken(),
            self.counters.scrapped()
        )
    }
}

/// The main simulation object: drives the scheduler tick by tick until enough jobs have left
/// the line.
pub struct Simulation<R = ChaChaRng> {
    clock: StochasticClock<R>,
    scheduler: EventScheduler,
    counters: Counters,
    stop_limit: usize,
    ticks: usize,
}

impl Simulation<ChaChaRng> {
    /// Constructs a simulation seeded with `config.seed`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid. See [`LineConfig::validate`].
    pub fn new(config: &LineConfig) -> Result<Self, ConfigError> {
        Self::with_clock(config, StochasticClock::seeded(config.seed))
    }
}

impl<R: Rng> Simulation<R> {
    /// Constructs a simulation drawing random values from the given clock, and schedules the
    /// first arrival.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid. See [`LineConfig::validate`].
    pub fn with_clock(
        config: &LineConfig,
        mut clock: StochasticClock<R>,
    ) -> Result<Self, ConfigError> {
        let mut scheduler = EventScheduler::new(config)?;
        let mut counters = Counters::default();
        let first = config.first_arrival.map_or_else(
            || SimTime::ZERO + clock.sample(config.mean_interarrival),
            SimTime::from_minutes,
        );
        scheduler.schedule_arrival(first, &mut counters);
        Ok(Self {
            clock,
            scheduler,
            counters,
            stop_limit: config.stop_limit,
            ticks: 0,
        })
    }

    /// Number of arrivals generated so far.
    #[must_use]
    pub fn total(&self) -> usize {
        self.counters.total()
    }

    /// Number of completed jobs, including the broken ones.
    #[must_use]
    pub fn completed(&self) -> usize {
        self.counters.completed()
    }

    /// Number of completed jobs that had one defect.
    #[must_use]
    pub fn broken(&self) -> usize {
        self.counters.broken()
    }

    /// Number of scrapped jobs.
    #[must_use]
    pub fn scrapped(&self) -> usize {
        self.counters.scrapped()
    }

    /// Current simulation time.
    #[must_use]
    pub fn time(&self) -> SimTime {
        self.scheduler.now()
    }

    /// All counters.
    #[must_use]
    pub fn counters(&self) -> Counters {
        self.counters
    }

    /// The underlying scheduler.
    #[must_use]
    pub fn scheduler(&self) -> &EventScheduler {
        &self.scheduler
    }

    /// Jobs in the future queue.
    #[must_use]
    pub fn future_queue(&self) -> Vec<JobView> {
        self.scheduler
            .future_jobs()
            .into_iter()
            .map(JobView::from)
            .collect()
    }

    /// Jobs in the backlog.
    #[must_use]
    pub fn backlog(&self) -> Vec<JobView> {
        self.scheduler
            .backlog_jobs()
            .into_iter()
            .map(JobView::from)
            .collect()
    }

    /// Returns `true` once the stop limit has been reached or there is nothing left to simulate.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.counters.terminated() >= self.stop_limit || !self.scheduler.has_events()
    }

    /// Executes a single tick: advances the time to the next event and processes everything
    /// that can happen at that time.
    ///
    /// Returns `None` without doing anything if the simulation is finished.
    pub fn step(&mut self) -> Option<Snapshot> {
        if self.is_finished() {
            return None;
        }
        self.scheduler.advance()?;
        self.scheduler.drain(&mut self.counters, &mut self.clock);
        self.ticks += 1;
        debug_assert_eq!(self.scheduler.audit(), Ok(()));
        Some(Snapshot {
            tick: self.ticks,
            time: self.scheduler.now(),
            counters: self.counters,
            backlog: self.backlog(),
            future: self.future_queue(),
            transitions: self.scheduler.take_transitions(),
        })
    }

    /// Runs until the simulation is finished, passing a snapshot to `reporter` after each tick.
    ///
    /// # Errors
    ///
    /// Returns an error if the reporter fails.
    pub fn run<P: Report + ?Sized>(&mut self, reporter: &mut P) -> eyre::Result<RunSummary> {
        log::info!("Starting simulation; stopping after {} jobs", self.stop_limit);
        while let Some(snapshot) = self.step() {
            reporter.report(&snapshot)?;
        }
        reporter.finish()?;
        let summary = self.summary();
        log::info!("Simulation finished: {}", summary);
        Ok(summary)
    }

    /// Summary of the run so far.
    #[must_use]
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            ticks: self.ticks,
            time: self.scheduler.now(),
            counters: self.counters,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{MachineConfig, MachineId, Outcome};
    use rstest::{fixture, rstest};

    #[fixture]
    fn config() -> LineConfig {
        LineConfig {
            stop_limit: 50,
            ..LineConfig::default()
        }
    }

    #[rstest]
    fn test_first_arrival(config: LineConfig) {
        let simulation = Simulation::new(&config).unwrap();
        assert_eq!(simulation.total(), 1);
        assert_eq!(simulation.time(), SimTime::ZERO);
        let future = simulation.future_queue();
        assert_eq!(future.len(), 1);
        assert_eq!(future[0].state, JobState::Created);
        assert!(future[0].time > SimTime::ZERO);
        assert!(simulation.backlog().is_empty());
    }

    #[rstest]
    fn test_fixed_first_arrival(config: LineConfig) {
        let config = LineConfig {
            first_arrival: Some(12.0),
            ..config
        };
        let mut simulation = Simulation::new(&config).unwrap();
        let snapshot = simulation.step().unwrap();
        assert_eq!(snapshot.tick, 1);
        assert_eq!(snapshot.time, SimTime::from_minutes(12.0));
    }

    #[rstest]
    fn test_run_stops_at_limit(config: LineConfig) {
        let mut simulation = Simulation::new(&config).unwrap();
        let summary = simulation.run(&mut ()).unwrap();
        assert!(simulation.is_finished());
        assert!(simulation.step().is_none());
        let counters = summary.counters;
        assert!(counters.terminated() >= 50);
        assert!(counters.broken() <= counters.completed());
        assert!(counters.total() >= counters.terminated());
        assert_eq!(summary.time, simulation.time());
    }

    #[rstest]
    fn test_snapshots_are_monotonic(config: LineConfig) {
        let mut simulation = Simulation::new(&config).unwrap();
        let mut last = SimTime::ZERO;
        let mut tick = 0;
        while let Some(snapshot) = simulation.step() {
            tick += 1;
            assert_eq!(snapshot.tick, tick);
            assert!(snapshot.time >= last);
            last = snapshot.time;
            assert!(snapshot.transitions.iter().all(|t| t.time == snapshot.time));
            assert!(snapshot.backlog.iter().all(|j| j.state.is_waiting()));
            assert!(snapshot.future.iter().all(|j| j.time >= snapshot.time));
        }
    }

    #[test]
    fn test_single_machine_line() {
        let config = LineConfig {
            machines: vec![MachineConfig {
                id: MachineId::from(7),
                success_probability: 0.5,
                mean_service: 20.0,
            }],
            repair_machine: MachineId::from(7),
            stop_limit: 30,
            ..LineConfig::default()
        };
        let mut simulation = Simulation::new(&config).unwrap();
        let mut outcomes = Vec::new();
        while let Some(snapshot) = simulation.step() {
            outcomes.extend(snapshot.transitions.iter().filter_map(|t| match t.to {
                JobState::Terminated(outcome) => Some(outcome),
                _ => None,
            }));
        }
        assert_eq!(outcomes.len(), 30);
        let count = |o: Outcome| outcomes.iter().filter(|&&x| x == o).count();
        assert_eq!(
            count(Outcome::Completed) + count(Outcome::Broken),
            simulation.completed()
        );
        assert_eq!(count(Outcome::Broken), simulation.broken());
        assert_eq!(count(Outcome::Scrapped), simulation.scrapped());
    }

    #[test]
    fn test_invalid_config() {
        let config = LineConfig {
            mean_interarrival: -1.0,
            ..LineConfig::default()
        };
        assert!(Simulation::new(&config).is_err());
    }

    #[test]
    fn test_display() {
        let snapshot = Snapshot {
            tick: 1,
            time: SimTime::from_minutes(61.0),
            counters: Counters::default(),
            backlog: vec![],
            future: vec![JobView {
                id: JobId::from(0),
                time: SimTime::from_minutes(90.0),
                state: JobState::Created,
                defects: 0,
            }],
            transitions: vec![],
        };
        assert_eq!(
            snapshot.to_string(),
            "Current time: 0 d. 1 h. 1.00 m.\nTotal = 0\nCompleted = 0\nBroken = 0\n\
             Scrapped = 0\nBacklog = 0\nFuture = 1"
        );
        assert_eq!(
            snapshot.future[0].to_string(),
            "Id: 0. Time: 0 d. 1 h. 30.00 m. State: created. Defects: 0"
        );
    }
}
