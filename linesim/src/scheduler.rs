use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet};

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::job::MAX_DEFECTS;
use crate::{
    ConfigError, Counters, Job, JobId, JobState, LineConfig, Machine, MachineId, Outcome,
    SimTime, StochasticClock, Trial,
};

/// Heap entry. Ties in time are broken by job ID, which makes the processing order of
/// simultaneous events deterministic.
type Entry = Reverse<(SimTime, JobId)>;

/// A single change of a job's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    /// Simulation time at which the transition happened.
    pub time: SimTime,
    /// The job that changed its state.
    pub job: JobId,
    /// State before the transition.
    pub from: JobState,
    /// State after the transition.
    pub to: JobState,
}

/// Inconsistency found by [`EventScheduler::audit`].
#[allow(missing_docs)]
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum AuditError {
    #[error("job {0} is queued more than once")]
    DuplicateEntry(JobId),
    #[error("job {0} is queued but does not exist")]
    UnknownEntry(JobId),
    #[error("job {0} exists but is not queued")]
    MissingJob(JobId),
    #[error("queue entry of job {0} does not match its event time")]
    StaleEntry(JobId),
    #[error("job {0} is scheduled in the past")]
    PastEvent(JobId),
    #[error("job {0} has more defects than allowed")]
    TooManyDefects(JobId),
    #[error("machine {machine} and job {job} disagree on who holds whom")]
    HolderMismatch { machine: MachineId, job: JobId },
    #[error("job {job} is waiting even though machine {machine} is free")]
    MissedAcquisition { machine: MachineId, job: JobId },
}

/// The discrete-event engine of the line.
///
/// Jobs are stored in an arena indexed by their IDs, while the queues only contain
/// `(time, id)` handles:
/// - the **future queue** contains every pending event: arrivals and process completions;
/// - the **backlog** contains the events due at the current time, together with all jobs
///   waiting for a machine. It is not cleared between ticks: waiting jobs stay there and are
///   merged with the events due at the next tick.
///
/// A tick consists of [`advance`](Self::advance) followed by [`drain`](Self::drain).
pub struct EventScheduler {
    jobs: Vec<Option<Job>>,
    machines: Vec<Machine>,
    repair_machine: MachineId,
    mean_interarrival: f64,
    max_arrivals: Option<usize>,
    future: BinaryHeap<Entry>,
    backlog: BinaryHeap<Entry>,
    now: SimTime,
    transitions: Vec<Transition>,
}

impl EventScheduler {
    /// Constructs a scheduler with free machines and empty queues.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid. See [`LineConfig::validate`].
    pub fn new(config: &LineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            jobs: Vec::new(),
            machines: config
                .machines
                .iter()
                .map(Machine::new)
                .collect::<Result<_, _>>()?,
            repair_machine: config.repair_machine,
            mean_interarrival: config.mean_interarrival,
            max_arrivals: config.max_arrivals,
            future: BinaryHeap::new(),
            backlog: BinaryHeap::new(),
            now: SimTime::ZERO,
            transitions: Vec::new(),
        })
    }

    /// Current simulation time.
    #[must_use]
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// Machines in configuration order.
    #[must_use]
    pub fn machines(&self) -> &[Machine] {
        &self.machines
    }

    /// Returns the job with the given ID, unless it has already terminated.
    #[must_use]
    pub fn job(&self, id: JobId) -> Option<&Job> {
        self.jobs.get(usize::from(id)).and_then(Option::as_ref)
    }

    /// Returns `true` if there is at least one pending event.
    #[must_use]
    pub fn has_events(&self) -> bool {
        !self.future.is_empty()
    }

    /// Jobs in the future queue, in the order they will be processed.
    #[must_use]
    pub fn future_jobs(&self) -> Vec<&Job> {
        self.sorted_jobs(&self.future)
    }

    /// Jobs in the backlog, in the order they will be processed.
    #[must_use]
    pub fn backlog_jobs(&self) -> Vec<&Job> {
        self.sorted_jobs(&self.backlog)
    }

    fn sorted_jobs(&self, heap: &BinaryHeap<Entry>) -> Vec<&Job> {
        let mut entries: Vec<_> = heap.iter().map(|Reverse(entry)| *entry).collect();
        entries.sort_unstable();
        entries
            .into_iter()
            .filter_map(|(_, id)| self.job(id))
            .collect()
    }

    /// Takes out all transitions recorded since the last call.
    pub fn take_transitions(&mut self) -> Vec<Transition> {
        std::mem::take(&mut self.transitions)
    }

    /// Creates a new job arriving at `time` and puts it in the future queue.
    ///
    /// Returns `None` if the configured arrival limit has already been reached.
    pub fn schedule_arrival(&mut self, time: SimTime, counters: &mut Counters) -> Option<JobId> {
        if self.max_arrivals.map_or(false, |max| self.jobs.len() >= max) {
            log::debug!("Arrival limit reached; no more jobs will arrive");
            return None;
        }
        let id = JobId::from(self.jobs.len());
        self.jobs.push(Some(Job::new(id, time)));
        self.future.push(Reverse((time, id)));
        counters.arrival();
        log::trace!("[{}] Job {} will arrive at {}", self.now, id, time);
        Some(id)
    }

    /// Moves the clock forward to the earliest pending event, and moves all events due at that
    /// exact time from the future queue to the backlog.
    ///
    /// Returns the new time, or `None` if there are no pending events.
    pub fn advance(&mut self) -> Option<SimTime> {
        let Reverse((time, id)) = self.future.pop()?;
        self.now = time;
        self.backlog.push(Reverse((time, id)));
        while let Some(&Reverse((next, _))) = self.future.peek() {
            if next != time {
                break;
            }
            if let Some(entry) = self.future.pop() {
                self.backlog.push(entry);
            }
        }
        log::debug!("[{}] Advanced clock; {} events in backlog", time, self.backlog.len());
        Some(time)
    }

    /// Processes the backlog until no job can make progress without advancing the time.
    ///
    /// Each job is stepped once. Jobs that start processing go to the future queue, terminated
    /// jobs are counted and dropped, and waiting jobs are set aside. Whenever a job leaves a
    /// machine, all jobs set aside so far go back to the backlog to get a chance at the freed
    /// machine at the same instant. Once the backlog is exhausted, the jobs still waiting form
    /// the backlog for the next tick.
    pub fn drain<R: Rng>(&mut self, counters: &mut Counters, clock: &mut StochasticClock<R>) {
        let mut pending: Vec<Entry> = Vec::new();
        while let Some(Reverse((_, id))) = self.backlog.pop() {
            let mut job = self.jobs[usize::from(id)]
                .take()
                .expect("queued job must exist");
            let released = self.step(&mut job, counters, clock);
            let entry = Reverse((job.time(), id));
            match job.state() {
                JobState::InProcess { .. } => self.future.push(entry),
                JobState::WaitingForStage1 | JobState::WaitingForRepair => pending.push(entry),
                JobState::Terminated(_) => {}
                JobState::Created => unreachable!("created jobs are always handled"),
            }
            if !matches!(job.state(), JobState::Terminated(_)) {
                self.jobs[usize::from(id)] = Some(job);
            }
            if released && !pending.is_empty() {
                log::trace!("[{}] Machine released; retrying {} jobs", self.now, pending.len());
                self.backlog.extend(pending.drain(..));
            }
        }
        self.backlog.extend(pending);
    }

    /// Runs a single state machine step. Returns `true` if a machine has been released.
    fn step<R: Rng>(
        &mut self,
        job: &mut Job,
        counters: &mut Counters,
        clock: &mut StochasticClock<R>,
    ) -> bool {
        match job.state() {
            JobState::Created => {
                let next = self.now + clock.sample(self.mean_interarrival);
                self.schedule_arrival(next, counters);
                self.transition(job, JobState::WaitingForStage1);
                self.try_stage1(job, clock);
                false
            }
            JobState::WaitingForStage1 => {
                self.try_stage1(job, clock);
                false
            }
            JobState::InProcess { machine } => {
                let idx = self.machine_index(machine);
                self.machines[idx].release(job.id());
                let trial = self.machines[idx].trial(job, clock);
                if trial == Trial::Success || job.is_scrap() {
                    let outcome = Outcome::from_defects(job.defects());
                    self.transition(job, JobState::Terminated(outcome));
                    counters.record(outcome);
                } else {
                    self.transition(job, JobState::WaitingForRepair);
                    self.try_repair(job, clock);
                }
                true
            }
            JobState::WaitingForRepair => {
                self.try_repair(job, clock);
                false
            }
            JobState::Terminated(_) => false,
        }
    }

    /// Offers the job to every machine in configuration order.
    fn try_stage1<R: Rng>(&mut self, job: &mut Job, clock: &mut StochasticClock<R>) {
        let now = self.now;
        let from = job.state();
        if self
            .machines
            .iter_mut()
            .any(|machine| machine.try_acquire(job, now, clock))
        {
            self.record(job, from);
        }
    }

    fn try_repair<R: Rng>(&mut self, job: &mut Job, clock: &mut StochasticClock<R>) {
        let idx = self.machine_index(self.repair_machine);
        let from = job.state();
        if self.machines[idx].try_acquire(job, self.now, clock) {
            self.record(job, from);
        }
    }

    fn transition(&mut self, job: &mut Job, state: JobState) {
        let from = job.state();
        job.set_state(state);
        self.record(job, from);
    }

    fn record(&mut self, job: &Job, from: JobState) {
        let to = job.state();
        if from == to {
            return;
        }
        log::trace!("[{}] Job {}: {} -> {}", self.now, job.id(), from, to);
        self.transitions.push(Transition {
            time: self.now,
            job: job.id(),
            from,
            to,
        });
    }

    fn machine_index(&self, id: MachineId) -> usize {
        self.machines
            .iter()
            .position(|machine| machine.id() == id)
            .expect("machine IDs are validated at construction")
    }

    /// Checks the consistency of the scheduler between ticks, i.e., before the first
    /// [`advance`](Self::advance) or right after a [`drain`](Self::drain):
    /// - every existing job is queued exactly once, and every queued job exists;
    /// - queue entries carry the current event times of their jobs;
    /// - nothing in the future queue is scheduled before the current time;
    /// - no job has more than two defects;
    /// - a machine is held by a job if and only if that job is in process on that machine;
    /// - no job waits for a machine that is free.
    ///
    /// # Errors
    ///
    /// Returns the first inconsistency found.
    pub fn audit(&self) -> Result<(), AuditError> {
        let mut seen = HashSet::new();
        let entries = self
            .future
            .iter()
            .map(|entry| (true, entry))
            .chain(self.backlog.iter().map(|entry| (false, entry)));
        for (is_future, Reverse((time, id))) in entries {
            if !seen.insert(*id) {
                return Err(AuditError::DuplicateEntry(*id));
            }
            let job = self.job(*id).ok_or(AuditError::UnknownEntry(*id))?;
            if job.time() != *time {
                return Err(AuditError::StaleEntry(*id));
            }
            if is_future && *time < self.now {
                return Err(AuditError::PastEvent(*id));
            }
        }
        for job in self.jobs.iter().flatten() {
            if !seen.contains(&job.id()) {
                return Err(AuditError::MissingJob(job.id()));
            }
            if job.defects() > MAX_DEFECTS {
                return Err(AuditError::TooManyDefects(job.id()));
            }
            if let Some(machine) = job.machine() {
                let idx = self.machine_index(machine);
                if self.machines[idx].holder() != Some(job.id()) {
                    return Err(AuditError::HolderMismatch {
                        machine,
                        job: job.id(),
                    });
                }
            }
        }
        for machine in &self.machines {
            if let Some(id) = machine.holder() {
                if self.job(id).and_then(Job::machine) != Some(machine.id()) {
                    return Err(AuditError::HolderMismatch {
                        machine: machine.id(),
                        job: id,
                    });
                }
            }
        }
        self.audit_waiting()
    }

    fn audit_waiting(&self) -> Result<(), AuditError> {
        let repair = &self.machines[self.machine_index(self.repair_machine)];
        for job in self.backlog_jobs() {
            let free = match job.state() {
                JobState::WaitingForStage1 => self.machines.iter().find(|m| m.is_free()),
                JobState::WaitingForRepair => Some(repair).filter(|m| m.is_free()),
                _ => None,
            };
            if let Some(machine) = free {
                return Err(AuditError::MissedAcquisition {
                    machine: machine.id(),
                    job: job.id(),
                });
            }
        }
        Ok(())
    }
}
