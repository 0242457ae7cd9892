use std::cmp::max;

use rand::distributions::Bernoulli;
use rand::Rng;

use crate::{ConfigError, Job, JobId, MachineConfig, MachineId, SimTime, StochasticClock};

/// Result of the quality trial run when a job leaves a machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trial {
    /// The job left the machine without a new defect.
    Success,
    /// The machine made a defect; the job's defect counter was incremented.
    Defect,
}

/// A machine processes one job at a time. Each pass succeeds with a fixed probability;
/// otherwise, the job gets a defect.
#[derive(Debug, Clone)]
pub struct Machine {
    id: MachineId,
    holder: Option<JobId>,
    success_probability: f64,
    success: Bernoulli,
    mean_service: f64,
}

impl Machine {
    /// Constructs a free machine.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Probability`] if the success probability is outside of `[0, 1]`.
    pub fn new(config: &MachineConfig) -> Result<Self, ConfigError> {
        let success = Bernoulli::new(config.success_probability).map_err(|_| {
            ConfigError::Probability {
                machine: config.id,
                probability: config.success_probability,
            }
        })?;
        Ok(Self {
            id: config.id,
            holder: None,
            success_probability: config.success_probability,
            success,
            mean_service: config.mean_service,
        })
    }

    /// The ID of the machine.
    #[must_use]
    pub fn id(&self) -> MachineId {
        self.id
    }

    /// Returns `true` if no job is being processed.
    #[must_use]
    pub fn is_free(&self) -> bool {
        self.holder.is_none()
    }

    /// The job being processed, if any.
    #[must_use]
    pub fn holder(&self) -> Option<JobId> {
        self.holder
    }

    /// Probability that a pass does not make a defect.
    #[must_use]
    pub fn success_probability(&self) -> f64 {
        self.success_probability
    }

    /// Mean service time in minutes.
    #[must_use]
    pub fn mean_service(&self) -> f64 {
        self.mean_service
    }

    /// Tries to start processing `job` at time `now`.
    ///
    /// If the machine is free, it becomes busy, and the job is put in process until the end of
    /// a randomly sampled service time. Service starts at the job's own event time or at `now`,
    /// whichever is later, so a job that has been waiting does not finish in the past.
    /// Returns `false` without touching the job or the clock if the machine is busy.
    pub fn try_acquire<R: Rng>(
        &mut self,
        job: &mut Job,
        now: SimTime,
        clock: &mut StochasticClock<R>,
    ) -> bool {
        if self.holder.is_some() {
            return false;
        }
        self.holder = Some(job.id());
        let finish = max(job.time(), now) + clock.sample(self.mean_service);
        job.start(self.id, finish);
        true
    }

    /// Frees the machine held by `job`.
    pub fn release(&mut self, job: JobId) {
        debug_assert_eq!(
            self.holder,
            Some(job),
            "machine {} released by a job not holding it",
            self.id
        );
        self.holder = None;
    }

    /// Runs the quality trial for a job leaving the machine, and counts the defect if it occurs.
    pub fn trial<R: Rng>(&self, job: &mut Job, clock: &mut StochasticClock<R>) -> Trial {
        if clock.trial(&self.success) {
            Trial::Success
        } else {
            job.add_defect();
            Trial::Defect
        }
    }
}
