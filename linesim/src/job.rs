use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{JobId, MachineId, Outcome, SimTime};

/// Maximum number of defects a job can accumulate; reaching it scraps the job.
pub const MAX_DEFECTS: u8 = 2;

/// State of a job in the line.
///
/// The machine processing a job is only known while the job is [`JobState::InProcess`], which
/// makes a job referencing a machine outside of processing unrepresentable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Just arrived and not handled yet.
    Created,
    /// Waiting for any free machine.
    WaitingForStage1,
    /// Being processed by `machine`.
    InProcess {
        /// The machine holding the job.
        machine: MachineId,
    },
    /// Has one defect and waits for the repair machine.
    WaitingForRepair,
    /// Left the line with the given outcome.
    Terminated(Outcome),
}

impl JobState {
    /// Returns `true` if the job waits for a machine.
    #[must_use]
    pub fn is_waiting(&self) -> bool {
        matches!(self, Self::WaitingForStage1 | Self::WaitingForRepair)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::WaitingForStage1 => write!(f, "waiting_for_stage1"),
            Self::InProcess { machine } => write!(f, "in_process(#{})", machine),
            Self::WaitingForRepair => write!(f, "waiting_for_repair"),
            Self::Terminated(outcome) => write!(f, "terminated({})", outcome.to_string()),
        }
    }
}

/// A single unit of work flowing through the line.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    id: JobId,
    time: SimTime,
    defects: u8,
    state: JobState,
}

impl Job {
    /// Constructs a newly created job arriving at `time`.
    #[must_use]
    pub fn new(id: JobId, time: SimTime) -> Self {
        Self {
            id,
            time,
            defects: 0,
            state: JobState::Created,
        }
    }

    /// The ID of the job.
    #[must_use]
    pub fn id(&self) -> JobId {
        self.id
    }

    /// The time of the next event of this job.
    #[must_use]
    pub fn time(&self) -> SimTime {
        self.time
    }

    /// Number of defects so far, never greater than [`MAX_DEFECTS`].
    #[must_use]
    pub fn defects(&self) -> u8 {
        self.defects
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> JobState {
        self.state
    }

    /// The machine currently holding the job, if any.
    #[must_use]
    pub fn machine(&self) -> Option<MachineId> {
        match self.state {
            JobState::InProcess { machine } => Some(machine),
            _ => None,
        }
    }

    pub(crate) fn set_state(&mut self, state: JobState) {
        self.state = state;
    }

    /// Puts the job in process on `machine` until `time`.
    pub(crate) fn start(&mut self, machine: MachineId, time: SimTime) {
        self.time = time;
        self.state = JobState::InProcess { machine };
    }

    pub(crate) fn add_defect(&mut self) {
        debug_assert!(self.defects < MAX_DEFECTS, "job {} has too many defects", self.id);
        self.defects += 1;
    }

    /// Returns `true` once the job accumulated the maximum number of defects.
    #[must_use]
    pub fn is_scrap(&self) -> bool {
        self.defects >= MAX_DEFECTS
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_new_job() {
        let job = Job::new(JobId::from(3), SimTime::from_minutes(1.5));
        assert_eq!(job.id(), JobId::from(3));
        assert_eq!(job.time(), SimTime::from_minutes(1.5));
        assert_eq!(job.defects(), 0);
        assert_eq!(job.state(), JobState::Created);
        assert_eq!(job.machine(), None);
    }

    #[test]
    fn test_machine_only_in_process() {
        let mut job = Job::new(JobId::from(0), SimTime::ZERO);
        job.start(MachineId::from(2), SimTime::from_minutes(10.0));
        assert_eq!(job.machine(), Some(MachineId::from(2)));
        assert_eq!(job.time(), SimTime::from_minutes(10.0));
        job.set_state(JobState::WaitingForRepair);
        assert_eq!(job.machine(), None);
        assert!(job.state().is_waiting());
    }

    #[test]
    fn test_defects() {
        let mut job = Job::new(JobId::from(0), SimTime::ZERO);
        assert!(!job.is_scrap());
        job.add_defect();
        assert!(!job.is_scrap());
        job.add_defect();
        assert!(job.is_scrap());
        assert_eq!(job.defects(), MAX_DEFECTS);
    }

    #[test]
    fn test_display_state() {
        assert_eq!(
            JobState::InProcess {
                machine: MachineId::from(1)
            }
            .to_string(),
            "in_process(#1)"
        );
        assert_eq!(
            JobState::Terminated(Outcome::Scrapped).to_string(),
            "terminated(scrapped)"
        );
    }
}
