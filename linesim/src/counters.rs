use serde::{Deserialize, Serialize};

/// Final classification of a terminated job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::ToString)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Finished without any defect.
    Completed,
    /// Finished after one defect was repaired.
    Broken,
    /// Terminated after the second defect.
    Scrapped,
}

impl Outcome {
    /// Classifies a terminated job by the number of defects it accumulated.
    #[must_use]
    pub fn from_defects(defects: u8) -> Self {
        match defects {
            0 => Self::Completed,
            1 => Self::Broken,
            _ => Self::Scrapped,
        }
    }
}

/// Aggregate counters of a simulation run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    total: usize,
    completed: usize,
    broken: usize,
    scrapped: usize,
}

impl Counters {
    /// Registers a newly generated arrival.
    pub fn arrival(&mut self) {
        self.total += 1;
    }

    /// Registers a terminated job.
    pub fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Completed => self.completed += 1,
            Outcome::Broken => {
                self.completed += 1;
                self.broken += 1;
            }
            Outcome::Scrapped => self.scrapped += 1,
        }
    }

    /// Number of arrivals generated so far.
    #[must_use]
    pub fn total(&self) -> usize {
        self.total
    }

    /// Number of completed jobs, including the broken ones.
    #[must_use]
    pub fn completed(&self) -> usize {
        self.completed
    }

    /// Number of completed jobs that had exactly one defect.
    #[must_use]
    pub fn broken(&self) -> usize {
        self.broken
    }

    /// Number of jobs scrapped after the second defect.
    #[must_use]
    pub fn scrapped(&self) -> usize {
        self.scrapped
    }

    /// Number of jobs that have terminated, one way or another.
    #[must_use]
    pub fn terminated(&self) -> usize {
        self.completed + self.scrapped
    }
}
