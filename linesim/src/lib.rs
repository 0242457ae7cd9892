//! Two-stage manufacturing line simulation.
//!
//! Jobs arrive at random intervals and compete for a fixed set of machines. Each pass through a
//! machine may leave a defect on the job. A job with one defect is sent to the designated repair
//! machine, and a job with two defects is scrapped.
//!
//! The engine is a discrete-event scheduler with two queues: the *future queue*, holding all
//! pending events ordered by time, and the *backlog*, holding the events that are due now along
//! with the jobs still waiting for a free machine. See [`EventScheduler`] for the details of the
//! time advance and the same-tick retry loop.

#![warn(
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unused_import_braces,
    unused_qualifications
)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::module_name_repetitions,
    clippy::default_trait_access,
    clippy::inline_always
)]

use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};

mod clock;
pub use clock::StochasticClock;

mod config;
pub use config::{ConfigError, LineConfig, MachineConfig};

mod counters;
pub use counters::{Counters, Outcome};

mod job;
pub use job::{Job, JobState};

mod machine;
pub use machine::{Machine, Trial};

mod report;
pub use report::{CsvReporter, LogReporter, ProgressReporter, Report};

mod scheduler;
pub use scheduler::{AuditError, EventScheduler, Transition};

mod simulation;
pub use simulation::{JobView, RunSummary, Simulation, Snapshot};

mod time;
pub use time::SimTime;

/// Job ID, unique within a single simulation and assigned in the order of arrival.
#[derive(
    From,
    Into,
    Debug,
    PartialEq,
    PartialOrd,
    Eq,
    Ord,
    Serialize,
    Deserialize,
    Copy,
    Clone,
    Hash,
    Display,
)]
pub struct JobId(usize);

/// Machine ID as given in the configuration.
#[derive(
    From,
    Into,
    Debug,
    PartialEq,
    PartialOrd,
    Eq,
    Ord,
    Serialize,
    Deserialize,
    Copy,
    Clone,
    Hash,
    Display,
)]
pub struct MachineId(usize);
