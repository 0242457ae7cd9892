//! Configuration of the line and of the run.

use std::collections::HashSet;
use std::io::{Cursor, Read};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::MachineId;

/// Invalid configuration.
#[allow(missing_docs)]
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("success probability of machine {machine} must be within [0, 1] but is {probability}")]
    Probability { machine: MachineId, probability: f64 },
    #[error("mean service time of machine {machine} must be finite and non-negative but is {mean}")]
    ServiceTime { machine: MachineId, mean: f64 },
    #[error("mean interarrival time must be finite and positive but is {0}")]
    Interarrival(f64),
    #[error("first arrival time must be finite and non-negative but is {0}")]
    FirstArrival(f64),
    #[error("the line must have at least one machine")]
    NoMachines,
    #[error("machine {0} is defined more than once")]
    DuplicateMachine(MachineId),
    #[error("repair machine {0} is not defined")]
    UnknownRepairMachine(MachineId),
    #[error("stop limit must be positive")]
    ZeroStopLimit,
    #[error("arrival limit must be positive")]
    ZeroArrivalLimit,
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Configuration of a single machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineConfig {
    /// Machine ID, unique within the line.
    pub id: MachineId,
    /// Probability that a pass through the machine does not make a defect.
    pub success_probability: f64,
    /// Mean of the exponentially distributed service time, in minutes.
    pub mean_service: f64,
}

/// Simulation configuration, typically loaded from a JSON file.
///
/// Any field missing in the input takes its default value, which describes the classic
/// two-machine line: machine 1 with success probability 0.96 and mean service time of 30
/// minutes, and machine 2 with 0.92 and 50 minutes, also used for repairs. Jobs arrive every 35
/// minutes on average, and the run stops after 500 jobs have left the line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineConfig {
    /// Machines in the order in which they are offered to newly arrived jobs.
    pub machines: Vec<MachineConfig>,
    /// The only machine accepting jobs that need repair.
    pub repair_machine: MachineId,
    /// Mean of the exponentially distributed time between arrivals, in minutes.
    pub mean_interarrival: f64,
    /// The run stops once this many jobs have been completed or scrapped.
    pub stop_limit: usize,
    /// Random seed.
    pub seed: u64,
    /// Time of the first arrival. If `None`, it is sampled like any other interarrival time.
    pub first_arrival: Option<f64>,
    /// If set, no more than this many jobs will arrive.
    pub max_arrivals: Option<usize>,
}

impl Default for LineConfig {
    fn default() -> Self {
        Self {
            machines: vec![
                MachineConfig {
                    id: MachineId::from(1),
                    success_probability: 0.96,
                    mean_service: 30.0,
                },
                MachineConfig {
                    id: MachineId::from(2),
                    success_probability: 0.92,
                    mean_service: 50.0,
                },
            ],
            repair_machine: MachineId::from(2),
            mean_interarrival: 35.0,
            stop_limit: 500,
            seed: 100,
            first_arrival: None,
            max_arrivals: None,
        }
    }
}

impl LineConfig {
    /// Loads config from JSON and validates it.
    ///
    /// # Example
    ///
    /// ```
    /// # use linesim::{LineConfig, MachineId};
    /// # fn main() -> Result<(), linesim::ConfigError> {
    /// let input = r#"{"stop_limit": 20, "seed": 7}"#;
    /// let config = LineConfig::from_reader(std::io::Cursor::new(input))?;
    /// assert_eq!(config.stop_limit, 20);
    /// assert_eq!(config.seed, 7);
    /// assert_eq!(config.repair_machine, MachineId::from(2));
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// Returns an error if the input cannot be parsed or if [`LineConfig::validate`] fails.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the configuration for values that make no sense for the simulation.
    ///
    /// # Errors
    ///
    /// Returns the first problem found, e.g., a probability outside of `[0, 1]` or a repair
    /// machine that does not exist.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.machines.is_empty() {
            return Err(ConfigError::NoMachines);
        }
        let mut ids = HashSet::new();
        for machine in &self.machines {
            if !ids.insert(machine.id) {
                return Err(ConfigError::DuplicateMachine(machine.id));
            }
            if !(0.0..=1.0).contains(&machine.success_probability) {
                return Err(ConfigError::Probability {
                    machine: machine.id,
                    probability: machine.success_probability,
                });
            }
            if !machine.mean_service.is_finite() || machine.mean_service < 0.0 {
                return Err(ConfigError::ServiceTime {
                    machine: machine.id,
                    mean: machine.mean_service,
                });
            }
        }
        if !ids.contains(&self.repair_machine) {
            return Err(ConfigError::UnknownRepairMachine(self.repair_machine));
        }
        if !self.mean_interarrival.is_finite() || self.mean_interarrival <= 0.0 {
            return Err(ConfigError::Interarrival(self.mean_interarrival));
        }
        if let Some(time) = self.first_arrival {
            if !time.is_finite() || time < 0.0 {
                return Err(ConfigError::FirstArrival(time));
            }
        }
        if self.stop_limit == 0 {
            return Err(ConfigError::ZeroStopLimit);
        }
        if self.max_arrivals == Some(0) {
            return Err(ConfigError::ZeroArrivalLimit);
        }
        Ok(())
    }
}

impl FromStr for LineConfig {
    type Err = ConfigError;
    fn from_str(config: &str) -> Result<Self, Self::Err> {
        LineConfig::from_reader(Cursor::new(config))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = LineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.machines.len(), 2);
        assert_eq!(config.stop_limit, 500);
    }

    #[test]
    fn test_parse() -> Result<(), ConfigError> {
        let config: LineConfig = r#"{
            "machines": [
                {"id": 3, "success_probability": 0.5, "mean_service": 10},
                {"id": 4, "success_probability": 1, "mean_service": 20}
            ],
            "repair_machine": 3,
            "mean_interarrival": 12.5,
            "max_arrivals": 10,
            "first_arrival": 0
        }"#
        .parse()?;
        assert_eq!(config.machines[0].id, MachineId::from(3));
        assert_eq!(config.repair_machine, MachineId::from(3));
        assert_eq!(config.max_arrivals, Some(10));
        assert_eq!(config.first_arrival, Some(0.0));
        assert_eq!(config.stop_limit, 500);
        Ok(())
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(
            "{\"stop_limit\": -1}".parse::<LineConfig>(),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_invalid_probability() {
        let mut config = LineConfig::default();
        config.machines[1].success_probability = 1.01;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Probability { machine, .. }) if machine == MachineId::from(2)
        ));
        config.machines[1].success_probability = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_topology() {
        let mut config = LineConfig::default();
        config.repair_machine = MachineId::from(5);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::UnknownRepairMachine(_))
        ));

        let mut config = LineConfig::default();
        config.machines[1].id = MachineId::from(1);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DuplicateMachine(_))
        ));

        let mut config = LineConfig::default();
        config.machines.clear();
        assert!(matches!(config.validate(), Err(ConfigError::NoMachines)));
    }

    #[test]
    fn test_invalid_times_and_limits() {
        let config = LineConfig {
            mean_interarrival: 0.0,
            ..LineConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Interarrival(_))));

        let mut config = LineConfig::default();
        config.machines[0].mean_service = f64::INFINITY;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ServiceTime { .. })
        ));

        let config = LineConfig {
            first_arrival: Some(-1.0),
            ..LineConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::FirstArrival(_))));

        let config = LineConfig {
            stop_limit: 0,
            ..LineConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::ZeroStopLimit)));

        let config = LineConfig {
            max_arrivals: Some(0),
            ..LineConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ZeroArrivalLimit)
        ));
    }
}
