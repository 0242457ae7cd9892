use std::fmt;
use std::ops::Add;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

const MINUTES_PER_HOUR: i64 = 60;
const MINUTES_PER_DAY: i64 = 24 * MINUTES_PER_HOUR;

/// Simulated time, measured in minutes since the start of the simulation.
///
/// Wraps an [`OrderedFloat`] so that it can be used directly as a key in the scheduler's heaps.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SimTime(OrderedFloat<f64>);

impl SimTime {
    /// The start of the simulation.
    pub const ZERO: Self = Self(OrderedFloat(0.0));

    /// Constructs a time point from the number of minutes since the start.
    #[must_use]
    pub fn from_minutes(minutes: f64) -> Self {
        Self(OrderedFloat(minutes))
    }

    /// Number of minutes since the start.
    #[must_use]
    pub fn as_minutes(self) -> f64 {
        self.0.into_inner()
    }
}

impl Add<f64> for SimTime {
    type Output = Self;

    fn add(self, minutes: f64) -> Self::Output {
        Self(self.0 + minutes)
    }
}

impl From<f64> for SimTime {
    fn from(minutes: f64) -> Self {
        Self::from_minutes(minutes)
    }
}

/// Formats as days, hours, and (fractional) minutes, e.g., `1 d. 2 h. 3.50 m.`.
impl fmt::Display for SimTime {
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let time = self.as_minutes();
        let whole = time as i64;
        let days = whole / MINUTES_PER_DAY;
        let hours = (whole % MINUTES_PER_DAY) / MINUTES_PER_HOUR;
        let minutes = time - (days * MINUTES_PER_DAY + hours * MINUTES_PER_HOUR) as f64;
        write!(f, "{} d. {} h. {:.2} m.", days, hours, minutes)
    }
}
