use rand::distributions::{Bernoulli, Distribution, Open01};
use rand::Rng;
use rand_chacha::{rand_core::SeedableRng, ChaChaRng};

/// The only source of randomness in a simulation.
///
/// It draws exponentially distributed durations, used both for intervals between arrivals and
/// for service times, and performs the success trials of the machines. Owning a single stream
/// per simulation makes every run reproducible from its seed.
pub struct StochasticClock<R = ChaChaRng> {
    rng: R,
}

impl StochasticClock<ChaChaRng> {
    /// Constructs a clock backed by a [`ChaChaRng`] seeded with `seed`.
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self::new(ChaChaRng::seed_from_u64(seed))
    }
}

impl<R: Rng> StochasticClock<R> {
    /// Constructs a clock drawing from the given random number generator.
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    /// Samples a duration from the exponential distribution with the given `mean`.
    ///
    /// Computed as `-mean * ln(u)`, where `u` is drawn from the open interval `(0, 1)`, so the
    /// result is always finite and non-negative.
    pub fn sample(&mut self, mean: f64) -> f64 {
        let u: f64 = self.rng.sample(Open01);
        -mean * u.ln()
    }

    /// Runs a single Bernoulli trial. Returns `true` on success.
    pub fn trial(&mut self, distr: &Bernoulli) -> bool {
        distr.sample(&mut self.rng)
    }
}
