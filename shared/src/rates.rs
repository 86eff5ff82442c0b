use rand::Rng;
use serde::{Deserialize, Serialize};

pub const SECONDS_PER_DAY: f64 = 86_400.0;
pub const HOURS_PER_YEAR: f64 = 365.0 * 24.0;

/// Approximate global averages, per 1000 people per year.
pub const DEFAULT_BIRTH_RATE: f64 = 18.0;
pub const DEFAULT_DEATH_RATE: f64 = 8.0;

pub const DEFAULT_JITTER_LOW: f64 = 0.8;
pub const DEFAULT_JITTER_HIGH: f64 = 1.2;

/// Per-second change implied by a today/tomorrow forecast pair.
pub fn forecast_rate_per_second(today: u64, tomorrow: u64) -> f64 {
    (tomorrow as f64 - today as f64) / SECONDS_PER_DAY
}

/// Birth and death rates, per 1000 people per year.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DemographicRates {
    pub birth_per_1000: f64,
    pub death_per_1000: f64,
}

impl Default for DemographicRates {
    fn default() -> Self {
        Self {
            birth_per_1000: DEFAULT_BIRTH_RATE,
            death_per_1000: DEFAULT_DEATH_RATE,
        }
    }
}

impl DemographicRates {
    pub fn new(birth_per_1000: f64, death_per_1000: f64) -> Self {
        Self {
            birth_per_1000,
            death_per_1000,
        }
    }

    /// Net change per hour for a population of the given size.
    pub fn rate_per_hour(&self, population: u64) -> f64 {
        ((self.birth_per_1000 - self.death_per_1000) / HOURS_PER_YEAR)
            * (population as f64 / 1000.0)
    }
}

/// Multiplier drawn once per tick for each demographic projection.
pub trait Jitter {
    fn sample(&mut self) -> f64;
}

/// Always 1.0.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoJitter;

impl Jitter for NoJitter {
    fn sample(&mut self) -> f64 {
        1.0
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedJitter(pub f64);

impl Jitter for FixedJitter {
    fn sample(&mut self) -> f64 {
        self.0
    }
}

/// Uniform draw from `[low, high]`.
#[derive(Debug, Clone)]
pub struct UniformJitter<R> {
    rng: R,
    low: f64,
    high: f64,
}

impl<R: Rng> UniformJitter<R> {
    /// Bounds are swapped if given in the wrong order; a degenerate range
    /// always yields `low`.
    pub fn new(rng: R, low: f64, high: f64) -> Self {
        let (low, high) = if low <= high { (low, high) } else { (high, low) };
        Self { rng, low, high }
    }

    pub fn with_default_bounds(rng: R) -> Self {
        Self::new(rng, DEFAULT_JITTER_LOW, DEFAULT_JITTER_HIGH)
    }
}

impl<R: Rng> Jitter for UniformJitter<R> {
    fn sample(&mut self) -> f64 {
        if self.high - self.low <= f64::EPSILON {
            return self.low;
        }
        self.rng.gen_range(self.low..=self.high)
    }
}
