use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::country::SupportedCountry;
use crate::events::PopulationChange;
use crate::rates::{DemographicRates, Jitter};

/// How a tracked population moves over time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum Growth {
    /// Fixed change per second, already scaled.
    PerSecond { rate: f64 },
    /// Per-hour change re-derived from the current population every tick,
    /// multiplied by `scale` and a fresh jitter draw.
    Demographic { rates: DemographicRates, scale: f64 },
}

impl Growth {
    pub fn per_second(rate: f64) -> Self {
        Self::PerSecond { rate }
    }

    pub fn demographic(rates: DemographicRates, scale: f64) -> Self {
        Self::Demographic { rates, scale }
    }

    /// Nominal rate for `population`, in the model's own unit
    /// (per second or per hour), before jitter.
    pub fn rate(&self, population: u64) -> f64 {
        match *self {
            Self::PerSecond { rate } => rate,
            Self::Demographic { rates, scale } => rates.rate_per_hour(population) * scale,
        }
    }

    fn raw_delta(&self, population: u64, elapsed_secs: f64, jitter: &mut dyn Jitter) -> f64 {
        match *self {
            Self::PerSecond { rate } => rate * elapsed_secs,
            Self::Demographic { .. } => {
                let hours = elapsed_secs / 3600.0;
                self.rate(population) * hours * jitter.sample()
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TrackError {
    #[error("{0} is already in the list")]
    AlreadyTracked(SupportedCountry),
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProjectionError {
    #[error("non-finite population delta for {country}")]
    NonFiniteRate { country: SupportedCountry },
}

/// Live record of one country's extrapolated population.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedProjection {
    pub country: SupportedCountry,
    pub population: u64,
    pub growth: Growth,
    pub last_update: DateTime<Utc>,
    pub last_population: u64,
    pub total_change: i64,
}

impl TrackedProjection {
    fn new(country: SupportedCountry, population: u64, growth: Growth, now: DateTime<Utc>) -> Self {
        Self {
            country,
            population,
            growth,
            last_update: now,
            last_population: population,
            total_change: 0,
        }
    }

    pub fn rate(&self) -> f64 {
        self.growth.rate(self.population)
    }

    /// Extrapolates to `now`. Sub-integer remainders are dropped rather
    /// than carried into the next tick.
    fn advance(
        &mut self,
        now: DateTime<Utc>,
        jitter: &mut dyn Jitter,
    ) -> Result<Option<PopulationChange>, ProjectionError> {
        let elapsed_ms = now
            .signed_duration_since(self.last_update)
            .num_milliseconds()
            .max(0);
        let elapsed_secs = elapsed_ms as f64 / 1000.0;

        let raw = self.growth.raw_delta(self.population, elapsed_secs, jitter);
        if !raw.is_finite() {
            return Err(ProjectionError::NonFiniteRate {
                country: self.country.clone(),
            });
        }

        let delta = raw.round() as i64;
        if delta == 0 {
            return Ok(None);
        }

        let old = self.population;
        let new = if delta > 0 {
            old.saturating_add(delta.unsigned_abs())
        } else {
            old.saturating_sub(delta.unsigned_abs())
        };
        self.last_update = now;
        if new == old {
            // Already pinned at zero (or u64::MAX); nothing to render.
            return Ok(None);
        }

        let applied = i64::try_from(i128::from(new) - i128::from(old)).unwrap_or(delta);
        self.last_population = old;
        self.population = new;
        self.total_change = self.total_change.saturating_add(applied);

        Ok(Some(PopulationChange {
            country: self.country.clone(),
            old,
            new,
            delta: applied,
            total_change: self.total_change,
            at: now,
        }))
    }
}

/// Insertion-ordered set of tracked projections.
#[derive(Debug, Clone, Default)]
pub struct ProjectionEngine {
    entries: Vec<TrackedProjection>,
}

impl ProjectionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, country: &str) -> bool {
        self.get(country).is_some()
    }

    pub fn get(&self, country: &str) -> Option<&TrackedProjection> {
        self.entries.iter().find(|entry| entry.country == country)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrackedProjection> {
        self.entries.iter()
    }

    pub fn countries(&self) -> Vec<SupportedCountry> {
        self.entries.iter().map(|entry| entry.country.clone()).collect()
    }

    /// Starts tracking `country`. An existing entry is left untouched.
    pub fn track(
        &mut self,
        country: SupportedCountry,
        initial_population: u64,
        growth: Growth,
        now: DateTime<Utc>,
    ) -> Result<&TrackedProjection, TrackError> {
        if self.contains(&country) {
            return Err(TrackError::AlreadyTracked(country));
        }
        self.entries.push(TrackedProjection::new(
            country,
            initial_population,
            growth,
            now,
        ));
        let idx = self.entries.len() - 1;
        Ok(&self.entries[idx])
    }

    /// Removes `country` if present.
    pub fn untrack(&mut self, country: &str) -> Option<TrackedProjection> {
        let idx = self.entries.iter().position(|entry| entry.country == country)?;
        Some(self.entries.remove(idx))
    }

    /// Advances every projection to `now`, in insertion order, returning a
    /// change for each entry whose population moved. A failing entry is
    /// logged and skipped.
    pub fn tick(&mut self, now: DateTime<Utc>, jitter: &mut dyn Jitter) -> Vec<PopulationChange> {
        let mut changes = Vec::new();
        for entry in &mut self.entries {
            match entry.advance(now, jitter) {
                Ok(Some(change)) => changes.push(change),
                Ok(None) => {}
                Err(e) => {
                    warn!(country = %entry.country, error = %e, "skipping projection this tick");
                }
            }
        }
        if !changes.is_empty() {
            debug!(
                changed = changes.len(),
                tracked = self.entries.len(),
                "projection tick"
            );
        }
        changes
    }
}
