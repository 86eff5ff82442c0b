pub mod fixture;
pub mod population_io;

use std::future::Future;

use popclock_shared::{Growth, SupportedCountry, forecast_rate_per_second};
use serde::{Deserialize, Serialize};

use crate::config::RatePolicy;
use crate::error::SourceError;

pub use fixture::StaticSource;
pub use population_io::PopulationIoSource;

/// What a source knows about a resolved country's population.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PopulationSeed {
    Forecast { today: u64, tomorrow: u64 },
    Snapshot { population: u64 },
}

impl PopulationSeed {
    pub fn current(&self) -> u64 {
        match *self {
            Self::Forecast { today, .. } => today,
            Self::Snapshot { population } => population,
        }
    }

    /// Starting population and growth model under `policy`.
    pub fn growth(
        &self,
        country: &str,
        policy: RatePolicy,
        scale: f64,
    ) -> Result<(u64, Growth), SourceError> {
        match (policy, *self) {
            (RatePolicy::ForecastDiff, Self::Forecast { today, tomorrow }) => Ok((
                today,
                Growth::per_second(forecast_rate_per_second(today, tomorrow) * scale),
            )),
            (RatePolicy::ForecastDiff, Self::Snapshot { .. }) => {
                Err(SourceError::insufficient(country))
            }
            (RatePolicy::Demographic(rates), seed) => {
                Ok((seed.current(), Growth::demographic(rates, scale)))
            }
        }
    }
}

/// Country list plus per-country seed. Both backings implement this so the
/// registry and clock never care which one they talk to.
pub trait CountryDataSource: Send + Sync + 'static {
    fn list_countries(
        &self,
    ) -> impl Future<Output = Result<Vec<SupportedCountry>, SourceError>> + Send;

    fn population_seed(
        &self,
        country: &str,
    ) -> impl Future<Output = Result<PopulationSeed, SourceError>> + Send;
}
