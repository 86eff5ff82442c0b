use std::time::Duration;

use popclock_shared::SupportedCountry;
use tracing::debug;

use super::{CountryDataSource, PopulationSeed};
use crate::error::SourceError;

/// Built-in table used when no live forecast service is reachable.
pub const BUILTIN_POPULATIONS: &[(&str, u64)] = &[
    ("Norway", 5_421_241),
    ("Sweden", 10_353_442),
    ("Denmark", 5_831_404),
    ("Finland", 5_540_720),
    ("Iceland", 366_425),
    ("Germany", 83_783_942),
    ("France", 65_273_511),
    ("Spain", 46_754_778),
    ("Italy", 60_461_826),
    ("United Kingdom", 67_886_011),
    ("United States", 331_002_651),
    ("Canada", 37_742_154),
    ("Mexico", 128_932_753),
    ("Brazil", 212_559_417),
    ("Argentina", 45_195_774),
    ("China", 1_439_323_776),
    ("Japan", 126_476_461),
    ("South Korea", 51_269_185),
    ("India", 1_380_004_385),
    ("Australia", 25_499_884),
];

/// In-process country table with a single population figure per country.
#[derive(Debug, Clone)]
pub struct StaticSource {
    table: Vec<(SupportedCountry, u64)>,
    latency: Duration,
}

impl Default for StaticSource {
    fn default() -> Self {
        Self::new(
            BUILTIN_POPULATIONS
                .iter()
                .map(|&(name, population)| (name.to_string(), population))
                .collect(),
        )
    }
}

impl StaticSource {
    pub fn new(table: Vec<(SupportedCountry, u64)>) -> Self {
        Self {
            table,
            latency: Duration::ZERO,
        }
    }

    /// Delay each seed lookup, to mimic a slow upstream.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }
}

impl CountryDataSource for StaticSource {
    async fn list_countries(&self) -> Result<Vec<SupportedCountry>, SourceError> {
        Ok(self.table.iter().map(|(name, _)| name.clone()).collect())
    }

    async fn population_seed(&self, country: &str) -> Result<PopulationSeed, SourceError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let population = self
            .table
            .iter()
            .find(|(name, _)| name == country)
            .map(|&(_, population)| population)
            .ok_or_else(|| SourceError::insufficient(country))?;
        debug!(%country, population, "static population seed");
        Ok(PopulationSeed::Snapshot { population })
    }
}
