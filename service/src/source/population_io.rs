use popclock_shared::SupportedCountry;
use reqwest::Url;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::{CountryDataSource, PopulationSeed};
use crate::config::{api_base, upstream_connect_timeout, upstream_http_timeout};
use crate::error::SourceError;

#[derive(Debug, Deserialize)]
struct CountriesResponse {
    countries: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct TodayAndTomorrowResponse {
    #[serde(default)]
    total_population: Vec<DatedPopulation>,
}

#[derive(Debug, Deserialize)]
struct DatedPopulation {
    #[serde(default)]
    population: Option<u64>,
}

/// population.io client: country list plus today/tomorrow forecasts.
#[derive(Debug, Clone)]
pub struct PopulationIoSource {
    client: reqwest::Client,
    base: Url,
}

impl PopulationIoSource {
    pub fn new(client: reqwest::Client, base: &str) -> Result<Self, SourceError> {
        let base = Url::parse(base)
            .map_err(|e| SourceError::unavailable(format!("invalid API base {base}: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(SourceError::unavailable(format!(
                "API base {base} cannot carry a path"
            )));
        }
        Ok(Self { client, base })
    }

    /// Client with the configured timeouts, pointed at the configured base.
    pub fn from_env() -> Result<Self, SourceError> {
        let request_timeout = upstream_http_timeout();
        let connect_timeout = upstream_connect_timeout();
        let client = reqwest::Client::builder()
            .user_agent("popclock/0.1")
            .timeout(request_timeout)
            .connect_timeout(connect_timeout)
            .build()
            .or_else(|e| {
                warn!(
                    error = %e,
                    "failed to build configured HTTP client, retrying without custom user-agent"
                );
                reqwest::Client::builder()
                    .timeout(request_timeout)
                    .connect_timeout(connect_timeout)
                    .build()
            })?;
        let base = api_base();
        info!(%base, "using population.io source");
        Self::new(client, &base)
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, SourceError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| SourceError::unavailable(format!("{} cannot carry a path", self.base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

impl CountryDataSource for PopulationIoSource {
    async fn list_countries(&self) -> Result<Vec<SupportedCountry>, SourceError> {
        let url = self.endpoint(&["countries", ""])?;
        let resp = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?
            .error_for_status()?;
        let data: CountriesResponse = resp.json().await?;
        Ok(data.countries)
    }

    async fn population_seed(&self, country: &str) -> Result<PopulationSeed, SourceError> {
        let url = self.endpoint(&["population", country, "today-and-tomorrow", ""])?;
        debug!(%url, "fetching population forecast");
        let resp = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?
            .error_for_status()?;
        let data: TodayAndTomorrowResponse = resp.json().await?;

        let mut figures = data.total_population.iter().map(|entry| entry.population);
        match (figures.next().flatten(), figures.next().flatten()) {
            (Some(today), Some(tomorrow)) if today > 0 && tomorrow > 0 => {
                Ok(PopulationSeed::Forecast { today, tomorrow })
            }
            _ => Err(SourceError::insufficient(country)),
        }
    }
}
