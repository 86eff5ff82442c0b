use std::time::Duration;

use popclock_shared::{DEFAULT_BIRTH_RATE, DEFAULT_DEATH_RATE, DemographicRates};

pub const POPULATION_API_BASE: &str = "https://d6wn6bmjj722w.population.io/1.0";

pub const DEFAULT_TICK_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_RATE_SCALE: f64 = 1.0;
pub const DEFAULT_ANIMATION_MS: u64 = 500;
pub const DEFAULT_FRAME_INTERVAL_MS: u64 = 16; // ~60fps
pub const DEFAULT_BROADCAST_BUFFER: usize = 256;
pub const DEFAULT_UPSTREAM_HTTP_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_UPSTREAM_CONNECT_TIMEOUT_SECS: u64 = 3;

/// Where countries and population seeds come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    PopulationIo,
    Static,
}

/// How a seed becomes a growth rate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RatePolicy {
    ForecastDiff,
    Demographic(DemographicRates),
}

#[derive(Debug, Clone)]
pub struct ClockConfig {
    pub tick_interval: Duration,
    pub rate_scale: f64,
    pub rate_policy: RatePolicy,
    pub animation_duration: Duration,
    pub frame_interval: Duration,
    pub broadcast_buffer: usize,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(DEFAULT_TICK_INTERVAL_MS),
            rate_scale: DEFAULT_RATE_SCALE,
            rate_policy: RatePolicy::Demographic(DemographicRates::default()),
            animation_duration: Duration::from_millis(DEFAULT_ANIMATION_MS),
            frame_interval: Duration::from_millis(DEFAULT_FRAME_INTERVAL_MS),
            broadcast_buffer: DEFAULT_BROADCAST_BUFFER,
        }
    }
}

impl ClockConfig {
    pub fn from_env() -> Self {
        Self {
            tick_interval: tick_interval(),
            rate_scale: rate_scale(),
            rate_policy: rate_policy(source_kind()),
            animation_duration: animation_duration(),
            frame_interval: frame_interval(),
            broadcast_buffer: broadcast_buffer(),
        }
    }
}

fn env_positive_u64(key: &str) -> Option<u64> {
    std::env::var(key)
        .ok()
        .and_then(|value| value.trim().parse::<u64>().ok())
        .filter(|value| *value > 0)
}

fn env_finite_f64(key: &str) -> Option<f64> {
    std::env::var(key)
        .ok()
        .and_then(|value| value.trim().parse::<f64>().ok())
        .filter(|value| value.is_finite())
}

pub fn tick_interval() -> Duration {
    Duration::from_millis(
        env_positive_u64("POPCLOCK_TICK_INTERVAL_MS").unwrap_or(DEFAULT_TICK_INTERVAL_MS),
    )
}

pub fn rate_scale() -> f64 {
    env_finite_f64("POPCLOCK_RATE_SCALE")
        .filter(|value| *value > 0.0)
        .unwrap_or(DEFAULT_RATE_SCALE)
}

pub fn animation_duration() -> Duration {
    // Zero is allowed here: it disables the transition.
    let ms = std::env::var("POPCLOCK_ANIMATION_MS")
        .ok()
        .and_then(|value| value.trim().parse::<u64>().ok())
        .unwrap_or(DEFAULT_ANIMATION_MS);
    Duration::from_millis(ms)
}

pub fn frame_interval() -> Duration {
    Duration::from_millis(
        env_positive_u64("POPCLOCK_FRAME_INTERVAL_MS").unwrap_or(DEFAULT_FRAME_INTERVAL_MS),
    )
}

pub fn broadcast_buffer() -> usize {
    env_positive_u64("POPCLOCK_BROADCAST_BUFFER")
        .and_then(|value| usize::try_from(value).ok())
        .unwrap_or(DEFAULT_BROADCAST_BUFFER)
}

pub fn source_kind() -> SourceKind {
    match std::env::var("POPCLOCK_SOURCE")
        .map(|value| value.trim().to_ascii_lowercase())
        .as_deref()
    {
        Ok("http") | Ok("population.io") | Ok("api") => SourceKind::PopulationIo,
        _ => SourceKind::Static,
    }
}

/// Defaults to the forecast policy for the HTTP source and the demographic
/// model for the static table, which has no forecast.
pub fn rate_policy(source: SourceKind) -> RatePolicy {
    let requested = std::env::var("POPCLOCK_RATE_POLICY")
        .map(|value| value.trim().to_ascii_lowercase())
        .ok();
    match (requested.as_deref(), source) {
        (Some("forecast"), _) => RatePolicy::ForecastDiff,
        (Some("demographic"), _) | (_, SourceKind::Static) => {
            RatePolicy::Demographic(demographic_rates())
        }
        (_, SourceKind::PopulationIo) => RatePolicy::ForecastDiff,
    }
}

pub fn demographic_rates() -> DemographicRates {
    DemographicRates::new(
        env_finite_f64("POPCLOCK_BIRTH_RATE")
            .filter(|value| *value >= 0.0)
            .unwrap_or(DEFAULT_BIRTH_RATE),
        env_finite_f64("POPCLOCK_DEATH_RATE")
            .filter(|value| *value >= 0.0)
            .unwrap_or(DEFAULT_DEATH_RATE),
    )
}

pub fn api_base() -> String {
    std::env::var("POPCLOCK_API_BASE")
        .ok()
        .map(|value| value.trim().trim_end_matches('/').to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| POPULATION_API_BASE.to_string())
}

pub fn upstream_http_timeout() -> Duration {
    Duration::from_secs(
        env_positive_u64("UPSTREAM_HTTP_TIMEOUT_SECS")
            .unwrap_or(DEFAULT_UPSTREAM_HTTP_TIMEOUT_SECS),
    )
}

pub fn upstream_connect_timeout() -> Duration {
    Duration::from_secs(
        env_positive_u64("UPSTREAM_CONNECT_TIMEOUT_SECS")
            .unwrap_or(DEFAULT_UPSTREAM_CONNECT_TIMEOUT_SECS),
    )
}

/// Comma-separated country names the headless shell tracks on startup.
pub fn startup_countries() -> Vec<String> {
    std::env::var("POPCLOCK_COUNTRIES")
        .map(|value| {
            value
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}
