use std::ops::ControlFlow;
use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use popclock_shared::{
    Growth, Jitter, PopulationChange, ProjectionEngine, SupportedCountry, TrackedProjection,
    UniformJitter,
};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::{Mutex, broadcast};
use tracing::{info, warn};

use crate::config::ClockConfig;
use crate::error::{ClockError, ClockResult};
use crate::registry::CountryRegistry;
use crate::render::Renderer;
use crate::services::ticker::PeriodicTask;
use crate::source::CountryDataSource;

pub type BoxedJitter = Box<dyn Jitter + Send>;

struct Tracker {
    engine: ProjectionEngine,
    jitter: BoxedJitter,
}

struct ClockInner<S, R> {
    config: ClockConfig,
    source: Arc<S>,
    registry: CountryRegistry<S>,
    renderer: R,
    tracker: Mutex<Tracker>,
    driver: PeriodicTask,
    event_tx: broadcast::Sender<PopulationChange>,
}

/// Owns the tracked projections and the single tick driver over them.
///
/// The driver runs exactly while at least one country is tracked.
pub struct PopulationClock<S, R> {
    inner: Arc<ClockInner<S, R>>,
}

impl<S, R> Clone for PopulationClock<S, R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: CountryDataSource, R: Renderer> PopulationClock<S, R> {
    pub fn new(source: S, renderer: R, config: ClockConfig) -> Self {
        let jitter = UniformJitter::with_default_bounds(StdRng::from_entropy());
        Self::with_jitter(source, renderer, config, Box::new(jitter))
    }

    pub fn with_jitter(source: S, renderer: R, config: ClockConfig, jitter: BoxedJitter) -> Self {
        let source = Arc::new(source);
        let (event_tx, _) = broadcast::channel(config.broadcast_buffer.max(1));
        Self {
            inner: Arc::new(ClockInner {
                registry: CountryRegistry::new(Arc::clone(&source)),
                driver: PeriodicTask::new(config.tick_interval),
                config,
                source,
                renderer,
                tracker: Mutex::new(Tracker {
                    engine: ProjectionEngine::new(),
                    jitter,
                }),
                event_tx,
            }),
        }
    }

    pub fn config(&self) -> &ClockConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> &CountryRegistry<S> {
        &self.inner.registry
    }

    pub fn renderer(&self) -> &R {
        &self.inner.renderer
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PopulationChange> {
        self.inner.event_tx.subscribe()
    }

    pub fn is_ticking(&self) -> bool {
        self.inner.driver.is_running()
    }

    pub async fn snapshot(&self) -> Vec<TrackedProjection> {
        self.inner.tracker.lock().await.engine.iter().cloned().collect()
    }

    pub async fn tracked_countries(&self) -> Vec<SupportedCountry> {
        self.inner.tracker.lock().await.engine.countries()
    }

    /// Resolves `input`, seeds it from the data source and starts tracking.
    /// Nothing changes unless every step succeeds.
    pub async fn add_country(&self, input: &str) -> ClockResult<TrackedProjection> {
        let country = self.inner.registry.resolve(input).await?;

        if self.inner.tracker.lock().await.engine.contains(&country) {
            return Err(ClockError::AlreadyTracked(country));
        }

        let seed = self
            .inner
            .source
            .population_seed(&country)
            .await
            .inspect_err(|e| warn!(%country, error = %e, "failed to fetch population seed"))?;
        let (population, growth) = seed.growth(
            &country,
            self.inner.config.rate_policy,
            self.inner.config.rate_scale,
        )?;

        self.track(country, population, growth).await
    }

    /// Starts tracking an already-resolved country with a known growth model.
    pub async fn track(
        &self,
        country: SupportedCountry,
        initial_population: u64,
        growth: Growth,
    ) -> ClockResult<TrackedProjection> {
        let mut tracker = self.inner.tracker.lock().await;
        let entry = tracker
            .engine
            .track(country, initial_population, growth, Utc::now())?
            .clone();
        info!(
            country = %entry.country,
            population = entry.population,
            rate = entry.rate(),
            tracked = tracker.engine.len(),
            "tracking country"
        );
        self.inner
            .renderer
            .row_created(&entry.country, entry.population);
        self.ensure_ticking();
        Ok(entry)
    }

    /// Stops tracking `country`; a no-op if it is not tracked. Removing the
    /// last country stops the driver.
    pub async fn untrack(&self, country: &str) -> Option<TrackedProjection> {
        let mut tracker = self.inner.tracker.lock().await;
        let removed = tracker.engine.untrack(country)?;
        if tracker.engine.is_empty() {
            self.inner.driver.stop();
        }
        self.inner.renderer.row_removed(country);
        drop(tracker);

        info!(%country, "untracked country");
        Some(removed)
    }

    /// Untracks everything, in insertion order.
    pub async fn clear(&self) {
        for country in self.tracked_countries().await {
            self.untrack(&country).await;
        }
    }

    /// One extrapolation pass at `now`.
    ///
    /// Changes are rendered and broadcast while the engine lock is held, so
    /// no change reaches a subscriber after its row was removed, and passes
    /// from the driver and from callers never interleave.
    pub async fn tick(&self, now: DateTime<Utc>) -> Vec<PopulationChange> {
        tick_inner(&self.inner, now).await
    }

    fn ensure_ticking(&self) {
        let weak: Weak<ClockInner<S, R>> = Arc::downgrade(&self.inner);
        self.inner.driver.start(move || {
            let weak = weak.clone();
            async move {
                let Some(inner) = weak.upgrade() else {
                    return ControlFlow::Break(());
                };
                tick_inner(&inner, Utc::now()).await;
                ControlFlow::Continue(())
            }
        });
    }
}

async fn tick_inner<S, R: Renderer>(
    inner: &ClockInner<S, R>,
    now: DateTime<Utc>,
) -> Vec<PopulationChange> {
    let mut guard = inner.tracker.lock().await;
    let Tracker { engine, jitter } = &mut *guard;
    let changes = engine.tick(now, &mut **jitter);
    // Renderer calls and sends never block.
    for change in &changes {
        inner.renderer.population_changed(change);
        // No subscribers is fine.
        let _ = inner.event_tx.send(change.clone());
    }
    drop(guard);
    changes
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    use chrono::TimeDelta;
    use popclock_shared::{DemographicRates, FixedJitter};

    use super::*;
    use crate::config::RatePolicy;
    use crate::error::SourceError;
    use crate::source::{PopulationSeed, StaticSource};

    #[derive(Default)]
    struct RecordingRenderer {
        events: StdMutex<Vec<String>>,
    }

    impl RecordingRenderer {
        fn events(&self) -> Vec<String> {
            self.events.lock().expect("renderer lock").clone()
        }

        fn push(&self, event: String) {
            self.events.lock().expect("renderer lock").push(event);
        }
    }

    impl Renderer for RecordingRenderer {
        fn row_created(&self, country: &str, population: u64) {
            self.push(format!("create {country} {population}"));
        }

        fn population_changed(&self, change: &PopulationChange) {
            self.push(format!("change {} {}->{}", change.country, change.old, change.new));
        }

        fn row_removed(&self, country: &str) {
            self.push(format!("remove {country}"));
        }
    }

    /// Serves a fixed list and forecasts; list fetch can be made to fail.
    struct ForecastSource {
        fail_list: bool,
    }

    impl CountryDataSource for ForecastSource {
        async fn list_countries(&self) -> Result<Vec<SupportedCountry>, SourceError> {
            if self.fail_list {
                return Err(SourceError::unavailable("503 Service Unavailable"));
            }
            Ok(vec!["Norway".into(), "Sweden".into(), "Atlantis".into()])
        }

        async fn population_seed(&self, country: &str) -> Result<PopulationSeed, SourceError> {
            match country {
                "Norway" => Ok(PopulationSeed::Forecast {
                    today: 1000,
                    tomorrow: 87_400,
                }),
                "Sweden" => Ok(PopulationSeed::Forecast {
                    today: 10_000,
                    tomorrow: 10_000,
                }),
                _ => Err(SourceError::insufficient(country)),
            }
        }
    }

    fn config(policy: RatePolicy) -> ClockConfig {
        ClockConfig {
            rate_policy: policy,
            tick_interval: Duration::from_millis(10),
            ..ClockConfig::default()
        }
    }

    fn forecast_clock(fail_list: bool) -> PopulationClock<ForecastSource, RecordingRenderer> {
        PopulationClock::with_jitter(
            ForecastSource { fail_list },
            RecordingRenderer::default(),
            config(RatePolicy::ForecastDiff),
            Box::new(FixedJitter(1.0)),
        )
    }

    #[tokio::test]
    async fn add_country_resolves_seeds_and_extrapolates() {
        let clock = forecast_clock(false);
        let entry = clock.add_country("NORWAY").await.expect("known country");
        assert_eq!(entry.country, "Norway");
        assert_eq!(entry.population, 1000);
        assert_eq!(entry.rate(), 1.0);
        clock.inner.driver.stop();

        let changes = clock.tick(entry.last_update + TimeDelta::seconds(10)).await;
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].delta, 10);
        assert_eq!(changes[0].new, 1010);
        assert_eq!(
            clock.renderer().events(),
            ["create Norway 1000", "change Norway 1000->1010"]
        );
    }

    #[tokio::test]
    async fn duplicate_add_is_rejected_and_entry_unchanged() {
        let clock = forecast_clock(false);
        let first = clock.add_country("Norway").await.expect("first add");
        let err = clock.add_country("norway").await.expect_err("duplicate");
        assert_eq!(err, ClockError::AlreadyTracked("Norway".into()));

        let err = clock
            .track("Norway".into(), 1, Growth::per_second(-50.0))
            .await
            .expect_err("duplicate track");
        assert_eq!(err, ClockError::AlreadyTracked("Norway".into()));

        let snapshot = clock.snapshot().await;
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].growth, first.growth);
        assert!(snapshot[0].population >= first.population);
    }

    #[tokio::test]
    async fn unknown_country_suggests_and_changes_nothing() {
        let clock = forecast_clock(false);
        let err = clock.add_country("Finland").await.expect_err("no such country");
        assert!(matches!(err, ClockError::NotFound { .. }));
        assert!(err.suggestions().is_empty());

        let err = clock.add_country("SWED").await.expect_err("partial");
        assert_eq!(err.suggestions(), ["Sweden"]);

        assert!(clock.snapshot().await.is_empty());
        assert!(!clock.is_ticking());
        assert!(clock.renderer().events().is_empty());
    }

    #[tokio::test]
    async fn seed_failure_leaves_clock_untouched() {
        let clock = forecast_clock(false);
        let err = clock.add_country("atlantis").await.expect_err("no data");
        assert_eq!(err, ClockError::InsufficientData("Atlantis".into()));
        assert!(clock.snapshot().await.is_empty());
        assert!(!clock.is_ticking());
    }

    #[tokio::test]
    async fn unavailable_source_is_reported_and_retried() {
        let clock = forecast_clock(true);
        let err = clock.add_country("Norway").await.expect_err("list fails");
        assert!(matches!(err, ClockError::SourceUnavailable(_)));
        assert!(!clock.registry().is_loaded());
        assert!(clock.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn static_table_under_forecast_policy_is_insufficient() {
        let clock = PopulationClock::with_jitter(
            StaticSource::default(),
            RecordingRenderer::default(),
            config(RatePolicy::ForecastDiff),
            Box::new(FixedJitter(1.0)),
        );
        let err = clock.add_country("Iceland").await.expect_err("no forecast");
        assert_eq!(err, ClockError::InsufficientData("Iceland".into()));
    }

    #[tokio::test]
    async fn static_table_uses_demographic_model() {
        let rates = DemographicRates::new(18.0, 8.0);
        let clock = PopulationClock::with_jitter(
            StaticSource::default(),
            RecordingRenderer::default(),
            config(RatePolicy::Demographic(rates)),
            Box::new(FixedJitter(1.0)),
        );
        let entry = clock.add_country("india").await.expect("static country");
        assert_eq!(entry.population, 1_380_004_385);
        assert_eq!(entry.growth, Growth::demographic(rates, 1.0));
        clock.inner.driver.stop();

        let changes = clock.tick(entry.last_update + TimeDelta::hours(1)).await;
        // 10 per 1000 per year over one hour.
        let expected = (10.0 / (365.0 * 24.0) * 1_380_004.385_f64).round() as i64;
        assert_eq!(changes[0].delta, expected);
    }

    #[tokio::test]
    async fn zero_rate_never_renders_changes() {
        let clock = forecast_clock(false);
        let entry = clock.add_country("Sweden").await.expect("known");
        assert_eq!(entry.rate(), 0.0);
        clock.inner.driver.stop();
        let mut rx = clock.subscribe();

        for step in 1..=20 {
            assert!(
                clock
                    .tick(entry.last_update + TimeDelta::minutes(step))
                    .await
                    .is_empty()
            );
        }
        assert_eq!(clock.renderer().events(), ["create Sweden 10000"]);
        assert!(matches!(
            rx.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }

    #[tokio::test]
    async fn driver_follows_tracked_set_and_restarts() {
        let clock = forecast_clock(false);
        assert!(!clock.is_ticking());

        clock.add_country("Norway").await.expect("add");
        clock.add_country("Sweden").await.expect("add");
        assert!(clock.is_ticking());

        assert!(clock.untrack("Norway").await.is_some());
        assert!(clock.is_ticking());
        assert!(clock.untrack("Norway").await.is_none());

        assert!(clock.untrack("Sweden").await.is_some());
        assert!(!clock.is_ticking());

        let fresh = clock.add_country("Norway").await.expect("re-add");
        assert_eq!(fresh.population, 1000);
        assert_eq!(fresh.total_change, 0);
        assert!(clock.is_ticking());

        clock.clear().await;
        assert!(!clock.is_ticking());
        assert!(clock.tracked_countries().await.is_empty());
    }

    #[tokio::test]
    async fn running_driver_broadcasts_changes() {
        let clock = PopulationClock::with_jitter(
            ForecastSource { fail_list: false },
            RecordingRenderer::default(),
            // +100 per second once scaled, ticking every 10ms.
            ClockConfig {
                rate_scale: 100.0,
                ..config(RatePolicy::ForecastDiff)
            },
            Box::new(FixedJitter(1.0)),
        );
        let mut rx = clock.subscribe();
        clock.add_country("Norway").await.expect("add");

        let change = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("a change within two seconds")
            .expect("channel open");
        assert_eq!(change.country, "Norway");
        assert!(change.new > change.old);

        clock.clear().await;
    }

    /// Walks the renderer log and fails on a change for a row that is not
    /// currently created.
    fn assert_changes_only_for_live_rows(events: &[String]) {
        let mut live = false;
        for event in events {
            match event.split(' ').next() {
                Some("create") => {
                    assert!(!live, "row created twice: {events:?}");
                    live = true;
                }
                Some("remove") => {
                    assert!(live, "row removed twice: {events:?}");
                    live = false;
                }
                Some("change") => assert!(live, "change after removal: {event}"),
                _ => panic!("unexpected event {event}"),
            }
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn ticks_racing_untrack_never_render_removed_rows() {
        let clock = PopulationClock::with_jitter(
            ForecastSource { fail_list: false },
            RecordingRenderer::default(),
            ClockConfig {
                broadcast_buffer: 1024,
                ..config(RatePolicy::ForecastDiff)
            },
            Box::new(FixedJitter(1.0)),
        );
        let mut rx = clock.subscribe();
        clock
            .track("Norway".into(), 1000, Growth::per_second(1000.0))
            .await
            .expect("track");
        clock.inner.driver.stop();

        let ticker = {
            let clock = clock.clone();
            tokio::spawn(async move {
                let base = Utc::now() + TimeDelta::hours(1);
                for i in 0..500 {
                    clock.tick(base + TimeDelta::seconds(i)).await;
                    tokio::task::yield_now().await;
                }
            })
        };
        let churner = {
            let clock = clock.clone();
            tokio::spawn(async move {
                for _ in 0..200 {
                    clock.untrack("Norway").await;
                    tokio::task::yield_now().await;
                    clock
                        .track("Norway".into(), 1000, Growth::per_second(1000.0))
                        .await
                        .expect("retrack");
                    clock.inner.driver.stop();
                }
            })
        };
        ticker.await.expect("ticker task");
        churner.await.expect("churner task");

        assert_changes_only_for_live_rows(&clock.renderer().events());

        // Broadcast order follows tick order within each tracked lifetime.
        let mut last_new = None;
        while let Ok(change) = rx.try_recv() {
            if change.old == 1000 {
                last_new = None;
            }
            if let Some(previous) = last_new {
                assert_eq!(change.old, previous);
            }
            last_new = Some(change.new);
        }

        clock.clear().await;
    }

    #[tokio::test]
    async fn dropping_the_clock_ends_the_driver() {
        let clock = forecast_clock(false);
        clock.add_country("Norway").await.expect("add");
        let weak = Arc::downgrade(&clock.inner);
        drop(clock);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(weak.upgrade().is_none());
    }
}
