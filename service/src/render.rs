use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use popclock_shared::format::{format_count, format_delta};
use popclock_shared::{CountAnimation, PopulationChange};
use tokio::task::JoinHandle;
use tracing::{info, trace};

/// One display refresh for a country row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowUpdate {
    pub value: u64,
    pub delta: i64,
    pub total_change: i64,
    /// Final frame of the transition.
    pub settled: bool,
}

/// Where rows are drawn. Implementations must tolerate updates for rows
/// they no longer show.
pub trait RenderSurface: Send + Sync + 'static {
    fn create_row(&self, country: &str, initial: u64);
    fn update_row(&self, country: &str, update: RowUpdate);
    fn remove_row(&self, country: &str);
}

/// Consumer of clock lifecycle and change events.
pub trait Renderer: Send + Sync + 'static {
    fn row_created(&self, country: &str, population: u64);
    fn population_changed(&self, change: &PopulationChange);
    fn row_removed(&self, country: &str);
}

struct RowState {
    displayed: u64,
    animation: Option<JoinHandle<()>>,
}

/// Drives an eased count transition per row on the tokio runtime.
///
/// A change that arrives mid-transition aborts the running one and starts
/// again from whatever value is on screen.
pub struct AnimatedRenderer<T> {
    surface: Arc<T>,
    duration: Duration,
    frame_interval: Duration,
    rows: Arc<DashMap<String, RowState>>,
}

impl<T: RenderSurface> AnimatedRenderer<T> {
    pub fn new(surface: T, duration: Duration, frame_interval: Duration) -> Self {
        Self {
            surface: Arc::new(surface),
            duration,
            frame_interval: frame_interval.max(Duration::from_millis(1)),
            rows: Arc::new(DashMap::new()),
        }
    }

    pub fn surface(&self) -> &T {
        &self.surface
    }

    /// Value currently on screen for `country`.
    pub fn displayed(&self, country: &str) -> Option<u64> {
        self.rows.get(country).map(|row| row.displayed)
    }
}

impl<T: RenderSurface> Renderer for AnimatedRenderer<T> {
    fn row_created(&self, country: &str, population: u64) {
        if let Some(old) = self.rows.insert(
            country.to_string(),
            RowState {
                displayed: population,
                animation: None,
            },
        ) {
            if let Some(task) = old.animation {
                task.abort();
            }
        }
        self.surface.create_row(country, population);
    }

    fn population_changed(&self, change: &PopulationChange) {
        let Some(mut row) = self.rows.get_mut(&change.country) else {
            trace!(country = %change.country, "change for a row that is gone");
            return;
        };
        if let Some(task) = row.animation.take() {
            task.abort();
        }

        if self.duration.is_zero() {
            row.displayed = change.new;
            drop(row);
            self.surface.update_row(
                &change.country,
                RowUpdate {
                    value: change.new,
                    delta: change.delta,
                    total_change: change.total_change,
                    settled: true,
                },
            );
            return;
        }

        let animation = CountAnimation::new(
            row.displayed,
            change.new,
            0.0,
            self.duration.as_secs_f64() * 1000.0,
        );
        row.animation = Some(tokio::spawn(animate(
            Arc::clone(&self.surface),
            Arc::clone(&self.rows),
            change.clone(),
            animation,
            self.frame_interval,
        )));
    }

    fn row_removed(&self, country: &str) {
        if let Some((_, row)) = self.rows.remove(country) {
            if let Some(task) = row.animation {
                task.abort();
            }
        }
        self.surface.remove_row(country);
    }
}

async fn animate<T: RenderSurface>(
    surface: Arc<T>,
    rows: Arc<DashMap<String, RowState>>,
    change: PopulationChange,
    animation: CountAnimation,
    frame_interval: Duration,
) {
    let started = tokio::time::Instant::now();
    let mut frames = tokio::time::interval(frame_interval);
    frames.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        frames.tick().await;
        let now = started.elapsed().as_secs_f64() * 1000.0;
        let value = animation.value_at(now);
        let settled = animation.is_finished(now);

        match rows.get_mut(&change.country) {
            Some(mut row) => row.displayed = value,
            None => return,
        }
        surface.update_row(
            &change.country,
            RowUpdate {
                value,
                delta: change.delta,
                total_change: change.total_change,
                settled,
            },
        );
        if settled {
            return;
        }
    }
}

/// Renders rows as log lines: settled values at info, frames at trace.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSurface;

impl RenderSurface for LogSurface {
    fn create_row(&self, country: &str, initial: u64) {
        info!(%country, population = %format_count(initial), "tracking");
    }

    fn update_row(&self, country: &str, update: RowUpdate) {
        if update.settled {
            info!(
                %country,
                population = %format_count(update.value),
                change = %format_delta(update.delta),
                total = %format_delta(update.total_change),
                "population"
            );
        } else {
            trace!(%country, population = update.value, "frame");
        }
    }

    fn remove_row(&self, country: &str) {
        info!(%country, "stopped tracking");
    }
}
