use std::future::Future;
use std::ops::ControlFlow;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// A cancellable fixed-period task. At most one loop runs at a time.
pub struct PeriodicTask {
    period: Duration,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl PeriodicTask {
    pub fn new(period: Duration) -> Self {
        Self {
            period: period.max(Duration::from_millis(1)),
            handle: Mutex::new(None),
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    fn slot(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.handle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_running(&self) -> bool {
        self.slot()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Spawns the loop unless one is already running. Returns whether a new
    /// loop was started. `on_tick` returning `Break` ends the loop.
    pub fn start<F, Fut>(&self, on_tick: F) -> bool
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ControlFlow<()>> + Send + 'static,
    {
        let mut slot = self.slot();
        if slot.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return false;
        }
        info!(period_ms = self.period.as_millis() as u64, "starting periodic task");
        *slot = Some(tokio::spawn(run(self.period, on_tick)));
        true
    }

    /// Cancels the running loop, if any. Returns whether one was running.
    pub fn stop(&self) -> bool {
        match self.slot().take() {
            Some(handle) => {
                let was_running = !handle.is_finished();
                handle.abort();
                if was_running {
                    info!("stopped periodic task");
                }
                was_running
            }
            None => false,
        }
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        if let Some(handle) = self.slot().take() {
            handle.abort();
        }
    }
}

pub async fn run<F, Fut>(period: Duration, mut on_tick: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ControlFlow<()>>,
{
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        interval.tick().await;
        if on_tick().await.is_break() {
            debug!("periodic task finished");
            return;
        }
    }
}
