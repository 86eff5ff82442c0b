use std::f64::consts::PI;

/// Ease-in-out on a half cosine: slow start, fast middle, slow finish.
pub fn ease_in_out(progress: f64) -> f64 {
    let p = progress.clamp(0.0, 1.0);
    0.5 - (p * PI).cos() / 2.0
}

/// An eased count transition between two populations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CountAnimation {
    pub from: u64,
    pub to: u64,
    pub start_time: f64,
    pub duration: f64, // milliseconds
}

impl CountAnimation {
    pub fn new(from: u64, to: u64, start_time: f64, duration: f64) -> Self {
        Self {
            from,
            to,
            start_time,
            duration,
        }
    }

    pub fn progress(&self, now: f64) -> f64 {
        if self.duration <= 0.0 {
            return 1.0;
        }
        ((now - self.start_time) / self.duration).clamp(0.0, 1.0)
    }

    pub fn is_finished(&self, now: f64) -> bool {
        self.progress(now) >= 1.0
    }

    /// Displayed value at `now`; exactly `to` once the duration has elapsed.
    pub fn value_at(&self, now: f64) -> u64 {
        let progress = self.progress(now);
        if progress >= 1.0 {
            return self.to;
        }
        let from = self.from as f64;
        let span = self.to as f64 - from;
        let value = (from + span * ease_in_out(progress)).floor();
        let (lo, hi) = (self.from.min(self.to), self.from.max(self.to));
        (value.max(0.0) as u64).clamp(lo, hi)
    }

    /// Values sampled every `step` milliseconds from the start time,
    /// always ending with `to`.
    pub fn frames(&self, step: f64) -> Frames {
        Frames {
            animation: *self,
            step: if step > 0.0 { step } else { self.duration.max(1.0) },
            elapsed: 0.0,
            done: false,
        }
    }
}

/// Lazy, finite frame sequence of a [`CountAnimation`].
#[derive(Debug, Clone)]
pub struct Frames {
    animation: CountAnimation,
    step: f64,
    elapsed: f64,
    done: bool,
}

impl Iterator for Frames {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        if self.done {
            return None;
        }
        let now = self.animation.start_time + self.elapsed;
        if self.animation.is_finished(now) {
            self.done = true;
        }
        self.elapsed += self.step;
        Some(self.animation.value_at(now))
    }
}
